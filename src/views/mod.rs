//! Admin collections and the typed rows each list screen shows.
//!
//! Documents are schema-less, so every view reads its fields defensively:
//! missing text becomes [`PLACEHOLDER`], missing numbers `0`, missing flags
//! `false`.

mod fields;
mod models;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::{Document, OrderBy};

pub use fields::PLACEHOLDER;
pub use models::{
    BannerView, BrandView, CategoryView, CouponView, InventoryView, OrderView, ProductView,
    UserView,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Categories,
    Brands,
    Products,
    Banners,
    Coupons,
    Orders,
    Inventory,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Categories,
        Collection::Brands,
        Collection::Products,
        Collection::Banners,
        Collection::Coupons,
        Collection::Orders,
        Collection::Inventory,
        Collection::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::Brands => "brands",
            Collection::Products => "products",
            Collection::Banners => "banners",
            Collection::Coupons => "coupons",
            Collection::Orders => "orders",
            Collection::Inventory => "inventory",
            Collection::Users => "users",
        }
    }

    /// Ordering a list screen uses when none is requested.
    pub fn default_order(&self) -> OrderBy {
        match self {
            Collection::Categories | Collection::Brands | Collection::Products => {
                OrderBy::asc("name")
            }
            Collection::Banners => OrderBy::asc("title"),
            Collection::Coupons => OrderBy::asc("code"),
            Collection::Orders => OrderBy::desc("created_at"),
            Collection::Inventory => OrderBy::asc("product_name"),
            Collection::Users => OrderBy::asc("email"),
        }
    }

    pub fn view(&self, doc: &Document) -> View {
        match self {
            Collection::Categories => View::Category(CategoryView::from(doc)),
            Collection::Brands => View::Brand(BrandView::from(doc)),
            Collection::Products => View::Product(ProductView::from(doc)),
            Collection::Banners => View::Banner(BannerView::from(doc)),
            Collection::Coupons => View::Coupon(CouponView::from(doc)),
            Collection::Orders => View::Order(OrderView::from(doc)),
            Collection::Inventory => View::Inventory(InventoryView::from(doc)),
            Collection::Users => View::User(UserView::from(doc)),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection: {0}")]
pub struct UnknownCollection(pub String);

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum View {
    Category(CategoryView),
    Brand(BrandView),
    Product(ProductView),
    Banner(BannerView),
    Coupon(CouponView),
    Order(OrderView),
    Inventory(InventoryView),
    User(UserView),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn doc(value: serde_json::Value) -> Document {
        let data: Map<_, _> = value.as_object().cloned().unwrap_or_default();
        Document::new("d1", data)
    }

    #[test]
    fn collection_names_round_trip() {
        for c in Collection::ALL {
            assert_eq!(c.as_str().parse::<Collection>().unwrap(), c);
        }
        assert!("widgets".parse::<Collection>().is_err());
    }

    #[test]
    fn missing_fields_fall_back() {
        let view = ProductView::from(&doc(json!({ "name": "Tee" })));
        assert_eq!(view.id, "d1");
        assert_eq!(view.name, "Tee");
        assert_eq!(view.brand, PLACEHOLDER);
        assert_eq!(view.price, 0.0);
        assert_eq!(view.stock, 0);
    }

    #[test]
    fn loose_values_are_coerced() {
        let view = ProductView::from(&doc(json!({
            "name": "Mug",
            "price": "12.50",
            "stock": 7.0,
            "brand": "  ",
        })));
        assert_eq!(view.price, 12.5);
        assert_eq!(view.stock, 7);
        assert_eq!(view.brand, PLACEHOLDER);

        let order = OrderView::from(&doc(json!({ "items": [1, 2, 3], "total": 30 })));
        assert_eq!(order.item_count, 3);
        assert_eq!(order.total, 30.0);
    }

    #[test]
    fn user_view_never_carries_password_hash() {
        let user = doc(json!({
            "email": "ops@shop.test",
            "password_hash": "$2b$12$abc",
            "is_superadmin": true,
        }));
        let json = serde_json::to_value(Collection::Users.view(&user)).unwrap();
        assert_eq!(json["email"], "ops@shop.test");
        assert_eq!(json["is_superadmin"], true);
        assert!(json.get("password_hash").is_none());
    }
}
