use serde::Serialize;

use super::fields::{flag, integer, number, text};
use crate::store::Document;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
}

impl From<&Document> for CategoryView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: text(doc, "name"),
            description: text(doc, "description"),
            image_url: text(doc, "image_url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandView {
    pub id: String,
    pub name: String,
    pub logo_url: String,
}

impl From<&Document> for BrandView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: text(doc, "name"),
            logo_url: text(doc, "logo_url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub category: String,
    pub brand: String,
    pub price: f64,
    pub stock: i64,
    pub status: String,
    pub image_url: String,
}

impl From<&Document> for ProductView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: text(doc, "name"),
            category: text(doc, "category"),
            brand: text(doc, "brand"),
            price: number(doc, "price"),
            stock: integer(doc, "stock"),
            status: text(doc, "status"),
            image_url: text(doc, "image_url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BannerView {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub link: String,
    pub active: bool,
}

impl From<&Document> for BannerView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: text(doc, "title"),
            image_url: text(doc, "image_url"),
            link: text(doc, "link"),
            active: flag(doc, "active"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponView {
    pub id: String,
    pub code: String,
    pub discount: f64,
    pub discount_type: String,
    pub expires_at: String,
    pub active: bool,
}

impl From<&Document> for CouponView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            code: text(doc, "code"),
            discount: number(doc, "discount"),
            discount_type: text(doc, "discount_type"),
            expires_at: text(doc, "expires_at"),
            active: flag(doc, "active"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub id: String,
    pub customer_email: String,
    pub total: f64,
    pub status: String,
    pub item_count: i64,
    pub created_at: String,
}

impl From<&Document> for OrderView {
    fn from(doc: &Document) -> Self {
        let item_count = if doc.data.contains_key("item_count") {
            integer(doc, "item_count")
        } else {
            integer(doc, "items")
        };
        Self {
            id: doc.id.clone(),
            customer_email: text(doc, "customer_email"),
            total: number(doc, "total"),
            status: text(doc, "status"),
            item_count,
            created_at: text(doc, "created_at"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryView {
    pub id: String,
    pub product_name: String,
    pub sku: String,
    pub quantity: i64,
    pub warehouse: String,
}

impl From<&Document> for InventoryView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            product_name: text(doc, "product_name"),
            sku: text(doc, "sku"),
            quantity: integer(doc, "quantity"),
            warehouse: text(doc, "warehouse"),
        }
    }
}

/// Admin account as listed; the password hash stays in the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_superadmin: bool,
}

impl From<&Document> for UserView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            email: text(doc, "email"),
            first_name: text(doc, "first_name"),
            last_name: text(doc, "last_name"),
            role: text(doc, "role"),
            is_superadmin: flag(doc, "is_superadmin"),
        }
    }
}
