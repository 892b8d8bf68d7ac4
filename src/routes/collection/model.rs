use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;
use crate::store::{Filter, OrderBy};
use crate::views::View;

const PAGE: &str = "page";
const PAGE_SIZE: &str = "page_size";
const ORDER_BY: &str = "order_by";
const DESC: &str = "desc";

/// List query string. Anything that is not a paging or ordering parameter is
/// an equality filter; values are read as JSON when they parse, so `stock=0`
/// matches the number and `active=true` the boolean.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: usize,
    pub page_size: usize,
    pub order_by: Option<OrderBy>,
    pub filter: Filter,
}

impl ListParams {
    pub fn parse(mut raw: HashMap<String, String>, config: &Config) -> Result<Self, AppError> {
        let page = match raw.remove(PAGE) {
            Some(v) => parse_number(PAGE, &v)?,
            None => 1,
        };
        let page_size = match raw.remove(PAGE_SIZE) {
            Some(v) => Some(parse_number(PAGE_SIZE, &v)?),
            None => None,
        };
        let desc = raw
            .remove(DESC)
            .is_some_and(|v| matches!(v.as_str(), "true" | "1"));
        let order_by = match raw.remove(ORDER_BY) {
            Some(field) => {
                check_field_name(&field)?;
                Some(if desc {
                    OrderBy::desc(field)
                } else {
                    OrderBy::asc(field)
                })
            }
            None => None,
        };

        let mut filter = Filter::new();
        for (field, value) in raw {
            check_field_name(&field)?;
            let value = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            filter = filter.eq(field, value);
        }

        Ok(Self {
            page,
            page_size: config.page_size(page_size),
            order_by,
            filter,
        })
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{name} must be a non-negative integer")))
}

fn check_field_name(field: &str) -> Result<(), AppError> {
    let valid = !field.is_empty()
        && field.len() <= 64
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid field name: {field}")))
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub rows: Vec<View>,
    pub has_more: bool,
    pub page: usize,
    pub page_size: usize,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::store::Direction;
    use serde_json::json;

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_params() {
        let params = ListParams::parse(HashMap::new(), &test_config()).unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 10);
        assert_eq!(params.order_by, None);
        assert!(params.filter.is_empty());
    }

    #[test]
    fn extra_params_become_typed_filters() {
        let params = ListParams::parse(
            raw(&[
                ("page", "3"),
                ("page_size", "500"),
                ("order_by", "price"),
                ("desc", "true"),
                ("status", "shipped"),
                ("stock", "0"),
            ]),
            &test_config(),
        )
        .unwrap();
        assert_eq!(params.page, 3);
        assert_eq!(params.page_size, 50);
        assert_eq!(params.order_by.unwrap().direction, Direction::Desc);
        assert_eq!(params.filter.conditions()["status"], json!("shipped"));
        assert_eq!(params.filter.conditions()["stock"], json!(0));
    }

    #[test]
    fn rejects_bad_numbers_and_field_names() {
        let config = test_config();
        assert!(ListParams::parse(raw(&[("page", "two")]), &config).is_err());
        assert!(ListParams::parse(raw(&[("order_by", "name; drop")]), &config).is_err());
        assert!(ListParams::parse(raw(&[("a-b", "x")]), &config).is_err());
    }
}
