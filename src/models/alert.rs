use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{generate_id, NotifyMethod, Product, Site};
use crate::utils::error::AppError;

/// A user's subscription to be told when a matching deal shows up.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Alert {
    pub id: String,
    pub keyword: String,
    pub product_title: String,
    pub product_url: Option<String>,
    pub product_site: Option<Site>,
    pub min_discount: Option<i64>,
    pub method: NotifyMethod,
    pub contact: String,
    pub created_at: DateTime<Utc>,

    // Summary of the most recent firing across all listings
    pub fired: bool,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub last_fired_snapshot: Option<String>,
    pub version: i64,
}

/// The last notification sent for one listing under an alert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DealFiring {
    pub alert_id: String,
    pub deal_key: String,
    pub snapshot: String,
    pub fired_at: DateTime<Utc>,
    pub version: i64,
}

/// The product a subscription was created from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProductRef {
    pub title: String,
    pub url: Option<String>,
    pub site: Option<Site>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlert {
    pub keyword: String,
    pub product: ProductRef,
    pub min_discount: Option<i64>,
    pub method: NotifyMethod,
    pub contact: String,
}

impl Alert {
    pub fn new(new_alert: NewAlert) -> Self {
        Self {
            id: generate_id(),
            keyword: new_alert.keyword.trim().to_string(),
            product_title: new_alert.product.title,
            product_url: new_alert.product.url.filter(|u| !u.trim().is_empty()),
            product_site: new_alert.product.site,
            min_discount: new_alert.min_discount,
            method: new_alert.method,
            contact: new_alert.contact.trim().to_string(),
            created_at: Utc::now(),
            fired: false,
            last_fired_at: None,
            last_fired_snapshot: None,
            version: 0,
        }
    }

    /// Whether `product` is a deal this alert is waiting for.
    ///
    /// Identity is a case-insensitive keyword hit on the title, or an exact
    /// URL match against the product the alert was created from. The product
    /// must carry a discount at or above the threshold; with no threshold any
    /// discount qualifies.
    pub fn matches(&self, product: &Product) -> bool {
        let discount = match product.discount_percent {
            Some(d) => i64::from(d),
            None => return false,
        };
        if let Some(min) = self.min_discount {
            if discount < min {
                return false;
            }
        }

        let keyword = self.keyword.to_lowercase();
        let keyword_hit = !keyword.is_empty() && product.title.to_lowercase().contains(&keyword);
        let url_hit = match (&self.product_url, &product.url) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => false,
        };

        keyword_hit || url_hit
    }
}

/// Parse the free-text discount field of a subscription.
///
/// Accepts `"30"`, `"30%"`, `"Any"` or an empty string; the latter two mean
/// no threshold.
pub fn parse_threshold(text: Option<&str>) -> Result<Option<i64>, AppError> {
    let raw = match text.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(t) => t,
    };
    if raw.eq_ignore_ascii_case("any") {
        return Ok(None);
    }

    let digits = raw.trim_end_matches('%').trim();
    let value: i64 = digits
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid discount threshold: {}", raw)))?;
    if !(0..=100).contains(&value) {
        return Err(AppError::validation(format!(
            "Discount threshold must be between 0 and 100, got {}",
            value
        )));
    }
    Ok(Some(value))
}
