use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Alert, NotifyMethod, Product, Site};
use crate::utils::error::AppError;

/// A rendered deal notification, ready to hand to a delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub alert_id: String,
    pub method: NotifyMethod,
    pub contact: String,
    pub product_title: String,
    pub site: Site,
    pub url: Option<String>,
    pub price_text: String,
    pub discount_percent: Option<u8>,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn for_match(alert: &Alert, product: &Product) -> Self {
        let discount = product
            .discount_percent
            .map(|d| format!("{}% off", d))
            .unwrap_or_else(|| "a new price".to_string());
        let subject = format!("Deal alert: {} is {}", product.title, discount);

        let mut body = format!(
            "A deal matching \"{}\" is live on {}.\n\n{}\nPrice: {}",
            alert.keyword, product.site, product.title, product.price_text
        );
        if let Some(original) = &product.original_price_text {
            body.push_str(&format!(" (was {})", original));
        }
        if let Some(url) = &product.url {
            body.push_str(&format!("\n{}", url));
        }

        Self {
            alert_id: alert.id.clone(),
            method: alert.method,
            contact: alert.contact.clone(),
            product_title: product.title.clone(),
            site: product.site,
            url: product.url.clone(),
            price_text: product.price_text.clone(),
            discount_percent: product.discount_percent,
            subject,
            body,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationReceipt {
    pub receipt_id: String,
    pub method: NotifyMethod,
    pub delivered_at: DateTime<Utc>,
}

/// A delivery channel for alert notifications (email, WhatsApp, SMS).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn method(&self) -> NotifyMethod;

    async fn notify(&self, notification: &Notification) -> Result<NotificationReceipt, AppError>;
}
