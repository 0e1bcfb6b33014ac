use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Site;

/// A listing exactly as an adapter scraped it, before any parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawListing {
    pub site: Site,
    pub title: String,
    pub price_text: Option<String>,
    pub original_price_text: Option<String>,
    pub discount_text: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

impl RawListing {
    pub fn new(site: Site, title: impl Into<String>) -> Self {
        Self {
            site,
            title: title.into(),
            price_text: None,
            original_price_text: None,
            discount_text: None,
            url: None,
            image: None,
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price_text = Some(price.into());
        self
    }

    pub fn with_original_price(mut self, original: impl Into<String>) -> Self {
        self.original_price_text = Some(original.into());
        self
    }

    pub fn with_discount(mut self, badge: impl Into<String>) -> Self {
        self.discount_text = Some(badge.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Canonical product record produced by the normalizer. Never mutated after
/// normalization; `discount_percent` is only set when both prices parsed and
/// the original is higher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub title: String,
    pub site: Site,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<u8>,
    pub price_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Product {
    pub fn has_discount(&self) -> bool {
        self.discount_percent.is_some()
    }

    /// Which listing this is, regardless of its current price.
    pub fn deal_key(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.title)
    }

    /// Identity of this deal for alert de-duplication. Two products with the
    /// same fingerprint are the same notification.
    pub fn fingerprint(&self) -> String {
        let key = self.deal_key();
        let discount = self
            .discount_percent
            .map(|d| d.to_string())
            .unwrap_or_default();
        let price = self
            .price
            .map(|p| p.normalize().to_string())
            .unwrap_or_default();
        format!("{}|{}|{}", key, discount, price)
    }
}
