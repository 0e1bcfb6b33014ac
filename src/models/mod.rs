use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod alert;
pub mod product;
pub mod search;

// Re-exports for convenience
pub use alert::*;
pub use product::*;
pub use search::*;

/// The fixed set of stores dealscope knows how to search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum Site {
    #[sqlx(rename = "amazon")]
    Amazon,
    #[sqlx(rename = "flipkart")]
    Flipkart,
    #[sqlx(rename = "nykaa")]
    Nykaa,
}

/// How a free-text query is applied to a site's listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitlePolicy {
    /// The query must appear in the title.
    Strict,
    /// The store already scoped results server-side; loosely titled hits stay.
    AlwaysInclude,
}

impl Site {
    pub const ALL: [Site; 3] = [Site::Amazon, Site::Flipkart, Site::Nykaa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Amazon => "amazon",
            Site::Flipkart => "flipkart",
            Site::Nykaa => "nykaa",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Site::Amazon => "https://www.amazon.in",
            Site::Flipkart => "https://www.flipkart.com",
            Site::Nykaa => "https://www.nykaa.com",
        }
    }

    pub fn title_policy(&self) -> TitlePolicy {
        match self {
            Site::Amazon => TitlePolicy::Strict,
            Site::Flipkart | Site::Nykaa => TitlePolicy::AlwaysInclude,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amazon" => Ok(Site::Amazon),
            "flipkart" => Ok(Site::Flipkart),
            "nykaa" => Ok(Site::Nykaa),
            other => Err(format!("Unknown site: {}", other)),
        }
    }
}

/// Channel an alert is delivered through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum NotifyMethod {
    #[sqlx(rename = "email")]
    Email,
    #[sqlx(rename = "whatsapp")]
    WhatsApp,
    #[serde(rename = "SMS")]
    #[sqlx(rename = "sms")]
    Sms,
}

impl NotifyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyMethod::Email => "Email",
            NotifyMethod::WhatsApp => "WhatsApp",
            NotifyMethod::Sms => "SMS",
        }
    }

    /// Whether `contact` has the shape this channel delivers to: an address
    /// for email, a phone number of at least seven digits otherwise.
    pub fn accepts_contact(&self, contact: &str) -> bool {
        let contact = contact.trim();
        match self {
            NotifyMethod::Email => contact
                .split_once('@')
                .map_or(false, |(user, domain)| !user.is_empty() && !domain.is_empty()),
            NotifyMethod::WhatsApp | NotifyMethod::Sms => {
                let digits = contact.chars().filter(|c| c.is_ascii_digit()).count();
                digits >= 7
                    && contact
                        .chars()
                        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
            }
        }
    }
}

impl fmt::Display for NotifyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifyMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(NotifyMethod::Email),
            "whatsapp" => Ok(NotifyMethod::WhatsApp),
            "sms" => Ok(NotifyMethod::Sms),
            other => Err(format!("Unrecognized notification method: {}", other)),
        }
    }
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
