//! Turns scraped listings into canonical [`Product`] records.
//!
//! Everything here is pure: the same listing always normalizes to the same
//! product.

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::models::{Product, RawListing};

pub const PRICE_UNAVAILABLE: &str = "N/A";

/// Characters accepted as thousands separators when they sit between digits.
const SEPARATORS: [char; 5] = [',', ' ', '\u{00A0}', '\u{2009}', '\u{202F}'];

/// A number grouped in thousands (`1,299,000`), in lakhs (`1,00,000`), or
/// not grouped at all, with an optional fraction. The token must not run
/// straight into another digit.
fn price_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        let sep = r"[, \u{00A0}\u{2009}\u{202F}]";
        let pattern = format!(
            r"(?P<num>(?:\d{{1,3}}(?:{sep}\d{{3}})+|\d{{1,2}}(?:{sep}\d{{2}})+{sep}\d{{3}}|\d+)(?:\.\d+)?)(?:\D|$)",
            sep = sep
        );
        Regex::new(&pattern).expect("price token pattern")
    })
}

/// A price pulled out of free text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPrice {
    pub value: Decimal,
    /// The numeric token as it appeared, grouping kept (`"1,299.00"`).
    pub display: String,
}

/// Extract the first price in `text`. Currency symbols, labels and
/// thousands separators are ignored.
pub fn parse_price(text: &str) -> Option<ParsedPrice> {
    let token = price_token().captures(text)?.name("num")?.as_str();
    let digits: String = token.chars().filter(|c| !SEPARATORS.contains(c)).collect();
    let value = Decimal::from_str(&digits).ok()?;
    Some(ParsedPrice {
        value,
        display: token.to_string(),
    })
}

/// Percentage saved going from `original` to `price`, rounded half away
/// from zero. Only defined when the original is strictly higher.
pub fn discount_percent(price: Decimal, original: Decimal) -> Option<u8> {
    if original <= price || original <= Decimal::ZERO {
        return None;
    }
    let pct = (original - price) / original * Decimal::ONE_HUNDRED;
    pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
        .filter(|p| *p <= 100)
}

/// Collapse internal whitespace runs to single spaces.
fn clean_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Normalize one listing. Listings without a usable title are dropped;
/// listings without a parsable price are kept with `price_text = "N/A"`.
pub fn normalize(raw: RawListing) -> Option<Product> {
    let title = clean_title(&raw.title);
    if title.is_empty() {
        return None;
    }

    let price = raw.price_text.as_deref().and_then(parse_price);
    let original = raw.original_price_text.as_deref().and_then(parse_price);

    let discount = match (&price, &original) {
        (Some(p), Some(o)) => discount_percent(p.value, o.value),
        _ => None,
    };

    Some(Product {
        title,
        site: raw.site,
        price: price.as_ref().map(|p| p.value),
        original_price: original.as_ref().map(|o| o.value),
        discount_percent: discount,
        price_text: price
            .map(|p| p.display)
            .unwrap_or_else(|| PRICE_UNAVAILABLE.to_string()),
        original_price_text: original.map(|o| o.display),
        url: non_empty(raw.url),
        image: non_empty(raw.image),
    })
}

/// Normalize a merged batch, preserving order.
pub fn normalize_all(listings: Vec<RawListing>) -> Vec<Product> {
    listings.into_iter().filter_map(normalize).collect()
}

/// Drop later products whose URL was already seen. Products without a URL
/// are never considered duplicates.
pub fn dedupe_by_url(products: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|p| match &p.url {
            Some(url) => seen.insert(url.clone()),
            None => true,
        })
        .collect()
}
