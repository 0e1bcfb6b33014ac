//! Shared helpers for pulling listings out of store search pages.

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

use crate::models::Site;
use crate::normalizer::parse_price;
use crate::utils::error::SourceError;

const PLACEHOLDER_MARKERS: [&str; 5] = ["placeholder", "transparent", "pixel", "no-image", "sprite"];

const BLOCK_MARKERS: [&str; 5] = [
    "robot check",
    "captcha",
    "access denied",
    "enter the characters you see below",
    "are you a human",
];

fn badge_pattern() -> &'static Regex {
    static BADGE: OnceLock<Regex> = OnceLock::new();
    BADGE.get_or_init(|| Regex::new(r"(\d{1,3})\s*%").expect("badge pattern"))
}

/// Compile a CSS selector, reporting a bad one as a page error for `site`.
pub fn css(site: Site, selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector)
        .map_err(|e| SourceError::render(site, format!("invalid selector '{}': {:?}", selector, e)))
}

/// Visible text of an element with whitespace collapsed.
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first descendant matching `selector`, if non-empty.
pub fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .map(text_of)
        .find(|t| !t.is_empty())
}

pub fn first_attr(element: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .filter_map(|e| e.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}

/// Resolve `href` against `base`. Protocol-relative links get `https:`.
pub fn make_absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    if let Ok(url) = Url::parse(href) {
        return Some(url.to_string());
    }
    Url::parse(base).ok()?.join(href).ok().map(|u| u.to_string())
}

/// Like [`make_absolute_url`] but drops query string and fragment.
pub fn make_clean_url(base: &str, href: &str) -> Option<String> {
    let absolute = make_absolute_url(base, href)?;
    let mut url = Url::parse(&absolute).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

pub fn is_placeholder_image(url: &str) -> bool {
    let lower = url.to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
}

/// First usable image URL on `img`, trying `attrs` in order. `srcset`-style
/// values contribute their first candidate; inline data URIs and known
/// placeholder images are skipped.
pub fn image_from(img: ElementRef<'_>, attrs: &[&str], base: &str) -> Option<String> {
    attrs
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(|value| {
            if value.contains(',') || value.trim().contains(' ') {
                value
                    .split(',')
                    .next()
                    .and_then(|c| c.split_whitespace().next())
                    .unwrap_or("")
            } else {
                value.trim()
            }
        })
        .filter(|v| !v.is_empty() && !v.starts_with("data:"))
        .filter_map(|v| make_absolute_url(base, v))
        .find(|url| !is_placeholder_image(url))
}

/// `og:image` of a product detail page.
pub fn og_image(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"meta[property="og:image"]"#).ok()?;
    let content = document
        .select(&selector)
        .filter_map(|m| m.value().attr("content"))
        .next()?;
    make_absolute_url(base, content)
}

/// Percentage from a badge such as `"45% off"` or `"(20% Off)"`.
pub fn badge_percent(badge: &str) -> Option<u32> {
    badge_pattern()
        .captures(badge)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Reconstruct the pre-discount price from the selling price and a
/// percentage badge: `round(price * 100 / (100 - badge))`. Badges at or above
/// `max_badge` are treated as noise.
pub fn derive_original_from_badge(price_text: &str, badge: u32, max_badge: u32) -> Option<String> {
    if badge == 0 || badge >= max_badge || badge >= 100 {
        return None;
    }
    let price = parse_price(price_text)?.value;
    let original = (price * Decimal::ONE_HUNDRED / Decimal::from(100 - badge)).round();
    Some(group_thousands(original.to_u64()?))
}

/// `1999` -> `"1,999"`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// True when the store served a bot check or an error wall instead of
/// results.
pub fn is_blocked_page(document: &Html) -> bool {
    let title = Selector::parse("title")
        .ok()
        .and_then(|s| document.select(&s).next().map(text_of))
        .unwrap_or_default()
        .to_lowercase();
    if BLOCK_MARKERS.iter().any(|m| title.contains(m)) {
        return true;
    }
    Selector::parse("form[action*='validateCaptcha'], #captchacharacters")
        .map(|s| document.select(&s).next().is_some())
        .unwrap_or(false)
}

/// Fail with a page error when `document` is a bot wall.
pub fn ensure_not_blocked(site: Site, document: &Html) -> Result<(), SourceError> {
    if is_blocked_page(document) {
        Err(SourceError::render(site, "blocked by a bot check"))
    } else {
        Ok(())
    }
}

/// `{base}{path}` with the given query parameters, properly encoded.
pub fn search_url(site: Site, base: &str, path: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
    let mut url = Url::parse(base)
        .and_then(|b| b.join(path))
        .map_err(|e| SourceError::fetch(site, format!("bad search URL: {}", e)))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.to_string())
}
