use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::{Arc, OnceLock};

use super::collect_pages;
use super::html::{
    css, derive_original_from_badge, ensure_not_blocked, first_attr, image_from, make_absolute_url, make_clean_url,
    search_url,
};
use crate::models::{RawListing, Site};
use crate::plugins::traits::SourceAdapter;
use crate::scraper::PageFetcher;
use crate::utils::error::SourceError;

const SITE: Site = Site::Flipkart;

// Flipkart obfuscates its class names, so cards are read by text shape.
const TITLE_MIN_CHARS: usize = 10;
const TITLE_MAX_CHARS: usize = 120;

struct Patterns {
    not_a_title: Regex,
    price: Regex,
    badge: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        not_a_title: Regex::new(r"(?i)₹|%|★|off|add to cart").expect("title filter pattern"),
        price: Regex::new(r"₹\s?[\d,]+").expect("price pattern"),
        badge: Regex::new(r"(?i)(\d{1,2})%\s*off").expect("badge pattern"),
    })
}

pub struct FlipkartSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    max_pages: u32,
}

impl FlipkartSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, base_url: impl Into<String>, max_pages: u32) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            max_pages,
        }
    }

    pub fn search_url(&self, keyword: &str, page: u32) -> Result<String, SourceError> {
        search_url(
            SITE,
            &self.base_url,
            "/search",
            &[("q", keyword.to_string()), ("page", page.to_string())],
        )
    }

    /// Longest text fragment of title length that isn't a price, rating or
    /// call to action.
    fn card_title(card: ElementRef<'_>) -> Option<String> {
        let mut best: Option<String> = None;
        for fragment in card.text().map(str::trim) {
            let len = fragment.chars().count();
            if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len) || patterns().not_a_title.is_match(fragment) {
                continue;
            }
            if best.as_ref().map_or(true, |b| len > b.chars().count()) {
                best = Some(fragment.to_string());
            }
        }
        best
    }

    fn card_link(card: ElementRef<'_>, link_sel: &scraper::Selector, base_url: &str) -> Option<String> {
        let href = first_attr(card, link_sel, "href")?;
        if href.starts_with('/') {
            make_clean_url(base_url, &href)
        } else if href.starts_with("http") {
            make_absolute_url(base_url, &href)
        } else {
            None
        }
    }

    pub fn parse_results(html: &str, base_url: &str) -> Result<Vec<RawListing>, SourceError> {
        let document = Html::parse_document(html);
        ensure_not_blocked(SITE, &document)?;

        let card_sel = css(SITE, "div[data-id]")?;
        let link_sel = css(SITE, "a[href]")?;
        let image_sel = css(SITE, "img")?;

        let mut listings = Vec::new();
        for card in document.select(&card_sel) {
            let title = match Self::card_title(card) {
                Some(title) => title,
                None => continue,
            };
            let text = card.text().collect::<Vec<_>>().join(" ");

            let mut listing = RawListing::new(SITE, title);
            listing.price_text = patterns().price.find(&text).map(|m| m.as_str().to_string());
            let badge = patterns()
                .badge
                .captures(&text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok());
            listing.discount_text = badge.map(|b| format!("{}% off", b));
            if let (Some(price), Some(badge)) = (listing.price_text.as_deref(), badge) {
                listing.original_price_text = derive_original_from_badge(price, badge, 100);
            }
            listing.url = Self::card_link(card, &link_sel, base_url);
            listing.image = card
                .select(&image_sel)
                .next()
                .and_then(|img| image_from(img, &["src", "data-src"], base_url));

            listings.push(listing);
        }

        Ok(listings)
    }
}

#[async_trait]
impl SourceAdapter for FlipkartSource {
    fn site(&self) -> Site {
        SITE
    }

    async fn search(&self, keyword: &str, budget: usize) -> Result<Vec<RawListing>, SourceError> {
        let listings = collect_pages(
            self.fetcher.as_ref(),
            SITE,
            budget,
            self.max_pages,
            |page| self.search_url(keyword, page),
            |html| Self::parse_results(html, &self.base_url),
        )
        .await?;

        tracing::info!(site = %SITE, keyword = %keyword, count = listings.len(), "Source search finished");
        Ok(listings)
    }
}
