use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;

use super::collect_pages;
use super::html::{
    badge_percent, css, derive_original_from_badge, ensure_not_blocked, first_attr, first_text, image_from,
    make_absolute_url, search_url,
};
use crate::models::{RawListing, Site};
use crate::plugins::traits::SourceAdapter;
use crate::scraper::PageFetcher;
use crate::utils::error::SourceError;

const SITE: Site = Site::Amazon;

pub struct AmazonSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    max_pages: u32,
}

impl AmazonSource {
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
            "/s",
            &[("k", keyword.to_string()), ("page", page.to_string())],
        )
    }

    /// Listings on one search result page, in page order.
    pub fn parse_results(html: &str, base_url: &str) -> Result<Vec<RawListing>, SourceError> {
        let document = Html::parse_document(html);
        ensure_not_blocked(SITE, &document)?;

        let card_sel = css(SITE, "div.s-result-item[data-component-type='s-search-result']")?;
        let title_sel = css(SITE, "h2 a span")?;
        let title_fallback_sel = css(SITE, "h2 span")?;
        let link_sel = css(SITE, "h2 a[href], a.a-link-normal[href*='/dp/']")?;
        let image_sel = css(SITE, "img.s-image")?;
        let price_sel = css(SITE, "span.a-price > span.a-offscreen")?;
        let original_sel = css(SITE, "span.a-text-price span.a-offscreen")?;
        let badge_sel = css(SITE, "span.savingsPercentage")?;

        let mut listings = Vec::new();
        for card in document.select(&card_sel) {
            let title = match first_text(card, &title_sel).or_else(|| first_text(card, &title_fallback_sel)) {
                Some(title) => title,
                None => continue,
            };

            let mut listing = RawListing::new(SITE, title);
            listing.url = first_attr(card, &link_sel, "href").and_then(|href| make_absolute_url(base_url, &href));
            listing.image = card
                .select(&image_sel)
                .next()
                .and_then(|img| image_from(img, &["src", "data-image-src", "srcset", "data-src"], base_url));
            listing.price_text = first_text(card, &price_sel);
            listing.original_price_text = first_text(card, &original_sel);
            listing.discount_text = first_text(card, &badge_sel);

            if listing.original_price_text.is_none() {
                if let (Some(price), Some(badge)) = (
                    listing.price_text.as_deref(),
                    listing.discount_text.as_deref().and_then(badge_percent),
                ) {
                    listing.original_price_text = derive_original_from_badge(price, badge, 100);
                }
            }

            listings.push(listing);
        }

        Ok(listings)
    }
}

#[async_trait]
impl SourceAdapter for AmazonSource {
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
