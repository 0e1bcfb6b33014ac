use async_trait::async_trait;
use futures::future::join_all;
use scraper::{ElementRef, Html};
use std::sync::Arc;

use super::collect_pages;
use super::html::{
    badge_percent, css, derive_original_from_badge, ensure_not_blocked, first_attr, first_text, image_from,
    make_absolute_url, og_image, search_url,
};
use crate::models::{RawListing, Site};
use crate::plugins::traits::SourceAdapter;
use crate::scraper::PageFetcher;
use crate::utils::error::SourceError;

const SITE: Site = Site::Nykaa;

/// Badges at or above this are misprints, not discounts.
const MAX_BADGE: u32 = 95;

pub struct NykaaSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    max_pages: u32,
}

impl NykaaSource {
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
            "/search/result/",
            &[("q", keyword.to_string()), ("page_no", page.to_string())],
        )
    }

    /// Product link of a card: its own anchor, or the anchor wrapping it.
    fn card_href(card: ElementRef<'_>, link_sel: &scraper::Selector) -> Option<String> {
        first_attr(card, link_sel, "href").or_else(|| {
            card.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
                .map(|h| h.trim().to_string())
        })
    }

    pub fn parse_results(html: &str, base_url: &str) -> Result<Vec<RawListing>, SourceError> {
        let document = Html::parse_document(html);
        ensure_not_blocked(SITE, &document)?;

        let card_sel = css(SITE, "div.css-1rd7vky")?;
        let link_sel = css(SITE, "a[href]")?;
        let image_sel = css(SITE, "img")?;
        let title_sel = css(SITE, "div.css-xrzmfa")?;
        let price_sel = css(SITE, "span.css-111z9ua")?;
        let mrp_sel = css(SITE, "span.css-17x46n5")?;
        let badge_sel = css(SITE, "span.css-cjd9an")?;

        let mut listings = Vec::new();
        for card in document.select(&card_sel) {
            let title = match first_text(card, &title_sel) {
                Some(title) => title,
                None => continue,
            };

            let mut listing = RawListing::new(SITE, title);
            listing.url = Self::card_href(card, &link_sel).and_then(|h| make_absolute_url(base_url, &h));
            listing.image = card
                .select(&image_sel)
                .next()
                .and_then(|img| image_from(img, &["src", "data-src", "data-srcset", "srcset"], base_url));
            listing.price_text = first_text(card, &price_sel);
            listing.original_price_text = first_text(card, &mrp_sel);
            listing.discount_text = first_text(card, &badge_sel);

            if listing.original_price_text.is_none() {
                if let (Some(price), Some(badge)) = (
                    listing.price_text.as_deref(),
                    listing.discount_text.as_deref().and_then(badge_percent),
                ) {
                    listing.original_price_text = derive_original_from_badge(price, badge, MAX_BADGE);
                }
            }

            listings.push(listing);
        }

        Ok(listings)
    }

    /// Fill missing images from each product page's `og:image`. Best effort:
    /// a failed detail fetch leaves the image empty.
    async fn backfill_images(&self, listings: &mut [RawListing]) {
        let lookups = listings
            .iter()
            .enumerate()
            .filter(|(_, l)| l.image.is_none())
            .filter_map(|(i, l)| l.url.clone().map(|url| (i, url)))
            .map(|(i, url)| async move {
                match self.fetcher.fetch(SITE, &url).await {
                    Ok(html) => (i, og_image(&html, &self.base_url)),
                    Err(e) => {
                        tracing::debug!(site = %SITE, url = %url, error = %e, "Image lookup failed");
                        (i, None)
                    }
                }
            });

        for (i, image) in join_all(lookups).await {
            if image.is_some() {
                listings[i].image = image;
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for NykaaSource {
    fn site(&self) -> Site {
        SITE
    }

    async fn search(&self, keyword: &str, budget: usize) -> Result<Vec<RawListing>, SourceError> {
        let mut listings = collect_pages(
            self.fetcher.as_ref(),
            SITE,
            budget,
            self.max_pages,
            |page| self.search_url(keyword, page),
            |html| Self::parse_results(html, &self.base_url),
        )
        .await?;

        self.backfill_images(&mut listings).await;

        tracing::info!(site = %SITE, keyword = %keyword, count = listings.len(), "Source search finished");
        Ok(listings)
    }
}
