// Source adapter implementations
pub mod amazon;
pub mod flipkart;
pub mod html;
pub mod nykaa;

pub use amazon::AmazonSource;
pub use flipkart::FlipkartSource;
pub use nykaa::NykaaSource;

use std::sync::Arc;

use crate::config::{AppConfig, SourceConfig};
use crate::models::{RawListing, Site};
use crate::plugins::traits::SourceAdapter;
use crate::scraper::PageFetcher;
use crate::utils::error::SourceError;

/// Build the adapter for one configured source.
pub fn build_source(
    source: &SourceConfig,
    config: &AppConfig,
    fetcher: Arc<dyn PageFetcher>,
) -> Box<dyn SourceAdapter> {
    let base_url = source.base_url().trim_end_matches('/').to_string();
    let max_pages = config.scraper.max_pages;
    match source.site {
        Site::Amazon => Box::new(AmazonSource::new(fetcher, base_url, max_pages)),
        Site::Flipkart => Box::new(FlipkartSource::new(fetcher, base_url, max_pages)),
        Site::Nykaa => Box::new(NykaaSource::new(fetcher, base_url, max_pages)),
    }
}

/// Walk search result pages `1..=max_pages` until `budget` listings are
/// collected or a page comes back empty.
///
/// A failure on the first page fails the search; a failure on a later page
/// keeps what was already collected.
pub(crate) async fn collect_pages<U, P>(
    fetcher: &dyn PageFetcher,
    site: Site,
    budget: usize,
    max_pages: u32,
    url_for: U,
    parse: P,
) -> Result<Vec<RawListing>, SourceError>
where
    U: Fn(u32) -> Result<String, SourceError> + Send + Sync,
    P: Fn(&str) -> Result<Vec<RawListing>, SourceError> + Send + Sync,
{
    let mut listings = Vec::new();

    for page in 1..=max_pages.max(1) {
        if listings.len() >= budget {
            break;
        }

        let url = url_for(page)?;
        tracing::info!(site = %site, page, url = %url, "Fetching search page");

        let found = match fetcher.fetch(site, &url).await.and_then(|html| parse(&html)) {
            Ok(found) => found,
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                tracing::warn!(site = %site, page, error = %e, "Stopping pagination early");
                break;
            }
        };

        tracing::debug!(site = %site, page, found = found.len(), "Parsed search page");
        if found.is_empty() {
            break;
        }
        listings.extend(found);
    }

    listings.truncate(budget);
    Ok(listings)
}
