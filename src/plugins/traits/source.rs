use async_trait::async_trait;

use crate::models::{RawListing, Site};
use crate::utils::error::SourceError;

/// One e-commerce store's search.
///
/// Implementations are stateless across calls. An empty result is a
/// successful search that found nothing.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn site(&self) -> Site;

    /// Fetch up to `budget` listings for `keyword`, in the order the store
    /// presents them.
    async fn search(&self, keyword: &str, budget: usize) -> Result<Vec<RawListing>, SourceError>;
}
