//! Filtering and ranking of a normalized result set into the views the
//! client renders.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::{Product, Site, TitlePolicy};

pub const TOP_DEALS_LIMIT: usize = 6;
pub const TRENDING_LIMIT: usize = 4;
pub const MOST_VIEWED_LIMIT: usize = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealFilter {
    pub query: Option<String>,
    pub site: Option<Site>,
    pub min_discount: Option<u8>,
    #[serde(default)]
    pub saved_only: bool,
}

impl DealFilter {
    fn accepts(&self, product: &Product, saved: &HashSet<String>) -> bool {
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if product.site.title_policy() == TitlePolicy::Strict
                && !product.title.to_lowercase().contains(&query.to_lowercase())
            {
                return false;
            }
        }

        if let Some(site) = self.site {
            if product.site != site {
                return false;
            }
        }

        if let Some(min) = self.min_discount {
            match product.discount_percent {
                Some(d) if d >= min => {}
                _ => return false,
            }
        }

        if self.saved_only {
            match &product.url {
                Some(url) if saved.contains(url) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Products passing every active filter, in their original order.
pub fn filter(products: &[Product], filter: &DealFilter, saved: &HashSet<String>) -> Vec<Product> {
    products
        .iter()
        .filter(|p| filter.accepts(p, saved))
        .cloned()
        .collect()
}

/// Discounted products, best discount first. Ties keep input order and
/// undiscounted products are left out entirely.
pub fn top_deals(products: &[Product], limit: usize) -> Vec<Product> {
    let mut discounted: Vec<&Product> = products.iter().filter(|p| p.has_discount()).collect();
    // sort_by is stable
    discounted.sort_by(|a, b| b.discount_percent.cmp(&a.discount_percent));
    discounted.into_iter().take(limit).cloned().collect()
}

pub fn trending(products: &[Product], limit: usize) -> Vec<Product> {
    top_deals(products, limit)
}

/// Products the client has viewed, most viewed first.
pub fn most_viewed(products: &[Product], views: &HashMap<String, u64>, limit: usize) -> Vec<Product> {
    let mut viewed: Vec<(&Product, u64)> = products
        .iter()
        .filter_map(|p| {
            let count = p.url.as_ref().and_then(|u| views.get(u)).copied()?;
            (count > 0).then_some((p, count))
        })
        .collect();
    viewed.sort_by(|a, b| b.1.cmp(&a.1));
    viewed.into_iter().take(limit).map(|(p, _)| p.clone()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealViews {
    pub items: Vec<Product>,
    pub top_deals: Vec<Product>,
    pub trending: Vec<Product>,
    pub most_viewed: Vec<Product>,
}

/// Assemble every section shown for a search. Only `items` is filtered;
/// the ranked sections always cover the whole result set.
pub fn views(
    products: &[Product],
    deal_filter: &DealFilter,
    saved: &HashSet<String>,
    view_counts: &HashMap<String, u64>,
) -> DealViews {
    DealViews {
        items: filter(products, deal_filter, saved),
        top_deals: top_deals(products, TOP_DEALS_LIMIT),
        trending: trending(products, TRENDING_LIMIT),
        most_viewed: most_viewed(products, view_counts, MOST_VIEWED_LIMIT),
    }
}
