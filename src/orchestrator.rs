//! Fans a search out to every registered source at once and merges what
//! comes back.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::models::{RawListing, Site, SourceOutcome, SourceStatus};
use crate::plugins::manager::{PluginManager, SourcePluginRef};
use crate::utils::error::{AppError, SourceError};

/// Merged listings plus one outcome per source, both in priority order.
#[derive(Debug, Clone, Default)]
pub struct MergedListings {
    pub listings: Vec<RawListing>,
    pub outcomes: Vec<SourceOutcome>,
}

/// Listings each of `sources` may contribute so that `max_total` can be
/// filled: `ceil(max_total / sources)`.
pub fn fair_share(max_total: usize, sources: usize) -> usize {
    if sources == 0 {
        return 0;
    }
    (max_total + sources - 1) / sources
}

/// Concatenate per-source listings in priority order, drop repeats of a URL
/// already taken, then cut to `max_total`. Listings without a URL are never
/// repeats.
pub fn merge(results: Vec<(Vec<RawListing>, SourceOutcome)>, max_total: usize) -> MergedListings {
    let mut seen = HashSet::new();
    let mut merged = MergedListings::default();
    for (listings, outcome) in results {
        merged.listings.extend(listings.into_iter().filter(|l| {
            match l.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
                Some(url) => seen.insert(url.to_string()),
                None => true,
            }
        }));
        merged.outcomes.push(outcome);
    }
    merged.listings.truncate(max_total);
    merged
}

#[derive(Clone)]
pub struct Orchestrator {
    plugins: PluginManager,
    source_timeout: Duration,
    source_timeout_overrides: HashMap<Site, Duration>,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn new(plugins: PluginManager, config: &AppConfig) -> Self {
        let source_timeout_overrides = config
            .sources
            .iter()
            .filter_map(|s| s.timeout_ms.map(|ms| (s.site, Duration::from_millis(ms))))
            .collect();

        Self {
            plugins,
            source_timeout: Duration::from_millis(config.search.source_timeout_ms),
            source_timeout_overrides,
            request_timeout: Duration::from_millis(config.search.request_timeout_ms),
        }
    }

    pub fn with_timeouts(plugins: PluginManager, source_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            plugins,
            source_timeout,
            source_timeout_overrides: HashMap::new(),
            request_timeout,
        }
    }

    fn timeout_for(&self, site: Site) -> Duration {
        self.source_timeout_overrides
            .get(&site)
            .copied()
            .unwrap_or(self.source_timeout)
    }

    /// Run every source for `keyword` and merge up to `max_total` listings.
    ///
    /// A failing or slow source only costs its own contribution. The whole
    /// call fails only when the request deadline passes, in which case
    /// sources still running are cancelled.
    pub async fn run(&self, keyword: &str, max_total: usize) -> Result<MergedListings, AppError> {
        let sources = self.plugins.sources().await;
        if sources.is_empty() {
            tracing::warn!(keyword = %keyword, "No sources registered");
            return Ok(MergedListings::default());
        }

        let budget = fair_share(max_total, sources.len());
        tracing::info!(keyword = %keyword, sources = sources.len(), budget, "Starting search");

        let runs = sources
            .iter()
            .map(|source| self.run_source(source.clone(), keyword, budget));

        let results = tokio::time::timeout(self.request_timeout, join_all(runs))
            .await
            .map_err(|_| {
                tracing::warn!(keyword = %keyword, after_ms = self.request_timeout.as_millis() as u64, "Search timed out");
                AppError::SearchTimeout {
                    after_ms: self.request_timeout.as_millis() as u64,
                }
            })?;

        Ok(merge(results, max_total))
    }

    async fn run_source(&self, source: SourcePluginRef, keyword: &str, budget: usize) -> (Vec<RawListing>, SourceOutcome) {
        let site = source.site();
        let limit = self.timeout_for(site);
        let started = Instant::now();

        let result = match tokio::time::timeout(limit, source.search(keyword, budget)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                site,
                after_ms: limit.as_millis() as u64,
            }),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (mut listings, status, error) = match result {
            Ok(listings) => (listings, SourceStatus::Ok, None),
            Err(e @ SourceError::Timeout { .. }) => (Vec::new(), SourceStatus::TimedOut, Some(e.to_string())),
            Err(e) => (Vec::new(), SourceStatus::Failed, Some(e.to_string())),
        };
        listings.truncate(budget);

        match &error {
            None => tracing::info!(site = %site, count = listings.len(), elapsed_ms, "Source succeeded"),
            Some(e) => tracing::warn!(site = %site, status = status.as_str(), elapsed_ms, error = %e, "Source failed"),
        }
        metrics::counter!("dealscope_source_outcomes_total", "site" => site.as_str(), "status" => status.as_str())
            .increment(1);
        metrics::histogram!("dealscope_source_duration_seconds", "site" => site.as_str())
            .record(elapsed_ms as f64 / 1000.0);

        let outcome = SourceOutcome {
            site,
            status,
            listings: listings.len(),
            error,
            elapsed_ms,
        };
        (listings, outcome)
    }
}
