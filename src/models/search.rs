use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Product, Site};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    TimedOut,
    Failed,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::TimedOut => "timed_out",
            SourceStatus::Failed => "failed",
        }
    }
}

/// What happened to one adapter during a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceOutcome {
    pub site: Site,
    pub status: SourceStatus,
    pub listings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == SourceStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Complete,
    Partial,
    Failed,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Complete => "complete",
            SearchStatus::Partial => "partial",
            SearchStatus::Failed => "failed",
        }
    }

    /// Aggregate status from per-source outcomes. No sources at all counts as
    /// a failed search.
    pub fn from_outcomes(outcomes: &[SourceOutcome]) -> Self {
        let ok = outcomes.iter().filter(|o| o.is_ok()).count();
        if ok == 0 {
            SearchStatus::Failed
        } else if ok == outcomes.len() {
            SearchStatus::Complete
        } else {
            SearchStatus::Partial
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub keyword: String,
    pub products: Vec<Product>,
    pub sources: Vec<SourceOutcome>,
    pub status: SearchStatus,
    pub fetched_at: DateTime<Utc>,
}

impl SearchResult {
    /// Per-site error messages for every source that did not succeed.
    pub fn site_errors(&self) -> Vec<(Site, String)> {
        self.sources
            .iter()
            .filter(|o| !o.is_ok())
            .map(|o| {
                let message = o
                    .error
                    .clone()
                    .unwrap_or_else(|| o.status.as_str().to_string());
                (o.site, message)
            })
            .collect()
    }
}
