use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertMatcher, AlertRegistry, MatchReport};
use crate::config::AppConfig;
use crate::models::{Alert, NewAlert, Product, SearchResult, SearchStatus};
use crate::normalizer::{dedupe_by_url, normalize_all};
use crate::orchestrator::Orchestrator;
use crate::plugins::manager::PluginManager;
use crate::scraper::build_fetcher;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub keyword: String,
    pub max_products: Option<usize>,
}

impl SearchRequest {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            max_products: None,
        }
    }
}

/// Entry point for everything the service does: searching the stores and
/// managing alert subscriptions.
pub struct DealManager {
    orchestrator: Orchestrator,
    plugins: PluginManager,
    registry: AlertRegistry,
    matcher: AlertMatcher,
    config: AppConfig,
}

impl DealManager {
    pub fn new(config: AppConfig, plugins: PluginManager, registry: AlertRegistry) -> Self {
        let orchestrator = Orchestrator::new(plugins.clone(), &config);
        let matcher = AlertMatcher::new(registry.clone(), plugins.clone());
        Self {
            orchestrator,
            plugins,
            registry,
            matcher,
            config,
        }
    }

    /// Wire up the configured fetcher, sources, notifiers and alert database.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let fetcher = build_fetcher(&config.scraper)?;
        let plugins = PluginManager::new();
        plugins.initialize_default_plugins(&config, fetcher).await?;
        let registry = AlertRegistry::connect(&config.database).await?;

        tracing::info!(
            sources = ?plugins.list_source_sites().await,
            engine = ?config.scraper.engine,
            "Deal manager ready"
        );
        Ok(Self::new(config, plugins, registry))
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn registry(&self) -> &AlertRegistry {
        &self.registry
    }

    fn budget(&self, requested: Option<usize>) -> Result<usize> {
        let limit = self.config.search.max_products_limit;
        let budget = requested.unwrap_or(self.config.search.default_max_products);
        if budget == 0 || budget > limit {
            return Err(AppError::validation(format!(
                "max_products must be between 1 and {}",
                limit
            )));
        }
        Ok(budget)
    }

    /// Search every source for `request.keyword`.
    ///
    /// Partial failures are reported in the result's `sources`; an error is
    /// only returned for invalid input or when the request deadline passes.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        let keyword = request.keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::validation("Keyword is required"));
        }
        let budget = self.budget(request.max_products)?;

        let merged = self.orchestrator.run(keyword, budget).await?;
        let products = dedupe_by_url(normalize_all(merged.listings));
        let status = SearchStatus::from_outcomes(&merged.outcomes);

        tracing::info!(keyword = %keyword, count = products.len(), status = status.as_str(), "Search finished");
        metrics::counter!("dealscope_searches_total", "status" => status.as_str()).increment(1);

        if self.config.alerts.match_on_search && status != SearchStatus::Failed && !products.is_empty() {
            self.spawn_match_pass(products.clone());
        }

        Ok(SearchResult {
            keyword: keyword.to_string(),
            products,
            sources: merged.outcomes,
            status,
            fetched_at: Utc::now(),
        })
    }

    fn spawn_match_pass(&self, products: Vec<Product>) {
        let matcher = self.matcher.clone();
        tokio::spawn(async move {
            if let Err(e) = matcher.run_pass(&products).await {
                tracing::error!(error = %e, "Background alert pass failed");
            }
        });
    }

    pub async fn subscribe(&self, new_alert: NewAlert) -> Result<Alert> {
        if !new_alert.method.accepts_contact(&new_alert.contact) {
            return Err(AppError::validation(format!(
                "Invalid contact for {}",
                new_alert.method
            )));
        }
        self.registry.create(new_alert).await
    }

    pub async fn list_alerts(&self) -> Result<Vec<Alert>> {
        self.registry.list().await
    }

    pub async fn delete_alert(&self, id: &str) -> Result<u64> {
        self.registry.delete(id).await
    }

    /// Run a matching pass over `products` and wait for it.
    pub async fn match_alerts(&self, products: &[Product]) -> Result<MatchReport> {
        self.matcher.run_pass(products).await
    }
}
