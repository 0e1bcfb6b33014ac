// Integration tests for DealScope
// These tests verify that all components work together correctly

pub mod api_tests;
pub mod search_tests;
pub mod source_adapter_tests;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use dealscope::{
    config::AppConfig,
    models::{NotifyMethod, RawListing, Site},
    plugins::traits::{Notification, NotificationReceipt, NotifierPlugin, SourceAdapter},
    web::AppState,
    AlertRegistry, AppError, DealManager, PluginManager, SourceError,
};

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.search.source_timeout_ms = 300;
    config.search.request_timeout_ms = 3_000;
    config.alerts.match_on_search = false;
    config.scraper.retry_attempts = 1;
    config.scraper.retry_delay_ms = 1;
    config
}

/// Source that answers with a fixed set of listings after `delay`.
pub struct FixedSource {
    pub site: Site,
    pub listings: Vec<RawListing>,
    pub delay: Duration,
}

impl FixedSource {
    pub fn new(site: Site, listings: Vec<RawListing>) -> Self {
        Self {
            site,
            listings,
            delay: Duration::ZERO,
        }
    }

    pub fn slow(site: Site, delay: Duration) -> Self {
        Self {
            site,
            listings: vec![RawListing::new(site, "Too late")],
            delay,
        }
    }
}

#[async_trait]
impl SourceAdapter for FixedSource {
    fn site(&self) -> Site {
        self.site
    }

    async fn search(&self, _keyword: &str, budget: usize) -> Result<Vec<RawListing>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.listings.iter().take(budget).cloned().collect())
    }
}

pub struct FailingSource(pub Site);

#[async_trait]
impl SourceAdapter for FailingSource {
    fn site(&self) -> Site {
        self.0
    }

    async fn search(&self, _keyword: &str, _budget: usize) -> Result<Vec<RawListing>, SourceError> {
        Err(SourceError::fetch(self.0, "connection reset"))
    }
}

/// Notifier that keeps every notification it is handed.
#[derive(Clone)]
pub struct RecordingNotifier {
    method: NotifyMethod,
    pub sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new(method: NotifyMethod) -> Self {
        Self {
            method,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn method(&self) -> NotifyMethod {
        self.method
    }

    async fn notify(&self, notification: &Notification) -> Result<NotificationReceipt, AppError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(NotificationReceipt {
            receipt_id: format!("receipt-{}", self.sent.lock().unwrap().len()),
            method: self.method,
            delivered_at: chrono::Utc::now(),
        })
    }
}

pub fn listing(site: Site, title: &str, url: &str, price: &str, original: Option<&str>) -> RawListing {
    let listing = RawListing::new(site, title).with_price(price).with_url(url);
    match original {
        Some(original) => listing.with_original_price(original),
        None => listing,
    }
}

/// One source per store with a small catalogue of shoes and lipsticks.
pub fn default_sources() -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(FixedSource::new(
            Site::Amazon,
            vec![
                listing(Site::Amazon, "Running Shoes", "https://www.amazon.in/dp/RS1", "₹999", Some("₹1,999")),
                listing(Site::Amazon, "Office Chair", "https://www.amazon.in/dp/OC1", "₹4,500", Some("₹5,000")),
            ],
        )),
        Arc::new(FixedSource::new(
            Site::Flipkart,
            vec![listing(Site::Flipkart, "Trail Shoes", "https://www.flipkart.com/p/TS1", "₹1,500", Some("₹2,000"))],
        )),
        Arc::new(FixedSource::new(
            Site::Nykaa,
            vec![listing(Site::Nykaa, "Matte Lipstick", "https://www.nykaa.com/p/ML1", "₹489", Some("MRP:₹699"))],
        )),
    ]
}

pub struct TestApp {
    pub state: AppState,
    pub notifier: RecordingNotifier,
}

impl TestApp {
    pub fn router(&self) -> Router {
        dealscope::web::create_router(self.state.clone())
    }

    pub fn deals(&self) -> &DealManager {
        &self.state.deals
    }
}

pub async fn create_test_app(
    sources: Vec<Arc<dyn SourceAdapter>>,
    config: AppConfig,
    registry: AlertRegistry,
) -> anyhow::Result<TestApp> {
    let plugins = PluginManager::new();
    for source in sources {
        plugins.register_source(source).await?;
    }

    let notifier = RecordingNotifier::new(NotifyMethod::Email);
    plugins.register_notifier(Arc::new(notifier.clone())).await?;

    let deals = DealManager::new(config.clone(), plugins, registry);
    Ok(TestApp {
        state: AppState::new(deals, config),
        notifier,
    })
}

/// Create test application state
pub async fn create_test_app_state() -> anyhow::Result<TestApp> {
    create_test_app(default_sources(), get_test_config(), AlertRegistry::in_memory().await?).await
}

/// Send one request through the router and decode the JSON reply.
pub async fn make_request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> anyhow::Result<(axum::http::StatusCode, serde_json::Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request.body(match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    })?;

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, json))
}
