//! Page fetching: turns a URL into HTML, either through headless Chrome or a
//! plain HTTP client. Adapters only see the [`PageFetcher`] trait.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::{FetchEngine, ScraperConfig};
use crate::models::Site;
use crate::utils::error::SourceError;

/// Longest pause between two fetch attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` on behalf of `site` and return the page HTML.
    async fn fetch(&self, site: Site, url: &str) -> Result<String, SourceError>;
}

/// Build the fetcher selected by `scraper.engine`.
pub fn build_fetcher(config: &ScraperConfig) -> Result<Arc<dyn PageFetcher>> {
    let fetcher: Arc<dyn PageFetcher> = match config.engine {
        FetchEngine::Chrome => Arc::new(ChromeFetcher::new(config.clone())?),
        FetchEngine::Http => Arc::new(HttpFetcher::new(config.clone())?),
    };
    Ok(fetcher)
}

/// Delays between attempts: `retry_delay_ms`, doubling, jittered.
fn backoff(config: &ScraperConfig) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor((config.retry_delay_ms / 2).max(1))
        .max_delay(MAX_RETRY_DELAY)
        .map(jitter)
        .take(config.retry_attempts.saturating_sub(1) as usize)
}

fn is_timeout_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("timed out") || lower.contains("timeout")
}

/// A browser resource that must be given back when a render ends.
trait Release {
    fn release(&self);
}

impl Release for Tab {
    fn release(&self) {
        if let Err(e) = self.close(true) {
            tracing::debug!(error = %e, "Failed to close tab");
        }
    }
}

/// Releases the wrapped resource when dropped, whichever way the render
/// exits.
struct ReleaseOnDrop<T: Release>(Arc<T>);

impl<T: Release> Deref for ReleaseOnDrop<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Release> Drop for ReleaseOnDrop<T> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Wall-clock budget for one whole render. Each browser wait is bounded by
/// the tab's default timeout; this bounds their sum.
struct RenderDeadline {
    at: Instant,
    budget: Duration,
}

impl RenderDeadline {
    fn new(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    fn check(&self, stage: &str) -> Result<()> {
        if self.expired() {
            return Err(anyhow!("{} timed out after {}ms", stage, self.budget.as_millis()));
        }
        Ok(())
    }
}

pub struct BrowserPool {
    browsers: Vec<Arc<Browser>>,
    current_index: AtomicUsize,
}

impl BrowserPool {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut browsers = Vec::new();

        for _ in 0..config.browser_pool_size.max(1) {
            let mut launch_options = LaunchOptions::default_builder()
                .headless(config.headless)
                .sandbox(false) // Often needed in containerized environments
                .window_size(Some((1366, 900)))
                .idle_browser_timeout(Duration::from_secs(300))
                .args(vec![
                    std::ffi::OsStr::new("--no-sandbox"),
                    std::ffi::OsStr::new("--disable-dev-shm-usage"),
                    std::ffi::OsStr::new("--disable-gpu"),
                    std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
                    std::ffi::OsStr::new("--lang=en-IN"),
                ])
                .build()
                .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

            if let Some(chrome_path) = &config.chrome_path {
                launch_options.path = Some(std::path::PathBuf::from(chrome_path));
            }

            let browser = Browser::new(launch_options)
                .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

            browsers.push(Arc::new(browser));
        }

        Ok(Self {
            browsers,
            current_index: AtomicUsize::new(0),
        })
    }

    pub fn get_browser(&self) -> Arc<Browser> {
        let index = self.current_index.fetch_add(1, Ordering::Relaxed) % self.browsers.len();
        self.browsers[index].clone()
    }
}

/// Renders pages in a pooled headless Chrome, scrolling to load lazy content.
pub struct ChromeFetcher {
    pool: Arc<BrowserPool>,
    config: ScraperConfig,
}

impl ChromeFetcher {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let pool = Arc::new(BrowserPool::new(&config)?);
        tracing::info!(browsers = pool.browsers.len(), headless = config.headless, "Browser pool started");
        Ok(Self { pool, config })
    }

    /// One blocking render of `url`. Runs on the blocking thread pool. The
    /// tab is closed on every path, and the whole render is bounded by
    /// `navigation_timeout_ms` so a render abandoned by its caller still ends.
    fn render(browser: Arc<Browser>, url: String, config: ScraperConfig) -> Result<String> {
        let budget = Duration::from_millis(config.navigation_timeout_ms);
        let deadline = RenderDeadline::new(budget);
        let tab = ReleaseOnDrop(
            browser
                .new_tab()
                .map_err(|e| anyhow!("Failed to create tab: {}", e))?,
        );
        tab.set_default_timeout(budget);
        tab.set_user_agent(&config.user_agent, Some("en-IN,en;q=0.9"), None)
            .map_err(|e| anyhow!("Failed to set user agent: {}", e))?;

        tab.navigate_to(&url)
            .map_err(|e| anyhow!("Navigation failed: {}", e))?;
        tab.wait_until_navigated()
            .map_err(|e| anyhow!("Page load failed: {}", e))?;
        deadline.check("Page load")?;

        for _ in 0..config.scroll_steps {
            if deadline.expired() {
                tracing::debug!(url = %url, "Render budget spent, skipping remaining scrolls");
                break;
            }
            if let Err(e) = tab.evaluate("window.scrollBy(0, Math.max(400, window.innerHeight))", false) {
                tracing::debug!(error = %e, "Scroll step failed");
                break;
            }
            std::thread::sleep(Duration::from_millis(350));
        }

        let html = tab
            .get_content()
            .map_err(|e| anyhow!("Failed to get page content: {}", e))?;
        Ok(html)
    }

    async fn fetch_once(&self, site: Site, url: &str) -> Result<String, SourceError> {
        let browser = self.pool.get_browser();
        let url_owned = url.to_string();
        let config = self.config.clone();
        let started = Instant::now();

        let rendered = tokio::task::spawn_blocking(move || Self::render(browser, url_owned, config))
            .await
            .map_err(|e| SourceError::fetch(site, format!("render task failed: {}", e)))?;

        rendered.map_err(|e| {
            let message = e.to_string();
            tracing::debug!(site = %site, url = %url, error = %message, "Render attempt failed");
            if is_timeout_message(&message) {
                SourceError::Timeout {
                    site,
                    after_ms: started.elapsed().as_millis() as u64,
                }
            } else {
                SourceError::fetch(site, message)
            }
        })
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(&self, site: Site, url: &str) -> Result<String, SourceError> {
        RetryIf::spawn(
            backoff(&self.config),
            || self.fetch_once(site, url),
            |e: &SourceError| e.is_retryable(),
        )
        .await
    }
}

/// Plain HTTP fetcher for stores that serve their listings without
/// JavaScript, and for local fixtures.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: ScraperConfig,
}

impl HttpFetcher {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.navigation_timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    async fn fetch_once(&self, site: Site, url: &str) -> Result<String, SourceError> {
        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-IN,en;q=0.9")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout {
                        site,
                        after_ms: started.elapsed().as_millis() as u64,
                    }
                } else {
                    SourceError::fetch(site, e.to_string())
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                return Err(SourceError::render(site, format!("blocked with HTTP {}", status.as_u16())));
            }
            s if !s.is_success() => {
                tracing::debug!(site = %site, url = %url, status = s.as_u16(), "Fetch attempt failed");
                return Err(SourceError::fetch(site, format!("HTTP {}", s.as_u16())));
            }
            _ => {}
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    site,
                    after_ms: started.elapsed().as_millis() as u64,
                }
            } else {
                SourceError::fetch(site, e.to_string())
            }
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, site: Site, url: &str) -> Result<String, SourceError> {
        RetryIf::spawn(
            backoff(&self.config),
            || self.fetch_once(site, url),
            |e: &SourceError| e.is_retryable(),
        )
        .await
    }
}
