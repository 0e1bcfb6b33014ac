use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::notifiers::LogNotifier;
use super::sources::build_source;
use super::traits::{Notification, NotificationReceipt, NotifierPlugin, SourceAdapter};
use crate::config::AppConfig;
use crate::models::{NotifyMethod, Site};
use crate::scraper::PageFetcher;
use crate::utils::error::AppError;

pub type SourcePluginRef = Arc<dyn SourceAdapter>;
pub type NotifierPluginRef = Arc<dyn NotifierPlugin>;

/// Registry of source adapters (kept in priority order) and notifiers
/// (one per delivery method).
#[derive(Clone)]
pub struct PluginManager {
    sources: Arc<RwLock<Vec<SourcePluginRef>>>,
    notifiers: Arc<RwLock<HashMap<NotifyMethod, NotifierPluginRef>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            sources: Arc::new(RwLock::new(Vec::new())),
            notifiers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a source adapter at the lowest priority. A site can only be
    /// registered once.
    pub async fn register_source(&self, plugin: SourcePluginRef) -> Result<(), AppError> {
        let site = plugin.site();
        let mut sources = self.sources.write().await;
        if sources.iter().any(|s| s.site() == site) {
            return Err(AppError::validation(format!("Source {} is already registered", site)));
        }
        sources.push(plugin);
        Ok(())
    }

    /// Register a notifier plugin, replacing any previous one for its method.
    pub async fn register_notifier(&self, plugin: NotifierPluginRef) -> Result<(), AppError> {
        let method = plugin.method();
        tracing::debug!(method = %method, name = plugin.name(), "Registering notifier");

        let mut notifiers = self.notifiers.write().await;
        notifiers.insert(method, plugin);
        Ok(())
    }

    /// Snapshot of the registered sources in priority order.
    pub async fn sources(&self) -> Vec<SourcePluginRef> {
        self.sources.read().await.clone()
    }

    pub async fn list_source_sites(&self) -> Vec<Site> {
        let sources = self.sources.read().await;
        sources.iter().map(|s| s.site()).collect()
    }

    /// Check if a notifier plugin exists
    pub async fn has_notifier(&self, method: NotifyMethod) -> bool {
        let notifiers = self.notifiers.read().await;
        notifiers.contains_key(&method)
    }

    pub async fn list_notifier_methods(&self) -> Vec<NotifyMethod> {
        let notifiers = self.notifiers.read().await;
        notifiers.keys().copied().collect()
    }

    /// Register the configured sources and the stub notifiers.
    pub async fn initialize_default_plugins(
        &self,
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<(), AppError> {
        for source in config.enabled_sources() {
            self.register_source(Arc::from(build_source(source, config, fetcher.clone())))
                .await?;
        }

        self.register_notifier(Arc::new(LogNotifier::email())).await?;
        self.register_notifier(Arc::new(LogNotifier::whatsapp())).await?;
        self.register_notifier(Arc::new(LogNotifier::sms())).await?;

        Ok(())
    }

    /// Send a notification through the notifier for its method.
    pub async fn send_notification(&self, notification: &Notification) -> Result<NotificationReceipt, AppError> {
        // Clone out of the lock so delivery doesn't block registration.
        let notifier = {
            let notifiers = self.notifiers.read().await;
            notifiers.get(&notification.method).cloned()
        };

        match notifier {
            Some(notifier) => notifier.notify(notification).await,
            None => Err(AppError::Dispatch {
                method: notification.method.to_string(),
                message: "no notifier registered".to_string(),
            }),
        }
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
