pub mod alerts;
pub mod config;
pub mod deal_manager;
pub mod deals;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod plugins;
pub mod scraper;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use alerts::{AlertMatcher, AlertRegistry, MatchReport};
pub use config::AppConfig;
pub use deal_manager::{DealManager, SearchRequest};
pub use orchestrator::Orchestrator;
pub use plugins::PluginManager;
pub use utils::error::{AppError, SourceError};

pub type Result<T> = std::result::Result<T, AppError>;
