// Notifier plugin implementations
pub mod log;

pub use log::LogNotifier;
