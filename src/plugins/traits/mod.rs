pub mod notifier;
pub mod source;

pub use notifier::{NotificationReceipt, Notification, NotifierPlugin};
pub use source::SourceAdapter;
