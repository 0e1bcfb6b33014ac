use async_trait::async_trait;
use chrono::Utc;

use crate::models::{generate_id, NotifyMethod};
use crate::plugins::traits::{Notification, NotificationReceipt, NotifierPlugin};
use crate::utils::error::AppError;

/// Delivery stub: renders the notification into the log instead of sending
/// it. Contacts are still checked for the shape the channel would need.
pub struct LogNotifier {
    method: NotifyMethod,
}

impl LogNotifier {
    pub fn new(method: NotifyMethod) -> Self {
        Self { method }
    }

    pub fn email() -> Self {
        Self::new(NotifyMethod::Email)
    }

    pub fn whatsapp() -> Self {
        Self::new(NotifyMethod::WhatsApp)
    }

    pub fn sms() -> Self {
        Self::new(NotifyMethod::Sms)
    }

    fn check_contact(&self, contact: &str) -> Result<(), AppError> {
        if self.method.accepts_contact(contact) {
            Ok(())
        } else {
            Err(AppError::Dispatch {
                method: self.method.to_string(),
                message: format!("cannot deliver to '{}'", contact),
            })
        }
    }
}

#[async_trait]
impl NotifierPlugin for LogNotifier {
    fn name(&self) -> &'static str {
        match self.method {
            NotifyMethod::Email => "log-email",
            NotifyMethod::WhatsApp => "log-whatsapp",
            NotifyMethod::Sms => "log-sms",
        }
    }

    fn method(&self) -> NotifyMethod {
        self.method
    }

    async fn notify(&self, notification: &Notification) -> Result<NotificationReceipt, AppError> {
        self.check_contact(&notification.contact)?;

        let receipt_id = generate_id();
        tracing::info!(
            method = %self.method,
            contact = %notification.contact,
            alert_id = %notification.alert_id,
            receipt_id = %receipt_id,
            subject = %notification.subject,
            "Notification dispatched"
        );
        tracing::debug!(body = %notification.body, "Notification body");

        Ok(NotificationReceipt {
            receipt_id,
            method: self.method,
            delivered_at: Utc::now(),
        })
    }
}
