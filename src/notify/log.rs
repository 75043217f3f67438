use async_trait::async_trait;
use tracing::info;

use super::{password_reset_message, verification_message, Notifier, NotifyError};

/// Writes outgoing mail to the log. Used when no SMTP relay is configured.
pub struct LogNotifier {
    base_url: String,
}

impl LogNotifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), NotifyError> {
        let msg = verification_message(&self.base_url, token);
        info!(to = %email, subject = msg.subject, body = %msg.body, "mail (log transport)");
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        email: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        let msg = password_reset_message(&self.base_url, token);
        info!(to = %email, subject = msg.subject, body = %msg.body, "mail (log transport)");
        Ok(())
    }
}
