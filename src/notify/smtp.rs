use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error};

use super::{password_reset_message, verification_message, Notifier, NotifyError, Rendered};
use crate::config::SmtpConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    base_url: String,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig, base_url: impl Into<String>) -> Result<Self, NotifyError> {
        let from = cfg
            .from
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(cfg.port)
            .timeout(Some(SMTP_TIMEOUT));
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            base_url: base_url.into(),
        })
    }

    async fn deliver(&self, to: &str, msg: Rendered) -> Result<(), NotifyError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address(e.to_string()))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(msg.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(msg.body)
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        match self.transport.send(email).await {
            Ok(resp) => {
                debug!(code = %resp.code(), subject = msg.subject, "smtp accepted message");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, subject = msg.subject, "smtp send failed");
                Err(NotifyError::Transport(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), NotifyError> {
        self.deliver(email, verification_message(&self.base_url, token))
            .await
    }

    async fn send_password_reset_email(
        &self,
        email: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(email, password_reset_message(&self.base_url, token))
            .await
    }
}
