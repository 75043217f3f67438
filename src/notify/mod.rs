//! Outbound account emails.

use async_trait::async_trait;
use thiserror::Error;

mod log;
mod smtp;

pub use self::log::LogNotifier;
pub use self::smtp::SmtpNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("message build failed: {0}")]
    Message(String),

    #[error("transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), NotifyError>;
    async fn send_password_reset_email(&self, email: &str, token: &str)
        -> Result<(), NotifyError>;
}

/// Subject and plain-text body of an outgoing mail.
pub(crate) struct Rendered {
    pub subject: &'static str,
    pub body: String,
}

pub(crate) fn verification_message(base_url: &str, token: &str) -> Rendered {
    let link = format!("{}/verify-email?token={}", base_url.trim_end_matches('/'), token);
    Rendered {
        subject: "Confirm your email address",
        body: format!(
            "Welcome!\n\nConfirm your email address by opening the link below:\n\n{link}\n\n\
             If you did not create an account you can ignore this message.\n"
        ),
    }
}

pub(crate) fn password_reset_message(base_url: &str, token: &str) -> Rendered {
    let link = format!("{}/reset-password?token={}", base_url.trim_end_matches('/'), token);
    Rendered {
        subject: "Reset your password",
        body: format!(
            "A password reset was requested for your account.\n\n\
             Choose a new password here (the link expires in one hour):\n\n{link}\n\n\
             If you did not ask for this, no action is needed.\n"
        ),
    }
}

#[cfg(test)]
pub use recording::{RecordingNotifier, Sent};


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_join_base_url_without_double_slash() {
        let msg = verification_message("https://app.example.com/", "abc");
        assert!(msg.body.contains("https://app.example.com/verify-email?token=abc"));

        let msg = password_reset_message("https://app.example.com", "xyz");
        assert!(msg.body.contains("https://app.example.com/reset-password?token=xyz"));
        assert_eq!(msg.subject, "Reset your password");
    }
}
