use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::accounts::AccountService;
use crate::auth::memory::{MemoryAccountStore, MemorySessionStore};
use crate::auth::password;
use crate::auth::pg::{PgAccountStore, PgSessionStore};
use crate::auth::repo::{AccountStore, SessionStore};
use crate::auth::sessions::SessionService;
use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, StorageBackend};
use crate::db;
use crate::notify::{LogNotifier, Notifier, SmtpNotifier};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: Arc<AccountService>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        if !password::prepare_dummy_hash() {
            warn!("dummy password hash unavailable; unknown-email logins will answer faster");
        }

        let (accounts, sessions): (Arc<dyn AccountStore>, Arc<dyn SessionStore>) =
            match config.storage.backend {
                StorageBackend::Postgres => {
                    let pool = db::connect(&config.storage).await?;
                    db::migrate(&pool).await;
                    (
                        Arc::new(PgAccountStore::new(pool.clone())),
                        Arc::new(PgSessionStore::new(pool)),
                    )
                }
                StorageBackend::Memory => {
                    warn!("using in-memory storage; all accounts are lost on restart");
                    (
                        Arc::new(MemoryAccountStore::new()),
                        Arc::new(MemorySessionStore::new()),
                    )
                }
            };

        let notifier: Arc<dyn Notifier> = match &config.mail.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, port = smtp.port, "smtp notifier configured");
                Arc::new(SmtpNotifier::new(smtp, &config.mail.public_base_url)?)
            }
            None => {
                warn!("SMTP_HOST not set; outgoing mail is written to the log");
                Arc::new(LogNotifier::new(&config.mail.public_base_url))
            }
        };

        Ok(Self::from_parts(
            config,
            accounts,
            sessions,
            notifier,
            Arc::new(SystemClock),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let account_service = AccountService::new(
            accounts.clone(),
            sessions.clone(),
            notifier,
            clock.clone(),
            config.auth.clone(),
        );
        let session_service = SessionService::new(accounts, sessions, clock, config.auth.clone());
        Self {
            config,
            accounts: Arc::new(account_service),
            sessions: Arc::new(session_service),
        }
    }
}

#[cfg(test)]
pub use fake::{Fake, LogCapture};
