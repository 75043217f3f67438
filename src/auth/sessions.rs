//! Session issuance, revocation and resolution.

use std::sync::Arc;
use std::time::Duration;

use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use crate::auth::password::{burn_verification, verify_password};
use crate::auth::repo::{AccountStore, Deadline, SessionStore};
use crate::auth::repo_types::{Identity, Session, UserStatus};
use crate::auth::token::{digest_session_token, generate_opaque_token};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

/// Successful login. `token` is the bearer credential and is shown to the
/// client exactly once.
#[derive(Debug)]
pub struct LoginOutput {
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub identity: Identity,
}

pub struct SessionService {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl SessionService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            accounts,
            sessions,
            clock,
            config,
        }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(Duration::from_secs(self.config.store_timeout_secs))
    }

    pub fn session_ttl(&self) -> TimeDuration {
        TimeDuration::hours(self.config.session_ttl_hours)
    }

    /// Checks run cheapest-to-reveal first: unknown email and wrong password
    /// are indistinguishable; account state is only reported once the
    /// password has been proven.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutput> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("email and password are required".into()));
        }
        let deadline = self.deadline();

        let Some(user) = deadline.run(self.accounts.find_by_email(email)).await? else {
            burn_verification(password);
            warn!("login unknown email");
            return Err(AppError::Unauthorized);
        };

        if let Err(e) = verify_password(password, &user.password_hash) {
            if matches!(e, AppError::Unauthorized) {
                warn!(user_id = %user.id, "login invalid password");
            }
            return Err(e);
        }

        if !user.is_verified() {
            warn!(user_id = %user.id, "login refused: email not verified");
            return Err(AppError::Forbidden("email address is not verified"));
        }
        if user.status != UserStatus::Active {
            warn!(user_id = %user.id, status = ?user.status, "login refused: account not active");
            return Err(AppError::Forbidden("account is not active"));
        }

        let token = generate_opaque_token();
        let now = self.clock.now();
        let expires_at = now + self.session_ttl();
        deadline
            .run(self.sessions.create(Session {
                token_hash: digest_session_token(&token),
                user_id: user.id,
                expires_at,
                created_at: now,
            }))
            .await?;

        if let Err(e) = deadline
            .run(self.accounts.touch_last_login(user.id, now))
            .await
        {
            warn!(user_id = %user.id, error = %e, "last_login update failed");
        }

        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutput {
            token,
            expires_at,
            identity: user.identity(),
        })
    }

    /// Idempotent; store failures are logged and never reach the caller.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: Option<&str>) {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            debug!("logout without session");
            return;
        };
        match self
            .deadline()
            .run(self.sessions.delete_by_token_hash(&digest_session_token(token)))
            .await
        {
            Ok(true) => info!("session closed"),
            Ok(false) => debug!("logout for unknown session"),
            Err(e) => warn!(error = %e, "session delete failed during logout"),
        }
    }

    /// The authorization primitive: map a bearer token to its owner.
    #[instrument(skip_all)]
    pub async fn resolve_current_user(&self, token: &str) -> AppResult<Identity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Unauthenticated);
        }
        let deadline = self.deadline();
        let token_hash = digest_session_token(token);

        let session = deadline
            .run(self.sessions.find_by_token_hash(&token_hash))
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !session.is_live_at(self.clock.now()) {
            debug!(user_id = %session.user_id, "session expired");
            if let Err(e) = deadline
                .run(self.sessions.delete_by_token_hash(&token_hash))
                .await
            {
                warn!(error = %e, "expired session cleanup failed");
            }
            return Err(AppError::Unauthenticated);
        }

        let user = deadline
            .run(self.accounts.find_by_id(session.user_id))
            .await?
            .ok_or(AppError::Unauthenticated)?;
        if user.status == UserStatus::Suspended {
            debug!(user_id = %user.id, "session owner suspended");
            return Err(AppError::Unauthenticated);
        }
        Ok(user.identity())
    }
}
