//! Account lifecycle: registration, email verification, password reset and
//! profile updates.

use std::sync::Arc;
use std::time::Duration;

use time::Duration as TimeDuration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, validate_password_policy};
use crate::auth::repo::{AccountStore, Deadline, SessionStore, StoreError};
use crate::auth::repo_types::{Identity, NewUser, ProfileUpdate, User};
use crate::auth::token::generate_opaque_token;
use crate::auth::validation::{
    normalize_email, normalize_name, normalize_username, require_token,
};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::notify::Notifier;

/// Returned by a resend request whether or not anything was sent.
pub const RESEND_VERIFICATION_ACK: &str =
    "If an unverified account exists for that email, a new verification link has been sent.";

/// Returned by a reset request whether or not the account exists.
pub const PASSWORD_RESET_ACK: &str =
    "If an account exists for that email, a password reset link has been sent.";

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            accounts,
            sessions,
            notifier,
            clock,
            config,
        }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(Duration::from_secs(self.config.store_timeout_secs))
    }

    fn reset_token_ttl(&self) -> TimeDuration {
        TimeDuration::minutes(self.config.reset_token_ttl_minutes)
    }

    fn verification_token_ttl(&self) -> TimeDuration {
        TimeDuration::hours(self.config.verification_token_ttl_hours)
    }

    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn register(&self, input: RegisterInput) -> AppResult<Identity> {
        let email = normalize_email(&input.email)?;
        let username = normalize_username(&input.username)?;
        validate_password_policy(&input.password)?;
        let first_name = normalize_name("first_name", input.first_name)?;
        let last_name = normalize_name("last_name", input.last_name)?;

        let password_hash = hash_password(&input.password)?;
        let now = self.clock.now();
        let token = generate_opaque_token();

        let new_user = NewUser {
            email,
            username,
            password_hash,
            first_name,
            last_name,
            verification_token: token.clone(),
            verification_token_expires_at: now + self.verification_token_ttl(),
            created_at: now,
        };
        let user = match self.deadline().run(self.accounts.create(new_user)).await {
            Ok(user) => user,
            Err(StoreError::Conflict(field)) => {
                warn!(%field, "registration rejected: already taken");
                return Err(AppError::Conflict);
            }
            Err(e) => {
                error!(error = %e, "create user failed");
                return Err(e.into());
            }
        };

        if let Err(e) = self
            .notifier
            .send_verification_email(&user.email, &token)
            .await
        {
            warn!(user_id = %user.id, error = %e, "verification email not delivered; resend is available");
        }

        info!(user_id = %user.id, "user registered");
        Ok(user.identity())
    }

    #[instrument(skip_all)]
    pub async fn verify_email(&self, token: &str) -> AppResult<Identity> {
        let token = require_token(token)?;
        let deadline = self.deadline();
        let now = self.clock.now();

        let user = deadline
            .run(self.accounts.find_by_verification_token(token))
            .await?
            .ok_or_else(|| {
                debug!("verification token not found");
                AppError::InvalidOrExpired
            })?;

        match user.verification_token_expires_at {
            Some(exp) if exp > now => {}
            _ => {
                debug!(user_id = %user.id, "verification token expired");
                return Err(AppError::InvalidOrExpired);
            }
        }

        let user = match deadline
            .run(self.accounts.mark_verified(user.id, token, now))
            .await
        {
            Ok(user) => user,
            // consumed or replaced since the lookup
            Err(StoreError::NotFound) => return Err(AppError::InvalidOrExpired),
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, "email verified");
        Ok(user.identity())
    }

    #[instrument(skip_all)]
    pub async fn resend_verification(&self, email: &str) -> AppResult<&'static str> {
        let email = normalize_email(email)?;
        let deadline = self.deadline();

        match deadline.run(self.accounts.find_by_email(&email)).await? {
            Some(user) if !user.is_verified() => {
                let token = generate_opaque_token();
                let expires_at = self.clock.now() + self.verification_token_ttl();
                deadline
                    .run(self.accounts.set_verification_token(user.id, &token, expires_at))
                    .await?;
                if let Err(e) = self
                    .notifier
                    .send_verification_email(&user.email, &token)
                    .await
                {
                    warn!(user_id = %user.id, error = %e, "verification email not delivered");
                } else {
                    info!(user_id = %user.id, "verification email re-sent");
                }
            }
            Some(user) => debug!(user_id = %user.id, "resend skipped: already verified"),
            None => debug!("resend skipped: no such account"),
        }

        Ok(RESEND_VERIFICATION_ACK)
    }

    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> AppResult<&'static str> {
        let email = normalize_email(email)?;
        let deadline = self.deadline();

        let Some(user) = deadline.run(self.accounts.find_by_email(&email)).await? else {
            debug!("password reset skipped: no such account");
            return Ok(PASSWORD_RESET_ACK);
        };

        let token = generate_opaque_token();
        let expires_at = self.clock.now() + self.reset_token_ttl();
        deadline
            .run(self.accounts.set_reset_token(user.id, &token, expires_at))
            .await?;

        // No other way to obtain the link, so a failed send is reported.
        self.notifier
            .send_password_reset_email(&user.email, &token)
            .await
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "password reset email not delivered");
                e
            })?;

        info!(user_id = %user.id, "password reset requested");
        Ok(PASSWORD_RESET_ACK)
    }

    /// Look up the holder of a reset token that has not yet expired.
    async fn live_reset_holder(&self, deadline: &Deadline, token: &str) -> AppResult<User> {
        let user = deadline
            .run(self.accounts.find_by_reset_token(token))
            .await?
            .ok_or(AppError::InvalidOrExpired)?;
        self.ensure_reset_live(&user)?;
        Ok(user)
    }

    fn ensure_reset_live(&self, user: &User) -> AppResult<()> {
        match user.reset_token_expires_at {
            Some(exp) if exp > self.clock.now() => Ok(()),
            _ => {
                debug!(user_id = %user.id, "reset token expired");
                Err(AppError::InvalidOrExpired)
            }
        }
    }

    /// Read-only check that a reset link is still usable.
    #[instrument(skip_all)]
    pub async fn verify_reset_token(&self, token: &str) -> AppResult<()> {
        let token = require_token(token)?;
        self.live_reset_holder(&self.deadline(), token).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let token = require_token(token)?;
        validate_password_policy(new_password)?;

        let deadline = self.deadline();
        let user = self.live_reset_holder(&deadline, token).await?;
        let password_hash = hash_password(new_password)?;
        // hashing takes time; the token may have lapsed meanwhile
        self.ensure_reset_live(&user)?;

        match deadline
            .run(self.accounts.reset_password(user.id, token, &password_hash))
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(AppError::InvalidOrExpired),
            Err(e) => return Err(e.into()),
        }
        info!(user_id = %user.id, "password reset");

        match self
            .deadline()
            .run(self.sessions.delete_all_for_user(user.id))
            .await
        {
            Ok(revoked) => info!(user_id = %user.id, revoked, "sessions revoked after password reset"),
            Err(e) => error!(
                user_id = %user.id,
                error = %e,
                "password changed but sessions could not be revoked"
            ),
        }
        Ok(())
    }

    #[instrument(skip(self, first_name, last_name), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> AppResult<User> {
        let update = ProfileUpdate {
            first_name: normalize_name("first_name", first_name)?,
            last_name: normalize_name("last_name", last_name)?,
        };
        let deadline = self.deadline();
        if update.is_empty() {
            return deadline
                .run(self.accounts.find_by_id(user_id))
                .await?
                .ok_or(AppError::NotFound);
        }
        let user = deadline
            .run(self.accounts.update_profile(user_id, update))
            .await?;
        debug!("profile updated");
        Ok(user)
    }

    pub async fn profile(&self, user_id: Uuid) -> AppResult<User> {
        self.deadline()
            .run(self.accounts.find_by_id(user_id))
            .await?
            .ok_or(AppError::NotFound)
    }
}
