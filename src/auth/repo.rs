//! Store contracts the account and session managers depend on.
//!
//! Implementations live in [`crate::auth::pg`] and [`crate::auth::memory`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, ProfileUpdate, Session, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
    Unknown,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UniqueField::Email => "email",
            UniqueField::Username => "username",
            UniqueField::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0}")]
    Conflict(UniqueField),

    #[error("record not found")]
    NotFound,

    #[error("store operation timed out")]
    Timeout,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let field = match db.constraint() {
                    Some(c) if c.contains("username") => UniqueField::Username,
                    Some(c) if c.contains("email") => UniqueField::Email,
                    _ => UniqueField::Unknown,
                };
                StoreError::Conflict(field)
            }
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// A fixed point in time shared by every store call of one logical operation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }

    pub async fn run<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        tokio::time::timeout_at(self.0, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a user. Uniqueness of email and username is enforced here and
    /// reported as [`StoreError::Conflict`].
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<User>>;
    async fn find_by_reset_token(&self, token: &str) -> StoreResult<Option<User>>;

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreResult<User>;

    /// Overwrite the user's verification token and its expiry.
    async fn set_verification_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()>;

    /// Set `verified_at`, clear the verification token and promote a pending
    /// account to active, provided `token` is still the current one.
    /// [`StoreError::NotFound`] when it is not.
    async fn mark_verified(&self, id: Uuid, token: &str, at: OffsetDateTime)
        -> StoreResult<User>;

    /// Overwrite the reset token and its expiry in one write.
    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()>;

    /// Replace the password hash and clear the reset token and expiry, provided
    /// `token` is still the current reset token. [`StoreError::NotFound`] when
    /// it is not.
    async fn reset_password(&self, id: Uuid, token: &str, password_hash: &str)
        -> StoreResult<()>;

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> StoreResult<Session>;
    async fn find_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<Session>>;
    /// Returns whether a row was removed.
    async fn delete_by_token_hash(&self, token_hash: &str) -> StoreResult<bool>;
    /// Returns how many sessions were removed.
    async fn delete_all_for_user(&self, user_id: Uuid) -> StoreResult<u64>;
}
