//! Store wrappers that fail or stall selected calls on demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::memory::{MemoryAccountStore, MemorySessionStore};
use crate::auth::repo::{AccountStore, SessionStore, StoreError, StoreResult};
use crate::auth::repo_types::{NewUser, ProfileUpdate, Session, User};

pub const INJECTED_FAILURE: &str = "connection refused (injected)";

fn injected() -> StoreError {
    StoreError::Unavailable(INJECTED_FAILURE.into())
}

async fn stall() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

pub struct FaultyAccountStore {
    inner: Arc<MemoryAccountStore>,
    fail_email_lookup: AtomicBool,
    stall_email_lookup: AtomicBool,
    fail_touch: AtomicBool,
}

impl FaultyAccountStore {
    pub fn new(inner: Arc<MemoryAccountStore>) -> Self {
        Self {
            inner,
            fail_email_lookup: AtomicBool::new(false),
            stall_email_lookup: AtomicBool::new(false),
            fail_touch: AtomicBool::new(false),
        }
    }

    pub fn fail_email_lookup(&self, on: bool) {
        self.fail_email_lookup.store(on, Ordering::SeqCst);
    }

    pub fn stall_email_lookup(&self, on: bool) {
        self.stall_email_lookup.store(on, Ordering::SeqCst);
    }

    pub fn fail_touch_last_login(&self, on: bool) {
        self.fail_touch.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for FaultyAccountStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        self.inner.create(user).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        if self.fail_email_lookup.load(Ordering::SeqCst) {
            return Err(injected());
        }
        if self.stall_email_lookup.load(Ordering::SeqCst) {
            stall().await;
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<User>> {
        self.inner.find_by_verification_token(token).await
    }

    async fn find_by_reset_token(&self, token: &str) -> StoreResult<Option<User>> {
        self.inner.find_by_reset_token(token).await
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreResult<User> {
        self.inner.update_profile(id, update).await
    }

    async fn set_verification_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        self.inner.set_verification_token(id, token, expires_at).await
    }

    async fn mark_verified(
        &self,
        id: Uuid,
        token: &str,
        at: OffsetDateTime,
    ) -> StoreResult<User> {
        self.inner.mark_verified(id, token, at).await
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        self.inner.set_reset_token(id, token, expires_at).await
    }

    async fn reset_password(
        &self,
        id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> StoreResult<()> {
        self.inner.reset_password(id, token, password_hash).await
    }

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.touch_last_login(id, at).await
    }
}

pub struct FaultySessionStore {
    inner: Arc<MemorySessionStore>,
    fail_revoke_all: AtomicBool,
}

impl FaultySessionStore {
    pub fn new(inner: Arc<MemorySessionStore>) -> Self {
        Self {
            inner,
            fail_revoke_all: AtomicBool::new(false),
        }
    }

    pub fn fail_revoke_all(&self, on: bool) {
        self.fail_revoke_all.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FaultySessionStore {
    async fn create(&self, session: Session) -> StoreResult<Session> {
        self.inner.create(session).await
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        self.inner.find_by_token_hash(token_hash).await
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> StoreResult<bool> {
        self.inner.delete_by_token_hash(token_hash).await
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        if self.fail_revoke_all.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.delete_all_for_user(user_id).await
    }
}
