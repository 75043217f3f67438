//! In-process stores for local development and tests.
//!
//! Each store keeps its records behind one `RwLock`, so uniqueness checks and
//! inserts happen under the same write guard.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::{AccountStore, SessionStore, StoreError, StoreResult, UniqueField};
use crate::auth::repo_types::{NewUser, ProfileUpdate, Session, User, UserStatus};

#[derive(Default)]
pub struct MemoryAccountStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn find_where<P>(&self, pred: P) -> StoreResult<Option<User>>
    where
        P: Fn(&User) -> bool + Send,
    {
        let users = self.users.read().await;
        Ok(users.values().find(|u| pred(u)).cloned())
    }

    async fn modify<F>(&self, id: Uuid, f: F) -> StoreResult<User>
    where
        F: FnOnce(&mut User) -> StoreResult<()> + Send,
    {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        f(user)?;
        Ok(user.clone())
    }

    /// Stand-in for the administrative action that suspends an account.
    #[cfg(test)]
    pub async fn suspend(&self, id: Uuid) {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.status = UserStatus::Suspended;
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
        if users.values().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict(UniqueField::Username));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            status: UserStatus::Pending,
            verified_at: None,
            verification_token: Some(new.verification_token),
            verification_token_expires_at: Some(new.verification_token_expires_at),
            reset_token: None,
            reset_token_expires_at: None,
            last_login_at: None,
            created_at: new.created_at,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_where(|u| u.email == email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_where(|u| u.username == username).await
    }

    async fn find_by_verification_token(&self, token: &str) -> StoreResult<Option<User>> {
        self.find_where(|u| u.verification_token.as_deref() == Some(token))
            .await
    }

    async fn find_by_reset_token(&self, token: &str) -> StoreResult<Option<User>> {
        self.find_where(|u| u.reset_token.as_deref() == Some(token)).await
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreResult<User> {
        self.modify(id, |u| {
            if let Some(first) = update.first_name {
                u.first_name = Some(first);
            }
            if let Some(last) = update.last_name {
                u.last_name = Some(last);
            }
            Ok(())
        })
        .await
    }

    async fn set_verification_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let token = token.to_string();
        self.modify(id, move |u| {
            u.verification_token = Some(token);
            u.verification_token_expires_at = Some(expires_at);
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn mark_verified(
        &self,
        id: Uuid,
        token: &str,
        at: OffsetDateTime,
    ) -> StoreResult<User> {
        self.modify(id, |u| {
            if u.verification_token.as_deref() != Some(token) {
                return Err(StoreError::NotFound);
            }
            u.verified_at = Some(at);
            u.verification_token = None;
            u.verification_token_expires_at = None;
            if u.status == UserStatus::Pending {
                u.status = UserStatus::Active;
            }
            Ok(())
        })
        .await
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let token = token.to_string();
        self.modify(id, move |u| {
            u.reset_token = Some(token);
            u.reset_token_expires_at = Some(expires_at);
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn reset_password(
        &self,
        id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> StoreResult<()> {
        self.modify(id, |u| {
            if u.reset_token.as_deref() != Some(token) {
                return Err(StoreError::NotFound);
            }
            u.password_hash = password_hash.to_string();
            u.reset_token = None;
            u.reset_token_expires_at = None;
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        self.modify(id, |u| {
            u.last_login_at = Some(at);
            Ok(())
        })
        .await
        .map(|_| ())
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: Session) -> StoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.token_hash) {
            return Err(StoreError::Conflict(UniqueField::Unknown));
        }
        sessions.insert(session.token_hash.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().await.get(token_hash).cloned())
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self.sessions.write().await.remove(token_hash).is_some())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn new_user(email: &str, username: &str) -> NewUser {
        let now = OffsetDateTime::now_utc();
        NewUser {
            email: email.into(),
            username: username.into(),
            password_hash: "$argon2id$stub".into(),
            first_name: None,
            last_name: None,
            verification_token: format!("vt-{username}"),
            verification_token_expires_at: now + Duration::hours(24),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_and_username() {
        let store = MemoryAccountStore::new();
        store.create(new_user("a@x.com", "alice")).await.unwrap();

        let err = store.create(new_user("a@x.com", "bob")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Email)));

        let err = store.create(new_user("b@x.com", "alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Username)));
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let store = MemoryAccountStore::new();
        store.create(new_user("A@x.com", "alice")).await.unwrap();
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
        assert!(store.find_by_email("A@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn mark_verified_requires_current_token() {
        let store = MemoryAccountStore::new();
        let user = store.create(new_user("a@x.com", "alice")).await.unwrap();
        let now = OffsetDateTime::now_utc();

        let err = store.mark_verified(user.id, "stale", now).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        let verified = store.mark_verified(user.id, "vt-alice", now).await.unwrap();
        assert_eq!(verified.status, UserStatus::Active);
        assert!(verified.verification_token.is_none());
        assert!(verified.verification_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn reset_password_clears_token_pair() {
        let store = MemoryAccountStore::new();
        let user = store.create(new_user("a@x.com", "alice")).await.unwrap();
        let exp = OffsetDateTime::now_utc() + Duration::hours(1);
        store.set_reset_token(user.id, "rt", exp).await.unwrap();

        store.reset_password(user.id, "rt", "$argon2id$new").await.unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$argon2id$new");
        assert!(stored.reset_token.is_none());
        assert!(stored.reset_token_expires_at.is_none());
        assert!(store.find_by_reset_token("rt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_all_for_user_leaves_other_users_alone() {
        let store = MemorySessionStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let now = OffsetDateTime::now_utc();
        for (hash, user_id) in [("h1", alice), ("h2", alice), ("h3", bob)] {
            store
                .create(Session {
                    token_hash: hash.into(),
                    user_id,
                    expires_at: now + Duration::hours(1),
                    created_at: now,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_all_for_user(alice).await.unwrap(), 2);
        assert!(store.find_by_token_hash("h3").await.unwrap().is_some());
        assert!(!store.delete_by_token_hash("h1").await.unwrap());
    }
}
