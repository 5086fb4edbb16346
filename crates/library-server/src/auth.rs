//! Identity resolution for inbound requests.
//!
//! Writes require an identity. The transport hands the bearer credential of
//! each request to an [`IdentityProvider`] and stores the resulting user (or
//! `None`) in the request context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use library_storage::{DataStore, User, UserId};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LibraryError, LibraryResult};

/// Resolves a bearer credential to the user it belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns `None` for unknown or expired credentials.
    async fn resolve(&self, credential: &str) -> LibraryResult<Option<User>>;
}

/// Opaque credential returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub value: String,
}

/// Default lifetime of a login token.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: UserId,
    expires_at: Instant,
}

impl Session {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process session table.
///
/// Every registered user shares one password; a login issues a random token
/// that maps back to the user id until the session TTL elapses. Expired
/// sessions are dropped when they are presented and swept on every login.
pub struct SessionStore<S> {
    store: Arc<S>,
    shared_password: String,
    ttl: Duration,
    sessions: DashMap<String, Session>,
}

impl<S> std::fmt::Debug for SessionStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl<S: DataStore> SessionStore<S> {
    pub fn new(store: Arc<S>, shared_password: impl Into<String>) -> Self {
        Self {
            store,
            shared_password: shared_password.into(),
            ttl: DEFAULT_SESSION_TTL,
            sessions: DashMap::new(),
        }
    }

    /// Sets how long an issued token stays valid.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issues a token when the user exists and the password matches.
    pub async fn login(&self, username: &str, password: &str) -> LibraryResult<Token> {
        let user = self.store.find_user_by_username(username).await?;
        let user = match user {
            Some(user) if password == self.shared_password => user,
            _ => {
                debug!(username, "login rejected");
                return Err(LibraryError::InvalidCredentials);
            }
        };

        let now = Instant::now();
        self.sweep(now);

        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id: user.id,
                expires_at: now + self.ttl,
            },
        );
        info!(user_id = %user.id, "user logged in");

        Ok(Token { value: token })
    }

    /// Invalidates a token. Returns `false` if it was unknown.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drops every expired session and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep(Instant::now())
    }

    /// Number of stored sessions, including expired ones not yet swept.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn sweep(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, "expired sessions swept");
        }
        removed
    }
}

#[async_trait]
impl<S: DataStore> IdentityProvider for SessionStore<S> {
    async fn resolve(&self, credential: &str) -> LibraryResult<Option<User>> {
        let Some(session) = self.sessions.get(credential).map(|entry| *entry) else {
            return Ok(None);
        };
        if session.is_expired(Instant::now()) {
            self.sessions
                .remove_if(credential, |_, stored| stored.expires_at == session.expires_at);
            debug!(user_id = %session.user_id, "expired session rejected");
            return Ok(None);
        }
        Ok(self.store.get_user(session.user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use library_storage::MemoryDataStore;

    use super::*;

    async fn sessions_with_user() -> (SessionStore<MemoryDataStore>, User) {
        let store = MemoryDataStore::new_shared();
        let user = store
            .save_user(User::new("mluukkai", "refactoring"))
            .await
            .unwrap();
        (SessionStore::new(store, "secret"), user)
    }

    #[tokio::test]
    async fn test_login_issues_token_that_resolves_to_user() {
        let (sessions, user) = sessions_with_user().await;

        let token = sessions.login("mluukkai", "secret").await.unwrap();
        let resolved = sessions.resolve(&token.value).await.unwrap();

        assert_eq!(resolved, Some(user));
        assert_eq!(sessions.session_count(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_or_unknown_user_rejected() {
        let (sessions, _) = sessions_with_user().await;

        assert!(matches!(
            sessions.login("mluukkai", "wrong").await,
            Err(LibraryError::InvalidCredentials)
        ));
        assert!(matches!(
            sessions.login("nobody", "secret").await,
            Err(LibraryError::InvalidCredentials)
        ));
        assert_eq!(sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_revoked_tokens_resolve_to_none() {
        let (sessions, _) = sessions_with_user().await;
        assert_eq!(sessions.resolve("not-a-token").await.unwrap(), None);

        let token = sessions.login("mluukkai", "secret").await.unwrap();
        assert!(sessions.logout(&token.value));
        assert!(!sessions.logout(&token.value));
        assert_eq!(sessions.resolve(&token.value).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_token_resolves_to_none_and_is_dropped() {
        let (sessions, user) = sessions_with_user().await;
        let sessions = sessions.with_ttl(Duration::from_millis(20));

        let token = sessions.login("mluukkai", "secret").await.unwrap();
        assert_eq!(sessions.resolve(&token.value).await.unwrap(), Some(user));

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(sessions.resolve(&token.value).await.unwrap(), None);
        assert_eq!(sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn test_login_sweeps_expired_sessions() {
        let (sessions, _) = sessions_with_user().await;
        let sessions = sessions.with_ttl(Duration::from_millis(20));

        for _ in 0..5 {
            sessions.login("mluukkai", "secret").await.unwrap();
        }
        assert_eq!(sessions.session_count(), 5);

        tokio::time::sleep(Duration::from_millis(40)).await;

        let fresh = sessions.login("mluukkai", "secret").await.unwrap();
        assert_eq!(sessions.session_count(), 1);
        assert!(sessions.resolve(&fresh.value).await.unwrap().is_some());
        assert_eq!(sessions.sweep_expired(), 0);
    }
}
