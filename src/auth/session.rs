//! Server-side sessions: an opaque token held by the client in a private
//! cookie, mapped to a user id by a pluggable store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::{Rng, distr::Alphanumeric};
use sqlx::{Pool, Sqlite};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::db::{clean_expired_sessions, create_user_session, get_session_by_token, invalidate_session};
use crate::error::AppError;
use crate::models::UserSession;

pub const SESSION_COOKIE: &str = "session_token";

const TOKEN_LENGTH: usize = 48;

/// Storage for session bindings. Expiry is decided by [`Sessions`]; stores
/// only persist and purge.
#[rocket::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &UserSession) -> Result<(), AppError>;

    async fn get(&self, token: &str) -> Result<Option<UserSession>, AppError>;

    async fn remove(&self, token: &str) -> Result<(), AppError>;

    /// Deletes every expired session, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, AppError>;
}

pub struct SqliteSessionStore {
    pool: Pool<Sqlite>,
}

impl SqliteSessionStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert(&self, session: &UserSession) -> Result<(), AppError> {
        create_user_session(&self.pool, session.user_id, &session.token, session.expires_at)
            .await?;
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<UserSession>, AppError> {
        match get_session_by_token(&self.pool, token).await {
            Ok(session) => Ok(Some(session)),
            Err(AppError::Authentication(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn remove(&self, token: &str) -> Result<(), AppError> {
        invalidate_session(&self.pool, token).await
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        clean_expired_sessions(&self.pool).await
    }
}

/// Process-local sessions. Lost on restart.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, UserSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[rocket::async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &UserSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<UserSession>, AppError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(token).cloned())
    }

    async fn remove(&self, token: &str) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at >= now);
        Ok((before - sessions.len()) as u64)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(1),
        }
    }
}

/// Managed state tying a store to its expiry policy.
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    policy: SessionPolicy,
}

impl Sessions {
    pub fn new(store: Arc<dyn SessionStore>, policy: SessionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn start(&self, user_id: i64) -> Result<UserSession, AppError> {
        let now = Utc::now();
        let session = UserSession {
            user_id,
            token: Self::generate_token(),
            created_at: now,
            expires_at: now + self.policy.ttl,
        };

        self.store.insert(&session).await?;
        info!("Session started");

        Ok(session)
    }

    /// Returns the user id bound to `token`. Expired sessions are removed
    /// and treated as absent.
    #[instrument(skip_all)]
    pub async fn resolve(&self, token: &str) -> Result<Option<i64>, AppError> {
        let Some(session) = self.store.get(token).await? else {
            return Ok(None);
        };

        if !session.is_valid() {
            warn!(user_id = session.user_id, "Session token expired");
            self.store.remove(token).await?;
            return Ok(None);
        }

        Ok(Some(session.user_id))
    }

    #[instrument(skip_all)]
    pub async fn end(&self, token: &str) -> Result<(), AppError> {
        self.store.remove(token).await
    }

    pub async fn sweep(&self) -> Result<u64, AppError> {
        self.store.purge_expired().await
    }
}
