//! User store collaborator.
//!
//! The gates only need point lookups: by id and username for every
//! credential check, by username for login. Password hashes are opaque here;
//! equality is all the session core relies on.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::Instrument;

use super::error::StoreError;

#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

impl UserRecord {
    #[must_use]
    pub fn new(id: i64, username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Live record for a session identity, `None` when the account is gone.
    async fn find_user_by_id_and_username(
        &self,
        id: i64,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// Cheap liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Read-only Postgres store over `users(id, username, password_hash)`.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(
        &self,
        query: &'static str,
        lookup: Lookup<'_>,
    ) -> Result<Option<UserRecord>, StoreError> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let statement = sqlx::query(query);
        let statement = match lookup {
            Lookup::IdAndUsername(id, username) => statement.bind(id).bind(username),
            Lookup::Username(username) => statement.bind(username),
        };
        let row = statement
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(StoreError::from)
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
    })
}

enum Lookup<'a> {
    IdAndUsername(i64, &'a str),
    Username(&'a str),
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_user_by_id_and_username(
        &self,
        id: i64,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.fetch(
            "SELECT id, username, password_hash FROM users WHERE id = $1 AND username = $2",
            Lookup::IdAndUsername(id, username),
        )
        .await
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.fetch(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
            Lookup::Username(username),
        )
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!(
            "db.ping",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "SELECT 1"
        );
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}

/// In-process store keyed by user id.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<i64, UserRecord>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserRecord) {
        self.users.write().await.insert(user.id, user);
    }

    /// Replace a user's password hash. Returns `false` when the user is unknown.
    pub async fn set_password_hash(&self, id: i64, password_hash: impl Into<String>) -> bool {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.into();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: i64) -> Option<UserRecord> {
        self.users.write().await.remove(&id)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user_by_id_and_username(
        &self,
        id: i64,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .get(&id)
            .filter(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
