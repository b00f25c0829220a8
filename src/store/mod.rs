pub mod memory;
pub mod postgres;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::models::{
    notification::{FacultyResponse, Notification, NotificationFilter},
    timetable::{TimetableEntry, TimetableFilter},
    user::{User, UserChanges, UserRole},
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("data store request failed ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("data store unreachable: {0}")]
    Unavailable(String),
    #[error("could not decode row: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Unavailable(e.to_string())
        }
    }
}

/// The three tables of the tracker behind simple filtered queries.
///
/// Each call is a single round trip; there are no transactions and no joins.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // users
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn list_users(&self, role: UserRole) -> Result<Vec<User>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn upsert_user(&self, user: &User) -> Result<(), StoreError>;
    /// Returns whether a row was updated.
    async fn update_user(&self, username: &str, changes: &UserChanges) -> Result<bool, StoreError>;
    async fn delete_user(&self, username: &str) -> Result<bool, StoreError>;

    // timetable
    async fn list_timetable(&self, filter: &TimetableFilter) -> Result<Vec<TimetableEntry>, StoreError>;
    /// Insert or replace the row with the same (day, time, subject, faculty, division, batch).
    async fn upsert_timetable(&self, entry: &TimetableEntry) -> Result<(), StoreError>;

    // notifications
    /// Matching rows ordered by timestamp, oldest first.
    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError>;
    /// Fails with [`StoreError::Conflict`] on a duplicate timestamp or a
    /// second faculty notification for the same (username, subject, day, time).
    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError>;
    /// Returns whether the notification existed.
    async fn set_response(
        &self,
        timestamp: &str,
        response: &FacultyResponse,
    ) -> Result<bool, StoreError>;
    /// Delete the notification with `timestamp` if it also matches `filter`.
    /// Returns the number of deleted rows.
    async fn delete_notification(
        &self,
        timestamp: &str,
        filter: &NotificationFilter,
    ) -> Result<u64, StoreError>;
}

/// Pick the backend from the store URL scheme.
pub async fn create_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let url = config.store_url.as_str();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let pool = crate::db::create_pool(
            url,
            &config.store_key,
            config.store_max_connections,
            config.store_timeout_seconds,
        )
        .await?;
        crate::db::run_migrations(&pool).await?;
        tracing::info!("Using Postgres data store");
        Ok(Arc::new(postgres::PgStore::new(pool)))
    } else if url.starts_with("http://") || url.starts_with("https://") {
        tracing::info!("Using REST data store at {}", url);
        Ok(Arc::new(rest::RestStore::new(
            url,
            &config.store_key,
            config.store_timeout_seconds,
        )?))
    } else if url.starts_with("memory://") {
        tracing::warn!("Using in-memory data store, nothing will be persisted");
        Ok(Arc::new(memory::MemoryStore::new()))
    } else {
        Err(anyhow::anyhow!("Unsupported STORE_URL scheme: {url}"))
    }
}
