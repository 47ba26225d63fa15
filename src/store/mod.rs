use async_trait::async_trait;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

mod memory;
mod postgres;
mod types;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use types::{ActivityEvent, NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint (the user email) rejected the write.
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Other(e.into()),
        }
    }
}

/// Persisted user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Fails with `StoreError::Duplicate` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_name(&self, id: Uuid, first_name: &str, last_name: &str)
        -> Result<Option<User>, StoreError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
    async fn mark_email_verified(&self, id: Uuid) -> Result<(), StoreError>;
    /// Sets `last_session` and, for sign-in requests, bumps `login_count`.
    async fn touch_session(&self, id: Uuid, at: OffsetDateTime, count_login: bool)
        -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn count(&self) -> Result<i64, StoreError>;
}

/// Append-only activity log.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn append(&self, event: ActivityEvent) -> Result<(), StoreError>;
    /// Distinct users with at least one event at or after `since`.
    async fn count_active_users_since(&self, since: OffsetDateTime) -> Result<i64, StoreError>;
    /// Distinct (user, calendar day) pairs at or after `since`; days are taken in `offset`.
    async fn count_active_user_days_since(
        &self,
        since: OffsetDateTime,
        offset: UtcOffset,
    ) -> Result<i64, StoreError>;
}
