use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub first_name: String,
    pub last_name: String,
    pub is_google_registered: bool,
    pub is_email_verified: bool,
    pub last_session: OffsetDateTime,
    pub login_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields supplied when a user is created; the hash is already computed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_google_registered: bool,
    pub is_email_verified: bool,
}

/// One row of the append-only activity log.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityEvent {
    pub user_id: Uuid,
    pub activity_path: String,
    pub activity_at: OffsetDateTime,
}
