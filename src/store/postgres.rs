use async_trait::async_trait;
use sqlx::PgPool;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use super::{ActivityEvent, ActivityStore, NewUser, StoreError, User, UserStore};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, is_google_registered, \
     is_email_verified, last_session, login_count, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name,
                               is_google_registered, is_email_verified, last_session, login_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), 1)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_google_registered)
        .bind(user.is_email_verified)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_name(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET first_name = $2, last_name = $3, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET is_email_verified = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn touch_session(
        &self,
        id: Uuid,
        at: OffsetDateTime,
        count_login: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET last_session = $2,
                   login_count = login_count + CASE WHEN $3 THEN 1 ELSE 0 END
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(count_login)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn append(&self, event: ActivityEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_activities (user_id, activity_path, activity_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(event.user_id)
        .bind(&event.activity_path)
        .bind(event.activity_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn count_active_users_since(&self, since: OffsetDateTime) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT user_id) FROM user_activities WHERE activity_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.db)
        .await?;
        Ok(n)
    }

    async fn count_active_user_days_since(
        &self,
        since: OffsetDateTime,
        offset: UtcOffset,
    ) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM (
                SELECT DISTINCT user_id,
                       ((activity_at AT TIME ZONE 'UTC') + make_interval(secs => $2))::date
                  FROM user_activities
                 WHERE activity_at >= $1
            ) AS active_days
            "#,
        )
        .bind(since)
        .bind(offset.whole_seconds() as f64)
        .fetch_one(&self.db)
        .await?;
        Ok(n)
    }
}
