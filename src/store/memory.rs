use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ActivityEvent, ActivityStore, NewUser, StoreError, User, UserStore};

/// Process-local store used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    activities: Vec<ActivityEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            is_google_registered: user.is_google_registered,
            is_email_verified: user.is_email_verified,
            last_session: now,
            login_count: 1,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_name(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.get_mut(&id).map(|u| {
            u.first_name = first_name.to_string();
            u.last_name = last_name.to_string();
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        if let Some(u) = self.inner.write().await.users.get_mut(&id) {
            u.password_hash = password_hash.to_string();
            u.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(u) = self.inner.write().await.users.get_mut(&id) {
            u.is_email_verified = true;
            u.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn touch_session(
        &self,
        id: Uuid,
        at: OffsetDateTime,
        count_login: bool,
    ) -> Result<(), StoreError> {
        if let Some(u) = self.inner.write().await.users.get_mut(&id) {
            u.last_session = at;
            if count_login {
                u.login_count += 1;
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.inner.read().await.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().await.users.len() as i64)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn append(&self, event: ActivityEvent) -> Result<(), StoreError> {
        self.inner.write().await.activities.push(event);
        Ok(())
    }

    async fn count_active_users_since(&self, since: OffsetDateTime) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        let users: HashSet<Uuid> = inner
            .activities
            .iter()
            .filter(|a| a.activity_at >= since)
            .map(|a| a.user_id)
            .collect();
        Ok(users.len() as i64)
    }

    async fn count_active_user_days_since(
        &self,
        since: OffsetDateTime,
        offset: UtcOffset,
    ) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        let pairs: HashSet<_> = inner
            .activities
            .iter()
            .filter(|a| a.activity_at >= since)
            .map(|a| (a.user_id, a.activity_at.to_offset(offset).date()))
            .collect();
        Ok(pairs.len() as i64)
    }
}
