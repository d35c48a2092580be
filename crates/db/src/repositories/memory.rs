use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use hourbot_core::domain::hours::{Hours, HoursRecord};
use hourbot_core::domain::user::{RegisteredUser, UserId, UserKey};

use super::{HoursRepository, RepositoryError, RosterRepository};

#[derive(Default)]
pub struct InMemoryRosterRepository {
    users: RwLock<Vec<RegisteredUser>>,
}

impl InMemoryRosterRepository {
    pub async fn with_users(ids: &[&str]) -> Self {
        let repo = Self::default();
        {
            let mut users = repo.users.write().await;
            for id in ids {
                push_if_absent(&mut users, &UserId::new(*id));
            }
        }
        repo
    }
}

fn push_if_absent(users: &mut Vec<RegisteredUser>, user_id: &UserId) -> Option<RegisteredUser> {
    if users.iter().any(|user| &user.user_id == user_id) {
        return None;
    }

    let next_key = users.last().map(|user| user.key.0 + 1).unwrap_or(1);
    let user = RegisteredUser {
        key: UserKey(next_key),
        user_id: user_id.clone(),
        registered_at: Utc::now(),
    };
    users.push(user.clone());
    Some(user)
}

#[async_trait::async_trait]
impl RosterRepository for InMemoryRosterRepository {
    async fn list_all(&self) -> Result<Vec<RegisteredUser>, RepositoryError> {
        Ok(self.users.read().await.clone())
    }

    async fn find_by_external_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<RegisteredUser>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| &user.user_id == user_id).cloned())
    }

    async fn insert_if_absent(
        &self,
        user_id: &UserId,
    ) -> Result<Option<RegisteredUser>, RepositoryError> {
        let mut users = self.users.write().await;
        Ok(push_if_absent(&mut users, user_id))
    }
}

#[derive(Default)]
pub struct InMemoryHoursRepository {
    records: RwLock<BTreeMap<UserKey, HoursRecord>>,
}

#[async_trait::async_trait]
impl HoursRepository for InMemoryHoursRepository {
    async fn find_by_user(
        &self,
        user_key: UserKey,
    ) -> Result<Option<HoursRecord>, RepositoryError> {
        Ok(self.records.read().await.get(&user_key).cloned())
    }

    async fn upsert(
        &self,
        user_key: UserKey,
        hours: Hours,
    ) -> Result<HoursRecord, RepositoryError> {
        let mut records = self.records.write().await;
        let revision = records.get(&user_key).map(|record| record.revision + 1).unwrap_or(1);
        let record = HoursRecord { user_key, hours, revision, updated_at: Utc::now() };
        records.insert(user_key, record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<HoursRecord>, RepositoryError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
