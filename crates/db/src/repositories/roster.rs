use chrono::{DateTime, Utc};
use sqlx::Row;

use hourbot_core::domain::user::{RegisteredUser, UserId, UserKey};

use super::{RepositoryError, RosterRepository};
use crate::DbPool;

pub struct SqlRosterRepository {
    pool: DbPool,
}

impl SqlRosterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<RegisteredUser, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let external_id: String =
        row.try_get("external_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let registered_at_str: String =
        row.try_get("registered_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let registered_at = DateTime::parse_from_rfc3339(&registered_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("registered_at: {e}")))?;

    Ok(RegisteredUser { key: UserKey(id), user_id: UserId(external_id), registered_at })
}

#[async_trait::async_trait]
impl RosterRepository for SqlRosterRepository {
    async fn list_all(&self) -> Result<Vec<RegisteredUser>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, external_id, registered_at FROM registered_user ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect::<Result<Vec<_>, _>>()
    }

    async fn find_by_external_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<RegisteredUser>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, external_id, registered_at FROM registered_user WHERE external_id = ?",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn insert_if_absent(
        &self,
        user_id: &UserId,
    ) -> Result<Option<RegisteredUser>, RepositoryError> {
        let row = sqlx::query(
            "INSERT INTO registered_user (external_id, registered_at)
             VALUES (?, ?)
             ON CONFLICT(external_id) DO NOTHING
             RETURNING id, external_id, registered_at",
        )
        .bind(user_id.as_str())
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }
}
