use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use hourbot_core::domain::hours::{Hours, HoursRecord};
use hourbot_core::domain::user::UserKey;

use super::{HoursRepository, RepositoryError};
use crate::DbPool;

pub struct SqlHoursRepository {
    pool: DbPool,
}

impl SqlHoursRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<HoursRecord, RepositoryError> {
    let user_id: i64 =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let hours_str: String =
        row.try_get("hours").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let revision: i64 =
        row.try_get("revision").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let hours = Decimal::from_str(&hours_str)
        .map(Hours::from_decimal)
        .map_err(|e| RepositoryError::Decode(format!("hours `{hours_str}`: {e}")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("updated_at: {e}")))?;

    Ok(HoursRecord { user_key: UserKey(user_id), hours, revision, updated_at })
}

#[async_trait::async_trait]
impl HoursRepository for SqlHoursRepository {
    async fn find_by_user(
        &self,
        user_key: UserKey,
    ) -> Result<Option<HoursRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, hours, revision, updated_at FROM hours WHERE user_id = ?",
        )
        .bind(user_key.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_record(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(
        &self,
        user_key: UserKey,
        hours: Hours,
    ) -> Result<HoursRecord, RepositoryError> {
        let now = Utc::now().to_rfc3339();

        // Unqualified columns in DO UPDATE refer to the existing row.
        let row = sqlx::query(
            "INSERT INTO hours (user_id, hours, revision, created_at, updated_at)
             VALUES (?, ?, 1, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 hours = excluded.hours,
                 revision = revision + 1,
                 updated_at = excluded.updated_at
             RETURNING user_id, hours, revision, updated_at",
        )
        .bind(user_key.0)
        .bind(hours.to_string())
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        row_to_record(&row)
    }

    async fn list_all(&self) -> Result<Vec<HoursRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT user_id, hours, revision, updated_at FROM hours ORDER BY user_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()
    }
}
