use async_trait::async_trait;
use thiserror::Error;

use hourbot_core::domain::hours::{Hours, HoursRecord};
use hourbot_core::domain::user::{RegisteredUser, UserId, UserKey};

pub mod hours;
pub mod memory;
pub mod roster;

pub use hours::SqlHoursRepository;
pub use memory::{InMemoryHoursRepository, InMemoryRosterRepository};
pub use roster::SqlRosterRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Registered users. A missing user is `Ok(None)`, never an error.
#[async_trait]
pub trait RosterRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<RegisteredUser>, RepositoryError>;

    async fn find_by_external_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<RegisteredUser>, RepositoryError>;

    /// Inserts `user_id` in one statement. Returns `None` when the user was
    /// already present; the existing row is left untouched.
    async fn insert_if_absent(
        &self,
        user_id: &UserId,
    ) -> Result<Option<RegisteredUser>, RepositoryError>;
}

/// Latest hours value per registered user.
#[async_trait]
pub trait HoursRepository: Send + Sync {
    async fn find_by_user(&self, user_key: UserKey)
        -> Result<Option<HoursRecord>, RepositoryError>;

    /// Inserts the first record for `user_key` or overwrites the existing one
    /// in a single atomic write.
    async fn upsert(&self, user_key: UserKey, hours: Hours)
        -> Result<HoursRecord, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<HoursRecord>, RepositoryError>;
}
