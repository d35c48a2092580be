use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use hourbot_core::domain::user::{RegisteredUser, UserId};
use hourbot_core::errors::ApplicationError;
use hourbot_db::repositories::{RepositoryError, RosterRepository};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(RegisteredUser),
    AlreadyRegistered,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("roster store failure: {0}")]
    Store(#[from] RepositoryError),
}

impl From<RegistrationError> for ApplicationError {
    fn from(value: RegistrationError) -> Self {
        Self::Persistence(value.to_string())
    }
}

pub struct RegistrationHandler {
    roster: Arc<dyn RosterRepository>,
}

impl RegistrationHandler {
    pub fn new(roster: Arc<dyn RosterRepository>) -> Self {
        Self { roster }
    }

    /// Adds `user_id` to the roster. An existing entry is never modified.
    pub async fn register(
        &self,
        user_id: &UserId,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        if self.roster.find_by_external_id(user_id).await?.is_some() {
            info!(
                event_name = "workflow.registration.duplicate",
                user_id = %user_id,
                "user already on the roster"
            );
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        // A concurrent registration of the same user can win between the
        // lookup and the insert; the insert then reports no new row.
        match self.roster.insert_if_absent(user_id).await? {
            Some(user) => {
                info!(
                    event_name = "workflow.registration.added",
                    user_id = %user.user_id,
                    user_key = %user.key,
                    "user added to the roster"
                );
                Ok(RegistrationOutcome::Registered(user))
            }
            None => Ok(RegistrationOutcome::AlreadyRegistered),
        }
    }
}
