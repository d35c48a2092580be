use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use hourbot_chat::messages::{PROMPT_TEXT, REMINDER_TEXT};
use hourbot_chat::transport::ChatClient;
use hourbot_core::domain::conversation::{ConversationId, RoundId};
use hourbot_core::domain::user::{RegisteredUser, UserId};
use hourbot_core::errors::ApplicationError;
use hourbot_core::pending::PendingReplies;
use hourbot_db::repositories::{RepositoryError, RosterRepository};

#[derive(Debug, Error)]
pub enum RoundError {
    #[error("could not load the roster: {0}")]
    Roster(#[from] RepositoryError),
}

impl From<RoundError> for ApplicationError {
    fn from(error: RoundError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// What one fan-out unit sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Prompted,
    Reminded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitStage {
    OpenConversation,
    SendPrompt,
    SendReminder,
    Task,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitFailure {
    /// `None` when the unit's task itself failed and the user is unknown.
    pub user_id: Option<UserId>,
    pub stage: UnitStage,
    pub error: ApplicationError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundReport {
    pub round_id: RoundId,
    pub prompted: usize,
    pub reminded: usize,
    pub failures: Vec<UnitFailure>,
}

impl RoundReport {
    pub fn delivered(&self) -> usize {
        self.prompted + self.reminded
    }

    pub fn attempted(&self) -> usize {
        self.delivered() + self.failures.len()
    }
}

/// Sends the hours prompt to every registered user.
///
/// Each user is an independent unit: open the private conversation, mark it
/// pending, send the prompt (or a reminder when the conversation was already
/// awaiting a reply). Units run concurrently, at most `max_concurrency` at a
/// time, and `start_round` returns only after every unit has finished. A
/// failing unit is recorded in the report and never affects its siblings.
pub struct BroadcastCoordinator {
    roster: Arc<dyn RosterRepository>,
    chat: Arc<dyn ChatClient>,
    pending: Arc<PendingReplies>,
    max_concurrency: usize,
}

impl BroadcastCoordinator {
    pub fn new(
        roster: Arc<dyn RosterRepository>,
        chat: Arc<dyn ChatClient>,
        pending: Arc<PendingReplies>,
        max_concurrency: usize,
    ) -> Self {
        let max_concurrency = max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
        Self { roster, chat, pending, max_concurrency }
    }

    pub async fn start_round(
        &self,
        origin: Option<ConversationId>,
    ) -> Result<RoundReport, RoundError> {
        let round_id = RoundId::new();
        let users = self.roster.list_all().await?;
        info!(
            event_name = "workflow.round.started",
            round_id = %round_id,
            roster_size = users.len(),
            origin = origin.as_ref().map(ConversationId::as_str).unwrap_or("private"),
            "starting hours collection round"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut units = JoinSet::new();
        for user in users {
            let chat = Arc::clone(&self.chat);
            let pending = Arc::clone(&self.pending);
            let semaphore = Arc::clone(&semaphore);
            let origin = origin.clone();
            units.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Err(UnitFailure {
                        user_id: Some(user.user_id),
                        stage: UnitStage::Task,
                        error: ApplicationError::Integration("fan-out limiter closed".to_owned()),
                    });
                };
                dispatch_unit(chat.as_ref(), &pending, user, origin, round_id).await
            });
        }

        let mut report = RoundReport { round_id, prompted: 0, reminded: 0, failures: Vec::new() };
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(Ok(Delivery::Prompted)) => report.prompted += 1,
                Ok(Ok(Delivery::Reminded)) => report.reminded += 1,
                Ok(Err(failure)) => {
                    warn!(
                        event_name = "workflow.round.unit_failed",
                        round_id = %round_id,
                        user_id = failure.user_id.as_ref().map(UserId::as_str).unwrap_or("unknown"),
                        stage = ?failure.stage,
                        error_class = failure.error.error_class(),
                        error = %failure.error,
                        "hours prompt unit failed"
                    );
                    report.failures.push(failure);
                }
                Err(join_error) => {
                    warn!(
                        event_name = "workflow.round.unit_failed",
                        round_id = %round_id,
                        error = %join_error,
                        "hours prompt unit did not complete"
                    );
                    report.failures.push(UnitFailure {
                        user_id: None,
                        stage: UnitStage::Task,
                        error: ApplicationError::Integration(join_error.to_string()),
                    });
                }
            }
        }

        info!(
            event_name = "workflow.round.dispatched",
            round_id = %round_id,
            prompted = report.prompted,
            reminded = report.reminded,
            failed = report.failures.len(),
            "hours collection round dispatched"
        );
        Ok(report)
    }
}

async fn dispatch_unit(
    chat: &dyn ChatClient,
    pending: &PendingReplies,
    user: RegisteredUser,
    origin: Option<ConversationId>,
    round_id: RoundId,
) -> Result<Delivery, UnitFailure> {
    let conversation = chat.open_private_conversation(&user.user_id).await.map_err(|error| {
        UnitFailure {
            user_id: Some(user.user_id.clone()),
            stage: UnitStage::OpenConversation,
            error: error.into(),
        }
    })?;

    let is_new = pending.begin(&conversation, origin, round_id);
    let (delivery, stage, text) = if is_new {
        (Delivery::Prompted, UnitStage::SendPrompt, PROMPT_TEXT)
    } else {
        (Delivery::Reminded, UnitStage::SendReminder, REMINDER_TEXT)
    };

    if let Err(error) = chat.send_message(&conversation, text).await {
        // The user never saw a prompt, so the next round must prompt again.
        if is_new {
            pending.complete(&conversation);
        }
        return Err(UnitFailure {
            user_id: Some(user.user_id),
            stage,
            error: error.into(),
        });
    }

    debug!(
        event_name = "workflow.round.unit_sent",
        round_id = %round_id,
        user_id = %user.user_id,
        conversation_id = %conversation,
        delivery = ?delivery,
        "hours prompt unit sent"
    );
    Ok(delivery)
}
