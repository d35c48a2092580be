use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use hourbot_chat::commands::{CommandEnvelope, CommandRouteError, HoursCommandService};
use hourbot_chat::events::{
    EventContext, EventDispatcher, EventHandlerError, MessageEvent, MessageHandler, ReplyService,
};
use hourbot_chat::messages;
use hourbot_chat::transport::ChatClient;
use hourbot_core::config::CollectionConfig;
use hourbot_core::domain::hours::HoursPolicy;
use hourbot_core::errors::ApplicationError;
use hourbot_core::pending::PendingReplies;
use hourbot_db::repositories::{HoursRepository, RosterRepository};

use crate::broadcast::BroadcastCoordinator;
use crate::collector::ReplyCollector;
use crate::registration::{RegistrationHandler, RegistrationOutcome};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub max_concurrency: usize,
    pub policy: HoursPolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self { max_concurrency: 8, policy: HoursPolicy::default() }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &CollectionConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            policy: HoursPolicy::with_max_hours(config.max_hours),
        }
    }
}

/// The three workflow components behind the chat service traits. Cloning is
/// cheap and every clone shares the same tracker and stores.
#[derive(Clone)]
pub struct WorkflowRuntime {
    coordinator: Arc<BroadcastCoordinator>,
    collector: Arc<ReplyCollector>,
    registration: Arc<RegistrationHandler>,
    pending: Arc<PendingReplies>,
}

impl WorkflowRuntime {
    pub fn new(
        roster: Arc<dyn RosterRepository>,
        hours: Arc<dyn HoursRepository>,
        chat: Arc<dyn ChatClient>,
        pending: Arc<PendingReplies>,
        settings: WorkflowSettings,
    ) -> Self {
        let coordinator = BroadcastCoordinator::new(
            Arc::clone(&roster),
            Arc::clone(&chat),
            Arc::clone(&pending),
            settings.max_concurrency,
        );
        let collector = ReplyCollector::new(
            Arc::clone(&roster),
            hours,
            chat,
            Arc::clone(&pending),
            settings.policy,
        );
        let registration = RegistrationHandler::new(roster);

        Self {
            coordinator: Arc::new(coordinator),
            collector: Arc::new(collector),
            registration: Arc::new(registration),
            pending,
        }
    }

    pub fn coordinator(&self) -> &BroadcastCoordinator {
        &self.coordinator
    }

    /// Tracker shared by the coordinator and the collector.
    pub fn pending(&self) -> &PendingReplies {
        &self.pending
    }

    pub fn dispatcher(&self, prefix: &str) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(MessageHandler::new(self.clone(), self.clone(), prefix));
        dispatcher
    }
}

fn failure_reply(error: ApplicationError, command: &str, correlation_id: &str) -> String {
    warn!(
        event_name = "workflow.command.failed",
        command,
        correlation_id,
        error_class = error.error_class(),
        error = %error,
        "command failed"
    );
    error.into_interface(correlation_id).user_message().to_owned()
}

#[async_trait]
impl HoursCommandService for WorkflowRuntime {
    async fn register(&self, envelope: &CommandEnvelope) -> Result<String, CommandRouteError> {
        Ok(match self.registration.register(&envelope.author_id).await {
            Ok(RegistrationOutcome::Registered(user)) => messages::registered(&user.user_id),
            Ok(RegistrationOutcome::AlreadyRegistered) => {
                messages::ALREADY_REGISTERED_TEXT.to_owned()
            }
            Err(error) => failure_reply(error.into(), "add", &envelope.correlation_id),
        })
    }

    async fn start_round(&self, envelope: &CommandEnvelope) -> Result<String, CommandRouteError> {
        Ok(match self.coordinator.start_round(envelope.origin()).await {
            Ok(report) if report.attempted() == 0 => messages::EMPTY_ROSTER_TEXT.to_owned(),
            Ok(report) => messages::round_summary(report.delivered(), report.failures.len()),
            Err(error) => failure_reply(error.into(), "dm", &envelope.correlation_id),
        })
    }
}

#[async_trait]
impl ReplyService for WorkflowRuntime {
    async fn handle_reply(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError> {
        let Err(error) = self.collector.collect(event).await else {
            return Ok(None);
        };

        // The collector has already asked the user to try again.
        let error = ApplicationError::from(error);
        if error.is_recoverable() {
            debug!(
                correlation_id = %ctx.correlation_id,
                conversation_id = %event.conversation_id,
                error = %error,
                "reply rejected"
            );
            return Ok(None);
        }
        Err(EventHandlerError::Application(error))
    }
}
