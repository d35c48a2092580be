use async_trait::async_trait;
use thiserror::Error;

use hourbot_core::domain::conversation::{ConversationId, ConversationKind};
use hourbot_core::domain::user::UserId;
use hourbot_core::errors::ApplicationError;

use crate::messages;

/// A prefixed message, split into verb and arguments, with the context it
/// arrived in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub verb: String,
    pub args: String,
    pub conversation_id: ConversationId,
    pub conversation_kind: ConversationKind,
    pub author_id: UserId,
    pub correlation_id: String,
}

impl CommandEnvelope {
    /// Group conversation to report back to; `None` for private triggers.
    pub fn origin(&self) -> Option<ConversationId> {
        match self.conversation_kind {
            ConversationKind::Group => Some(self.conversation_id.clone()),
            ConversationKind::Private => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Add,
    Dm,
    Help,
    Unknown { verb: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error("command service failed: {0}")]
    Service(String),
}

/// Splits `text` into `(verb, args)` when its first whitespace-separated
/// token is exactly `prefix`. The verb is lowercased; a bare prefix yields
/// `help`.
pub fn split_command(prefix: &str, text: &str) -> Option<(String, String)> {
    let mut parts = text.split_whitespace();
    if parts.next()? != prefix {
        return None;
    }

    let verb = parts.next().unwrap_or("help").to_ascii_lowercase();
    let args = parts.collect::<Vec<_>>().join(" ");
    Some((verb, args))
}

pub fn classify_command(verb: &str) -> ChatCommand {
    match verb {
        "add" => ChatCommand::Add,
        "dm" => ChatCommand::Dm,
        "help" | "" => ChatCommand::Help,
        other => ChatCommand::Unknown { verb: other.to_owned() },
    }
}

pub struct CommandRouter<S> {
    service: S,
    prefix: String,
}

impl<S> CommandRouter<S>
where
    S: HoursCommandService,
{
    pub fn new(service: S, prefix: impl Into<String>) -> Self {
        Self { service, prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub async fn route(&self, envelope: CommandEnvelope) -> Result<String, CommandRouteError> {
        match classify_command(&envelope.verb) {
            ChatCommand::Add => self.service.register(&envelope).await,
            ChatCommand::Dm => self.service.start_round(&envelope).await,
            ChatCommand::Help => Ok(messages::help(&self.prefix)),
            ChatCommand::Unknown { verb } => Ok(messages::unsupported_command(&self.prefix, &verb)),
        }
    }
}

#[async_trait]
pub trait HoursCommandService: Send + Sync {
    /// Adds the command author to the roster and returns the reply text.
    async fn register(&self, envelope: &CommandEnvelope) -> Result<String, CommandRouteError>;

    /// Prompts every registered user and returns the summary for the
    /// triggering conversation once the fan-out has finished.
    async fn start_round(&self, envelope: &CommandEnvelope) -> Result<String, CommandRouteError>;
}

#[derive(Default)]
pub struct NoopHoursCommandService;

#[async_trait]
impl HoursCommandService for NoopHoursCommandService {
    async fn register(&self, envelope: &CommandEnvelope) -> Result<String, CommandRouteError> {
        Ok(messages::registered(&envelope.author_id))
    }

    async fn start_round(&self, _envelope: &CommandEnvelope) -> Result<String, CommandRouteError> {
        Ok(messages::EMPTY_ROSTER_TEXT.to_owned())
    }
}
