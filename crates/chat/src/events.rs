use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use hourbot_core::domain::conversation::{ConversationId, ConversationKind};
use hourbot_core::domain::user::UserId;
use hourbot_core::errors::ApplicationError;

use crate::commands::{
    split_command, CommandEnvelope, CommandRouteError, CommandRouter, HoursCommandService,
    NoopHoursCommandService,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub envelope_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Message(_) => ChatEventType::Message,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        match self {
            Self::Message(event) => Some(&event.conversation_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Message,
    Unsupported,
}

/// An inbound message as delivered by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub conversation_id: ConversationId,
    pub kind: ConversationKind,
    pub author_id: UserId,
    /// Set for messages the bot itself sent.
    pub from_self: bool,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// Text to post back into the conversation the event came from.
    Responded(String),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher(prefix: &str) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(NoopHoursCommandService, NoopReplyService, prefix));
    dispatcher
}

/// Handles a message in a private conversation that is not a command.
#[async_trait]
pub trait ReplyService: Send + Sync {
    /// Returns text to post back, or `None` when the service already answered
    /// (or chose not to).
    async fn handle_reply(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError>;
}

#[derive(Default)]
pub struct NoopReplyService;

#[async_trait]
impl ReplyService for NoopReplyService {
    async fn handle_reply(
        &self,
        _event: &MessageEvent,
        _ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError> {
        Ok(None)
    }
}

/// Routes prefixed messages to the command router and all other private
/// messages to the reply service. Non-command group messages and the bot's
/// own messages are ignored.
pub struct MessageHandler<C, R> {
    router: CommandRouter<C>,
    replies: R,
}

impl<C, R> MessageHandler<C, R>
where
    C: HoursCommandService,
    R: ReplyService,
{
    pub fn new(commands: C, replies: R, prefix: &str) -> Self {
        Self { router: CommandRouter::new(commands, prefix), replies }
    }
}

#[async_trait]
impl<C, R> EventHandler for MessageHandler<C, R>
where
    C: HoursCommandService + 'static,
    R: ReplyService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Message
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.from_self {
            return Ok(HandlerResult::Ignored);
        }

        if let Some((verb, args)) = split_command(self.router.prefix(), &event.text) {
            let command = CommandEnvelope {
                verb,
                args,
                conversation_id: event.conversation_id.clone(),
                conversation_kind: event.kind,
                author_id: event.author_id.clone(),
                correlation_id: ctx.correlation_id.clone(),
            };
            let message = self.router.route(command).await?;
            return Ok(HandlerResult::Responded(message));
        }

        if !event.kind.is_private() {
            return Ok(HandlerResult::Ignored);
        }

        let message = self.replies.handle_reply(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}
