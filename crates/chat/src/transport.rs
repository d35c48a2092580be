use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use hourbot_core::domain::conversation::ConversationId;
use hourbot_core::domain::user::UserId;
use hourbot_core::errors::ApplicationError;

use crate::events::ChatEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("could not open private conversation: {0}")]
    OpenConversation(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

impl From<TransportError> for ApplicationError {
    fn from(error: TransportError) -> Self {
        ApplicationError::Integration(error.to_string())
    }
}

/// Outbound half of the chat platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the private conversation with `user_id`, creating it when the
    /// platform has none yet.
    async fn open_private_conversation(
        &self,
        user_id: &UserId,
    ) -> Result<ConversationId, TransportError>;

    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), TransportError>;
}

/// Inbound half of the chat platform. `next_envelope` returns `None` when the
/// stream is closed.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Client that accepts every call and only logs it. Paired with
/// [`NoopGatewayTransport`] when no platform adapter is configured.
#[derive(Default)]
pub struct NoopChatClient;

#[async_trait]
impl ChatClient for NoopChatClient {
    async fn open_private_conversation(
        &self,
        user_id: &UserId,
    ) -> Result<ConversationId, TransportError> {
        Ok(ConversationId::new(format!("noop-{user_id}")))
    }

    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), TransportError> {
        tracing::debug!(
            event_name = "egress.chat.noop_send",
            conversation_id = %conversation_id,
            length = text.len(),
            "message dropped by noop chat client"
        );
        Ok(())
    }
}

/// Gateway fed from a fixed list of envelopes, closing once drained. Reads
/// and disconnects require a prior `connect`.
#[derive(Default)]
pub struct ScriptedGatewayTransport {
    envelopes: Mutex<VecDeque<ChatEnvelope>>,
    connected: AtomicBool,
}

impl ScriptedGatewayTransport {
    pub fn new(envelopes: Vec<ChatEnvelope>) -> Self {
        Self { envelopes: Mutex::new(envelopes.into()), connected: AtomicBool::new(false) }
    }

    pub fn remaining(&self) -> usize {
        self.envelopes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl GatewayTransport for ScriptedGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Receive("scripted gateway is not connected".to_owned()));
        }
        Ok(self.envelopes.lock().unwrap_or_else(PoisonError::into_inner).pop_front())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Disconnect("scripted gateway is not connected".to_owned()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub conversation_id: ConversationId,
    pub text: String,
}

#[derive(Default)]
struct RecordingState {
    sent: Vec<SentMessage>,
    opened: Vec<UserId>,
    failing_users: HashSet<UserId>,
    failing_conversations: HashSet<ConversationId>,
}

/// In-process `ChatClient` that records every message. Private conversations
/// are named `dm-<user id>`. Failures can be injected per user or per
/// conversation.
#[derive(Default)]
pub struct RecordingChatClient {
    state: Mutex<RecordingState>,
}

impl RecordingChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn private_conversation_for(user_id: &UserId) -> ConversationId {
        ConversationId::new(format!("dm-{user_id}"))
    }

    pub fn fail_open_for(&self, user_id: &UserId) {
        self.lock().failing_users.insert(user_id.clone());
    }

    pub fn fail_sends_to(&self, conversation_id: &ConversationId) {
        self.lock().failing_conversations.insert(conversation_id.clone());
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    pub fn sent_to(&self, conversation_id: &ConversationId) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|message| &message.conversation_id == conversation_id)
            .map(|message| message.text.clone())
            .collect()
    }

    pub fn opened(&self) -> Vec<UserId> {
        self.lock().opened.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatClient for RecordingChatClient {
    async fn open_private_conversation(
        &self,
        user_id: &UserId,
    ) -> Result<ConversationId, TransportError> {
        let mut state = self.lock();
        if state.failing_users.contains(user_id) {
            return Err(TransportError::OpenConversation(format!("user {user_id} unreachable")));
        }
        state.opened.push(user_id.clone());
        Ok(Self::private_conversation_for(user_id))
    }

    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.failing_conversations.contains(conversation_id) {
            return Err(TransportError::Send(format!("conversation {conversation_id} rejected")));
        }
        state.sent.push(SentMessage {
            conversation_id: conversation_id.clone(),
            text: text.to_owned(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hourbot_core::domain::conversation::ConversationId;
    use hourbot_core::domain::user::UserId;

    use super::{
        ChatClient, GatewayTransport, NoopChatClient, RecordingChatClient, ScriptedGatewayTransport,
        TransportError,
    };

    #[tokio::test]
    async fn recording_client_names_private_conversations_after_the_user() {
        let client = RecordingChatClient::new();

        let conversation =
            client.open_private_conversation(&UserId::new("U1")).await.expect("open");
        client.send_message(&conversation, "hello").await.expect("send");

        assert_eq!(conversation, ConversationId::new("dm-U1"));
        assert_eq!(client.sent_to(&conversation), vec!["hello"]);
        assert_eq!(client.opened(), vec![UserId::new("U1")]);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_transport_errors() {
        let client = RecordingChatClient::new();
        client.fail_open_for(&UserId::new("U2"));
        client.fail_sends_to(&ConversationId::new("dm-U3"));

        let open = client.open_private_conversation(&UserId::new("U2")).await;
        let send = client.send_message(&ConversationId::new("dm-U3"), "hi").await;

        assert!(matches!(open, Err(TransportError::OpenConversation(_))));
        assert!(matches!(send, Err(TransportError::Send(_))));
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn noop_client_accepts_everything() {
        let client = NoopChatClient;

        let conversation =
            client.open_private_conversation(&UserId::new("U9")).await.expect("open");

        assert_eq!(conversation, ConversationId::new("noop-U9"));
        assert!(client.send_message(&conversation, "ignored").await.is_ok());
    }

    #[tokio::test]
    async fn scripted_gateway_requires_a_live_connection() {
        let transport = ScriptedGatewayTransport::new(Vec::new());

        assert!(matches!(transport.next_envelope().await, Err(TransportError::Receive(_))));
        assert!(matches!(transport.disconnect().await, Err(TransportError::Disconnect(_))));

        transport.connect().await.expect("connect");
        assert_eq!(transport.next_envelope().await, Ok(None));
        transport.disconnect().await.expect("disconnect");
        assert!(matches!(transport.disconnect().await, Err(TransportError::Disconnect(_))));
    }

    #[test]
    fn transport_errors_become_integration_failures() {
        let error = hourbot_core::errors::ApplicationError::from(TransportError::Send(
            "rate limited".to_owned(),
        ));

        assert_eq!(error.error_class(), "transport_failure");
        assert!(!error.is_recoverable());
    }
}
