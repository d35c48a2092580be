use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::events::{ChatEnvelope, ChatEvent, EventContext, EventDispatcher, HandlerResult};
use crate::transport::{ChatClient, GatewayTransport};

/// Pulls envelopes off the gateway one at a time and dispatches them in
/// arrival order. A connect or read failure ends the loop; dispatch and
/// delivery failures are logged and the loop continues.
pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    client: Arc<dyn ChatClient>,
    dispatcher: EventDispatcher,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        client: Arc<dyn ChatClient>,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self { transport, client, dispatcher }
    }

    pub async fn start(&self) -> Result<()> {
        info!(event_name = "ingress.chat.connecting", "opening chat gateway connection");
        self.transport.connect().await.context("chat gateway connect failed")?;
        info!(event_name = "ingress.chat.connected", "chat gateway connected");

        loop {
            let envelope = match self.transport.next_envelope().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    info!(event_name = "ingress.chat.stream_closed", "chat gateway stream closed");
                    self.transport.disconnect().await.context("chat gateway disconnect failed")?;
                    return Ok(());
                }
                Err(error) => {
                    warn!(
                        event_name = "ingress.chat.receive_failed",
                        error = %error,
                        "chat gateway read failed; closing connection"
                    );
                    if let Err(disconnect_error) = self.transport.disconnect().await {
                        debug!(error = %disconnect_error, "disconnect after read failure failed");
                    }
                    return Err(error).context("chat gateway read failed");
                }
            };

            self.handle_envelope(&envelope).await;
        }
    }

    async fn handle_envelope(&self, envelope: &ChatEnvelope) {
        let conversation_id =
            envelope.event.conversation_id().map(|id| id.to_string()).unwrap_or_default();
        info!(
            event_name = "ingress.chat.envelope_received",
            envelope_id = %envelope.envelope_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %envelope.envelope_id,
            conversation_id = %conversation_id,
            "received chat envelope"
        );

        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        let result = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    event_name = "ingress.chat.dispatch_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    conversation_id = %conversation_id,
                    error = %error,
                    "event dispatch failed; continuing gateway loop"
                );
                return;
            }
        };

        let HandlerResult::Responded(text) = result else {
            debug!(
                envelope_id = %envelope.envelope_id,
                result = ?result,
                "event handled without a response"
            );
            return;
        };
        let ChatEvent::Message(event) = &envelope.event else {
            return;
        };

        if let Err(error) = self.client.send_message(&event.conversation_id, &text).await {
            warn!(
                event_name = "egress.chat.send_failed",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                conversation_id = %conversation_id,
                error = %error,
                "failed to deliver response"
            );
        } else {
            debug!(
                event_name = "egress.chat.response_sent",
                correlation_id = %envelope.envelope_id,
                conversation_id = %conversation_id,
                "delivered response"
            );
        }
    }
}
