use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use hourbot_chat::events::MessageEvent;
use hourbot_chat::messages;
use hourbot_chat::transport::ChatClient;
use hourbot_core::domain::conversation::ConversationId;
use hourbot_core::domain::hours::{Hours, HoursPolicy, HoursWrite, ParseHoursError};
use hourbot_core::errors::{ApplicationError, DomainError};
use hourbot_core::pending::PendingReplies;
use hourbot_db::repositories::{HoursRepository, RepositoryError, RosterRepository};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The conversation was not awaiting a reply.
    Ignored,
    Recorded { hours: Hours, write: HoursWrite },
    /// The author is not on the roster; the pending entry was dropped.
    Abandoned,
}

/// Every variant leaves the conversation awaiting a reply and the user has
/// already been told to send the value again.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    InvalidInput(#[from] ParseHoursError),
    #[error("hours value {hours} is outside the accepted range {min}..={max}")]
    OutOfRange { hours: Hours, min: Hours, max: Hours },
    #[error("could not record hours: {0}")]
    Store(#[from] RepositoryError),
}

impl From<CollectError> for ApplicationError {
    fn from(value: CollectError) -> Self {
        match value {
            CollectError::InvalidInput(error) => DomainError::from(error).into(),
            CollectError::OutOfRange { hours, min, max } => {
                DomainError::HoursOutOfRange { hours, min, max }.into()
            }
            CollectError::Store(error) => Self::Persistence(error.to_string()),
        }
    }
}

pub struct ReplyCollector {
    roster: Arc<dyn RosterRepository>,
    hours: Arc<dyn HoursRepository>,
    chat: Arc<dyn ChatClient>,
    pending: Arc<PendingReplies>,
    policy: HoursPolicy,
}

impl ReplyCollector {
    pub fn new(
        roster: Arc<dyn RosterRepository>,
        hours: Arc<dyn HoursRepository>,
        chat: Arc<dyn ChatClient>,
        pending: Arc<PendingReplies>,
        policy: HoursPolicy,
    ) -> Self {
        Self { roster, hours, chat, pending, policy }
    }

    pub async fn collect(&self, event: &MessageEvent) -> Result<CollectOutcome, CollectError> {
        let conversation = &event.conversation_id;
        let Some(round) = self.pending.peek(conversation) else {
            debug!(conversation_id = %conversation, "private message without pending round");
            return Ok(CollectOutcome::Ignored);
        };

        let hours = match Hours::parse(&event.text) {
            Ok(hours) => hours,
            Err(error) => {
                info!(
                    event_name = "workflow.reply.invalid",
                    round_id = %round.round_id,
                    conversation_id = %conversation,
                    error = %error,
                    "reply is not a number; asking again"
                );
                self.notify(conversation, &messages::invalid_hours(&event.text)).await;
                return Err(error.into());
            }
        };

        if !self.policy.accepts(hours) {
            info!(
                event_name = "workflow.reply.out_of_range",
                round_id = %round.round_id,
                conversation_id = %conversation,
                hours = %hours,
                "reply outside accepted range; asking again"
            );
            self.notify(conversation, &messages::hours_out_of_range(hours, &self.policy)).await;
            return Err(CollectError::OutOfRange {
                hours,
                min: self.policy.min,
                max: self.policy.max,
            });
        }

        if !self.pending.record(conversation, hours) {
            return Ok(CollectOutcome::Ignored);
        }

        let user = match self.roster.find_by_external_id(&event.author_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.pending.complete(conversation);
                warn!(
                    event_name = "workflow.reply.unregistered_author",
                    round_id = %round.round_id,
                    conversation_id = %conversation,
                    user_id = %event.author_id,
                    "reply author is not on the roster; dropping pending round"
                );
                return Ok(CollectOutcome::Abandoned);
            }
            Err(error) => return Err(self.store_failed(conversation, error).await),
        };

        let record = match self.hours.upsert(user.key, hours).await {
            Ok(record) => record,
            Err(error) => return Err(self.store_failed(conversation, error).await),
        };
        let write = HoursWrite::from_revision(record.revision);

        self.notify(conversation, &messages::confirmation(record.hours)).await;
        self.pending.complete(conversation);

        info!(
            event_name = "workflow.reply.recorded",
            round_id = %round.round_id,
            conversation_id = %conversation,
            user_key = %user.key,
            hours = %record.hours,
            write = ?write,
            "weekly hours recorded"
        );
        Ok(CollectOutcome::Recorded { hours: record.hours, write })
    }

    async fn store_failed(
        &self,
        conversation: &ConversationId,
        error: RepositoryError,
    ) -> CollectError {
        warn!(
            event_name = "workflow.reply.store_failed",
            conversation_id = %conversation,
            error = %error,
            "could not persist reply; conversation stays pending"
        );
        self.notify(conversation, messages::STORE_RETRY_TEXT).await;
        CollectError::Store(error)
    }

    async fn notify(&self, conversation: &ConversationId, text: &str) {
        if let Err(error) = self.chat.send_message(conversation, text).await {
            warn!(
                event_name = "egress.chat.send_failed",
                conversation_id = %conversation,
                error = %error,
                "failed to send collector message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use hourbot_chat::events::MessageEvent;
    use hourbot_chat::messages::{self, STORE_RETRY_TEXT};
    use hourbot_chat::transport::RecordingChatClient;
    use hourbot_core::domain::conversation::{ConversationId, ConversationKind, RoundId};
    use hourbot_core::domain::hours::{Hours, HoursPolicy, HoursRecord, HoursWrite};
    use hourbot_core::domain::user::{UserId, UserKey};
    use hourbot_core::errors::ApplicationError;
    use hourbot_core::pending::PendingReplies;
    use hourbot_db::repositories::{
        HoursRepository, InMemoryHoursRepository, InMemoryRosterRepository, RepositoryError,
    };

    use super::{CollectError, CollectOutcome, ReplyCollector};

    struct Fixture {
        chat: Arc<RecordingChatClient>,
        pending: Arc<PendingReplies>,
        hours: Arc<InMemoryHoursRepository>,
        collector: ReplyCollector,
    }

    async fn fixture(registered: &[&str]) -> Fixture {
        let chat = Arc::new(RecordingChatClient::new());
        let pending = Arc::new(PendingReplies::new());
        let hours = Arc::new(InMemoryHoursRepository::default());
        let roster = Arc::new(InMemoryRosterRepository::with_users(registered).await);
        let collector = ReplyCollector::new(
            roster,
            hours.clone(),
            chat.clone(),
            pending.clone(),
            HoursPolicy::default(),
        );
        Fixture { chat, pending, hours, collector }
    }

    fn dm(id: &str) -> ConversationId {
        RecordingChatClient::private_conversation_for(&UserId::new(id))
    }

    fn reply(author: &str, text: &str) -> MessageEvent {
        MessageEvent {
            conversation_id: dm(author),
            kind: ConversationKind::Private,
            author_id: UserId::new(author),
            from_self: false,
            text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn idle_conversation_is_ignored_silently() {
        let fx = fixture(&["UA"]).await;

        let outcome = fx.collector.collect(&reply("UA", "8")).await.expect("collect");

        assert_eq!(outcome, CollectOutcome::Ignored);
        assert!(fx.chat.sent().is_empty());
        assert!(fx.hours.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn valid_reply_is_recorded_confirmed_and_completed() {
        let fx = fixture(&["UA"]).await;
        fx.pending.begin(&dm("UA"), None, RoundId::new());

        let outcome = fx.collector.collect(&reply("UA", "7.25")).await.expect("collect");

        let expected = Hours::parse("7.3").expect("hours");
        assert_eq!(
            outcome,
            CollectOutcome::Recorded { hours: expected, write: HoursWrite::Inserted }
        );
        assert_eq!(fx.chat.sent_to(&dm("UA")), vec!["Recording 7.3 hours for the week"]);
        assert!(fx.pending.peek(&dm("UA")).is_none());
        let stored = fx.hours.find_by_user(UserKey(1)).await.expect("find").expect("record");
        assert_eq!(stored.hours, expected);
    }

    #[tokio::test]
    async fn later_round_overwrites_previous_value() {
        let fx = fixture(&["UA"]).await;

        fx.pending.begin(&dm("UA"), None, RoundId::new());
        fx.collector.collect(&reply("UA", "10.0")).await.expect("first");
        fx.pending.begin(&dm("UA"), None, RoundId::new());
        let outcome = fx.collector.collect(&reply("UA", "12.5")).await.expect("second");

        assert_eq!(
            outcome,
            CollectOutcome::Recorded {
                hours: Hours::parse("12.5").expect("hours"),
                write: HoursWrite::Updated,
            }
        );
        assert_eq!(fx.hours.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn unparseable_reply_reprompts_and_stays_awaiting() {
        let fx = fixture(&["UA"]).await;
        fx.pending.begin(&dm("UA"), None, RoundId::new());

        let error = fx.collector.collect(&reply("UA", "not-a-number")).await.expect_err("invalid");

        assert!(matches!(error, CollectError::InvalidInput(_)));
        assert!(ApplicationError::from(error).is_recoverable());
        assert!(fx.pending.peek(&dm("UA")).is_some());
        assert_eq!(fx.chat.sent_to(&dm("UA")), vec![messages::invalid_hours("not-a-number")]);
        assert!(fx.hours.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn negative_and_oversized_values_are_rejected() {
        let fx = fixture(&["UA"]).await;
        fx.pending.begin(&dm("UA"), None, RoundId::new());

        let negative = fx.collector.collect(&reply("UA", "-3")).await;
        let oversized = fx.collector.collect(&reply("UA", "169")).await;
        let zero = fx.collector.collect(&reply("UA", "0")).await.expect("zero is allowed");

        assert!(matches!(negative, Err(CollectError::OutOfRange { .. })));
        assert!(matches!(oversized, Err(CollectError::OutOfRange { .. })));
        assert!(matches!(zero, CollectOutcome::Recorded { .. }));
        assert_eq!(fx.chat.sent_to(&dm("UA")).len(), 3);
    }

    #[tokio::test]
    async fn unregistered_author_abandons_the_round() {
        let fx = fixture(&[]).await;
        fx.pending.begin(&dm("UX"), None, RoundId::new());

        let outcome = fx.collector.collect(&reply("UX", "5")).await.expect("collect");

        assert_eq!(outcome, CollectOutcome::Abandoned);
        assert!(fx.pending.is_empty());
        assert!(fx.chat.sent().is_empty());
        assert!(fx.hours.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn failed_confirmation_still_completes_the_round() {
        let fx = fixture(&["UA"]).await;
        fx.pending.begin(&dm("UA"), None, RoundId::new());
        fx.chat.fail_sends_to(&dm("UA"));

        let outcome = fx.collector.collect(&reply("UA", "6")).await.expect("collect");

        assert!(matches!(outcome, CollectOutcome::Recorded { .. }));
        assert!(fx.pending.is_empty());
    }

    #[tokio::test]
    async fn store_failure_keeps_conversation_awaiting() {
        struct FailingHours;

        #[async_trait]
        impl HoursRepository for FailingHours {
            async fn find_by_user(
                &self,
                _user_key: UserKey,
            ) -> Result<Option<HoursRecord>, RepositoryError> {
                Ok(None)
            }

            async fn upsert(
                &self,
                _user_key: UserKey,
                _hours: Hours,
            ) -> Result<HoursRecord, RepositoryError> {
                Err(RepositoryError::Decode("database is locked".to_owned()))
            }

            async fn list_all(&self) -> Result<Vec<HoursRecord>, RepositoryError> {
                Ok(Vec::new())
            }
        }

        let chat = Arc::new(RecordingChatClient::new());
        let pending = Arc::new(PendingReplies::new());
        let collector = ReplyCollector::new(
            Arc::new(InMemoryRosterRepository::with_users(&["UA"]).await),
            Arc::new(FailingHours),
            chat.clone(),
            pending.clone(),
            HoursPolicy::default(),
        );
        pending.begin(&dm("UA"), None, RoundId::new());

        let error = collector.collect(&reply("UA", "9")).await.expect_err("store failure");

        assert!(matches!(error, CollectError::Store(_)));
        assert_eq!(ApplicationError::from(error).error_class(), "store_failure");
        assert_eq!(chat.sent_to(&dm("UA")), vec![STORE_RETRY_TEXT]);
        let round = pending.peek(&dm("UA")).expect("still awaiting");
        assert_eq!(round.received, Some(Hours::parse("9").expect("hours")));
    }
}
