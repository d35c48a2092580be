//! Pending-reply tracking for private conversations.
//!
//! A conversation is either Idle (no entry) or Awaiting (one entry). Every
//! read-modify-write happens under a single lock inside this type, so callers
//! can only observe whole entries and can never insert a second entry for a
//! conversation that is already awaiting a reply.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationId, RoundId};
use crate::domain::hours::Hours;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRound {
    pub conversation_id: ConversationId,
    /// Group conversation that triggered the round, `None` when the round was
    /// started from a private conversation.
    pub origin: Option<ConversationId>,
    pub round_id: RoundId,
    /// Value parsed from the latest reply, set before it is persisted.
    pub received: Option<Hours>,
    pub started_at: DateTime<Utc>,
}

impl PendingRound {
    pub fn has_received_value(&self) -> bool {
        self.received.is_some()
    }
}

#[derive(Debug, Default)]
pub struct PendingReplies {
    rounds: Mutex<HashMap<ConversationId, PendingRound>>,
    ttl: Option<Duration>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries older than `ttl` are treated as absent. `None` keeps entries
    /// until they are completed.
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self { rounds: Mutex::new(HashMap::new()), ttl }
    }

    /// Marks `conversation` as awaiting a reply. Returns `false` and leaves the
    /// existing entry untouched when the conversation is already awaiting.
    pub fn begin(
        &self,
        conversation: &ConversationId,
        origin: Option<ConversationId>,
        round_id: RoundId,
    ) -> bool {
        self.begin_at(conversation, origin, round_id, Utc::now())
    }

    pub fn begin_at(
        &self,
        conversation: &ConversationId,
        origin: Option<ConversationId>,
        round_id: RoundId,
        now: DateTime<Utc>,
    ) -> bool {
        let mut rounds = self.lock();
        if let Some(existing) = rounds.get(conversation) {
            if !self.is_expired(existing, now) {
                return false;
            }
        }

        rounds.insert(
            conversation.clone(),
            PendingRound {
                conversation_id: conversation.clone(),
                origin,
                round_id,
                received: None,
                started_at: now,
            },
        );
        true
    }

    pub fn peek(&self, conversation: &ConversationId) -> Option<PendingRound> {
        self.peek_at(conversation, Utc::now())
    }

    pub fn peek_at(
        &self,
        conversation: &ConversationId,
        now: DateTime<Utc>,
    ) -> Option<PendingRound> {
        let mut rounds = self.lock();
        let expired = self.is_expired(rounds.get(conversation)?, now);
        if expired {
            rounds.remove(conversation);
            return None;
        }
        rounds.get(conversation).cloned()
    }

    /// Stores the parsed value on an awaiting conversation. Returns `false`
    /// when the conversation is idle.
    pub fn record(&self, conversation: &ConversationId, hours: Hours) -> bool {
        self.record_at(conversation, hours, Utc::now())
    }

    pub fn record_at(
        &self,
        conversation: &ConversationId,
        hours: Hours,
        now: DateTime<Utc>,
    ) -> bool {
        let mut rounds = self.lock();
        let Some(round) = rounds.get_mut(conversation) else {
            return false;
        };
        if self.is_expired(round, now) {
            rounds.remove(conversation);
            return false;
        }
        round.received = Some(hours);
        true
    }

    /// Returns the conversation to Idle. Completing an idle conversation is a
    /// no-op.
    pub fn complete(&self, conversation: &ConversationId) -> Option<PendingRound> {
        self.lock().remove(conversation)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn is_expired(&self, round: &PendingRound, now: DateTime<Utc>) -> bool {
        self.ttl.is_some_and(|ttl| now - round.started_at > ttl)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, PendingRound>> {
        self.rounds.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::{Duration, Utc};

    use super::PendingReplies;
    use crate::domain::conversation::{ConversationId, RoundId};
    use crate::domain::hours::Hours;

    fn dm(id: &str) -> ConversationId {
        ConversationId::new(id)
    }

    #[test]
    fn begin_is_exclusive_per_conversation() {
        let tracker = PendingReplies::new();
        let first_round = RoundId::new();

        assert!(tracker.begin(&dm("D1"), Some(dm("G1")), first_round));
        assert!(!tracker.begin(&dm("D1"), None, RoundId::new()));
        assert!(tracker.begin(&dm("D2"), Some(dm("G1")), first_round));

        let pending = tracker.peek(&dm("D1")).expect("D1 pending");
        assert_eq!(pending.round_id, first_round);
        assert_eq!(pending.origin, Some(dm("G1")));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn concurrent_begin_yields_exactly_one_winner() {
        for _ in 0..64 {
            let tracker = Arc::new(PendingReplies::new());
            let contenders = 8;
            let barrier = Arc::new(Barrier::new(contenders));

            let handles = (0..contenders)
                .map(|_| {
                    let tracker = Arc::clone(&tracker);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        tracker.begin(&dm("D-race"), None, RoundId::new())
                    })
                })
                .collect::<Vec<_>>();

            let winners = handles
                .into_iter()
                .map(|handle| handle.join().expect("thread"))
                .filter(|won| *won)
                .count();

            assert_eq!(winners, 1);
            assert_eq!(tracker.len(), 1);
        }
    }

    #[test]
    fn complete_returns_conversation_to_idle_and_tolerates_absent_keys() {
        let tracker = PendingReplies::new();
        assert!(tracker.complete(&dm("D-missing")).is_none());

        tracker.begin(&dm("D1"), None, RoundId::new());
        assert!(tracker.complete(&dm("D1")).is_some());
        assert!(tracker.peek(&dm("D1")).is_none());
        assert!(tracker.complete(&dm("D1")).is_none());
        assert!(tracker.is_empty());

        assert!(tracker.begin(&dm("D1"), None, RoundId::new()));
    }

    #[test]
    fn record_marks_received_value_only_while_awaiting() {
        let tracker = PendingReplies::new();
        let hours = Hours::parse("7.25").expect("hours");

        assert!(!tracker.record(&dm("D1"), hours));

        tracker.begin(&dm("D1"), None, RoundId::new());
        assert!(!tracker.peek(&dm("D1")).expect("pending").has_received_value());
        assert!(tracker.record(&dm("D1"), hours));
        assert_eq!(tracker.peek(&dm("D1")).expect("pending").received, Some(hours));
    }

    #[test]
    fn concurrent_complete_and_begin_never_duplicate_entries() {
        let tracker = Arc::new(PendingReplies::new());
        tracker.begin(&dm("D1"), None, RoundId::new());

        let handles = (0..16)
            .map(|index| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    if index % 2 == 0 {
                        tracker.complete(&dm("D1"));
                    } else {
                        tracker.begin(&dm("D1"), None, RoundId::new());
                    }
                    tracker.peek(&dm("D1")).map(|round| round.conversation_id)
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            if let Some(conversation) = handle.join().expect("thread") {
                assert_eq!(conversation, dm("D1"));
            }
        }
        assert!(tracker.len() <= 1);
    }

    #[test]
    fn entries_never_expire_without_ttl() {
        let tracker = PendingReplies::new();
        let started = Utc::now() - Duration::days(30);
        tracker.begin_at(&dm("D1"), None, RoundId::new(), started);

        assert!(tracker.peek_at(&dm("D1"), Utc::now()).is_some());
        assert!(!tracker.begin_at(&dm("D1"), None, RoundId::new(), Utc::now()));
    }

    #[test]
    fn expired_entries_are_treated_as_idle() {
        let tracker = PendingReplies::with_ttl(Some(Duration::hours(1)));
        let started = Utc::now();
        let first_round = RoundId::new();
        tracker.begin_at(&dm("D1"), None, first_round, started);

        let within = started + Duration::minutes(30);
        assert!(tracker.peek_at(&dm("D1"), within).is_some());
        assert!(!tracker.begin_at(&dm("D1"), None, RoundId::new(), within));

        let later = started + Duration::hours(2);
        let second_round = RoundId::new();
        assert!(tracker.begin_at(&dm("D1"), None, second_round, later));
        assert_eq!(tracker.peek_at(&dm("D1"), later).expect("pending").round_id, second_round);

        let much_later = later + Duration::hours(2);
        assert!(tracker.peek_at(&dm("D1"), much_later).is_none());
        assert!(tracker.is_empty());
    }
}
