//! Core domain for hourbot: the weekly hours value, roster and conversation
//! identities, the pending-reply tracker, configuration and error taxonomy.
//!
//! This crate has no I/O. Store and chat collaborators live in `hourbot-db`
//! and `hourbot-chat`; the broadcast-collect workflow that joins them lives in
//! `hourbot-workflow`.

pub mod config;
pub mod domain;
pub mod errors;
pub mod pending;

pub use domain::conversation::{ConversationId, ConversationKind, RoundId};
pub use domain::hours::{Hours, HoursPolicy, HoursRecord, HoursWrite, ParseHoursError};
pub use domain::user::{RegisteredUser, UserId, UserKey};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pending::{PendingReplies, PendingRound};
