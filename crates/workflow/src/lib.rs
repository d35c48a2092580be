//! Broadcast-collect workflow for weekly hours.
//!
//! - `broadcast` - prompts every registered user in their private conversation
//! - `collector` - turns a private reply into a stored hours value
//! - `registration` - adds a user to the roster
//! - `runtime` - wires the three into the chat dispatcher

pub mod broadcast;
pub mod collector;
pub mod registration;
pub mod runtime;

pub use broadcast::{
    BroadcastCoordinator, Delivery, RoundError, RoundReport, UnitFailure, UnitStage,
};
pub use collector::{CollectError, CollectOutcome, ReplyCollector};
pub use registration::{RegistrationError, RegistrationHandler, RegistrationOutcome};
pub use runtime::{WorkflowRuntime, WorkflowSettings};
