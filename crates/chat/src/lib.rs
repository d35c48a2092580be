//! Chat surface for hourbot
//!
//! This crate is everything the bot knows about the chat platform:
//! - **Transport** (`transport`) - outbound `ChatClient` and inbound `GatewayTransport` traits
//! - **Events** (`events`) - inbound envelopes, the dispatcher and its handlers
//! - **Commands** (`commands`) - `!gobot add`, `!gobot dm`, `!gobot help`
//! - **Gateway** (`gateway`) - the single sequential event loop
//! - **Messages** (`messages`) - every text the bot sends
//!
//! # Architecture
//!
//! ```text
//! Gateway events → EventDispatcher → MessageHandler ─┬→ CommandRouter → HoursCommandService
//!                                                    └→ ReplyService (private replies)
//!                        ↓
//!              ChatClient::send_message ← HandlerResult::Responded
//! ```
//!
//! The workflow crate implements `HoursCommandService` and `ReplyService`; the
//! `Noop*` implementations here keep the dispatcher usable on its own.

pub mod commands;
pub mod events;
pub mod gateway;
pub mod messages;
pub mod transport;
