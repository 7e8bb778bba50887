//! Chat bot interface for merchhours
//!
//! This crate is the presentation glue around the conversation service in `merchhours-core`:
//! - **Polling** (`polling`) - transport loop with reconnection logic
//! - **Commands** (`commands`) - `/start`, `/help`, menu buttons and callback payloads
//! - **Events** (`events`) - inbound messages and button callbacks routed to the conversation
//! - **Templates** (`templates`) - message texts with inline and reply keyboards
//!
//! # Architecture
//!
//! ```text
//! Chat updates → EventDispatcher → Handlers → ConversationService → Lookup + Calculation
//!                    ↓
//!              MessageTemplate ← Reply
//! ```
//!
//! # Key Types
//!
//! - `PollingRunner` - update loop with reconnection logic
//! - `EventDispatcher` - routes updates to the appropriate handler
//! - `MessageBuilder` - constructs messages with keyboards

pub mod commands;
pub mod events;
pub mod polling;
pub mod templates;
