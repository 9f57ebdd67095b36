//! # interbridge - Inter-Agent Message Bridge
//!
//! A bridge node for agent-to-agent messaging:
//! - **Envelope**: plain-text wire format for peer forwarding
//! - **Logbook**: append-only per-conversation records
//! - **Improve**: pluggable message-improvement pipeline
//! - **Directory**: peer lookup/registration client interface
//! - **Relay**: UI fan-out queues and latest-message mailbox
//! - **Router**: command classification and dispatch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use interbridge::config::BridgeConfig;
//! use interbridge::core::Message;
//! use interbridge::router::AgentBridge;
//!
//! #[tokio::main]
//! async fn main() {
//!     let bridge = AgentBridge::builder(BridgeConfig::new("alice")).build();
//!     let reply = bridge.handle_message(Message::user("/help")).await;
//!     println!("{}", reply.text().unwrap_or_default());
//! }
//! ```

pub mod config;
pub mod core;
pub mod directory;
pub mod envelope;
pub mod improve;
pub mod logbook;
pub mod relay;
pub mod router;

pub use crate::core::error::{Error, Result};
