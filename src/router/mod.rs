//! Command classification and dispatch.

pub mod bridge;
pub mod collaborators;
pub mod command;
pub mod forwarder;

pub use bridge::{AgentBridge, AgentBridgeBuilder};
pub use collaborators::{PeerTransport, TextGenerator, ToolInvoker};
pub use command::{Command, SlashCommand};
pub use forwarder::TerminalForwarder;
