//! UI fan-out and latest-message mailbox.

pub mod fanout;
pub mod mailbox;

pub use fanout::{UiMessage, UiRelay, UiSubscription};
pub use mailbox::{LatestMailbox, LatestMessage};
