//! Peer directory client interface.

pub mod client;

pub use client::{normalize_forward_url, Directory, InMemoryDirectory, ToolResolution};
