//! Collaborator seams the router dispatches through.
//!
//! The LLM API, tool protocol, and HTTP transport live outside this crate;
//! each collaborator owns its own timeouts. The router only sees these
//! traits, and every call site maps failure to a textual fallback reply.

use crate::core::{Message, Result};
use async_trait::async_trait;

/// Text-generation collaborator (prompt in, text out, may fail).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a response for `prompt` under `system` instructions.
    ///
    /// `None` covers failures and empty responses; callers degrade to a
    /// fallback string.
    async fn generate(&self, prompt: &str, system: &str) -> Option<String>;
}

/// Tool-invocation collaborator.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run `query` against a fully formed tool URL.
    ///
    /// Failures come back as error text in the return value, never as an
    /// error past this boundary.
    async fn invoke(&self, query: &str, final_url: &str) -> String;
}

/// Outbound transport to a peer bridge or local terminal endpoint.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Deliver `message` to `url` and wait for the acknowledgment.
    async fn deliver(&self, url: &str, message: &Message) -> Result<()>;
}

/// Generator that always declines; used when no LLM is wired up.
pub struct NullGenerator;

#[async_trait]
impl TextGenerator for NullGenerator {
    async fn generate(&self, _prompt: &str, _system: &str) -> Option<String> {
        None
    }
}

/// Invoker that reports tools as unconfigured.
pub struct NullToolInvoker;

#[async_trait]
impl ToolInvoker for NullToolInvoker {
    async fn invoke(&self, _query: &str, _final_url: &str) -> String {
        "Error processing tool query: no tool invoker configured".to_string()
    }
}

/// Transport that fails every delivery; used when no network is wired up.
pub struct NullTransport;

#[async_trait]
impl PeerTransport for NullTransport {
    async fn deliver(&self, url: &str, _message: &Message) -> Result<()> {
        Err(crate::core::Error::DeliveryFailed {
            url: url.to_string(),
            reason: "no transport configured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_generator_declines() {
        assert!(NullGenerator.generate("hi", "system").await.is_none());
    }

    #[tokio::test]
    async fn test_null_invoker_embeds_error_text() {
        let result = NullToolInvoker.invoke("q", "http://tool").await;
        assert!(result.starts_with("Error processing tool query"));
    }

    #[tokio::test]
    async fn test_null_transport_fails() {
        let msg = Message::user("x");
        assert!(NullTransport.deliver("http://peer/a2a", &msg).await.is_err());
    }
}
