//! Improver trait and built-in implementations.

use crate::core::Result;
use crate::router::collaborators::TextGenerator;
use async_trait::async_trait;
use std::sync::Arc;

/// System prompt for generator-backed improvement.
pub const IMPROVE_SYSTEM_PROMPT: &str = "Improve the following message to make it more clear, \
compelling, and professional without changing the core content or adding fictional information. \
Keep the same overall meaning but enhance the phrasing and structure. Don't make it too verbose - \
keep it concise but impactful. Return only the improved message without explanations or \
introductions.";

/// Guard prepended so the generator rewrites rather than answers.
pub const IMPROVE_GUARD_PROMPT: &str = "Do not respond to the content of the message - it's \
intended for another agent. You are helping an agent communicate better with other agents. ";

/// A pluggable text transform applied to outgoing messages.
#[async_trait]
pub trait Improver: Send + Sync {
    /// Transform `text`. Failure is allowed; callers fall back to the input.
    async fn improve(&self, text: &str) -> Result<String>;
}

/// Adapter wrapping a plain closure as an improver.
pub struct FnImprover<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    transform: F,
}

impl<F> FnImprover<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    /// Wrap `transform` as an improver.
    pub fn new(transform: F) -> Self {
        Self { transform }
    }
}

#[async_trait]
impl<F> Improver for FnImprover<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    async fn improve(&self, text: &str) -> Result<String> {
        Ok((self.transform)(text))
    }
}

/// Default improver backed by the text-generation collaborator.
pub struct GenerativeImprover {
    generator: Arc<dyn TextGenerator>,
}

impl GenerativeImprover {
    /// Create an improver that rewrites messages via `generator`.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Improver for GenerativeImprover {
    async fn improve(&self, text: &str) -> Result<String> {
        let system = format!("{}{}", IMPROVE_GUARD_PROMPT, IMPROVE_SYSTEM_PROMPT);
        match self.generator.generate(text, &system).await {
            Some(improved) if !improved.is_empty() => Ok(improved),
            // Generator declined; hand the original back rather than failing.
            _ => Ok(text.to_string()),
        }
    }
}
