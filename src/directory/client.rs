//! Directory client trait and URL normalization.
//!
//! The registry service itself is an external collaborator; this module only
//! defines the calls the router makes against it. An unregistered or offline
//! agent is a routine outcome, so lookups return `Option` rather than error.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Routing suffix every inter-bridge delivery URL must carry exactly once.
pub const FORWARD_SUFFIX: &str = "/a2a";

/// Resolution of a `provider:tool` pair to an invokable endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolResolution {
    /// Base endpoint of the tool server
    pub endpoint: String,
    /// Provider-specific configuration blob
    pub config: serde_json::Value,
    /// Name of the registry provider that resolved the tool
    pub provider: String,
}

/// Lookup and registration calls against the external registry.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve an agent ID to its bridge URL.
    ///
    /// `None` covers both "not registered" and "registry unreachable".
    async fn lookup(&self, agent_id: &str) -> Option<String>;

    /// Register this bridge under `agent_id`.
    async fn register(&self, agent_id: &str, public_url: &str, api_url: &str) -> bool;

    /// Resolve a tool by registry provider and qualified name.
    async fn resolve_tool(&self, provider: &str, tool_name: &str) -> Option<ToolResolution>;
}

/// Ensure a bridge URL carries exactly one trailing forward suffix.
///
/// Idempotent: normalizing twice yields the same URL as once.
pub fn normalize_forward_url(url: &str) -> String {
    if url.ends_with(FORWARD_SUFFIX) {
        url.to_string()
    } else {
        format!("{}{}", url, FORWARD_SUFFIX)
    }
}

/// In-memory directory for tests and single-process setups.
#[derive(Default)]
pub struct InMemoryDirectory {
    agents: RwLock<HashMap<String, String>>,
    tools: RwLock<HashMap<(String, String), ToolResolution>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an agent entry.
    pub fn insert_agent(&self, agent_id: &str, url: &str) {
        self.agents
            .write()
            .expect("directory lock poisoned")
            .insert(agent_id.to_string(), url.to_string());
    }

    /// Pre-populate a tool entry.
    pub fn insert_tool(&self, provider: &str, tool_name: &str, resolution: ToolResolution) {
        self.tools
            .write()
            .expect("directory lock poisoned")
            .insert((provider.to_string(), tool_name.to_string()), resolution);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn lookup(&self, agent_id: &str) -> Option<String> {
        self.agents
            .read()
            .expect("directory lock poisoned")
            .get(agent_id)
            .cloned()
    }

    async fn register(&self, agent_id: &str, public_url: &str, _api_url: &str) -> bool {
        self.insert_agent(agent_id, public_url);
        true
    }

    async fn resolve_tool(&self, provider: &str, tool_name: &str) -> Option<ToolResolution> {
        self.tools
            .read()
            .expect("directory lock poisoned")
            .get(&(provider.to_string(), tool_name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_appends_suffix() {
        assert_eq!(normalize_forward_url("http://host:6000"), "http://host:6000/a2a");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_forward_url("http://host:6000");
        let twice = normalize_forward_url(&once);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let directory = InMemoryDirectory::new();
        directory.insert_agent("bob", "http://bob:6000");

        assert_eq!(directory.lookup("bob").await.as_deref(), Some("http://bob:6000"));
        assert!(directory.lookup("carol").await.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_register() {
        let directory = InMemoryDirectory::new();
        assert!(directory.register("alice", "http://alice:6000", "http://alice:5000").await);
        assert_eq!(
            directory.lookup("alice").await.as_deref(),
            Some("http://alice:6000")
        );
    }

    #[tokio::test]
    async fn test_in_memory_tool_resolution() {
        let directory = InMemoryDirectory::new();
        directory.insert_tool(
            "smithery",
            "@acme/search",
            ToolResolution {
                endpoint: "http://tools/acme".to_string(),
                config: serde_json::json!({"region": "us"}),
                provider: "smithery".to_string(),
            },
        );

        let resolved = directory.resolve_tool("smithery", "@acme/search").await.unwrap();
        assert_eq!(resolved.endpoint, "http://tools/acme");
        assert!(directory.resolve_tool("smithery", "@other/tool").await.is_none());
    }
}
