//! Bridge configuration.
//!
//! Owned by the bridge instance and injected at construction; there are no
//! process-wide settings.

use std::path::PathBuf;

/// Configuration for a bridge instance.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// This bridge's agent identifier
    pub agent_id: String,
    /// Forward inbound peer messages to UI subscribers instead of the terminal
    pub ui_mode: bool,
    /// Local terminal endpoint for non-UI forwarding
    pub terminal_url: String,
    /// Directory where conversation logs are written
    pub log_dir: PathBuf,
    /// Whether the active improver is applied to outgoing directed sends
    pub improve_messages: bool,
    /// Credential for providers that require one when forming tool URLs
    pub smithery_api_key: Option<String>,
    /// Publicly reachable URL of this bridge, used for registration
    pub public_url: Option<String>,
    /// URL of the UI client API, used for registration
    pub api_url: Option<String>,
    /// Surface directed-send delivery failures to the sender instead of
    /// echoing the outgoing text as if delivered
    pub surface_send_failures: bool,
}

impl BridgeConfig {
    /// Create a config for `agent_id` with defaults for everything else.
    pub fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            ui_mode: true,
            terminal_url: "http://localhost:6010/a2a".to_string(),
            log_dir: PathBuf::from("conversation_logs"),
            improve_messages: true,
            smithery_api_key: None,
            public_url: None,
            api_url: None,
            surface_send_failures: false,
        }
    }

    /// Build a config from environment variables.
    ///
    /// Reads `AGENT_ID`, `UI_MODE`, `TERMINAL_PORT`, `LOG_DIR`,
    /// `IMPROVE_MESSAGES`, `SMITHERY_API_KEY`, `PUBLIC_URL`, and `API_URL`.
    pub fn from_env() -> Self {
        let agent_id = std::env::var("AGENT_ID").unwrap_or_else(|_| "default".to_string());
        let terminal_port = std::env::var("TERMINAL_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(6010);

        let mut config = Self::new(&agent_id);
        config.ui_mode = truthy(&std::env::var("UI_MODE").unwrap_or_else(|_| "true".to_string()));
        config.terminal_url = format!("http://localhost:{}/a2a", terminal_port);
        config.improve_messages =
            truthy(&std::env::var("IMPROVE_MESSAGES").unwrap_or_else(|_| "true".to_string()));
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        config.smithery_api_key = std::env::var("SMITHERY_API_KEY").ok().filter(|k| !k.is_empty());
        config.public_url = std::env::var("PUBLIC_URL").ok().filter(|u| !u.is_empty());
        config.api_url = std::env::var("API_URL").ok().filter(|u| !u.is_empty());
        config
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Parse the truthy forms accepted for boolean settings.
fn truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "y")
}
