//! The agent bridge: classification, dispatch, and reply construction.
//!
//! One inbound message per call; the handler is reentrant and stateless
//! except for the active-improver name, which is set rarely and read per
//! message. Every branch returns a well-formed reply; collaborator failures
//! degrade to textual fallbacks at the call site.

use crate::config::BridgeConfig;
use crate::core::types::meta;
use crate::core::Message;
use crate::directory::{normalize_forward_url, Directory, InMemoryDirectory, ToolResolution};
use crate::envelope::codec;
use crate::envelope::path::append_hop;
use crate::improve::{GenerativeImprover, Improver, ImproverRegistry};
use crate::logbook::ConversationLog;
use crate::relay::{LatestMailbox, LatestMessage, UiMessage, UiRelay};
use crate::router::collaborators::{
    NullGenerator, NullToolInvoker, NullTransport, PeerTransport, TextGenerator, ToolInvoker,
};
use crate::router::command::{Command, SlashCommand};
use crate::router::forwarder::TerminalForwarder;
use base64::Engine as _;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// System prompt for plain-text messages.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant helping a user communicate within \
an agent network. Assume the messages you get are part of a conversation with other agents. Help \
the user communicate effectively with other agents.";

/// System prompt for `/query` private assistance.
pub const QUERY_SYSTEM_PROMPT: &str = "You are an AI assistant. Provide a direct, helpful \
response to the user's question. Treat it as a private request for guidance and respond only to \
the user.";

/// Apology returned when `/query` generation fails or comes back empty.
const QUERY_FALLBACK: &str = "Sorry, I couldn't process your query. Please try again.";

/// Commands listed by `/help` and unknown-command replies.
const HELP_TEXT: &str = "Available commands:\n\
/help - Show this help message\n\
/quit - Exit the terminal\n\
/query [message] - Get a response from the agent privately\n\
@<agent_id> [message] - Send a message to a specific agent";

/// Name the built-in generator-backed improver registers under.
pub const DEFAULT_IMPROVER: &str = "default";

/// Registry provider whose tools need a credential embedded in the URL.
const CREDENTIALED_PROVIDER: &str = "smithery";

/// Builder for [`AgentBridge`].
pub struct AgentBridgeBuilder {
    config: BridgeConfig,
    directory: Arc<dyn Directory>,
    generator: Arc<dyn TextGenerator>,
    tools: Arc<dyn ToolInvoker>,
    transport: Arc<dyn PeerTransport>,
    relay: Arc<UiRelay>,
    mailbox: Arc<LatestMailbox>,
}

impl AgentBridgeBuilder {
    fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            directory: Arc::new(InMemoryDirectory::new()),
            generator: Arc::new(NullGenerator),
            tools: Arc::new(NullToolInvoker),
            transport: Arc::new(NullTransport),
            relay: Arc::new(UiRelay::new()),
            mailbox: Arc::new(LatestMailbox::in_memory()),
        }
    }

    /// Use `directory` for peer and tool lookups.
    pub fn directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = directory;
        self
    }

    /// Use `generator` for text generation and the default improver.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Use `tools` to run resolved tool queries.
    pub fn tool_invoker(mut self, tools: Arc<dyn ToolInvoker>) -> Self {
        self.tools = tools;
        self
    }

    /// Use `transport` for peer and terminal deliveries.
    pub fn transport(mut self, transport: Arc<dyn PeerTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Share an existing UI relay.
    pub fn relay(mut self, relay: Arc<UiRelay>) -> Self {
        self.relay = relay;
        self
    }

    /// Share an existing latest-message mailbox.
    pub fn mailbox(mut self, mailbox: Arc<LatestMailbox>) -> Self {
        self.mailbox = mailbox;
        self
    }

    /// Build the bridge. Must be called within a Tokio runtime (the terminal
    /// forwarder spawns its worker here).
    pub fn build(self) -> AgentBridge {
        let improvers = ImproverRegistry::new();
        improvers.register(
            DEFAULT_IMPROVER,
            Arc::new(GenerativeImprover::new(self.generator.clone())),
        );
        let log = ConversationLog::new(self.config.log_dir.clone());
        let forwarder = TerminalForwarder::spawn(self.transport.clone());

        AgentBridge {
            config: self.config,
            improvers,
            active_improver: RwLock::new(DEFAULT_IMPROVER.to_string()),
            log,
            relay: self.relay,
            mailbox: self.mailbox,
            directory: self.directory,
            generator: self.generator,
            tools: self.tools,
            transport: self.transport,
            forwarder,
        }
    }
}

/// A bridge node in the agent network.
pub struct AgentBridge {
    config: BridgeConfig,
    improvers: ImproverRegistry,
    active_improver: RwLock<String>,
    log: ConversationLog,
    relay: Arc<UiRelay>,
    mailbox: Arc<LatestMailbox>,
    directory: Arc<dyn Directory>,
    generator: Arc<dyn TextGenerator>,
    tools: Arc<dyn ToolInvoker>,
    transport: Arc<dyn PeerTransport>,
    forwarder: TerminalForwarder,
}

impl AgentBridge {
    /// Start building a bridge for `config`.
    pub fn builder(config: BridgeConfig) -> AgentBridgeBuilder {
        AgentBridgeBuilder::new(config)
    }

    /// This bridge's configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The UI relay shared with the serving transport.
    pub fn relay(&self) -> &Arc<UiRelay> {
        &self.relay
    }

    /// The latest-message mailbox shared with polling clients.
    pub fn mailbox(&self) -> &Arc<LatestMailbox> {
        &self.mailbox
    }

    /// The improver registry owned by this bridge.
    pub fn improvers(&self) -> &ImproverRegistry {
        &self.improvers
    }

    /// Name of the currently active improver.
    pub fn active_improver(&self) -> String {
        self.active_improver
            .read()
            .expect("active improver lock poisoned")
            .clone()
    }

    /// Activate a registered improver by name.
    ///
    /// Returns false and leaves the prior improver active if `name` is
    /// unregistered.
    pub fn set_message_improver(&self, name: &str) -> bool {
        if self.improvers.contains(name) {
            *self
                .active_improver
                .write()
                .expect("active improver lock poisoned") = name.to_string();
            info!(improver = name, "message improver set");
            true
        } else {
            warn!(
                improver = name,
                available = ?self.improvers.names(),
                "unknown improver"
            );
            false
        }
    }

    /// Register an improver and activate it in one step.
    pub fn set_custom_improver(&self, name: &str, improver: Arc<dyn Improver>) {
        self.improvers.register(name, improver);
        self.set_message_improver(name);
    }

    /// Run the active improver over `text`, failing open.
    ///
    /// An unregistered active name or a failing improver both return the
    /// original text: improvement never gates delivery.
    pub async fn apply_active(&self, text: &str) -> String {
        let name = self.active_improver();
        match self.improvers.get(&name) {
            Some(improver) => match improver.improve(text).await {
                Ok(improved) => improved,
                Err(e) => {
                    warn!(improver = %name, error = %e, "improver failed; using original text");
                    text.to_string()
                }
            },
            None => {
                warn!(improver = %name, "active improver not registered");
                text.to_string()
            }
        }
    }

    /// Register this bridge with the directory, when a public URL is set.
    pub async fn register_with_directory(&self) -> bool {
        let Some(public_url) = self.config.public_url.as_deref() else {
            warn!("no public URL configured; bridge will not be registered");
            return false;
        };
        let api_url = self.config.api_url.as_deref().unwrap_or("");
        let ok = self
            .directory
            .register(&self.config.agent_id, public_url, api_url)
            .await;
        if ok {
            info!(agent_id = %self.config.agent_id, public_url, "registered with directory");
        } else {
            warn!(agent_id = %self.config.agent_id, "directory registration failed");
        }
        ok
    }

    /// Handle one inbound message and produce the reply.
    ///
    /// Never fails: malformed input, unresolved targets, and collaborator
    /// failures all map to reply text.
    pub async fn handle_message(&self, msg: Message) -> Message {
        let conversation_id = msg
            .conversation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let agent_id = self.config.agent_id.clone();

        let Some(text) = msg.text().map(str::to_string) else {
            return Message::error_reply("Only text payloads supported.", &msg, &conversation_id);
        };

        let inbound_path = msg.meta_str(meta::PATH).unwrap_or("");
        let current_path = append_hop(inbound_path, &agent_id);
        debug!(agent_id = %agent_id, path = %current_path, "handling inbound message");

        match Command::classify(&text) {
            Command::PeerEnvelope(decoded) => {
                let (from, _to) = decoded.addressing().expect("classified with addressing");
                self.handle_peer_envelope(from, &decoded.body, &msg, &conversation_id)
            }
            command => {
                // A terminal that already processed this message on our
                // behalf only needs an acknowledgment; re-processing would
                // loop improvement and logging.
                if msg.meta_bool(meta::IS_FROM_PEER) {
                    return Message::agent_reply(
                        "Message from peer received",
                        &msg,
                        &conversation_id,
                    );
                }

                self.log.append(
                    &conversation_id,
                    &current_path,
                    &format!("Local user to Agent {}", agent_id),
                    &text,
                );

                match command {
                    Command::PeerEnvelope(_) => unreachable!("handled above"),
                    Command::DirectedSend { target, text } => {
                        self.handle_directed_send(&target, &text, &msg, &conversation_id, &current_path)
                            .await
                    }
                    Command::DirectedSendUsage => self.reply(
                        &format!(
                            "[AGENT {}] Invalid format. Use '@agent_id message' to send a message.",
                            agent_id
                        ),
                        &msg,
                        &conversation_id,
                    ),
                    Command::ToolQuery {
                        provider,
                        tool,
                        query,
                    } => {
                        self.handle_tool_query(&provider, &tool, &query, &msg, &conversation_id)
                            .await
                    }
                    Command::ToolQueryUsage => self.reply(
                        &format!(
                            "[AGENT {}] Invalid format. Use '#registry_provider:tool_name query' to send a query to a tool server.",
                            agent_id
                        ),
                        &msg,
                        &conversation_id,
                    ),
                    Command::Slash(slash) => {
                        self.handle_slash(slash, &msg, &conversation_id, &current_path)
                            .await
                    }
                    Command::Plain(text) => {
                        self.handle_plain(&text, &msg, &conversation_id, &current_path)
                            .await
                    }
                }
            }
        }
    }

    /// State 1: a peer's envelope addressed to this bridge.
    fn handle_peer_envelope(
        &self,
        from: &str,
        body: &str,
        msg: &Message,
        conversation_id: &str,
    ) -> Message {
        let formatted = format!("FROM {}: {}", from, body);

        if self.config.ui_mode {
            let reached = self
                .relay
                .broadcast(UiMessage::new(&formatted, from, conversation_id));
            self.mailbox
                .set(LatestMessage::new(&formatted, from, conversation_id));
            debug!(from, reached, "forwarded peer message to UI subscribers");
        } else {
            let forward = Message::user(&formatted)
                .with_conversation_id(conversation_id)
                .with_meta(meta::IS_FROM_PEER, true)
                .with_meta(meta::IS_USER_MESSAGE, true)
                .with_meta(meta::SOURCE_AGENT, from)
                .with_meta(meta::FORWARDED_BY_BRIDGE, true);
            self.forwarder.forward(&self.config.terminal_url, forward);
        }

        self.reply(
            &format!("Message received by Agent {}", self.config.agent_id),
            msg,
            conversation_id,
        )
    }

    /// State 3: `@agent text` directed send.
    async fn handle_directed_send(
        &self,
        target: &str,
        text: &str,
        msg: &Message,
        conversation_id: &str,
        current_path: &str,
    ) -> Message {
        let agent_id = &self.config.agent_id;

        let outgoing = if self.config.improve_messages {
            let improved = self.apply_active(text).await;
            self.log.append(
                conversation_id,
                current_path,
                &format!("Improver {}", agent_id),
                &improved,
            );
            improved
        } else {
            text.to_string()
        };

        let send_result = self
            .send_to_agent(target, &outgoing, conversation_id, current_path)
            .await;

        match send_result {
            Ok(()) => self.reply(
                &format!("[AGENT {}]: {}", agent_id, outgoing),
                msg,
                conversation_id,
            ),
            Err(reason) if self.config.surface_send_failures => self.reply(
                &format!("[AGENT {}] Could not deliver to {}: {}", agent_id, target, reason),
                msg,
                conversation_id,
            ),
            Err(reason) => {
                // Default policy: the sender sees the echoed message even
                // when delivery failed; the problem is only logged.
                warn!(peer = target, %reason, "directed send failed");
                self.reply(
                    &format!("[AGENT {}]: {}", agent_id, outgoing),
                    msg,
                    conversation_id,
                )
            }
        }
    }

    /// Resolve, wrap, and deliver a message to a peer bridge.
    async fn send_to_agent(
        &self,
        target: &str,
        text: &str,
        conversation_id: &str,
        current_path: &str,
    ) -> Result<(), String> {
        let agent_id = &self.config.agent_id;
        let url = self
            .directory
            .lookup(target)
            .await
            .ok_or_else(|| format!("Agent {} not found in registry", target))?;
        let bridge_url = normalize_forward_url(&url);

        let envelope = codec::encode(agent_id, target, text);
        let delivery = Message::user(&envelope)
            .with_conversation_id(conversation_id)
            .with_meta(meta::IS_EXTERNAL, true)
            .with_meta(meta::FROM_AGENT_ID, agent_id.as_str())
            .with_meta(meta::TO_AGENT_ID, target)
            .with_meta(meta::PATH, current_path)
            .with_meta(meta::SOURCE_AGENT, agent_id.as_str());

        self.transport
            .deliver(&bridge_url, &delivery)
            .await
            .map_err(|e| format!("Error sending message to {}: {}", target, e))
    }

    /// State 4: `#provider:tool query`.
    async fn handle_tool_query(
        &self,
        provider: &str,
        tool: &str,
        query: &str,
        msg: &Message,
        conversation_id: &str,
    ) -> Message {
        let agent_id = &self.config.agent_id;

        let Some(resolution) = self.directory.resolve_tool(provider, tool).await else {
            return self.reply(
                &format!(
                    "[AGENT {}] Tool '{}' not found in registry. Please check the tool name and try again.",
                    agent_id, tool
                ),
                msg,
                conversation_id,
            );
        };

        let final_url = match self.form_tool_url(&resolution) {
            Ok(url) => url,
            Err(crate::core::Error::MissingCredential(provider)) => {
                return self.reply(
                    &format!(
                        "[AGENT {}] Ensure the required API key for registry provider '{}' is configured",
                        agent_id, provider
                    ),
                    msg,
                    conversation_id,
                );
            }
            Err(e) => {
                return self.reply(
                    &format!("[AGENT {}] Error preparing tool call: {}", agent_id, e),
                    msg,
                    conversation_id,
                );
            }
        };

        debug!(provider, tool, "running tool query");
        let result = self.tools.invoke(query, &final_url).await;
        self.reply(&result, msg, conversation_id)
    }

    /// Form the callable tool URL, embedding credentials where the provider
    /// requires them.
    fn form_tool_url(&self, resolution: &ToolResolution) -> crate::core::Result<String> {
        if resolution.provider == CREDENTIALED_PROVIDER {
            let key = self
                .config
                .smithery_api_key
                .as_deref()
                .ok_or_else(|| crate::core::Error::MissingCredential(resolution.provider.clone()))?;
            let config_json = serde_json::to_string(&resolution.config)?;
            let config_b64 = base64::engine::general_purpose::STANDARD.encode(config_json);
            Ok(format!(
                "{}?api_key={}&config={}",
                resolution.endpoint, key, config_b64
            ))
        } else {
            Ok(resolution.endpoint.clone())
        }
    }

    /// State 5: slash commands.
    async fn handle_slash(
        &self,
        slash: SlashCommand,
        msg: &Message,
        conversation_id: &str,
        current_path: &str,
    ) -> Message {
        let agent_id = &self.config.agent_id;
        match slash {
            SlashCommand::Quit => self.reply(
                &format!("[AGENT {}] Exiting session...", agent_id),
                msg,
                conversation_id,
            ),
            SlashCommand::Help => self.reply(
                &format!("[AGENT {}] {}", agent_id, HELP_TEXT),
                msg,
                conversation_id,
            ),
            SlashCommand::Unknown(_) => self.reply(
                &format!("[AGENT {}] Unknown command. {}", agent_id, HELP_TEXT),
                msg,
                conversation_id,
            ),
            SlashCommand::QueryUsage => self.reply(
                &format!(
                    "[AGENT {}] Please provide a query after the /query command.",
                    agent_id
                ),
                msg,
                conversation_id,
            ),
            SlashCommand::Query(query) => {
                let response = self
                    .generate(&query, QUERY_SYSTEM_PROMPT, msg, conversation_id, current_path)
                    .await
                    .unwrap_or_else(|| QUERY_FALLBACK.to_string());
                self.reply(
                    &format!("[AGENT {}] {}", agent_id, response),
                    msg,
                    conversation_id,
                )
            }
        }
    }

    /// State 6: plain text, answered by the generator.
    async fn handle_plain(
        &self,
        text: &str,
        msg: &Message,
        conversation_id: &str,
        current_path: &str,
    ) -> Message {
        let agent_id = &self.config.agent_id;
        // Never lose the user's message: generation failure echoes the input.
        let response = self
            .generate(text, DEFAULT_SYSTEM_PROMPT, msg, conversation_id, current_path)
            .await
            .unwrap_or_else(|| text.to_string());
        self.reply(
            &format!("[AGENT {}] {}", agent_id, response),
            msg,
            conversation_id,
        )
    }

    /// Call the generator with any user-supplied additional context and log
    /// the response. `None` covers failure and empty output.
    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        msg: &Message,
        conversation_id: &str,
        current_path: &str,
    ) -> Option<String> {
        let context = msg.meta_str(meta::ADDITIONAL_CONTEXT).unwrap_or("");
        let full_prompt = if context.trim().is_empty() {
            prompt.to_string()
        } else {
            format!("ADDITIONAL CONTEXT FROM USER: {}\n\nMESSAGE: {}", context, prompt)
        };

        let response = self
            .generator
            .generate(&full_prompt, system)
            .await
            .filter(|r| !r.is_empty());
        match &response {
            Some(text) => self.log.append(
                conversation_id,
                current_path,
                &format!("Assistant {}", self.config.agent_id),
                text,
            ),
            None => debug!("generator declined; falling back"),
        }
        response
    }

    fn reply(&self, text: &str, msg: &Message, conversation_id: &str) -> Message {
        Message::agent_reply(text, msg, conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MessageContent, MessageRole};
    use crate::improve::FnImprover;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedGenerator(Option<String>);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str, _system: &str) -> Option<String> {
            self.0.clone()
        }
    }

    struct RecordingTransport {
        deliveries: Arc<Mutex<Vec<(String, Message)>>>,
    }

    impl RecordingTransport {
        fn new() -> (Arc<Self>, Arc<Mutex<Vec<(String, Message)>>>) {
            let deliveries = Arc::new(Mutex::new(Vec::new()));
            (
                Arc::new(Self {
                    deliveries: deliveries.clone(),
                }),
                deliveries,
            )
        }
    }

    #[async_trait]
    impl PeerTransport for RecordingTransport {
        async fn deliver(&self, url: &str, message: &Message) -> crate::core::Result<()> {
            self.deliveries
                .lock()
                .unwrap()
                .push((url.to_string(), message.clone()));
            Ok(())
        }
    }

    struct RecordingInvoker {
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingInvoker {
        fn new() -> (Arc<Self>, Arc<Mutex<Vec<(String, String)>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (Arc::new(Self { calls: calls.clone() }), calls)
        }
    }

    #[async_trait]
    impl ToolInvoker for RecordingInvoker {
        async fn invoke(&self, query: &str, final_url: &str) -> String {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), final_url.to_string()));
            "tool says hi".to_string()
        }
    }

    struct FailingImprover;

    #[async_trait]
    impl Improver for FailingImprover {
        async fn improve(&self, _text: &str) -> crate::core::Result<String> {
            Err(crate::core::Error::ImproverFailed("always fails".to_string()))
        }
    }

    fn test_config(agent_id: &str, dir: &tempfile::TempDir) -> BridgeConfig {
        let mut config = BridgeConfig::new(agent_id);
        config.log_dir = dir.path().to_path_buf();
        config
    }

    fn reply_text(reply: &Message) -> &str {
        reply.text().expect("reply should be text")
    }

    #[tokio::test]
    async fn test_help_and_unknown_list_same_commands() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let help = bridge.handle_message(Message::user("/help")).await;
        let unknown = bridge.handle_message(Message::user("/xyz")).await;

        for command in ["/help", "/quit", "/query", "@<agent_id>"] {
            assert!(reply_text(&help).contains(command), "help missing {}", command);
            assert!(
                reply_text(&unknown).contains(command),
                "unknown-command reply missing {}",
                command
            );
        }
        assert!(reply_text(&unknown).contains("Unknown command."));
    }

    #[tokio::test]
    async fn test_quit_reply() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge.handle_message(Message::user("/quit")).await;
        assert_eq!(reply_text(&reply), "[AGENT alice] Exiting session...");
        assert_eq!(reply.role, MessageRole::Agent);
    }

    #[tokio::test]
    async fn test_query_uses_generator() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir))
            .generator(Arc::new(FixedGenerator(Some("the answer".to_string()))))
            .build();

        let reply = bridge.handle_message(Message::user("/query what now")).await;
        assert_eq!(reply_text(&reply), "[AGENT alice] the answer");
    }

    #[tokio::test]
    async fn test_query_falls_back_to_apology() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge.handle_message(Message::user("/query what now")).await;
        assert_eq!(
            reply_text(&reply),
            "[AGENT alice] Sorry, I couldn't process your query. Please try again."
        );
    }

    #[tokio::test]
    async fn test_query_without_text_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge.handle_message(Message::user("/query")).await;
        assert!(reply_text(&reply).contains("Please provide a query"));
    }

    #[tokio::test]
    async fn test_plain_text_never_loses_user_message() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge.handle_message(Message::user("hello out there")).await;
        assert_eq!(reply_text(&reply), "[AGENT alice] hello out there");
    }

    #[tokio::test]
    async fn test_plain_text_uses_generator_when_available() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir))
            .generator(Arc::new(FixedGenerator(Some("generated".to_string()))))
            .build();

        let reply = bridge.handle_message(Message::user("hello")).await;
        assert_eq!(reply_text(&reply), "[AGENT alice] generated");
    }

    #[tokio::test]
    async fn test_non_text_payload_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let mut msg = Message::user("x");
        msg.content = MessageContent::Error("binary blob".to_string());

        let reply = bridge.handle_message(msg).await;
        assert!(matches!(reply.content, MessageContent::Error(_)));
    }

    #[tokio::test]
    async fn test_conversation_id_generated_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge.handle_message(Message::user("/quit")).await;
        assert!(reply.conversation_id.is_some());

        let with_id = Message::user("/quit").with_conversation_id("conv-7");
        let reply = bridge.handle_message(with_id).await;
        assert_eq!(reply.conversation_id.as_deref(), Some("conv-7"));
    }

    #[tokio::test]
    async fn test_directed_send_delivers_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, deliveries) = RecordingTransport::new();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert_agent("bob", "http://bob-host:6000");

        let mut config = test_config("alice", &dir);
        config.improve_messages = false;
        let bridge = AgentBridge::builder(config)
            .directory(directory)
            .transport(transport)
            .build();

        let reply = bridge
            .handle_message(Message::user("@bob hello bob").with_conversation_id("c1"))
            .await;
        assert_eq!(reply_text(&reply), "[AGENT alice]: hello bob");

        let recorded = deliveries.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let (url, delivered) = &recorded[0];
        assert_eq!(url, "http://bob-host:6000/a2a");

        let decoded = codec::decode(delivered.text().unwrap()).unwrap();
        assert_eq!(decoded.addressing(), Some(("alice", "bob")));
        assert_eq!(decoded.body, "hello bob");
        assert!(delivered.meta_bool(meta::IS_EXTERNAL));
        assert_eq!(delivered.meta_str(meta::FROM_AGENT_ID), Some("alice"));
        assert_eq!(delivered.meta_str(meta::PATH), Some("alice"));
        assert_eq!(delivered.conversation_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_directed_send_applies_active_improver() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, deliveries) = RecordingTransport::new();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert_agent("bob", "http://bob-host:6000/a2a");

        let bridge = AgentBridge::builder(test_config("alice", &dir))
            .directory(directory)
            .transport(transport)
            .build();
        bridge.set_custom_improver("upper", Arc::new(FnImprover::new(|t: &str| t.to_uppercase())));

        let reply = bridge.handle_message(Message::user("@bob hello")).await;
        assert_eq!(reply_text(&reply), "[AGENT alice]: HELLO");

        let recorded = deliveries.lock().unwrap();
        let decoded = codec::decode(recorded[0].1.text().unwrap()).unwrap();
        assert_eq!(decoded.body, "HELLO");
    }

    #[tokio::test]
    async fn test_directed_send_to_unknown_peer_still_echoes() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge.handle_message(Message::user("@ghost hello")).await;
        assert_eq!(reply_text(&reply), "[AGENT alice]: hello");
    }

    #[tokio::test]
    async fn test_directed_send_failure_surfaced_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("alice", &dir);
        config.surface_send_failures = true;
        let bridge = AgentBridge::builder(config).build();

        let reply = bridge.handle_message(Message::user("@ghost hello")).await;
        assert!(reply_text(&reply).contains("Could not deliver to ghost"));
        assert!(reply_text(&reply).contains("not found in registry"));
    }

    #[tokio::test]
    async fn test_directed_send_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge.handle_message(Message::user("@bob")).await;
        assert!(reply_text(&reply).contains("Invalid format. Use '@agent_id message'"));
    }

    #[tokio::test]
    async fn test_tool_query_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let (invoker, calls) = RecordingInvoker::new();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert_tool(
            "smithery",
            "search",
            ToolResolution {
                endpoint: "http://tools/search".to_string(),
                config: serde_json::json!({"region": "us"}),
                provider: "smithery".to_string(),
            },
        );

        let mut config = test_config("alice", &dir);
        config.smithery_api_key = Some("sk-123".to_string());
        let bridge = AgentBridge::builder(config)
            .directory(directory)
            .tool_invoker(invoker)
            .build();

        let reply = bridge
            .handle_message(Message::user("#smithery:search find cats"))
            .await;
        assert_eq!(reply_text(&reply), "tool says hi");

        let recorded = calls.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "find cats");
        assert!(recorded[0].1.starts_with("http://tools/search?api_key=sk-123&config="));
    }

    #[tokio::test]
    async fn test_tool_query_missing_credential_never_invokes() {
        let dir = tempfile::tempdir().unwrap();
        let (invoker, calls) = RecordingInvoker::new();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert_tool(
            "smithery",
            "search",
            ToolResolution {
                endpoint: "http://tools/search".to_string(),
                config: serde_json::json!({}),
                provider: "smithery".to_string(),
            },
        );

        let bridge = AgentBridge::builder(test_config("alice", &dir))
            .directory(directory)
            .tool_invoker(invoker)
            .build();

        let reply = bridge
            .handle_message(Message::user("#smithery:search find cats"))
            .await;
        assert!(reply_text(&reply).contains("Ensure the required API key"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_query_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge
            .handle_message(Message::user("#acme:missing find cats"))
            .await;
        assert!(reply_text(&reply).contains("Tool 'missing' not found in registry"));
    }

    #[tokio::test]
    async fn test_tool_query_without_credential_requirement_uses_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (invoker, calls) = RecordingInvoker::new();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert_tool(
            "acme",
            "search",
            ToolResolution {
                endpoint: "http://tools/plain".to_string(),
                config: serde_json::json!({}),
                provider: "acme".to_string(),
            },
        );

        let bridge = AgentBridge::builder(test_config("alice", &dir))
            .directory(directory)
            .tool_invoker(invoker)
            .build();

        bridge
            .handle_message(Message::user("#acme:search find cats"))
            .await;
        assert_eq!(calls.lock().unwrap()[0].1, "http://tools/plain");
    }

    #[tokio::test]
    async fn test_tool_query_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let reply = bridge.handle_message(Message::user("#nocolon query")).await;
        assert!(reply_text(&reply).contains("Invalid format. Use '#registry_provider:tool_name"));
    }

    #[tokio::test]
    async fn test_peer_envelope_ui_mode_publishes_once_and_acks() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();
        let subscription = bridge.relay().subscribe("ui-client");

        let envelope = codec::encode("bob", "alice", "hi alice");
        let reply = bridge
            .handle_message(Message::user(&envelope).with_conversation_id("c1"))
            .await;
        assert_eq!(reply_text(&reply), "Message received by Agent alice");

        let queued = subscription.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].message, "FROM bob: hi alice");
        assert_eq!(queued[0].from_agent, "bob");

        let latest = bridge.mailbox().take().unwrap();
        assert_eq!(latest.message, "FROM bob: hi alice");
    }

    #[tokio::test]
    async fn test_peer_envelope_terminal_mode_forwards_async() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, deliveries) = RecordingTransport::new();
        let mut config = test_config("alice", &dir);
        config.ui_mode = false;
        let bridge = AgentBridge::builder(config).transport(transport).build();

        let envelope = codec::encode("bob", "alice", "hi alice");
        let reply = bridge.handle_message(Message::user(&envelope)).await;
        assert_eq!(reply_text(&reply), "Message received by Agent alice");

        for _ in 0..100 {
            if !deliveries.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let recorded = deliveries.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let (url, forwarded) = &recorded[0];
        assert_eq!(url, "http://localhost:6010/a2a");
        assert_eq!(forwarded.text(), Some("FROM bob: hi alice"));
        assert!(forwarded.meta_bool(meta::IS_FROM_PEER));
        assert!(forwarded.meta_bool(meta::FORWARDED_BY_BRIDGE));
        assert_eq!(forwarded.meta_str(meta::SOURCE_AGENT), Some("bob"));
    }

    #[tokio::test]
    async fn test_envelope_without_addressing_falls_through_to_plain() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let text = "__EXTERNAL_MESSAGE__\n__MESSAGE_START__\nstray\n__MESSAGE_END__";
        let reply = bridge.handle_message(Message::user(text)).await;
        // Plain-text handling echoes the input when no generator is wired.
        assert!(reply_text(&reply).starts_with("[AGENT alice]"));
    }

    #[tokio::test]
    async fn test_peer_ack_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();

        let msg = Message::user("FROM bob: already handled").with_meta(meta::IS_FROM_PEER, true);
        let reply = bridge.handle_message(msg).await;
        assert_eq!(reply_text(&reply), "Message from peer received");

        // No conversation log entry for ack passthroughs.
        let conv = reply.conversation_id.clone().unwrap();
        assert!(bridge.log.read(&conv).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_improver_unknown_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();
        bridge.set_custom_improver("upper", Arc::new(FnImprover::new(|t: &str| t.to_uppercase())));

        assert!(!bridge.set_message_improver("nonexistent"));
        assert_eq!(bridge.active_improver(), "upper");
        assert_eq!(bridge.apply_active("hello").await, "HELLO");
    }

    #[tokio::test]
    async fn test_apply_active_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();
        bridge.set_custom_improver("broken", Arc::new(FailingImprover));

        assert_eq!(bridge.apply_active("hello").await, "hello");
    }

    #[tokio::test]
    async fn test_inbound_and_improved_text_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let directory = Arc::new(InMemoryDirectory::new());
        directory.insert_agent("bob", "http://bob:6000");
        let (transport, _deliveries) = RecordingTransport::new();

        let bridge = AgentBridge::builder(test_config("alice", &dir))
            .directory(directory)
            .transport(transport)
            .build();
        bridge.set_custom_improver("upper", Arc::new(FnImprover::new(|t: &str| t.to_uppercase())));

        bridge
            .handle_message(Message::user("@bob hi there").with_conversation_id("c1"))
            .await;

        let records = bridge.log.read("c1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "@bob hi there");
        assert_eq!(records[0].source, "Local user to Agent alice");
        assert_eq!(records[0].path, "alice");
        assert_eq!(records[1].message, "HI THERE");
        assert_eq!(records[1].source, "Improver alice");
    }

    #[tokio::test]
    async fn test_path_extends_inbound_path() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("carol", &dir)).build();

        let msg = Message::user("plain text")
            .with_conversation_id("c2")
            .with_meta(meta::PATH, "alice>bob");
        bridge.handle_message(msg).await;

        let records = bridge.log.read("c2").unwrap();
        assert_eq!(records[0].path, "alice>bob>carol");
    }

    #[tokio::test]
    async fn test_register_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        let directory = Arc::new(InMemoryDirectory::new());
        let mut config = test_config("alice", &dir);
        config.public_url = Some("http://alice-host:6000".to_string());

        let bridge = AgentBridge::builder(config)
            .directory(directory.clone())
            .build();
        assert!(bridge.register_with_directory().await);
        assert_eq!(
            directory.lookup("alice").await.as_deref(),
            Some("http://alice-host:6000")
        );
    }

    #[tokio::test]
    async fn test_register_without_public_url_declines() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = AgentBridge::builder(test_config("alice", &dir)).build();
        assert!(!bridge.register_with_directory().await);
    }
}
