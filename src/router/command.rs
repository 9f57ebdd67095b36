//! Inbound text classification.
//!
//! First match wins: peer envelope, directed send, tool query, slash command,
//! then plain text. Classification is pure over the message body; metadata
//! checks (peer-ack passthrough) happen in the bridge.

use crate::envelope::codec::{self, DecodedEnvelope};

/// Slash command kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlashCommand {
    /// `/quit`
    Quit,
    /// `/help`
    Help,
    /// `/query <text>`
    Query(String),
    /// `/query` with no text
    QueryUsage,
    /// Any other `/word`
    Unknown(String),
}

/// Classified command kind for an inbound message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Peer-forwarded envelope with a from/to pair
    PeerEnvelope(DecodedEnvelope),
    /// `@<agent_id> <text>`
    DirectedSend { target: String, text: String },
    /// `@...` without a message
    DirectedSendUsage,
    /// `#<provider>:<tool> <query>`
    ToolQuery {
        provider: String,
        tool: String,
        query: String,
    },
    /// `#...` without exactly one `:` or without a query
    ToolQueryUsage,
    /// `/...`
    Slash(SlashCommand),
    /// Anything else
    Plain(String),
}

impl Command {
    /// Classify a message body.
    ///
    /// An envelope whose start marker matches but whose headers are missing
    /// falls through to the ordinary rules rather than erroring.
    pub fn classify(text: &str) -> Command {
        if let Some(decoded) = codec::decode(text) {
            if decoded.addressing().is_some() {
                return Command::PeerEnvelope(decoded);
            }
        }

        if let Some(rest) = text.strip_prefix('@') {
            return match rest.split_once(' ') {
                Some((target, message)) => Command::DirectedSend {
                    target: target.to_string(),
                    text: message.to_string(),
                },
                None => Command::DirectedSendUsage,
            };
        }

        if let Some(rest) = text.strip_prefix('#') {
            if let Some((token, query)) = rest.split_once(' ') {
                if token.matches(':').count() == 1 && !query.is_empty() {
                    let (provider, tool) = token.split_once(':').expect("one colon checked");
                    return Command::ToolQuery {
                        provider: provider.to_string(),
                        tool: tool.to_string(),
                        query: query.to_string(),
                    };
                }
            }
            return Command::ToolQueryUsage;
        }

        if let Some(rest) = text.strip_prefix('/') {
            let (word, args) = match rest.split_once(' ') {
                Some((word, args)) => (word, Some(args)),
                None => (rest, None),
            };
            let slash = match word {
                "quit" => SlashCommand::Quit,
                "help" => SlashCommand::Help,
                "query" => match args {
                    Some(q) if !q.is_empty() => SlashCommand::Query(q.to_string()),
                    _ => SlashCommand::QueryUsage,
                },
                other => SlashCommand::Unknown(other.to_string()),
            };
            return Command::Slash(slash);
        }

        Command::Plain(text.to_string())
    }
}
