//! Conversation path trace.
//!
//! An ordered, `>`-joined list of agent IDs a conversation has traversed.
//! Advisory data only: nothing enforces loop detection or hop limits on it.

/// Separator between hops in a rendered path.
pub const HOP_SEPARATOR: char = '>';

/// Append an agent's own hop to a rendered path.
pub fn append_hop(path: &str, agent_id: &str) -> String {
    if path.is_empty() {
        agent_id.to_string()
    } else {
        format!("{}{}{}", path, HOP_SEPARATOR, agent_id)
    }
}

/// Split a rendered path back into hops.
pub fn hops(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split(HOP_SEPARATOR).collect()
    }
}
