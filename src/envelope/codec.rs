//! Codec for the peer-forwarding envelope.
//!
//! The envelope is line-oriented plain text: a start marker, `FROM`/`TO`
//! header fields, then literal body lines between start- and end-of-body
//! markers.

/// First line of every envelope.
pub const START_MARKER: &str = "__EXTERNAL_MESSAGE__";
/// Header prefix carrying the sending agent's ID.
pub const FROM_PREFIX: &str = "__FROM_AGENT__";
/// Header prefix carrying the recipient agent's ID.
pub const TO_PREFIX: &str = "__TO_AGENT__";
/// Marks the start of the literal body.
pub const BODY_START: &str = "__MESSAGE_START__";
/// Marks the end of the literal body (exclusive).
pub const BODY_END: &str = "__MESSAGE_END__";

/// A decoded envelope.
///
/// `from`/`to` are optional because a malformed envelope may match the start
/// marker yet miss header fields; the router treats that as ordinary text
/// rather than an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedEnvelope {
    /// Sending agent ID, if the header was present
    pub from: Option<String>,
    /// Recipient agent ID, if the header was present
    pub to: Option<String>,
    /// Literal body with exactly one trailing newline trimmed
    pub body: String,
}

impl DecodedEnvelope {
    /// The from/to pair, when both headers were present.
    pub fn addressing(&self) -> Option<(&str, &str)> {
        match (&self.from, &self.to) {
            (Some(f), Some(t)) => Some((f.as_str(), t.as_str())),
            _ => None,
        }
    }
}

/// Check whether `text` starts with the envelope start marker.
pub fn is_envelope(text: &str) -> bool {
    text.split('\n').next() == Some(START_MARKER)
}

/// Encode an envelope for delivery to a peer bridge.
///
/// Caller contract: `body` must not contain a line equal to the end-of-body
/// marker; the codec does not escape it.
pub fn encode(from_agent: &str, to_agent: &str, body: &str) -> String {
    format!(
        "{}\n{}{}\n{}{}\n{}\n{}\n{}",
        START_MARKER, FROM_PREFIX, from_agent, TO_PREFIX, to_agent, BODY_START, body, BODY_END
    )
}

/// Decode an envelope.
///
/// Returns `None` unless the first line is the start marker. Otherwise scans
/// header lines, then accumulates literal body lines until the end marker.
/// A missing end marker decodes as much as was captured.
pub fn decode(text: &str) -> Option<DecodedEnvelope> {
    let mut lines = text.split('\n');
    if lines.next() != Some(START_MARKER) {
        return None;
    }

    let mut from = None;
    let mut to = None;
    let mut body = String::new();
    let mut in_body = false;

    for line in lines {
        if let Some(rest) = line.strip_prefix(FROM_PREFIX) {
            from = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix(TO_PREFIX) {
            to = Some(rest.to_string());
        } else if line == BODY_START {
            in_body = true;
        } else if line == BODY_END {
            break;
        } else if in_body {
            body.push_str(line);
            body.push('\n');
        }
    }

    // Trim exactly the one trailing newline the accumulation added.
    if body.ends_with('\n') {
        body.pop();
    }

    Some(DecodedEnvelope { from, to, body })
}
