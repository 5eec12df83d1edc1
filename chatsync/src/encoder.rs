//! Turns user input into outbound envelopes.

use chatsync_proto::channel::Channel;
use chatsync_proto::command::{self, CommandKind, KNOWN};
use chatsync_proto::envelope::{OutboundEnvelope, OutboundKind};
use chatsync_proto::identity::Identity;
use chrono::{DateTime, Utc};

/// Input the encoder refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Empty or whitespace-only input.
    #[error("nothing to send")]
    Empty,
}

/// Classify `text` and wrap it in an envelope for `identity`.
///
/// The body is carried exactly as typed; only the classification looks at
/// the trimmed text.
///
/// # Errors
///
/// [`EncodeError::Empty`] for empty or whitespace-only input.
pub fn encode(
    text: &str,
    identity: &Identity,
    now: DateTime<Utc>,
) -> Result<OutboundEnvelope, EncodeError> {
    if text.trim().is_empty() {
        return Err(EncodeError::Empty);
    }
    let kind = if command::is_command(text) {
        OutboundKind::Command
    } else {
        OutboundKind::Message
    };
    Ok(OutboundEnvelope::new(kind, identity, text, now))
}

/// The command that joins `channel`.
#[must_use]
pub fn join_command(channel: &Channel) -> String {
    format!("{} {}", CommandKind::Join, channel.name)
}

/// Rows of the command help table: usage, description.
pub fn help_table() -> impl Iterator<Item = (&'static str, &'static str)> {
    KNOWN.iter().map(CommandKind::help)
}
