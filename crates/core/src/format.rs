//! Normalization of raw model messages.
//!
//! Every message coming back from a provider goes through [`normalize`]
//! exactly once, so the rest of the agent only ever deals with [`Turn`].

use turnloop_model::{ModelResponse, Role, ToolCall, Turn};

/// Converts a raw model message into a canonical [`Turn`].
///
/// A message that already is a [`Turn`] is returned unchanged, which makes
/// this function idempotent. Otherwise the role and content are copied
/// and every tool call request is projected into a function [`ToolCall`],
/// preserving the order the model listed them in.
pub fn normalize<R: ModelResponse + ?Sized>(raw: &R) -> Turn {
    if let Some(turn) = raw.as_turn() {
        return turn.clone();
    }

    let content = raw.content().map(ToOwned::to_owned);
    match raw.role() {
        Role::System => Turn::System {
            content: content.unwrap_or_default(),
        },
        Role::User => Turn::User {
            content: content.unwrap_or_default(),
        },
        Role::Assistant => Turn::Assistant {
            content,
            tool_calls: raw
                .tool_call_requests()
                .into_iter()
                .map(ToolCall::from)
                .collect(),
        },
        Role::Tool => Turn::Tool {
            tool_call_id: raw.tool_call_id().unwrap_or_default().to_owned(),
            name: raw.name().unwrap_or_default().to_owned(),
            content: content.unwrap_or_default(),
        },
    }
}
