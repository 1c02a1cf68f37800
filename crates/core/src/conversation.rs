//! Conversation-related types.

use std::io::Read;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use turnloop_model::Turn;

/// Represents a conversation.
///
/// A conversation is only appended to while an agent run is in progress,
/// and is handed back to the caller when the run ends, either with the
/// final answer or with the failure for diagnostics.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    pub(crate) turns: Vec<Turn>,
}

impl Conversation {
    /// Returns all turns in order.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if the conversation has no turns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the most recent turn.
    #[inline]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Consumes the conversation and returns its turns.
    #[inline]
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    /// Returns the text of every assistant turn, one per line.
    pub fn assistant_text(&self) -> String {
        self.turns
            .iter()
            .filter_map(|turn| match turn {
                Turn::Assistant {
                    content: Some(content),
                    ..
                } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Loads a transcript previously saved as a JSON array of turns.
    ///
    /// Unknown fields on a turn are ignored. A tool turn that answers no
    /// call of the preceding assistant turn is rejected.
    #[inline]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Loads a transcript from a reader, see [`Conversation::from_json`].
    #[inline]
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }

    /// Renders the conversation as an indented JSON transcript.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|err| format!("<unprintable transcript: {err}>"))
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        debug_assert!(
            self.accepts(&turn),
            "tool turn does not answer the preceding assistant turn"
        );
        self.turns.push(turn);
    }

    /// Checks that a tool turn answers a call of the latest assistant turn.
    fn accepts(&self, turn: &Turn) -> bool {
        let Turn::Tool { tool_call_id, .. } = turn else {
            return true;
        };
        let last_assistant = self
            .turns
            .iter()
            .rev()
            .find(|turn| matches!(turn, Turn::Assistant { .. }));
        last_assistant.is_some_and(|assistant| {
            assistant
                .tool_calls()
                .iter()
                .any(|call| &call.id == tool_call_id)
        })
    }
}

impl<'de> Deserialize<'de> for Conversation {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let turns = Vec::<Turn>::deserialize(deserializer)?;
        let mut conversation = Conversation::default();
        for turn in turns {
            if !conversation.accepts(&turn) {
                return Err(D::Error::custom(
                    "tool turn does not answer the preceding assistant turn",
                ));
            }
            conversation.turns.push(turn);
        }
        Ok(conversation)
    }
}
