use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::response::{ModelResponse, ToolCallRequest};

/// The author of a [`Turn`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The system instructions.
    System,
    /// The human user.
    User,
    /// The model.
    Assistant,
    /// The result of a tool call.
    Tool,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One entry in a conversation.
///
/// The serialized form is the message shape commonly used by chat
/// completion APIs, so a conversation can be dumped as a readable
/// transcript.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    /// The system instructions.
    System {
        /// The instructions text.
        content: String,
    },
    /// A user input text.
    User {
        /// The input text.
        content: String,
    },
    /// A message from the model.
    Assistant {
        /// The text of the message. May be absent when the message only
        /// carries tool calls.
        content: Option<String>,
        /// Tool calls requested by the model.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// The result of a tool call.
    Tool {
        /// The id of the [`ToolCall`] this turn answers.
        tool_call_id: String,
        /// The name of the tool that was called.
        name: String,
        /// The result text.
        content: String,
    },
}

impl Turn {
    /// Creates a system turn.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Turn::System {
            content: content.into(),
        }
    }

    /// Creates a user turn.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Turn::User {
            content: content.into(),
        }
    }

    /// Creates a text-only assistant turn.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Turn::Assistant {
            content: Some(content.into()),
            tool_calls: vec![],
        }
    }

    /// Creates a tool result turn.
    #[inline]
    pub fn tool<S1, S2, S3>(tool_call_id: S1, name: S2, content: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Turn::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// Returns the role of this turn.
    #[inline]
    pub fn role(&self) -> Role {
        match self {
            Turn::System { .. } => Role::System,
            Turn::User { .. } => Role::User,
            Turn::Assistant { .. } => Role::Assistant,
            Turn::Tool { .. } => Role::Tool,
        }
    }

    /// Returns the text content of this turn.
    #[inline]
    pub fn content(&self) -> Option<&str> {
        match self {
            Turn::System { content }
            | Turn::User { content }
            | Turn::Tool { content, .. } => Some(content),
            Turn::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Returns the tool calls of this turn, empty for anything but an
    /// assistant turn requesting tools.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Turn::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

impl ModelResponse for Turn {
    #[inline]
    fn as_turn(&self) -> Option<&Turn> {
        Some(self)
    }

    #[inline]
    fn role(&self) -> Role {
        Turn::role(self)
    }

    #[inline]
    fn content(&self) -> Option<&str> {
        Turn::content(self)
    }

    fn tool_call_requests(&self) -> Vec<ToolCallRequest> {
        self.tool_calls().iter().map(ToolCall::to_request).collect()
    }

    fn tool_call_id(&self) -> Option<&str> {
        match self {
            Turn::Tool { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            Turn::Tool { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// The type of a [`ToolCall`]. Only functions are supported.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallType {
    /// A function call.
    #[default]
    Function,
}

/// The function part of a [`ToolCall`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The name of the function.
    pub name: String,
    /// The JSON-encoded argument object.
    pub arguments: String,
}

/// A tool call in its normalized form, as stored in an assistant [`Turn`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    /// The unique identifier for the tool call.
    pub id: String,
    /// The type of the tool call.
    #[serde(rename = "type", default)]
    pub kind: ToolCallType,
    /// The function to call.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Creates a function tool call.
    #[inline]
    pub fn function<S1, S2, S3>(id: S1, name: S2, arguments: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            id: id.into(),
            kind: ToolCallType::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Converts this call back into a flat request.
    #[inline]
    pub fn to_request(&self) -> ToolCallRequest {
        ToolCallRequest {
            id: self.id.clone(),
            name: self.function.name.clone(),
            arguments: self.function.arguments.clone(),
        }
    }
}

impl From<ToolCallRequest> for ToolCall {
    #[inline]
    fn from(req: ToolCallRequest) -> Self {
        ToolCall::function(req.id, req.name, req.arguments)
    }
}
