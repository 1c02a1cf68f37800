use serde::{Deserialize, Serialize};

use crate::turn::{Role, Turn};

/// A raw message returned by the model provider.
///
/// Providers are free to keep their own wire structure. This trait only
/// exposes the parts the agent needs to rebuild a canonical [`Turn`].
pub trait ModelResponse: Send + 'static {
    /// Returns the message as a canonical turn if it already is one.
    ///
    /// Providers returning their own wire types should leave this as
    /// `None`.
    fn as_turn(&self) -> Option<&Turn> {
        None
    }

    /// Returns the role of the message author.
    fn role(&self) -> Role;

    /// Returns the text content of the message, if any.
    fn content(&self) -> Option<&str>;

    /// Returns the tool calls requested by the model, in the order the
    /// model listed them.
    fn tool_call_requests(&self) -> Vec<ToolCallRequest>;

    /// Returns the id of the tool call this message answers.
    ///
    /// Only meaningful for messages with the [`Role::Tool`] role.
    fn tool_call_id(&self) -> Option<&str> {
        None
    }

    /// Returns the name of the tool that produced this message.
    ///
    /// Only meaningful for messages with the [`Role::Tool`] role.
    fn name(&self) -> Option<&str> {
        None
    }
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    ///
    /// It is generated by the provider and only used for correlating the
    /// result with the request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The JSON-encoded argument object.
    pub arguments: String,
}
