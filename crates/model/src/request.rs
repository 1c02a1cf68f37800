use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Turn;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The conversation so far.
    pub messages: Vec<Turn>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// Whether and which tools the model may call for this request.
    pub tool_choice: ToolChoice,
    /// The format the answer must follow, if the provider should enforce
    /// one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// Instruction to the model about whether and which tools it may invoke.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model may call zero or more tools.
    #[default]
    Auto,
    /// The model must not call any tool.
    None,
    /// The model must call the named tool.
    Function(String),
}

impl ToolChoice {
    /// Creates a choice that forces the model to call the named tool.
    #[inline]
    pub fn function<S: Into<String>>(name: S) -> Self {
        ToolChoice::Function(name.into())
    }
}

/// The shape of the assistant's text answer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form text.
    #[default]
    Text,
    /// A single JSON object ("JSON mode").
    JsonObject,
}
