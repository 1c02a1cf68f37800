//! Tool call supports.

mod error;
mod object;
mod registry;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use registry::ToolRegistry;

/// The result of a tool call.
pub type ToolResult = Result<ToolOutput, Error>;

/// A value produced by a tool.
///
/// The model only ever receives text: [`ToolOutput::Text`] is passed through
/// verbatim while [`ToolOutput::Json`] is serialized to compact JSON.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutput {
    /// Plain text.
    Text(String),
    /// A structured value.
    Json(Value),
}

impl ToolOutput {
    /// Serializes any value into a [`ToolOutput::Json`].
    ///
    /// Values that cannot be represented as JSON result in an
    /// `ExecutionError`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> ToolResult {
        serde_json::to_value(value).map(ToolOutput::Json).map_err(|err| {
            Error::execution_error()
                .with_reason(format!("unserializable output: {err}"))
        })
    }

    /// Returns the text that will be sent back to the model.
    #[inline]
    pub fn into_content(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for ToolOutput {
    #[inline]
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    #[inline]
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_owned())
    }
}

impl From<Value> for ToolOutput {
    #[inline]
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as an API key or a base URL. To
/// do this, make the context an immutable state of the tool, which can be set
/// during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts. It is deserialized from the
    /// argument object sent by the model.
    type Input: DeserializeOwned + Send;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
