use std::any::Any;
use std::future::ready;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::Instrument;
use turnloop_model::ModelTool;

use crate::tool::object::{ToolObject, ToolObjectImpl};
use crate::tool::{Error, Tool, ToolResult};

/// A set of tools the model may call, keyed by name.
///
/// Registering a tool with a name that is already taken replaces the
/// earlier tool. A registry is only read while the agent runs, so it can
/// be built once and shared by many runs.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn ToolObject>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    pub fn register<T: Tool>(&mut self, tool: T) -> &mut Self {
        let name = tool.name().to_owned();
        let replaced =
            self.tools.insert(name, Arc::new(ToolObjectImpl(tool)));
        if let Some(replaced) = replaced {
            warn!("tool `{}` is registered twice, last wins", replaced.name());
        }
        self
    }

    /// Registers a tool, builder style.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns `true` if a tool with the given name is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the names of the registered tools in registration order.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Returns the definitions of all tools in registration order.
    pub fn schemas(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Calls the named tool with the JSON-encoded argument object.
    ///
    /// The returned future never panics: a panicking tool resolves to an
    /// `ExecutionError`.
    pub fn invoke(
        &self,
        name: &str,
        raw_arguments: &str,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let Some(tool) = self.tools.get(name) else {
            warn!("tool not found: {name}");
            return Box::pin(ready(Err(
                Error::unknown_tool().with_reason(name)
            )));
        };
        let arguments = match parse_arguments(raw_arguments) {
            Ok(arguments) => arguments,
            Err(err) => {
                warn!("malformed arguments for `{name}`: {err}");
                return Box::pin(ready(Err(err)));
            }
        };

        trace!("calling tool `{name}` with args: {arguments:?}");
        let fut = Arc::clone(tool).execute(arguments);
        Box::pin(
            async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        let reason = panic_message(payload.as_ref());
                        error!("tool panicked: {reason}");
                        Err(Error::execution_error().with_reason(reason))
                    }
                }
            }
            .instrument(debug_span!("tool execute", tool = name)),
        )
    }
}

/// Parses the raw arguments text, which must be a JSON object. Some models
/// send an empty string for tools without parameters.
fn parse_arguments(raw_arguments: &str) -> Result<Value, Error> {
    if raw_arguments.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(raw_arguments) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(Error::malformed_arguments()
            .with_reason("arguments must be a JSON object")),
        Err(err) => {
            Err(Error::malformed_arguments().with_reason(err.to_string()))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_owned()
    }
}
