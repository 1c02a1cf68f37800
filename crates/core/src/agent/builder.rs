use std::sync::Arc;
use std::time::Duration;

use turnloop_model::{ModelProvider, ResponseFormat, ToolChoice, Turn};

use super::{Agent, AgentStage};
use crate::model_client::{ModelClient, RetryPolicy};
use crate::tool::{Tool, ToolRegistry};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a ReAct agent. You can think, \
act, and observe. Use the tools provided to accomplish the task.";
const DEFAULT_MAX_TURNS: usize = 16;

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    tools: ToolRegistry,
    system_prompt: String,
    max_turns: usize,
    timeout: Option<Duration>,
    retry_policy: RetryPolicy,
    tool_choice: ToolChoice,
    response_format: Option<ResponseFormat>,
    on_turn: Option<Box<dyn Fn(&Turn) + Send + Sync>>,
    on_stage: Option<Box<dyn Fn(AgentStage) + Send + Sync>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            tools: ToolRegistry::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            max_turns: DEFAULT_MAX_TURNS,
            timeout: None,
            retry_policy: RetryPolicy::none(),
            tool_choice: ToolChoice::Auto,
            response_format: None,
            on_turn: None,
            on_stage: None,
        }
    }

    /// Sets the fixed system instructions.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the maximum number of model calls in one run.
    ///
    /// A value of zero is treated as one.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Sets a timeout applied to every run that has no explicit deadline.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how transient provider failures are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets the default tool choice for the first model call of a run.
    #[inline]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    /// Asks the model to answer in the given format on every call.
    #[inline]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    /// Replaces the tools with a prepared registry.
    #[inline]
    pub fn with_tool_registry(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Attaches a callback to be invoked whenever a turn is appended to the
    /// conversation.
    #[inline]
    pub fn on_turn(
        mut self,
        on_turn: impl Fn(&Turn) + Send + Sync + 'static,
    ) -> Self {
        self.on_turn = Some(Box::new(on_turn));
        self
    }

    /// Attaches a callback to be invoked whenever a run changes stage.
    #[inline]
    pub fn on_stage(
        mut self,
        on_stage: impl Fn(AgentStage) + Send + Sync + 'static,
    ) -> Self {
        self.on_stage = Some(Box::new(on_stage));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent {
            model_client: self.model_client,
            tools: Arc::new(self.tools),
            system_prompt: self.system_prompt,
            max_turns: self.max_turns,
            timeout: self.timeout,
            retry_policy: self.retry_policy,
            tool_choice: self.tool_choice,
            response_format: self.response_format,
            on_turn: self.on_turn.map(Arc::from),
            on_stage: self.on_stage.map(Arc::from),
        }
    }
}
