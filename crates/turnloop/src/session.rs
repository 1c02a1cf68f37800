use std::time::Duration;

use turnloop_core::{
    Agent, AgentBuilder, AgentStage, RetryPolicy, RunError, RunOptions,
    RunOutput,
};
use turnloop_model::{ModelProvider, Turn};

use crate::config::ToolsConfig;
use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    recognize_tool: RecognizeWeatherTool,
    tools_config: ToolsConfig,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    ///
    /// The provider also backs the `recognize_weather_request` tool.
    pub fn with_model_provider<M: ModelProvider + Clone + 'static>(
        provider: M,
    ) -> Self {
        let recognize_tool = RecognizeWeatherTool::new(provider.clone());
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            recognize_tool,
            tools_config: ToolsConfig::default(),
        }
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets the credentials of the built-in tools.
    #[inline]
    pub fn with_tools_config(mut self, tools_config: ToolsConfig) -> Self {
        self.tools_config = tools_config;
        self
    }

    /// Sets the maximum number of model calls in one message exchange.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_turns(max_turns);
        self
    }

    /// Sets a timeout for every message exchange.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent_builder = self.agent_builder.with_timeout(timeout);
        self
    }

    /// Sets how transient provider failures are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.agent_builder = self.agent_builder.with_retry_policy(retry_policy);
        self
    }

    /// Attaches a callback to be invoked whenever a turn is recorded.
    #[inline]
    pub fn on_turn(
        mut self,
        on_turn: impl Fn(&Turn) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_turn(on_turn);
        self
    }

    /// Attaches a callback to be invoked whenever the agent changes stage.
    #[inline]
    pub fn on_stage(
        mut self,
        on_stage: impl Fn(AgentStage) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_stage(on_stage);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let mut agent_builder =
            self.agent_builder.with_tool(CurrencyTool::new());
        match self.tools_config.weather_api_key() {
            Some(api_key) => {
                agent_builder = agent_builder
                    .with_tool(self.recognize_tool)
                    .with_tool(WeatherTool::new(api_key));
            }
            None => info!("WEATHERAPI_KEY is not set, weather lookup is off"),
        }
        match self.tools_config.airtable() {
            Some((api_key, base_id)) => {
                agent_builder = agent_builder
                    .with_tool(AirtableTablesTool::new(api_key, base_id));
            }
            None => info!("Airtable is not configured, table listing is off"),
        }

        Session {
            agent: agent_builder.build(),
        }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent that you can use directly, and it
/// is basically a wrapper around [`Agent`]. Every message is answered
/// independently.
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Sends a message to the session and waits for the final answer.
    #[inline]
    pub async fn send_message(
        &self,
        message: &str,
    ) -> Result<RunOutput, RunError> {
        self.agent.run(message).await
    }

    /// Sends a message with per-message options.
    #[inline]
    pub async fn send_message_with(
        &self,
        message: &str,
        options: RunOptions,
    ) -> Result<RunOutput, RunError> {
        self.agent.run_with(message, options).await
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}
