mod builder;
mod outcome;
mod state;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use turnloop_model::{ResponseFormat, ToolChoice, Turn};

use crate::model_client::{ModelClient, RetryPolicy};
use crate::tool::ToolRegistry;
pub use builder::AgentBuilder;
pub use outcome::{RunError, RunErrorKind, RunOutput};
use state::Run;
pub use state::AgentStage;

type TurnCallback = Arc<dyn Fn(&Turn) + Send + Sync>;
type StageCallback = Arc<dyn Fn(AgentStage) + Send + Sync>;

/// An agent instance, which holds a model client, a set of tools and the
/// configuration of its runs.
///
/// Every call to [`Agent::run`] starts a fresh conversation: the agent seeds
/// it with the system prompt and the user input, then alternates between
/// asking the model and executing the tools it requests, until the model
/// answers with text. The agent itself is never mutated by a run, so one
/// instance can serve any number of runs.
#[derive(Clone)]
pub struct Agent {
    model_client: ModelClient,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_turns: usize,
    timeout: Option<Duration>,
    retry_policy: RetryPolicy,
    tool_choice: ToolChoice,
    response_format: Option<ResponseFormat>,
    on_turn: Option<TurnCallback>,
    on_stage: Option<StageCallback>,
}

impl Agent {
    /// Returns the tools available to the model.
    #[inline]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Returns the fixed part of the system instructions.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Runs the agent on a user input with the default options.
    #[inline]
    pub async fn run<S: Into<String>>(
        &self,
        input: S,
    ) -> Result<RunOutput, RunError> {
        self.run_with(input, RunOptions::default()).await
    }

    /// Runs the agent on a user input.
    ///
    /// The run never panics on behalf of the model or the tools. A tool
    /// failure is reported back to the model, while a provider failure, an
    /// expired deadline or an exhausted turn budget end the run with a
    /// [`RunError`] that carries the transcript.
    pub async fn run_with<S: Into<String>>(
        &self,
        input: S,
        options: RunOptions,
    ) -> Result<RunOutput, RunError> {
        // A timeout too large to represent means no deadline at all.
        let deadline = options.deadline.or_else(|| {
            self.timeout
                .and_then(|timeout| Instant::now().checked_add(timeout))
        });
        let tool_choice = options
            .tool_choice
            .unwrap_or_else(|| self.tool_choice.clone());
        let system_prompt = match options.instructions {
            Some(instructions) if !instructions.trim().is_empty() => {
                format!("{}\n\n{instructions}", self.system_prompt)
            }
            _ => self.system_prompt.clone(),
        };

        Run::new(self, deadline, tool_choice)
            .drive(system_prompt, input.into())
            .await
    }
}

/// Per-run options supplied by the caller.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    instructions: Option<String>,
    tool_choice: Option<ToolChoice>,
    deadline: Option<Instant>,
}

impl RunOptions {
    /// Appends extra instructions to the system prompt of this run.
    #[inline]
    pub fn with_instructions<S: Into<String>>(
        mut self,
        instructions: S,
    ) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Overrides the tool choice for the first model call of this run.
    #[inline]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// Sets a deadline for the whole run. It takes precedence over the
    /// timeout configured on the agent.
    #[inline]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
