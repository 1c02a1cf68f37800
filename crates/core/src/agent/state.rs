use futures_util::future::join_all;
use tokio::time::{Instant, timeout_at};
use tracing::Instrument;
use turnloop_model::{ModelRequest, ToolCall, ToolChoice, Turn};

use super::{Agent, RunError, RunErrorKind, RunOutput};
use crate::conversation::Conversation;

/// The stage of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentStage {
    /// Waiting for the model to answer.
    AwaitingModel,
    /// Executing the tool calls of the latest assistant turn.
    ExecutingTools,
    /// The model answered with text, the run is over.
    Done,
    /// The run stopped with an error.
    Failed,
}

/// The state of one run. It owns the conversation until the run ends.
pub(super) struct Run<'a> {
    agent: &'a Agent,
    conversation: Conversation,
    deadline: Option<Instant>,
    tool_choice: ToolChoice,
    model_calls: usize,
}

impl<'a> Run<'a> {
    pub fn new(
        agent: &'a Agent,
        deadline: Option<Instant>,
        tool_choice: ToolChoice,
    ) -> Self {
        Self {
            agent,
            conversation: Conversation::default(),
            deadline,
            tool_choice,
            model_calls: 0,
        }
    }

    pub async fn drive(
        mut self,
        system_prompt: String,
        input: String,
    ) -> Result<RunOutput, RunError> {
        let span = debug_span!("agent run");
        async move {
            self.push(Turn::system(system_prompt));
            self.push(Turn::user(input));

            loop {
                self.set_stage(AgentStage::AwaitingModel);
                let turn = self.await_model().await?;

                if turn.tool_calls().is_empty() {
                    return self.finish(turn);
                }

                let tool_calls = turn.tool_calls().to_vec();
                self.push(turn);
                self.set_stage(AgentStage::ExecutingTools);
                self.execute_tools(&tool_calls).await?;
            }
        }
        .instrument(span)
        .await
    }

    async fn await_model(&mut self) -> Result<Turn, RunError> {
        if self.model_calls >= self.agent.max_turns {
            let message = format!(
                "the model was called {} times without a final answer",
                self.model_calls
            );
            return Err(self.fail(RunErrorKind::TurnLimitExceeded, message));
        }

        let request = self.build_model_request();
        self.model_calls += 1;
        // A forced tool choice only applies to the first call, otherwise the
        // model could never give a final answer.
        if matches!(self.tool_choice, ToolChoice::Function(_)) {
            self.tool_choice = ToolChoice::Auto;
        }

        let agent = self.agent;
        let fut = agent
            .model_client
            .send_request_with_retry(request, &agent.retry_policy);
        let Some(resp) = within_deadline(self.deadline, fut).await else {
            let message = "no answer from the model before the deadline";
            return Err(self.fail(RunErrorKind::Timeout, message.to_owned()));
        };
        match resp {
            Ok(turn @ Turn::Assistant { .. }) => Ok(turn),
            Ok(turn) => {
                let message =
                    format!("expected an assistant turn, got {}", turn.role());
                let kind = turnloop_model::ErrorKind::InvalidResponse;
                Err(self.fail(RunErrorKind::Provider(kind), message))
            }
            Err(err) => {
                let kind = RunErrorKind::Provider(err.kind());
                Err(self.fail(kind, err.to_string()))
            }
        }
    }

    async fn execute_tools(
        &mut self,
        tool_calls: &[ToolCall],
    ) -> Result<(), RunError> {
        let tools = &*self.agent.tools;
        let calls = tool_calls.iter().map(|call| {
            let name = call.function.name.clone();
            let id = call.id.clone();
            let fut = tools.invoke(&name, &call.function.arguments);
            async move {
                let content = match fut.await {
                    Ok(output) => output.into_content(),
                    Err(err) => {
                        warn!("tool call `{id}` failed: {err}");
                        format!("Error: {err}")
                    }
                };
                Turn::tool(id, name, content)
            }
        });
        // Calls run concurrently, `join_all` keeps the request order.
        let batch = join_all(calls)
            .instrument(debug_span!("tool batch", count = tool_calls.len()));

        let Some(results) = within_deadline(self.deadline, batch).await else {
            let message = "tools were still running at the deadline";
            return Err(self.fail(RunErrorKind::Timeout, message.to_owned()));
        };
        for turn in results {
            self.push(turn);
        }
        Ok(())
    }

    fn finish(mut self, turn: Turn) -> Result<RunOutput, RunError> {
        let answer = turn
            .content()
            .filter(|content| !content.trim().is_empty())
            .map(ToOwned::to_owned);
        self.push(turn);

        let Some(answer) = answer else {
            let message = "the model answered with neither text nor tools";
            let kind = RunErrorKind::EmptyResponse;
            return Err(self.fail(kind, message.to_owned()));
        };
        self.set_stage(AgentStage::Done);
        debug!(
            "run finished after {} model calls:\n{}",
            self.model_calls,
            self.conversation.to_json_pretty()
        );
        Ok(RunOutput {
            answer,
            conversation: self.conversation,
        })
    }

    fn fail(&mut self, kind: RunErrorKind, message: String) -> RunError {
        self.set_stage(AgentStage::Failed);
        error!(
            "run failed: {kind}: {message}\ntranscript:\n{}",
            self.conversation.to_json_pretty()
        );
        RunError::new(kind, message, std::mem::take(&mut self.conversation))
    }

    fn build_model_request(&self) -> ModelRequest {
        ModelRequest {
            messages: self.conversation.turns().to_vec(),
            tools: self.agent.tools.schemas(),
            tool_choice: self.tool_choice.clone(),
            response_format: self.agent.response_format,
        }
    }

    fn push(&mut self, turn: Turn) {
        if let Some(on_turn) = &self.agent.on_turn {
            on_turn(&turn);
        }
        self.conversation.push(turn);
    }

    fn set_stage(&self, stage: AgentStage) {
        debug!("stage: {stage:?}");
        if let Some(on_stage) = &self.agent.on_stage {
            on_stage(stage);
        }
    }
}

async fn within_deadline<F: Future>(
    deadline: Option<Instant>,
    fut: F,
) -> Option<F::Output> {
    match deadline {
        Some(deadline) => timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}
