use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use turnloop_model::{ErrorKind, ResponseFormat, ToolChoice, Turn};
use turnloop_test_model::{PresetResponse, TestModelProvider, tool_call};

use crate::tool::{Error, Tool, ToolOutput, ToolResult};
use crate::{AgentBuilder, AgentStage, RetryPolicy, RunErrorKind, RunOptions};

#[derive(Deserialize)]
struct WeatherInput {
    city: String,
}

struct WeatherTool {
    schema: Value,
}

impl WeatherTool {
    fn new() -> Self {
        Self {
            schema: json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": ["city"]
            }),
        }
    }
}

impl Tool for WeatherTool {
    type Input = WeatherInput;

    fn name(&self) -> &str {
        "get_weather_data"
    }

    fn description(&self) -> &str {
        "Get weather data for a specific city"
    }

    fn parameter_schema(&self) -> &Value {
        &self.schema
    }

    fn execute(
        &self,
        input: WeatherInput,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            ToolOutput::json(&json!({ "city": input.city, "temp_f": 72 }))
        }
    }
}

#[derive(Deserialize)]
struct SleepInput {
    millis: u64,
}

struct SleepTool {
    name: &'static str,
    schema: Value,
}

impl SleepTool {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            schema: json!({
                "type": "object",
                "properties": { "millis": { "type": "integer" } },
                "required": ["millis"]
            }),
        }
    }
}

impl Tool for SleepTool {
    type Input = SleepInput;

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Sleeps for a while and reports its name"
    }

    fn parameter_schema(&self) -> &Value {
        &self.schema
    }

    fn execute(
        &self,
        input: SleepInput,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let name = self.name;
        async move {
            sleep(Duration::from_millis(input.millis)).await;
            Ok(format!("{name} done").into())
        }
    }
}

struct FailingTool;

impl Tool for FailingTool {
    type Input = Value;

    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameter_schema(&self) -> &Value {
        static SCHEMA: std::sync::OnceLock<Value> = std::sync::OnceLock::new();
        SCHEMA.get_or_init(|| json!({ "type": "object" }))
    }

    fn execute(
        &self,
        _input: Value,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async {
            Err(Error::execution_error().with_reason("service unavailable"))
        }
    }
}

fn weather_provider() -> TestModelProvider {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::with_tool_calls([
        tool_call("call_1", "get_weather_data", r#"{"city":"Austin"}"#),
    ]));
    provider.add_assistant_response_step(PresetResponse::with_text(
        "It's 72°F in Austin.",
    ));
    provider
}

/// Every tool turn must answer a call of the closest assistant turn before
/// it.
fn assert_correlated(turns: &[Turn]) {
    let mut open_calls: Vec<String> = vec![];
    for turn in turns {
        match turn {
            Turn::Assistant { tool_calls, .. } => {
                open_calls =
                    tool_calls.iter().map(|call| call.id.clone()).collect();
            }
            Turn::Tool { tool_call_id, .. } => {
                assert!(
                    open_calls.contains(tool_call_id),
                    "dangling tool turn `{tool_call_id}`"
                );
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_weather_round_trip() {
    let provider = weather_provider();
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(WeatherTool::new())
        .build();

    let output = agent.run("Weather in Austin?").await.unwrap();
    assert_eq!(output.answer(), "It's 72°F in Austin.");

    let turns = output.conversation().turns();
    assert_eq!(turns.len(), 5);
    assert!(matches!(turns[0], Turn::System { .. }));
    assert_eq!(turns[1], Turn::user("Weather in Austin?"));
    assert_eq!(turns[2].tool_calls().len(), 1);
    assert_eq!(turns[2].tool_calls()[0].id, "call_1");
    assert_eq!(
        turns[3],
        Turn::tool(
            "call_1",
            "get_weather_data",
            r#"{"city":"Austin","temp_f":72}"#
        )
    );
    assert_eq!(turns[4], Turn::assistant("It's 72°F in Austin."));

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "get_weather_data");
    for request in &requests {
        assert_correlated(&request.messages);
    }
}

#[tokio::test]
async fn test_immediate_answer() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::with_text("Hello!"));
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(WeatherTool::new())
        .build();

    let output = agent.run("Hi").await.unwrap();
    assert_eq!(output.answer(), "Hello!");
    assert_eq!(output.conversation().len(), 3);
    assert_eq!(
        output.conversation().last(),
        Some(&Turn::assistant("Hello!"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_tools_keep_request_order() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::with_tool_calls([
        tool_call("call_a", "slow", r#"{"millis":50}"#),
        tool_call("call_b", "fast", r#"{"millis":10}"#),
    ]));
    provider.add_assistant_response_step(PresetResponse::with_text("Done."));
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(SleepTool::new("slow"))
        .with_tool(SleepTool::new("fast"))
        .build();

    let start = Instant::now();
    let output = agent.run("Go").await.unwrap();
    // Sequential execution would take at least 60ms.
    assert!(start.elapsed() < Duration::from_millis(60));

    let turns = output.conversation().turns();
    assert_eq!(turns.len(), 6);
    assert_eq!(turns[3], Turn::tool("call_a", "slow", "slow done"));
    assert_eq!(turns[4], Turn::tool("call_b", "fast", "fast done"));
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::with_tool_calls([
        tool_call("call_1", "get_stock_price", r#"{"symbol":"ACME"}"#),
    ]));
    provider.add_assistant_response_step(PresetResponse::with_text(
        "I can't look that up.",
    ));
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(WeatherTool::new())
        .build();

    let output = agent.run("ACME price?").await.unwrap();
    assert_eq!(output.answer(), "I can't look that up.");

    let turns = output.conversation().turns();
    let Turn::Tool { content, .. } = &turns[3] else {
        panic!("expected a tool turn, got {:?}", turns[3]);
    };
    assert!(content.starts_with("Error:"));
    assert!(content.contains("get_stock_price"));

    // The model saw the error in the second request.
    let requests = provider.requests();
    assert_eq!(requests[1].messages.last(), Some(&turns[3]));
}

#[tokio::test]
async fn test_failing_and_malformed_tools_are_not_fatal() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::with_tool_calls([
        tool_call("call_1", "lookup", "{}"),
        tool_call("call_2", "get_weather_data", "{not json"),
    ]));
    provider.add_assistant_response_step(PresetResponse::with_text("Sorry."));
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(FailingTool)
        .with_tool(WeatherTool::new())
        .build();

    let output = agent.run("Try").await.unwrap();
    let turns = output.conversation().turns();
    assert_eq!(
        turns[3].content(),
        Some("Error: Execution error: service unavailable")
    );
    let content = turns[4].content().unwrap();
    assert!(content.starts_with("Error: Malformed arguments"));
}

#[tokio::test]
async fn test_turn_limit() {
    let mut provider = TestModelProvider::default();
    for idx in 0..3 {
        provider.add_assistant_response_step(PresetResponse::with_tool_calls(
            [tool_call(
                format!("call_{idx}"),
                "get_weather_data",
                r#"{"city":"Austin"}"#,
            )],
        ));
    }
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(WeatherTool::new())
        .with_max_turns(2)
        .build();

    let err = agent.run("Loop forever").await.unwrap_err();
    assert_eq!(err.kind(), RunErrorKind::TurnLimitExceeded);
    assert_eq!(provider.requests().len(), 2);
    // system, user and two tool rounds
    assert_eq!(err.conversation().len(), 6);
    assert_correlated(err.conversation().turns());
}

#[tokio::test(start_paused = true)]
async fn test_timeout() {
    let mut provider = weather_provider();
    provider.set_delay(Duration::from_secs(10));
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(WeatherTool::new())
        .with_timeout(Duration::from_secs(1))
        .build();

    let start = Instant::now();
    let err = agent.run("Weather in Austin?").await.unwrap_err();
    assert_eq!(err.kind(), RunErrorKind::Timeout);
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(err.conversation().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_while_tools_run() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::with_tool_calls([
        tool_call("call_1", "slow", r#"{"millis":5000}"#),
    ]));
    provider.add_assistant_response_step(PresetResponse::with_text("Done."));
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(SleepTool::new("slow"))
        .with_timeout(Duration::from_secs(1))
        .build();

    let start = Instant::now();
    let err = agent.run("Go").await.unwrap_err();
    assert_eq!(err.kind(), RunErrorKind::Timeout);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(provider.requests().len(), 1);
    // system, user and the assistant turn whose tools never finished
    assert_eq!(err.conversation().len(), 3);
}

#[tokio::test]
async fn test_huge_timeout_means_no_deadline() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::with_text("Hello!"));
    let agent = AgentBuilder::with_model_provider(provider)
        .with_timeout(Duration::MAX)
        .build();

    let output = agent.run("Hi").await.unwrap();
    assert_eq!(output.answer(), "Hello!");
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline_overrides_timeout() {
    let mut provider = weather_provider();
    provider.set_delay(Duration::from_secs(2));
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(WeatherTool::new())
        .with_timeout(Duration::from_secs(60))
        .build();

    let options = RunOptions::default()
        .with_deadline(Instant::now() + Duration::from_secs(3));
    let err = agent
        .run_with("Weather in Austin?", options)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RunErrorKind::Timeout);
    // The first call made it, the second didn't.
    assert_eq!(err.conversation().len(), 4);
}

#[tokio::test]
async fn test_provider_failure() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(
        PresetResponse::with_text("Hello!").with_failures(0),
    );
    let agent = AgentBuilder::with_model_provider(provider).build();

    let err = agent.run("Hi").await.unwrap_err();
    assert_eq!(
        err.kind(),
        RunErrorKind::Provider(ErrorKind::RateLimitExceeded)
    );
    let turns = err.conversation().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1], Turn::user("Hi"));
    assert!(err.to_string().starts_with("Provider error"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_transient_failures() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(
        PresetResponse::with_text("Hello!").with_failures(2),
    );
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_retry_policy(RetryPolicy::with_max_retries(3))
        .build();

    let output = agent.run("Hi").await.unwrap();
    assert_eq!(output.answer(), "Hello!");
    assert_eq!(provider.requests().len(), 3);
}

#[tokio::test]
async fn test_empty_response() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::default());
    let agent = AgentBuilder::with_model_provider(provider).build();

    let err = agent.run("Hi").await.unwrap_err();
    assert_eq!(err.kind(), RunErrorKind::EmptyResponse);
    assert_eq!(err.conversation().len(), 3);
}

#[tokio::test]
async fn test_extra_instructions() {
    let provider = weather_provider();
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_system_prompt("You are a weather bot.")
        .with_tool(WeatherTool::new())
        .build();

    let options =
        RunOptions::default().with_instructions("Answer in Fahrenheit.");
    agent.run_with("Weather in Austin?", options).await.unwrap();

    let requests = provider.requests();
    assert_eq!(
        requests[0].messages[0],
        Turn::system("You are a weather bot.\n\nAnswer in Fahrenheit.")
    );
}

#[tokio::test]
async fn test_forced_tool_choice_applies_to_first_call() {
    let provider = weather_provider();
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(WeatherTool::new())
        .build();

    let options = RunOptions::default()
        .with_tool_choice(ToolChoice::function("get_weather_data"));
    agent.run_with("Weather in Austin?", options).await.unwrap();

    let requests = provider.requests();
    assert_eq!(
        requests[0].tool_choice,
        ToolChoice::function("get_weather_data")
    );
    assert_eq!(requests[1].tool_choice, ToolChoice::Auto);
}

#[tokio::test]
async fn test_response_format_is_sent_on_every_call() {
    let provider = weather_provider();
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(WeatherTool::new())
        .with_response_format(ResponseFormat::JsonObject)
        .build();

    agent.run("Weather in Austin?").await.unwrap();
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|req| {
        req.response_format == Some(ResponseFormat::JsonObject)
    }));
}

#[tokio::test]
async fn test_callbacks() {
    let stages = Arc::new(Mutex::new(vec![]));
    let roles = Arc::new(Mutex::new(vec![]));
    let agent = AgentBuilder::with_model_provider(weather_provider())
        .with_tool(WeatherTool::new())
        .on_stage({
            let stages = Arc::clone(&stages);
            move |stage| stages.lock().unwrap().push(stage)
        })
        .on_turn({
            let roles = Arc::clone(&roles);
            move |turn| roles.lock().unwrap().push(turn.role().to_string())
        })
        .build();

    agent.run("Weather in Austin?").await.unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        [
            AgentStage::AwaitingModel,
            AgentStage::ExecutingTools,
            AgentStage::AwaitingModel,
            AgentStage::Done,
        ]
    );
    assert_eq!(
        *roles.lock().unwrap(),
        ["system", "user", "assistant", "tool", "assistant"]
    );
}

#[tokio::test]
async fn test_agent_is_reusable() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_response_step(PresetResponse::with_text("Hello!"));
    let agent = AgentBuilder::with_model_provider(provider).build();

    let first = agent.run("Hi").await.unwrap();
    let second = agent.clone().run("Hi again").await.unwrap();
    assert_eq!(first.conversation().len(), 3);
    assert_eq!(second.conversation().len(), 3);
    assert_eq!(second.conversation().turns()[1], Turn::user("Hi again"));
}
