//! A local fake model for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;
use turnloop_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    Role, ToolCallRequest, Turn,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The raw message returned by [`TestModelProvider`].
///
/// It is deliberately not a [`Turn`], so that callers go through the same
/// normalization as with a real provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestModelResponse {
    content: Option<String>,
    tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse for TestModelResponse {
    #[inline]
    fn role(&self) -> Role {
        Role::Assistant
    }

    #[inline]
    fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[inline]
    fn tool_call_requests(&self) -> Vec<ToolCallRequest> {
        self.tool_calls.clone()
    }
}

#[derive(Default)]
struct SharedState {
    attempts: Vec<u64>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The response is selected by
/// counting the assistant turns already in the request, so the first request
/// of a conversation gets the first step, the request after one tool round
/// gets the second step, and so on. If there are no enough steps in the
/// script, an error will be returned.
///
/// Every received request is recorded and can be inspected with
/// [`TestModelProvider::requests`]. Clones share the records.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<PresetResponse>,
    delay: Option<Duration>,
    state: Arc<Mutex<SharedState>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script.push(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all requests received so far, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.state
            .lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    fn respond(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        let Ok(mut state) = self.state.lock() else {
            return Err(Error {
                message: "state is poisoned",
                kind: ErrorKind::Other,
            });
        };
        state.requests.push(req.clone());

        let step_idx = req
            .messages
            .iter()
            .filter(|turn| matches!(turn, Turn::Assistant { .. }))
            .count();
        let Some(step) = self.conversation_script.get(step_idx) else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };

        if state.attempts.len() <= step_idx {
            state.attempts.resize(step_idx + 1, 0);
        }
        state.attempts[step_idx] += 1;
        let attempt = state.attempts[step_idx];
        match step.failures {
            Some(0) => {
                return Err(Error {
                    message: "always failing step",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            Some(failures) if attempt <= failures => {
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            _ => {}
        }

        Ok(TestModelResponse {
            content: step.content.clone(),
            tool_calls: step.tool_calls.clone(),
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = self.respond(req);
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        async move {
            sleep(delay).await;
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use turnloop_model::{ModelTool, ToolChoice};

    use super::*;

    fn request(messages: Vec<Turn>) -> ModelRequest {
        ModelRequest {
            messages,
            tools: vec![ModelTool {
                name: "get_weather_data".to_owned(),
                description: "Get weather data for a specific city".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "city": { "type": "string" }
                    },
                    "required": ["city"]
                }),
            }],
            tool_choice: ToolChoice::Auto,
            response_format: None,
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(PresetResponse::with_tool_calls(
            [tool_call("call_1", "get_weather_data", r#"{"city":"Austin"}"#)],
        ));
        provider.add_assistant_response_step(PresetResponse::with_text(
            "It's 72°F in Austin.",
        ));

        let mut req = request(vec![Turn::user("Weather in Austin?")]);
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(resp.content(), None);
        let calls = resp.tool_call_requests();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather_data");

        req.messages.push(Turn::Assistant {
            content: None,
            tool_calls: calls.into_iter().map(Into::into).collect(),
        });
        req.messages.push(Turn::tool(
            "call_1",
            "get_weather_data",
            r#"{"temp_f":72}"#,
        ));
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(resp.content(), Some("It's 72°F in Austin."));
        assert!(resp.tool_call_requests().is_empty());

        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(
            PresetResponse::with_text("Hi").with_failures(2),
        );

        let req = request(vec![Turn::user("Hello")]);
        for _ in 0..2 {
            let err = provider.send_request(&req).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(resp.content(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_script_exhausted() {
        let provider = TestModelProvider::default();
        let req = request(vec![Turn::user("Hello")]);
        let err = provider.send_request(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(PresetResponse::with_text("Hi"));
        provider.set_delay(Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        let req = request(vec![Turn::user("Hello")]);
        provider.send_request(&req).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
