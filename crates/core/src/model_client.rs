use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use backoff::backoff::Backoff;
use tokio::time::sleep;
use tracing::Instrument;
use turnloop_model::{ModelProvider, ModelProviderError, ModelRequest, Turn};

use crate::format::normalize;

type SendRequestResult = Result<Turn, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err)
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the normalized assistant turn.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future drops the pending
    /// provider request.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }

    /// Sends a request, retrying transient failures as the policy allows.
    pub async fn send_request_with_retry(
        &self,
        req: ModelRequest,
        policy: &RetryPolicy,
    ) -> SendRequestResult {
        let mut backoff = policy.backoff();
        let mut retries = 0;
        loop {
            let err = match self.send_request(req.clone()).await {
                Ok(turn) => return Ok(turn),
                Err(err) => err,
            };
            if !err.kind().is_transient() || retries >= policy.max_retries {
                return Err(err);
            }
            let Some(delay) = backoff.next_backoff() else {
                return Err(err);
            };
            retries += 1;
            warn!(
                "model request failed ({err}), retry {retries}/{} in {delay:?}",
                policy.max_retries
            );
            sleep(delay).await;
        }
    }
}

fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let turn = normalize(&resp);
    trace!("got a turn: {turn:?}");
    Ok(turn)
}

/// How transient provider failures (such as rate limiting) are retried
/// before a run gives up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[inline]
    pub fn none() -> Self {
        Self::with_max_retries(0)
    }

    /// A policy that retries up to `max_retries` times with exponential
    /// backoff, starting at 500ms and capped at 10s per wait.
    #[inline]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
        }
    }

    /// Sets the first wait interval.
    #[inline]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the upper bound of a single wait interval.
    #[inline]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Returns the maximum number of retries.
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn backoff(&self) -> ExponentialBackoff {
        // The attempt count bounds the retries, not the elapsed time.
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(None)
            .build()
    }
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use turnloop_model::{ErrorKind, ToolChoice};
    use turnloop_test_model::{PresetResponse, TestModelProvider, tool_call};

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![Turn::user("Hi")],
            tools: vec![],
            tool_choice: ToolChoice::Auto,
            response_format: None,
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_response_step(
            PresetResponse::with_tool_calls([tool_call("call_1", "a", "{}")]),
        );

        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let turn = model_client.send_request(request()).await.unwrap();
            assert_eq!(turn.tool_calls().len(), 1);
            assert_eq!(turn.tool_calls()[0].id, "call_1");
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let err = model_client.send_request(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_response_step(
            PresetResponse::with_text("Hello!").with_failures(2),
        );
        let model_client = ModelClient::new(model_provider.clone());

        let turn = model_client
            .send_request_with_retry(
                request(),
                &RetryPolicy::with_max_retries(3),
            )
            .await
            .unwrap();
        assert_eq!(turn, Turn::assistant("Hello!"));
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_response_step(
            PresetResponse::with_text("Hello!").with_failures(0),
        );
        let model_client = ModelClient::new(model_provider.clone());

        let err = model_client
            .send_request_with_retry(
                request(),
                &RetryPolicy::with_max_retries(2),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_for_permanent_errors() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider.clone());

        let err = model_client
            .send_request_with_retry(
                request(),
                &RetryPolicy::with_max_retries(5),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(model_provider.requests().len(), 1);
    }
}
