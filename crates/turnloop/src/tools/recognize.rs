use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use turnloop_core::tool::{Error as ToolError, Tool, ToolOutput, ToolResult};
use turnloop_core::{Agent, AgentBuilder};
use turnloop_model::{ModelProvider, ResponseFormat};

const CLASSIFIER_PROMPT: &str = "You classify chat messages. Decide whether \
the user wants weather information and, if so, extract the location and the \
date they mention. Answer with a JSON object with the keys \"intent\" \
(\"get_weather\" or \"other\"), \"location\" and \"date\", using an empty \
string for anything the message does not mention. Return nothing but the \
JSON object.";

#[derive(Deserialize, JsonSchema)]
pub struct RecognizeWeatherToolParameters {
    #[schemars(description = "The user's message, verbatim.")]
    user_input: String,
}

/// A tool that asks the model, in JSON mode, whether a message is a weather
/// request and where and when it is about.
pub struct RecognizeWeatherTool {
    classifier: Agent,
    parameter_schema: Value,
}

impl RecognizeWeatherTool {
    /// Creates a new tool that classifies messages with the given model.
    pub fn new<M: ModelProvider + 'static>(provider: M) -> Self {
        let classifier = AgentBuilder::with_model_provider(provider)
            .with_system_prompt(CLASSIFIER_PROMPT)
            .with_response_format(ResponseFormat::JsonObject)
            .with_max_turns(1)
            .build();
        RecognizeWeatherTool {
            classifier,
            parameter_schema: schema_for!(RecognizeWeatherToolParameters)
                .to_value(),
        }
    }
}

impl Tool for RecognizeWeatherTool {
    type Input = RecognizeWeatherToolParameters;

    fn name(&self) -> &str {
        "recognize_weather_request"
    }

    fn description(&self) -> &str {
        "Analyze user input to determine if it's a weather request and \
extract location and date"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: RecognizeWeatherToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let classifier = self.classifier.clone();
        async move {
            let message = format!("Message: \"{}\"", input.user_input);
            let output = classifier.run(message).await.map_err(|err| {
                ToolError::execution_error()
                    .with_reason(format!("classification failed: {err}"))
            })?;
            match serde_json::from_str(output.answer()) {
                Ok(value @ Value::Object(_)) => Ok(ToolOutput::Json(value)),
                _ => Err(ToolError::execution_error().with_reason(format!(
                    "the model did not answer with a JSON object: {}",
                    output.answer()
                ))),
            }
        }
    }
}
