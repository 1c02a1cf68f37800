use reqwest::Client;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use turnloop_core::tool::{Error as ToolError, Tool, ToolOutput, ToolResult};

use super::{build_url, fetch_json};

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

#[derive(Deserialize, JsonSchema)]
pub struct WeatherToolParameters {
    #[schemars(description = "Name of the city, e.g. \"Austin\".")]
    city: String,
}

/// A tool for looking up the current weather of a city, backed by
/// WeatherAPI.
pub struct WeatherTool {
    client: Client,
    api_key: String,
    base_url: String,
    parameter_schema: Value,
}

impl WeatherTool {
    /// Creates a new weather tool with a WeatherAPI key.
    #[inline]
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        WeatherTool {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            parameter_schema: schema_for!(WeatherToolParameters).to_value(),
        }
    }

    /// Points the tool at another WeatherAPI-compatible server.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Tool for WeatherTool {
    type Input = WeatherToolParameters;

    fn name(&self) -> &str {
        "get_weather_data"
    }

    fn description(&self) -> &str {
        "Get weather data for a specific city"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WeatherToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let url = build_url(
            &self.base_url,
            "current.json",
            &[("key", self.api_key.as_str()), ("q", input.city.trim())],
        );
        async move {
            if input.city.trim().is_empty() {
                return Err(ToolError::execution_error()
                    .with_reason("city must not be empty"));
            }
            let value = fetch_json(client.get(url?)).await?;
            Ok(ToolOutput::Json(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use turnloop_core::tool::ErrorKind as ToolErrorKind;

    use super::*;

    #[test]
    fn test_schema() {
        let tool = WeatherTool::new("key");
        let schema = tool.parameter_schema();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["required"], json!(["city"]));
        assert_eq!(schema["properties"]["city"]["type"], json!("string"));
    }

    #[tokio::test]
    async fn test_empty_city() {
        let tool = WeatherTool::new("key");
        let input = serde_json::from_value(json!({ "city": "  " })).unwrap();
        let err = tool.execute(input).await.unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::ExecutionError);
    }
}
