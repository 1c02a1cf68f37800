use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use turnloop_core::tool::{Error as ToolError, Tool, ToolOutput, ToolResult};

use super::{build_url, fetch_json};

const DEFAULT_BASE_URL: &str = "https://api.airtable.com/v0";

/// The tool takes no parameters.
#[derive(Deserialize, JsonSchema)]
pub struct AirtableTablesToolParameters {}

/// A tool for listing the tables of an Airtable base, with their fields.
pub struct AirtableTablesTool {
    client: Client,
    api_key: String,
    base_id: String,
    base_url: String,
    parameter_schema: Value,
}

impl AirtableTablesTool {
    /// Creates a new tool for the given base.
    #[inline]
    pub fn new<S1, S2>(api_key: S1, base_id: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        AirtableTablesTool {
            client: Client::new(),
            api_key: api_key.into(),
            base_id: base_id.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            parameter_schema: schema_for!(AirtableTablesToolParameters)
                .to_value(),
        }
    }

    /// Points the tool at another Airtable-compatible server.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Tool for AirtableTablesTool {
    type Input = AirtableTablesToolParameters;

    fn name(&self) -> &str {
        "list_airtable_tables"
    }

    fn description(&self) -> &str {
        "List the tables of the configured Airtable base, including their \
fields and views"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: AirtableTablesToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let path = format!("meta/bases/{}/tables", self.base_id);
        let url = build_url(&self.base_url, &path, &[]);
        let auth = format!("Bearer {}", self.api_key);
        async move {
            let req = client.get(url?).header(AUTHORIZATION, auth);
            let schema = fetch_json(req).await?;
            Ok(ToolOutput::Json(tables(schema)?))
        }
    }
}

fn tables(mut schema: Value) -> Result<Value, ToolError> {
    match schema.get_mut("tables").map(Value::take) {
        Some(tables @ Value::Array(_)) => Ok(tables),
        _ => Err(ToolError::execution_error()
            .with_reason("base schema has no table list")),
    }
}
