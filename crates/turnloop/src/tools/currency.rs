use reqwest::Client;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use turnloop_core::tool::{Error as ToolError, Tool, ToolOutput, ToolResult};

use super::{build_url, fetch_json};

const DEFAULT_BASE_URL: &str = "https://open.er-api.com/v6";

#[derive(Deserialize, JsonSchema)]
pub struct CurrencyToolParameters {
    #[schemars(description = "The amount of money to convert.")]
    amount: f64,
    #[schemars(description = "ISO 4217 code of the source currency, e.g. USD.")]
    from: String,
    #[schemars(description = "ISO 4217 code of the target currency, e.g. EUR.")]
    to: String,
}

#[derive(Debug, PartialEq, Serialize)]
struct Conversion {
    amount: f64,
    from: String,
    to: String,
    rate: f64,
    converted: f64,
}

/// A tool for converting an amount between two currencies with the latest
/// exchange rates.
pub struct CurrencyTool {
    client: Client,
    base_url: String,
    parameter_schema: Value,
}

impl CurrencyTool {
    /// Creates a new currency tool.
    #[inline]
    pub fn new() -> Self {
        CurrencyTool {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            parameter_schema: schema_for!(CurrencyToolParameters).to_value(),
        }
    }

    /// Points the tool at another exchange-rate server.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for CurrencyTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CurrencyTool {
    type Input = CurrencyToolParameters;

    fn name(&self) -> &str {
        "convert_currency"
    }

    fn description(&self) -> &str {
        "Convert an amount of money from one currency to another using the \
latest exchange rates"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: CurrencyToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let lookup = currency_code(&input.from).and_then(|from| {
            let to = currency_code(&input.to)?;
            let path = format!("latest/{from}");
            let url = build_url(&self.base_url, &path, &[])?;
            Ok((url, from, to))
        });
        let amount = input.amount;
        async move {
            let (url, from, to) = lookup?;
            let rates = fetch_json(client.get(url)).await?;
            let conversion = convert(&rates, amount, from, to)?;
            ToolOutput::json(&conversion)
        }
    }
}

/// Checks that the value is a three-letter currency code and uppercases it.
fn currency_code(code: &str) -> Result<String, ToolError> {
    let code = code.trim();
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        let reason = format!("`{code}` is not an ISO 4217 currency code");
        return Err(ToolError::malformed_arguments().with_reason(reason));
    }
    Ok(code.to_ascii_uppercase())
}

fn convert(
    rates: &Value,
    amount: f64,
    from: String,
    to: String,
) -> Result<Conversion, ToolError> {
    if rates["result"] != "success" {
        let reason = rates["error-type"].as_str().unwrap_or("unknown error");
        return Err(ToolError::execution_error()
            .with_reason(format!("rate lookup for {from} failed: {reason}")));
    }
    let Some(rate) = rates["rates"][&to].as_f64() else {
        return Err(ToolError::execution_error()
            .with_reason(format!("no exchange rate from {from} to {to}")));
    };
    Ok(Conversion {
        amount,
        from,
        to,
        rate,
        converted: (amount * rate * 100.0).round() / 100.0,
    })
}
