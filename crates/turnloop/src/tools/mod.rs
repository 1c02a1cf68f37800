//! A set of built-in tools that models can use.

mod airtable;
mod currency;
mod recognize;
mod weather;

use reqwest::{RequestBuilder, StatusCode, Url};
use serde_json::Value;
use turnloop_core::tool::Error as ToolError;

pub use airtable::AirtableTablesTool;
pub use currency::CurrencyTool;
pub use recognize::RecognizeWeatherTool;
pub use weather::WeatherTool;

/// Builds a URL with query parameters, rejecting malformed base URLs.
fn build_url(
    base_url: &str,
    path: &str,
    params: &[(&str, &str)],
) -> Result<Url, ToolError> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&url).map_err(|err| {
        ToolError::execution_error()
            .with_reason(format!("invalid URL `{url}`: {err}"))
    })?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// Sends the request and decodes a JSON body.
async fn fetch_json(req: RequestBuilder) -> Result<Value, ToolError> {
    let resp = req.send().await.map_err(|err| {
        ToolError::execution_error().with_reason(format!("{err}"))
    })?;
    let status = resp.status();
    if status != StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(ToolError::execution_error()
            .with_reason(format!("service answered {status}: {body}")));
    }
    resp.json::<Value>().await.map_err(|err| {
        ToolError::execution_error()
            .with_reason(format!("undecodable response: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let url = build_url(
            "https://api.weatherapi.com/v1/",
            "current.json",
            &[("key", "k"), ("q", "San José")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.weatherapi.com/v1/current.json?key=k&q=San+Jos%C3%A9"
        );
    }

    #[test]
    fn test_build_url_without_params() {
        let url =
            build_url("https://open.er-api.com/v6", "latest/USD", &[]).unwrap();
        assert_eq!(url.as_str(), "https://open.er-api.com/v6/latest/USD");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_build_url_rejects_garbage() {
        assert!(build_url("not a url", "x", &[]).is_err());
    }
}
