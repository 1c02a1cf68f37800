use std::env;
use std::fmt::{self, Debug};

/// Credentials of the built-in tools.
///
/// Tools whose credentials are missing are left out of the session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ToolsConfig {
    weather_api_key: Option<String>,
    airtable_api_key: Option<String>,
    airtable_base_id: Option<String>,
}

impl ToolsConfig {
    /// Reads `WEATHERAPI_KEY`, `AIRTABLE_API_KEY` and `AIRTABLE_BASE_ID`
    /// from the environment.
    pub fn from_env() -> Self {
        Self {
            weather_api_key: non_empty_var("WEATHERAPI_KEY"),
            airtable_api_key: non_empty_var("AIRTABLE_API_KEY"),
            airtable_base_id: non_empty_var("AIRTABLE_BASE_ID"),
        }
    }

    /// Sets the WeatherAPI key.
    #[inline]
    pub fn with_weather_api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.weather_api_key = Some(key.into());
        self
    }

    /// Sets the Airtable key and the base to inspect.
    #[inline]
    pub fn with_airtable<S1, S2>(mut self, api_key: S1, base_id: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.airtable_api_key = Some(api_key.into());
        self.airtable_base_id = Some(base_id.into());
        self
    }

    pub(crate) fn weather_api_key(&self) -> Option<&str> {
        self.weather_api_key.as_deref()
    }

    pub(crate) fn airtable(&self) -> Option<(&str, &str)> {
        Some((
            self.airtable_api_key.as_deref()?,
            self.airtable_base_id.as_deref()?,
        ))
    }
}

impl Debug for ToolsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ToolsConfig")
            .field("weather_api_key", &redact(&self.weather_api_key))
            .field("airtable_api_key", &redact(&self.airtable_api_key))
            .field("airtable_base_id", &self.airtable_base_id)
            .finish()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airtable_needs_both_values() {
        let config = ToolsConfig::default();
        assert_eq!(config.airtable(), None);

        let config = config.with_airtable("pat-secret", "app123");
        assert_eq!(config.airtable(), Some(("pat-secret", "app123")));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = ToolsConfig::default()
            .with_weather_api_key("weather-secret")
            .with_airtable("pat-secret", "app123");
        let debug = format!("{config:?}");
        assert!(!debug.contains("weather-secret"));
        assert!(!debug.contains("pat-secret"));
        assert!(debug.contains("app123"));
    }
}
