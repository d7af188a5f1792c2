//! Endpoint configuration.

use crate::error::{EndpointError, EndpointResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

/// Prefix of admin settings that map an external category to a local one.
const CATEGORY_PREFIX: &str = "category-";

/// Default upper bound on payloads per message.
const DEFAULT_MAX_PAYLOADS: usize = 100;

/// Configuration for an endpoint.
///
/// An empty key or secret leaves the endpoint unconfigured: every request
/// gets a "setting not defined" error and fails authentication.
#[derive(Clone, Deserialize)]
#[serde(from = "RawConfig")]
pub struct EndpointConfig {
    /// API key shared with the client.
    pub api_key: String,
    api_secret: Zeroizing<String>,
    /// External category identifier to local category id.
    pub category_map: BTreeMap<String, u64>,
    /// Maximum number of payloads accepted in one message.
    pub max_payloads: usize,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawConfig {
    api_key: String,
    api_secret: String,
    category_map: BTreeMap<String, u64>,
    max_payloads: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            category_map: BTreeMap::new(),
            max_payloads: DEFAULT_MAX_PAYLOADS,
        }
    }
}

impl From<RawConfig> for EndpointConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            api_key: raw.api_key,
            api_secret: Zeroizing::new(raw.api_secret),
            category_map: raw.category_map,
            max_payloads: raw.max_payloads,
        }
    }
}

impl EndpointConfig {
    /// Creates a configuration with the given credentials.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
            category_map: BTreeMap::new(),
            max_payloads: DEFAULT_MAX_PAYLOADS,
        }
    }

    /// Sets the payload limit.
    pub fn with_max_payloads(mut self, max: usize) -> Self {
        self.max_payloads = max;
        self
    }

    /// Maps an external category identifier to a local category id.
    pub fn with_category(mut self, external: impl Into<String>, local: u64) -> Self {
        self.category_map.insert(external.into(), local);
        self
    }

    /// Returns the shared secret.
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// Returns true when both key and secret are set.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// Builds a configuration from raw admin settings.
    ///
    /// `api_key` and `api_secret` are kept as sanitized text.
    /// `category-<external>` entries are kept only when their value is a
    /// non-negative integer. Everything else is dropped.
    pub fn from_settings<I, K, V>(settings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::new("", "");
        for (key, value) in settings {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "api_key" => config.api_key = sanitize_text(value),
                "api_secret" => config.api_secret = Zeroizing::new(sanitize_text(value)),
                _ => {
                    let Some(external) = key.strip_prefix(CATEGORY_PREFIX) else {
                        continue;
                    };
                    if let Ok(local) = value.trim().parse::<u64>() {
                        config.category_map.insert(external.to_string(), local);
                    }
                }
            }
        }
        config
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> EndpointResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        if config.max_payloads == 0 {
            return Err(EndpointError::Config(
                "max_payloads must be at least 1".into(),
            ));
        }
        Ok(config)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("category_map", &self.category_map)
            .field("max_payloads", &self.max_payloads)
            .finish()
    }
}

/// Drops control characters and trims whitespace.
fn sanitize_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
