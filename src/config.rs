//! Plugin configuration.
//!
//! The configuration blob is decoded once, in `on_configure`, and never
//! changes afterwards. Its `type` field picks one of the fixed behaviors.

use serde::{Deserialize, Deserializer};

/// Upstream cluster used when the configuration names none.
pub const DEFAULT_UPSTREAM: &str = "upstream";

/// Behavior selected by the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    HeaderTests,
    TickTests,
    HttpCallTests,
    FfiTests,
}

impl HandlerType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "headerTests" => Some(HandlerType::HeaderTests),
            "tickTests" => Some(HandlerType::TickTests),
            "httpCallTests" => Some(HandlerType::HttpCallTests),
            "ffiTests" => Some(HandlerType::FfiTests),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerType::HeaderTests => "headerTests",
            HandlerType::TickTests => "tickTests",
            HandlerType::HttpCallTests => "httpCallTests",
            HandlerType::FfiTests => "ffiTests",
        }
    }
}

/// Errors that make the plugin refuse to start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The blob is not valid JSON or not a JSON object.
    #[error("invalid configuration format; expected a json object: {0}")]
    Malformed(String),

    /// `type` is missing or names no known handler.
    #[error("invalid config type: {0:?}")]
    UnknownHandler(String),
}

/// Raw shape of the JSON document. Unknown fields are ignored, and a known
/// field holding anything but a string reads as absent.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    handler_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    function: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    path: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    upstream: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

/// Decoded plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub handler_type: HandlerType,
    /// Foreign function applied to response bodies by `ffiTests`.
    pub function: String,
    /// Outbound `:path` used by `httpCallTests`.
    pub path: String,
    /// Upstream cluster used by `httpCallTests`.
    pub upstream: String,
}

impl PluginConfig {
    /// Decodes a configuration blob.
    ///
    /// Returns `Ok(None)` when no configuration was supplied; the plugin then
    /// starts without a behavior.
    pub fn parse(bytes: Option<&[u8]>) -> Result<Option<Self>, ConfigError> {
        let bytes = match bytes {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(None),
        };

        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(ConfigError::Malformed(format!(
                "top-level value is not an object: {}",
                value
            )));
        }

        let raw: RawConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let name = raw.handler_type.unwrap_or_default();
        let name = name.trim();
        let handler_type = HandlerType::from_name(name)
            .ok_or_else(|| ConfigError::UnknownHandler(name.to_string()))?;

        let upstream = match raw.upstream {
            Some(upstream) if !upstream.is_empty() => upstream,
            _ => DEFAULT_UPSTREAM.to_string(),
        };

        Ok(Some(PluginConfig {
            handler_type,
            function: raw.function.map(|f| f.trim().to_string()).unwrap_or_default(),
            path: raw.path.unwrap_or_default(),
            upstream,
        }))
    }
}
