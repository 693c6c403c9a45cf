//! Process-wide JSONP options, loadable from TOML.
//!
//! ```toml
//! default_content_type = "application/x-javascript; charset=utf-8"
//!
//! [serializer]
//! formatting = "indented"
//! indent = 4
//!
//! [pool]
//! max_retained = 64
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::JsonpError;

/// Content type used when neither the result nor the response names one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-javascript; charset=utf-8";

/// Whitespace layout of the serialized JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formatting {
    #[default]
    Compact,
    Indented,
}

/// Settings handed to the JSON serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerSettings {
    pub formatting: Formatting,
    /// Spaces per nesting level when `formatting` is `indented`.
    pub indent: usize,
}

impl SerializerSettings {
    pub fn compact() -> Self {
        Self::default()
    }

    pub fn indented(indent: usize) -> Self {
        Self {
            formatting: Formatting::Indented,
            indent,
        }
    }
}

impl Default for SerializerSettings {
    fn default() -> Self {
        Self {
            formatting: Formatting::Compact,
            indent: 2,
        }
    }
}

/// Limits for the shared character buffer pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle buffers kept per kind (chars and bytes).
    pub max_retained: usize,
    /// Characters buffered before transcoding and writing to the body.
    pub char_buffer_size: usize,
    /// Buffers that grew beyond this capacity are dropped on return.
    pub max_buffer_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_retained: 32,
            char_buffer_size: 16 * 1024,
            max_buffer_capacity: 1024 * 1024,
        }
    }
}

/// Options shared by every JSONP execution in the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonpOptions {
    /// Serializer settings used when a result carries none of its own.
    pub serializer: SerializerSettings,
    pub default_content_type: String,
    pub pool: PoolConfig,
}

impl Default for JsonpOptions {
    fn default() -> Self {
        Self {
            serializer: SerializerSettings::default(),
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            pool: PoolConfig::default(),
        }
    }
}

impl JsonpOptions {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, JsonpError> {
        let options: JsonpOptions =
            toml::from_str(content).map_err(|e| JsonpError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), JsonpError> {
        if self.default_content_type.trim().is_empty() {
            return Err(JsonpError::Config(
                "default_content_type must not be empty".to_string(),
            ));
        }
        if self.pool.char_buffer_size == 0 {
            return Err(JsonpError::Config(
                "pool.char_buffer_size must be at least 1".to_string(),
            ));
        }
        if self.pool.max_buffer_capacity < self.pool.char_buffer_size {
            return Err(JsonpError::Config(format!(
                "pool.max_buffer_capacity ({}) is smaller than pool.char_buffer_size ({})",
                self.pool.max_buffer_capacity, self.pool.char_buffer_size
            )));
        }
        Ok(())
    }
}
