//! Codec configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ConfigError;

/// Largest dynamic length (bytes or elements) the decoder will read.
pub const DEFAULT_MAX_LENGTH: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodingMode {
    /// Definitions resolved, code requested, enums and contracts classified.
    #[default]
    Full,
    /// Types reduced to their ABI form; no code requests.
    Abi,
}

/// Knobs shared by every decoding started from this config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Mask bad padding instead of reporting it
    #[serde(default)]
    pub permissive_padding: bool,
    /// Promote every embedded error to a fatal stop, and reject lengths
    /// that run past the end of the data
    #[serde(default)]
    pub strict_abi: bool,
    /// Dynamic lengths above this raise an error instead of being read
    #[serde(default = "default_max_length")]
    pub max_length: u64,
    /// Whether calldata and event decoding retry in abi mode
    #[serde(default = "bool_true")]
    pub allow_retry: bool,
    #[serde(default)]
    pub mode: DecodingMode,
}

fn default_max_length() -> u64 { DEFAULT_MAX_LENGTH }
fn bool_true() -> bool { true }

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            permissive_padding: false,
            strict_abi: false,
            max_length: DEFAULT_MAX_LENGTH,
            allow_retry: true,
            mode: DecodingMode::Full,
        }
    }
}

impl CodecConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            Some("json") => Self::from_json_str(&raw),
            other => Err(ConfigError::Invalid {
                reason: format!("unsupported config extension {other:?}"),
            }),
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict_abi = true;
        self
    }

    pub fn permissive(mut self) -> Self {
        self.permissive_padding = true;
        self
    }

    pub fn with_mode(mut self, mode: DecodingMode) -> Self {
        self.mode = mode;
        self
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_length == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_length must be positive".into(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = CodecConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CodecConfig::default());
        assert!(config.allow_retry);
        assert_eq!(config.max_length, DEFAULT_MAX_LENGTH);
    }

    #[test]
    fn yaml_overrides() {
        let config =
            CodecConfig::from_yaml_str("strict_abi: true\nmode: abi\nmax_length: 64\n").unwrap();
        assert!(config.strict_abi);
        assert_eq!(config.mode, DecodingMode::Abi);
        assert_eq!(config.max_length, 64);
    }

    #[test]
    fn zero_max_length_is_rejected() {
        assert!(matches!(
            CodecConfig::from_json_str(r#"{"max_length":0}"#),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
