//! Configuration loading and validation for TableTalk.
//!
//! Loads engine defaults from a TOML file with environment variable
//! overrides. The resulting [`EngineConfig`] is an immutable value
//! threaded into every completion call — there are no module-level
//! mutable globals.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tabletalk_core::Error;
use tracing::debug;

/// Immutable engine defaults.
///
/// Maps directly to `tabletalk.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Provider API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider base URL (any OpenAI-compatible endpoint)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model for completion calls
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default system role content prepended to each window
    #[serde(default = "default_system_role")]
    pub default_system_role: String,

    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default maximum number of messages in one assembled window
    #[serde(default = "default_max_messages")]
    pub default_max_messages: usize,

    /// Maximum tool-resolution rounds per turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Maximum automatic retries after a window-too-long rejection
    #[serde(default = "default_max_length_retries")]
    pub max_length_retries: usize,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_system_role() -> String {
    "You are a helpful assistant.".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_messages() -> usize {
    50
}
fn default_max_tool_rounds() -> usize {
    8
}
fn default_max_length_retries() -> usize {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            default_system_role: default_system_role(),
            default_temperature: default_temperature(),
            default_max_messages: default_max_messages(),
            max_tool_rounds: default_max_tool_rounds(),
            max_length_retries: default_max_length_retries(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_system_role", &self.default_system_role)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_messages", &self.default_max_messages)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("max_length_retries", &self.max_length_retries)
            .finish()
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, apply env overrides, validate.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut config: Self = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            })?;
            toml::from_str(&raw).map_err(|e| Error::Config {
                message: format!("Failed to parse {}: {e}", path.display()),
            })?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `TABLETALK_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("TABLETALK_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("TABLETALK_API_URL") {
            self.api_url = url;
        }
        if let Ok(model) = std::env::var("TABLETALK_MODEL") {
            self.default_model = model;
        }
        if let Ok(temp) = std::env::var("TABLETALK_TEMPERATURE") {
            if let Ok(parsed) = temp.parse() {
                self.default_temperature = parsed;
            }
        }
    }

    /// Validate settings; called once at load time.
    pub fn validate(&self) -> Result<(), Error> {
        if self.default_model.is_empty() {
            return Err(Error::Config {
                message: "default_model must not be empty".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(Error::Config {
                message: format!(
                    "default_temperature {} out of range 0.0..=2.0",
                    self.default_temperature
                ),
            });
        }
        if self.default_max_messages == 0 {
            return Err(Error::Config {
                message: "default_max_messages must be at least 1".into(),
            });
        }
        if self.max_tool_rounds == 0 {
            return Err(Error::Config {
                message: "max_tool_rounds must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tool_rounds, 8);
        assert_eq!(config.max_length_retries, 3);
        assert_eq!(config.default_max_messages, 50);
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            default_model = "gpt-4o-mini"
            default_temperature = 0.2
            max_tool_rounds = 4
            "#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert!((config.default_temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.max_tool_rounds, 4);
        // Unset fields fall back to defaults
        assert_eq!(config.default_max_messages, 50);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
    }

    #[test]
    fn rejects_zero_window() {
        let config = EngineConfig {
            default_max_messages: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let config = EngineConfig {
            default_temperature: 3.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = EngineConfig {
            api_key: Some("sk-secret".into()),
            ..EngineConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
