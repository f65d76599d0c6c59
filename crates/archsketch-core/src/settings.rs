use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Direction, ImageFormat, NodeTypeSet};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl SettingsError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Read-only configuration shared by every generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// `llm` backend name ("openai", "anthropic", "google", ...) or "mock"
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on a single model call
    pub request_timeout_secs: u64,
    /// Model calls per generation, counting the first one
    pub max_attempts: u32,
    pub supported_node_types: NodeTypeSet,
    pub use_mock: bool,
    pub direction: Direction,
    pub format: ImageFormat,
    /// Graphviz `dot` binary. Looked up on PATH when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            model: String::new(),
            temperature: 0.3,
            max_tokens: 4096,
            request_timeout_secs: 30,
            max_attempts: 3,
            supported_node_types: NodeTypeSet::default(),
            use_mock: false,
            direction: Direction::default(),
            format: ImageFormat::default(),
            dot_path: None,
            log_level: "info".to_string(),
        }
    }
}

// --- Storage ---

/// Resolve the global config directory (~/.archsketch/).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".archsketch")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

impl Settings {
    /// Settings file, then `ARCHSKETCH_*` environment overrides, then validation.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::read_from(&settings_path())?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from `path`. A missing file yields the defaults.
    pub fn read_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings to `path` atomically (temp file + rename).
    pub fn write_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)
    }

    /// Apply `ARCHSKETCH_*` overrides. `lookup` returns the variable's value, if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ARCHSKETCH_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = lookup("ARCHSKETCH_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("ARCHSKETCH_MODEL") {
            self.model = v;
        }
        if let Some(v) = lookup("ARCHSKETCH_MAX_ATTEMPTS") {
            self.max_attempts = v.trim().parse().map_err(|_| {
                SettingsError::invalid("ARCHSKETCH_MAX_ATTEMPTS", format!("'{v}' is not a positive integer"))
            })?;
        }
        if let Some(v) = lookup("ARCHSKETCH_SUPPORTED_NODES") {
            self.supported_node_types =
                NodeTypeSet::new(v.split(',').map(str::trim).filter(|s| !s.is_empty()));
        }
        if let Some(v) = lookup("ARCHSKETCH_USE_MOCK") {
            self.use_mock = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = lookup("ARCHSKETCH_LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_attempts == 0 {
            return Err(SettingsError::invalid("maxAttempts", "must be at least 1"));
        }
        if self.supported_node_types.is_empty() {
            return Err(SettingsError::invalid("supportedNodeTypes", "must list at least one node type"));
        }
        if self.supported_node_types.iter().any(|t| t.trim().is_empty()) {
            return Err(SettingsError::invalid("supportedNodeTypes", "entries must not be blank"));
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::invalid("requestTimeoutSecs", "must be at least 1"));
        }
        Ok(())
    }

    /// Whether a real model provider can be called with these settings.
    pub fn ai_configured(&self) -> bool {
        !self.provider.is_empty()
            && !self.model.is_empty()
            && (self.provider == "ollama" || !self.api_key.is_empty())
    }

    pub fn mock_mode(&self) -> bool {
        self.use_mock || self.provider == "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::read_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.supported_node_types, NodeTypeSet::default());
    }

    #[test]
    fn write_then_read_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            provider: "anthropic".into(),
            api_key: "k".into(),
            model: "claude".into(),
            max_attempts: 5,
            supported_node_types: NodeTypeSet::new(["EC2", "S3"]),
            format: ImageFormat::Svg,
            direction: Direction::TopBottom,
            ..Settings::default()
        };
        settings.write_to(&path).unwrap();
        assert_eq!(Settings::read_from(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"provider":"ollama","model":"llama3","direction":"TB"}"#).unwrap();
        let settings = Settings::read_from(&path).unwrap();
        assert_eq!(settings.direction, Direction::TopBottom);
        assert_eq!(settings.max_tokens, 4096);
        assert!(settings.ai_configured());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(Settings::read_from(&path), Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("ARCHSKETCH_PROVIDER", "openai"),
                ("ARCHSKETCH_MAX_ATTEMPTS", " 4 "),
                ("ARCHSKETCH_SUPPORTED_NODES", "EC2, Lambda,,S3"),
                ("ARCHSKETCH_USE_MOCK", "TRUE"),
            ]))
            .unwrap();
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.max_attempts, 4);
        assert_eq!(settings.supported_node_types.to_string(), "EC2, Lambda, S3");
        assert!(settings.mock_mode());
    }

    #[test]
    fn bad_attempt_override_is_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(env(&[("ARCHSKETCH_MAX_ATTEMPTS", "three")]))
            .unwrap_err();
        assert!(err.to_string().contains("ARCHSKETCH_MAX_ATTEMPTS"));
    }

    #[test]
    fn validation_rejects_zero_attempts_and_empty_types() {
        let zero = Settings {
            max_attempts: 0,
            ..Settings::default()
        };
        assert!(zero.validate().is_err());

        let empty = Settings {
            supported_node_types: NodeTypeSet::new(Vec::<String>::new()),
            ..Settings::default()
        };
        assert!(empty.validate().is_err());

        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn hosted_providers_need_a_key() {
        let settings = Settings {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            ..Settings::default()
        };
        assert!(!settings.ai_configured());
    }
}
