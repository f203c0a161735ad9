//! Runner configuration file.

use std::path::Path;

use kernelkit_backend::{CompileOptions, Configurable, ContextOptions, QueueOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Device choice plus flat option maps for compilation and submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub device: ContextOptions,
    pub compile: Map<String, Value>,
    pub queue: Map<String, Value>,
}

impl RunnerConfig {
    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn compile_options(&self) -> CompileOptions {
        let mut opts = CompileOptions::default();
        opts.apply_options(&self.compile);
        opts
    }

    pub fn queue_options(&self) -> QueueOptions {
        let mut opts = QueueOptions::default();
        opts.apply_options(&self.queue);
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = RunnerConfig::from_json("{}").unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert_eq!(config.compile_options(), CompileOptions::default());
    }

    #[test]
    fn test_full_config() {
        let config = RunnerConfig::from_json(
            r#"{
                "device": { "name": "Apple M2", "preferred_group_width": 64 },
                "compile": { "label": "fractal", "fooBar": 1 },
                "queue": { "pass_label": "main pass" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.device.name.as_deref(), Some("Apple M2"));
        assert_eq!(config.device.preferred_group_width, 64);
        assert!(!config.device.low_power);

        let compile = config.compile_options();
        assert_eq!(compile.label.as_deref(), Some("fractal"));
        assert!(compile.zero_initialize_workgroup_memory);
        assert_eq!(config.queue_options().pass_label.as_deref(), Some("main pass"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"queue": {"label": "q"}}"#).unwrap();
        let config = RunnerConfig::from_file(&path).unwrap();
        assert_eq!(config.queue_options().label.as_deref(), Some("q"));

        assert!(matches!(
            RunnerConfig::from_file(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(RunnerConfig::from_json("{"), Err(ConfigError::Json(_))));
    }
}
