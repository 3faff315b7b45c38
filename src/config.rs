//! Decoration sets described in TOML.

use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::decoration::Decoration;
use crate::target::{Target, TargetMatchMode};

/// File looked up in the scanned root when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".treedeco.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read decoration file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse decoration file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRule {
    /// Relative to the scanned root.
    pub path: PathBuf,
    pub mode: TargetMatchMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationSpec {
    pub name: String,
    #[serde(default)]
    pub classnames: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub targets: Vec<TargetRule>,
    #[serde(default)]
    pub negations: Vec<TargetRule>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationConfig {
    #[serde(default, rename = "decoration")]
    pub decorations: Vec<DecorationSpec>,
}

impl DecorationConfig {
    /// `Ok(None)` when the file does not exist.
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::ConfigReadError {
            config_path: config_path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
            config_path: config_path.to_path_buf(),
            source,
        })?;
        Ok(Some(config))
    }
}

impl DecorationSpec {
    /// Builds the decoration, resolving rule paths through `resolve`. Rules
    /// pointing at unknown paths are logged and skipped.
    pub fn build<T, F>(&self, resolve: F) -> Decoration<T>
    where
        T: Target,
        F: Fn(&Path) -> Option<T>,
    {
        let mut decoration = Decoration::new(self.name.clone()).with_classnames(self.classnames.iter().cloned());
        if !self.enabled {
            decoration.disable();
        }
        for rule in &self.targets {
            match resolve(&rule.path) {
                Some(target) => {
                    decoration.add_target(target, rule.mode);
                }
                None => warn!("decoration '{}': target {} not found", self.name, rule.path.display()),
            }
        }
        for rule in &self.negations {
            match resolve(&rule.path) {
                Some(target) => {
                    decoration.add_negated_target(target, rule.mode);
                }
                None => warn!("decoration '{}': negation {} not found", self.name, rule.path.display()),
            }
        }
        decoration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[[decoration]]
name = "sources"
classnames = ["highlight", "bold"]
targets = [{ path = "src", mode = "self_and_children" }]
negations = [{ path = "src/bin", mode = "self" }]

[[decoration]]
name = "docs"
classnames = ["muted"]
enabled = false
targets = [{ path = "docs", mode = "children" }, { path = "missing", mode = "self" }]
"#;

    #[test]
    fn test_parse_sample() {
        let config: DecorationConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.decorations.len(), 2);
        assert_eq!(config.decorations[0].negations[0].mode, TargetMatchMode::SelfOnly);
        assert!(config.decorations[0].enabled);
        assert!(!config.decorations[1].enabled);
    }

    #[test]
    fn test_build_skips_unresolved_paths() {
        let config: DecorationConfig = toml::from_str(SAMPLE).unwrap();
        let resolve = |path: &Path| match path.to_str() {
            Some("src") => Some(1u32),
            Some("src/bin") => Some(2),
            Some("docs") => Some(3),
            _ => None,
        };

        let sources = config.decorations[0].build(resolve);
        assert_eq!(sources.classnames(), ["highlight", "bold"]);
        assert_eq!(sources.applied_mode(&1), Some(TargetMatchMode::SelfAndChildren));
        assert_eq!(sources.negated_mode(&2), Some(TargetMatchMode::SelfOnly));

        let docs = config.decorations[1].build(resolve);
        assert!(!docs.is_enabled());
        assert_eq!(docs.applied_targets().len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let loaded = DecorationConfig::load_from_path(dir.path().join("nope.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[[decoration]]\nclassnames = 3\n").unwrap();

        let err = DecorationConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let original: DecorationConfig = toml::from_str(SAMPLE).unwrap();
        let text = toml::to_string(&original).unwrap();
        let parsed: DecorationConfig = toml::from_str(&text).unwrap();
        assert_eq!(original, parsed);
    }
}
