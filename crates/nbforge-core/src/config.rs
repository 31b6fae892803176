//! Run configuration

use crate::error::NbforgeError;
use nbforge_extract::{DEFAULT_INDENT, DEFAULT_MAX_DEPTH};
use nbforge_io::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the project directory for import resolution
pub const PROJECT_DIR_ENV: &str = "NBFORGE_PROJECT_DIR";

/// Older name of [`PROJECT_DIR_ENV`], still honoured
pub const LEGACY_PROJECT_DIR_ENV: &str = "ROOT_PROJECT_DIR";

/// nbforge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NbforgeConfig {
    /// Root searched for files satisfying missing imports
    pub project_dir: Option<PathBuf>,
    /// Maximum transitive import expansion depth
    pub max_resolve_depth: usize,
    /// Indentation of extracted unit bodies
    pub unit_indent: String,
    /// Engine used when a run names none
    pub default_engine: String,
    /// Python executable probed for module availability
    pub python: String,
    /// Jupyter executable driven by the `nbconvert` engine
    pub jupyter: String,
    /// Storage backends
    pub storage: StorageConfig,
}

impl Default for NbforgeConfig {
    fn default() -> Self {
        Self {
            project_dir: None,
            max_resolve_depth: DEFAULT_MAX_DEPTH,
            unit_indent: DEFAULT_INDENT.to_string(),
            default_engine: "nbconvert".to_string(),
            python: "python3".to_string(),
            jupyter: "jupyter".to_string(),
            storage: StorageConfig::default(),
        }
    }
}

impl NbforgeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML configuration; missing keys keep their defaults
    ///
    /// # Errors
    ///
    /// Returns `NbforgeError::Config` for malformed TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, NbforgeError> {
        toml::from_str(text).map_err(|e| NbforgeError::Config(e.to_string()))
    }

    /// Load TOML configuration from a file
    ///
    /// # Errors
    ///
    /// Returns `NbforgeError::Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, NbforgeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| NbforgeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// With project directory
    #[inline]
    #[must_use]
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// With maximum import resolution depth
    #[inline]
    #[must_use]
    pub fn with_max_resolve_depth(mut self, depth: usize) -> Self {
        self.max_resolve_depth = depth;
        self
    }

    /// With default engine
    #[inline]
    #[must_use]
    pub fn with_default_engine(mut self, engine: impl Into<String>) -> Self {
        self.default_engine = engine.into();
        self
    }

    /// With unit indentation
    #[inline]
    #[must_use]
    pub fn with_unit_indent(mut self, indent: impl Into<String>) -> Self {
        self.unit_indent = indent.into();
        self
    }

    /// With storage configuration
    #[inline]
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Project directory from configuration, then the environment
    #[must_use]
    pub fn resolved_project_dir(&self) -> Option<PathBuf> {
        self.project_dir.clone().or_else(|| {
            [PROJECT_DIR_ENV, LEGACY_PROJECT_DIR_ENV]
                .iter()
                .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
                .map(PathBuf::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NbforgeConfig::new();
        assert_eq!(config.max_resolve_depth, 8);
        assert_eq!(config.unit_indent, "    ");
        assert_eq!(config.default_engine, "nbconvert");
        assert_eq!(config.python, "python3");
    }

    #[test]
    fn partial_toml() {
        let config = NbforgeConfig::from_toml_str(
            r#"
            project_dir = "/srv/project"
            default_engine = "passthrough"

            [storage]
            timeout_secs = 5

            [storage.retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.project_dir.as_deref(), Some(Path::new("/srv/project")));
        assert_eq!(config.default_engine, "passthrough");
        assert_eq!(config.storage.timeout_secs, 5);
        assert_eq!(config.storage.retry.max_attempts, 5);
        assert_eq!(config.max_resolve_depth, 8);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            NbforgeConfig::from_toml_str("max_resolve_depth = \"deep\""),
            Err(NbforgeError::Config(_))
        ));
    }

    #[test]
    fn configured_project_dir_wins() {
        let config = NbforgeConfig::new().with_project_dir("/explicit");
        assert_eq!(config.resolved_project_dir(), Some(PathBuf::from("/explicit")));
    }
}
