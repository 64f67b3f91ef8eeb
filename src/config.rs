//! Router configuration.
//!
//! Loaded from `sqlroute.toml`:
//!
//! ```toml
//! [schema]
//! heading_marker = "###"
//!
//! [hints]
//! limit = 3
//! threshold = 65.0
//!
//! [prompt]
//! max_columns = 120
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RouterError, RouterResult};

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "sqlroute.toml";

/// Top-level configuration passed to every component constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub schema: SchemaConfig,
    pub hints: HintConfig,
    pub reconcile: ReconcileConfig,
    pub prompt: PromptConfig,
}

/// Schema description conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    /// Prefix that introduces a table heading line.
    pub heading_marker: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            heading_marker: "###".to_string(),
        }
    }
}

/// Fuzzy hint tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HintConfig {
    /// Maximum number of hints returned (K).
    pub limit: usize,
    /// Minimum partial-ratio score, 0 to 100.
    pub threshold: f64,
    /// Shorter tokens are ignored.
    pub min_token_len: usize,
    /// Best candidates kept per token before thresholding.
    pub per_token_limit: usize,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            limit: 3,
            threshold: 65.0,
            min_token_len: 3,
            per_token_limit: 20,
        }
    }
}

/// Suggestion policy for reconciled decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    pub max_suggestions: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { max_suggestions: 3 }
    }
}

/// Budget for what gets embedded into an oracle prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    pub max_columns: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { max_columns: 120 }
    }
}

impl RouterConfig {
    /// Create a new configuration builder
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::default()
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> RouterResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| RouterError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file.
    pub fn load(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RouterError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loading router config");
        Self::from_toml(&content)
    }

    /// Look for `./sqlroute.toml`, then `<config dir>/sqlroute/config.toml`.
    /// Falls back to defaults when neither exists.
    pub fn discover() -> RouterResult<Self> {
        match Self::candidate_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sqlroute").join("config.toml"));
        }
        paths
    }

    fn validate(&self) -> RouterResult<()> {
        if self.schema.heading_marker.is_empty() {
            return Err(RouterError::config("schema.heading_marker must not be empty"));
        }
        if !(0.0..=100.0).contains(&self.hints.threshold) {
            return Err(RouterError::config(format!(
                "hints.threshold must be within 0..=100, got {}",
                self.hints.threshold
            )));
        }
        Ok(())
    }
}

/// Builder for RouterConfig
#[derive(Debug, Default)]
pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    /// Set the table heading marker
    pub fn heading_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.schema.heading_marker = marker.into();
        self
    }

    /// Set the number of hints returned
    pub fn hint_limit(mut self, limit: usize) -> Self {
        self.config.hints.limit = limit;
        self
    }

    /// Set the minimum match score
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.hints.threshold = threshold;
        self
    }

    /// Set the suggestion cap for reconciled decisions
    pub fn max_suggestions(mut self, max: usize) -> Self {
        self.config.reconcile.max_suggestions = max;
        self
    }

    /// Set the prompt column budget
    pub fn prompt_columns(mut self, max: usize) -> Self {
        self.config.prompt.max_columns = max;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RouterConfig {
        self.config
    }
}
