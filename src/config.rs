//! Configuration for the warden engine.
//!
//! Reads from `.warden/warden.toml`. Every field has a default, so a missing
//! file or a partially filled table still yields a working engine.
//!
//! # Configuration File Format
//!
//! ```toml
//! [limits]
//! max_iterations = 5
//! freshness_window_secs = 1800
//!
//! [paths]
//! test_globs = ["tests/**", "**/*_test.*"]
//! source_globs = ["src/**", "lib/**"]
//! state_globs = [".warden/**"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the config file inside the warden directory.
pub const CONFIG_FILE: &str = "warden.toml";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub limits: LimitsConfig,
    pub paths: PathRules,
}

/// Retry and freshness bounds. Single global values; they apply to every
/// story and every checkpoint kind alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Failed validation attempts allowed per story before rollback is
    /// mandatory
    pub max_iterations: u32,
    /// Maximum age of an evidence artifact before it is rejected as stale
    pub freshness_window_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            freshness_window_secs: 1800,
        }
    }
}

/// Glob patterns classifying the working tree for the phase gate.
///
/// A path is checked against `state_globs` first, then `test_globs`, then
/// `source_globs`; the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathRules {
    pub test_globs: Vec<String>,
    pub source_globs: Vec<String>,
    pub state_globs: Vec<String>,
}

impl Default for PathRules {
    fn default() -> Self {
        Self {
            test_globs: vec![
                "tests/**".to_string(),
                "**/*_test.*".to_string(),
                "**/*.test.*".to_string(),
                "**/test_*.py".to_string(),
            ],
            source_globs: vec!["src/**".to_string(), "lib/**".to_string()],
            state_globs: vec![".warden/**".to_string()],
        }
    }
}

impl WardenConfig {
    /// Load configuration from `<warden_dir>/warden.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load(warden_dir: &Path) -> Result<Self> {
        let path = warden_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: WardenConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to `<warden_dir>/warden.toml`.
    pub fn save(&self, warden_dir: &Path) -> Result<()> {
        let path = warden_dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// The freshness window as a chrono duration.
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.limits.freshness_window_secs as i64)
    }
}
