//! Configuration file support
//!
//! Fusion settings can be loaded from a TOML file.
//!
//! # Config File Locations
//!
//! 1. Path given explicitly (`--config` on the command line)
//! 2. `./graphfuse.toml` (current directory)
//!
//! # Example Config File
//!
//! ```toml
//! [fusion]
//! # Maximum catalog passes before giving up on a fixpoint (default: 10)
//! max_passes = 5
//!
//! # Rules to run, in order (default: whole catalog in registration order)
//! rules = ["MatMulWithBiasSigmoid", "MatMulWithBiasAdd"]
//!
//! # Rules to leave out
//! disabled_rules = ["MatMulWithBiasAdd"]
//!
//! verbose = true
//! ```

use crate::error::ConfigError;
use crate::rules::{Rule, RuleRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name searched in the working directory
pub const CONFIG_FILE_NAME: &str = "graphfuse.toml";

/// Root configuration
///
/// Accepts either a `[fusion]` section or the same keys at the top level; the section wins
/// when both are present.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RootConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fusion: Option<FusionConfig>,

    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub direct: Option<FusionConfig>,
}

/// Fusion configuration loaded from TOML
///
/// All fields are optional. CLI arguments override config file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FusionConfig {
    /// Maximum catalog passes (default: 10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_passes: Option<usize>,

    /// Rules to run, in order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<String>>,

    /// Rules to skip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_rules: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

impl FusionConfig {
    /// Load config from a TOML file, sectioned or direct format
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(path.to_path_buf(), e))?;

        let root: RootConfig = toml::from_str(&contents).map_err(|e| ConfigLoadError::ParseError(path.to_path_buf(), e))?;

        Ok(root.fusion.or(root.direct).unwrap_or_default())
    }

    /// Load `./graphfuse.toml` if it exists
    pub fn find_and_load() -> Result<Option<Self>, ConfigLoadError> {
        Self::find_in(Path::new("."))
    }

    /// Load `graphfuse.toml` from `dir` if it exists
    pub fn find_in(dir: &Path) -> Result<Option<Self>, ConfigLoadError> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Ok(Some(Self::load(&candidate)?));
        }
        Ok(None)
    }

    /// Save config to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigLoadError> {
        let contents = toml::to_string_pretty(self).map_err(ConfigLoadError::SerializeError)?;
        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigLoadError::IoError(path.as_ref().to_path_buf(), e))?;
        Ok(())
    }

    /// Merge with CLI arguments (CLI args take precedence)
    pub fn merge_with_cli(&self, max_passes: Option<usize>, verbose: Option<bool>) -> MergedConfig {
        MergedConfig {
            max_passes: max_passes.or(self.max_passes).unwrap_or(10),
            rules: self.rules.clone(),
            disabled_rules: self.disabled_rules.clone().unwrap_or_default(),
            verbose: verbose.or(self.verbose).unwrap_or(false),
        }
    }
}

/// Merged configuration after combining config file + CLI args
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    pub max_passes: usize,
    /// Explicit rule order; `None` means the whole registry
    pub rules: Option<Vec<String>>,
    pub disabled_rules: Vec<String>,
    pub verbose: bool,
}

impl MergedConfig {
    /// Resolve the configured rules against `registry`, in run order.
    ///
    /// Every name in `rules` and `disabled_rules` must be registered.
    pub fn select_rules<'r>(&self, registry: &'r RuleRegistry) -> Result<Vec<&'r Rule>, ConfigError> {
        for name in &self.disabled_rules {
            registry.require(name)?;
        }

        let enabled = |rule: &&Rule| !self.disabled_rules.iter().any(|d| d == rule.name());
        match &self.rules {
            Some(names) => {
                let selected = names
                    .iter()
                    .map(|name| registry.require(name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(selected.into_iter().filter(enabled).collect())
            }
            None => Ok(registry.iter().filter(enabled).collect()),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Failed to read config file {0}: {1}")]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, #[source] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[source] toml::ser::Error),
}
