//! Configuration management
//!
//! Holds the engine tuning knobs (K-factor, difficulty bands, improvement
//! factors, default baselines) and the storage location. Everything is
//! injected into the engine at construction.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::profile::SkillLevels;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Recommendation and rating parameters
    #[serde(default)]
    pub engine: EngineConfig,
    /// Database location
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Parameters for the rating math, filter, ranker and feedback loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rating update step size
    #[serde(default = "default_k_factor")]
    pub k_factor: f64,
    /// Rating assigned to learners and lessons with no stored rating
    #[serde(default = "default_baseline_rating")]
    pub baseline_rating: i32,
    /// Half-width of the first difficulty band around the learner rating
    #[serde(default = "default_primary_band")]
    pub primary_band: i32,
    /// Half-width of the fallback band when the first one is empty
    #[serde(default = "default_widened_band")]
    pub widened_band: i32,
    /// Maximum number of recommendations returned
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Proficiency step applied (times lesson weight) on a pass
    #[serde(default = "default_pass_improvement")]
    pub pass_improvement: f64,
    /// Proficiency step applied (times lesson weight) on a fail
    #[serde(default = "default_fail_improvement")]
    pub fail_improvement: f64,
    /// Skill weights for lessons that have none stored
    #[serde(default = "default_weights")]
    pub default_weights: SkillLevels,
    /// Proficiency for learners that have none stored
    #[serde(default)]
    pub default_proficiency: f64,
}

fn default_k_factor() -> f64 {
    32.0
}

fn default_baseline_rating() -> i32 {
    1500
}

fn default_primary_band() -> i32 {
    150
}

fn default_widened_band() -> i32 {
    300
}

fn default_top_k() -> usize {
    5
}

fn default_pass_improvement() -> f64 {
    0.05
}

fn default_fail_improvement() -> f64 {
    -0.02
}

fn default_weights() -> SkillLevels {
    SkillLevels::new(0.33, 0.33, 0.34)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k_factor: default_k_factor(),
            baseline_rating: default_baseline_rating(),
            primary_band: default_primary_band(),
            widened_band: default_widened_band(),
            top_k: default_top_k(),
            pass_improvement: default_pass_improvement(),
            fail_improvement: default_fail_improvement(),
            default_weights: default_weights(),
            default_proficiency: 0.0,
        }
    }
}

impl EngineConfig {
    /// Reject parameter combinations the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if !(self.k_factor > 0.0) {
            anyhow::bail!("k_factor must be positive, got {}", self.k_factor);
        }
        if self.baseline_rating < 0 {
            anyhow::bail!("baseline_rating must not be negative, got {}", self.baseline_rating);
        }
        if self.primary_band < 0 {
            anyhow::bail!("primary_band must not be negative, got {}", self.primary_band);
        }
        if self.widened_band < self.primary_band {
            anyhow::bail!(
                "widened_band ({}) must be at least primary_band ({})",
                self.widened_band,
                self.primary_band
            );
        }
        if self.top_k == 0 {
            anyhow::bail!("top_k must be at least 1");
        }
        if !(self.pass_improvement > 0.0) {
            anyhow::bail!("pass_improvement must be positive, got {}", self.pass_improvement);
        }
        if self.fail_improvement > 0.0 {
            anyhow::bail!("fail_improvement must not be positive, got {}", self.fail_improvement);
        }
        if !(0.0..=1.0).contains(&self.default_proficiency) {
            anyhow::bail!(
                "default_proficiency must lie in [0, 1], got {}",
                self.default_proficiency
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file, defaults to `<data_dir>/recommender.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database path, falling back to the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("recommender.db")),
        }
    }
}

impl Config {
    /// Load configuration from the default location, writing defaults if absent
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.engine.validate()
            .with_context(|| format!("Invalid engine settings in {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lesson-recommender", "lesson-recommender")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lesson-recommender", "lesson-recommender")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}
