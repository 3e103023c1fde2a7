//! Configuration types and parsing for shunt.yml

use crate::error::{CoreError, CoreResult};
use crate::serde_helpers::humantime_duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Scheduler configuration from shunt.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Keyspace all migrations are submitted to
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Shards of the keyspace; one scheduler runs per shard
    #[serde(default = "default_shards")]
    pub shards: Vec<String>,

    /// Directory holding one migration store per shard
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Execution target settings
    #[serde(default)]
    pub target: TargetConfig,

    /// Poll loop settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Artifact retention
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// Cut-over timeout bounds
    #[serde(default)]
    pub cutover: CutOverConfig,
}

/// SQL dialect of the execution target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetDialect {
    #[default]
    Mysql,
    Duckdb,
}

impl std::fmt::Display for TargetDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetDialect::Mysql => write!(f, "mysql"),
            TargetDialect::Duckdb => write!(f, "duckdb"),
        }
    }
}

/// Execution target configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Dialect statements are parsed with
    #[serde(default)]
    pub dialect: TargetDialect,

    /// DuckDB target database file; `None` runs against the in-memory catalog
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Interval between scheduling ticks
    #[serde(default = "default_tick_interval", with = "humantime_duration")]
    pub tick_interval: Duration,

    /// How often a worker re-reads its migration to observe operator commands
    #[serde(default = "default_worker_poll_interval", with = "humantime_duration")]
    pub worker_poll_interval: Duration,

    /// Internal restarts after transient engine errors before failing
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            worker_poll_interval: default_worker_poll_interval(),
            max_transient_retries: default_max_transient_retries(),
        }
    }
}

/// Artifact retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactConfig {
    /// Retention applied when a migration does not set `--retain-artifacts`
    #[serde(default = "default_retain", with = "humantime_duration")]
    pub retain: Duration,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            retain: default_retain(),
        }
    }
}

/// Cut-over threshold configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutOverConfig {
    #[serde(default = "default_threshold", with = "humantime_duration")]
    pub default_threshold: Duration,

    #[serde(default = "default_min_threshold", with = "humantime_duration")]
    pub min_threshold: Duration,

    #[serde(default = "default_max_threshold", with = "humantime_duration")]
    pub max_threshold: Duration,
}

impl Default for CutOverConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            min_threshold: default_min_threshold(),
            max_threshold: default_max_threshold(),
        }
    }
}

impl CutOverConfig {
    /// Check an explicitly requested threshold against `[min, max]`.
    /// Sub-second precision is truncated before the check.
    pub fn validate_threshold(&self, requested: Duration) -> Result<Duration, String> {
        let truncated = Duration::from_secs(requested.as_secs());
        if truncated < self.min_threshold {
            return Err(format!(
                "cut-over min value is {}, got {}",
                humantime::format_duration(self.min_threshold),
                humantime::format_duration(requested)
            ));
        }
        if truncated > self.max_threshold {
            return Err(format!(
                "cut-over max value is {}, got {}",
                humantime::format_duration(self.max_threshold),
                humantime::format_duration(requested)
            ));
        }
        Ok(truncated)
    }
}

fn default_keyspace() -> String {
    "commerce".to_string()
}

fn default_shards() -> Vec<String> {
    vec!["0".to_string()]
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".shunt")
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_worker_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_max_transient_retries() -> u32 {
    3
}

fn default_retain() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_threshold() -> Duration {
    Duration::from_secs(10)
}

fn default_min_threshold() -> Duration {
    Duration::from_secs(5)
}

fn default_max_threshold() -> Duration {
    Duration::from_secs(30)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keyspace: default_keyspace(),
            shards: default_shards(),
            state_dir: default_state_dir(),
            target: TargetConfig::default(),
            scheduler: SchedulerConfig::default(),
            artifacts: ArtifactConfig::default(),
            cutover: CutOverConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> CoreResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate YAML text
    pub fn from_yaml(content: &str) -> CoreResult<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        crate::identifiers::Keyspace::parse(&self.keyspace)?;
        if self.shards.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "At least one shard must be configured".to_string(),
            });
        }
        for shard in &self.shards {
            crate::identifiers::Shard::parse(shard)?;
        }
        if self.scheduler.tick_interval.is_zero() {
            return Err(CoreError::ConfigInvalid {
                message: "scheduler.tick_interval must be greater than zero".to_string(),
            });
        }
        let cutover = &self.cutover;
        if cutover.min_threshold > cutover.default_threshold
            || cutover.default_threshold > cutover.max_threshold
        {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "cutover thresholds must satisfy min <= default <= max (got {} / {} / {})",
                    humantime::format_duration(cutover.min_threshold),
                    humantime::format_duration(cutover.default_threshold),
                    humantime::format_duration(cutover.max_threshold)
                ),
            });
        }
        Ok(())
    }

    /// Path of the migration store for one shard
    pub fn store_path(&self, shard: &str) -> PathBuf {
        self.state_dir
            .join(format!("{}-{}.duckdb", self.keyspace, shard))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
