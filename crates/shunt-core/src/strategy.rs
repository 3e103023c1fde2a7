//! DDL strategy string parsing.
//!
//! A strategy string has the form `<strategy> [--flag[=value] ...]`. It is
//! parsed exactly once, at submission, into a [`DdlStrategySetting`] through
//! the recognized-option table below; the scheduler only ever looks at the
//! typed [`MigrationOptions`].

use crate::error::{CoreError, CoreResult};
use crate::serde_helpers::humantime_option;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which execution path runs a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Apply the statement in place, unscheduled semantics aside
    Direct,
    /// Shadow-table online migration with a staged cut-over (alias `vitess`)
    Online,
    /// Native in-place DDL on the target
    Mysql,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Online => "online",
            Strategy::Mysql => "mysql",
        }
    }

    /// Whether `flag` is legal with this strategy. Only the online strategy
    /// stages a cut-over, so cut-over controls are rejected elsewhere.
    pub fn supports(&self, flag: OptionFlag) -> bool {
        match self {
            Strategy::Online => true,
            Strategy::Direct | Strategy::Mysql => !matches!(
                flag,
                OptionFlag::PostponeCompletion
                    | OptionFlag::ForceCutOverAfter
                    | OptionFlag::CutoverThreshold
            ),
        }
    }

    /// Whether this strategy leaves renamed/shadow objects behind.
    pub fn keeps_artifacts(&self) -> bool {
        matches!(self, Strategy::Online)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Strategy::Direct),
            "online" | "vitess" => Ok(Strategy::Online),
            "mysql" => Ok(Strategy::Mysql),
            _ => Err(CoreError::InvalidStrategy {
                strategy: s.to_string(),
                reason: "expected one of direct, online, vitess, mysql".to_string(),
            }),
        }
    }
}

/// Every option the strategy string may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionFlag {
    Singleton,
    SingletonContext,
    SingletonTable,
    AllowConcurrent,
    PostponeLaunch,
    PostponeCompletion,
    InOrderCompletion,
    Declarative,
    PreferInstantDdl,
    ForceCutOverAfter,
    RetainArtifacts,
    CutoverThreshold,
}

/// Recognized option names and the flag each one sets.
const OPTION_TABLE: &[(&str, OptionFlag)] = &[
    ("singleton", OptionFlag::Singleton),
    ("singleton-context", OptionFlag::SingletonContext),
    ("singleton-table", OptionFlag::SingletonTable),
    ("allow-concurrent", OptionFlag::AllowConcurrent),
    ("postpone-launch", OptionFlag::PostponeLaunch),
    ("postpone-completion", OptionFlag::PostponeCompletion),
    ("in-order-completion", OptionFlag::InOrderCompletion),
    ("declarative", OptionFlag::Declarative),
    ("prefer-instant-ddl", OptionFlag::PreferInstantDdl),
    ("force-cut-over-after", OptionFlag::ForceCutOverAfter),
    ("retain-artifacts", OptionFlag::RetainArtifacts),
    ("retain-artifacts-duration", OptionFlag::RetainArtifacts),
    ("cutover-threshold", OptionFlag::CutoverThreshold),
    ("cutover-threshold-duration", OptionFlag::CutoverThreshold),
];

impl OptionFlag {
    /// Look an option up by its name (without leading dashes).
    pub fn lookup(name: &str) -> Option<OptionFlag> {
        OPTION_TABLE
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, flag)| *flag)
    }

    /// Canonical name, used when rendering options back to text.
    pub fn name(&self) -> &'static str {
        OPTION_TABLE
            .iter()
            .find(|(_, flag)| flag == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Duration-valued options require `=<duration>`; the rest are booleans.
    pub fn takes_value(&self) -> bool {
        matches!(
            self,
            OptionFlag::ForceCutOverAfter | OptionFlag::RetainArtifacts | OptionFlag::CutoverThreshold
        )
    }

    fn apply(&self, options: &mut MigrationOptions, value: Option<Duration>) {
        match self {
            OptionFlag::Singleton => options.singleton = true,
            OptionFlag::SingletonContext => options.singleton_context = true,
            OptionFlag::SingletonTable => options.singleton_table = true,
            OptionFlag::AllowConcurrent => options.allow_concurrent = true,
            OptionFlag::PostponeLaunch => options.postpone_launch = true,
            OptionFlag::PostponeCompletion => options.postpone_completion = true,
            OptionFlag::InOrderCompletion => options.in_order_completion = true,
            OptionFlag::Declarative => options.declarative = true,
            OptionFlag::PreferInstantDdl => options.prefer_instant_ddl = true,
            OptionFlag::ForceCutOverAfter => options.force_cut_over_after = value,
            OptionFlag::RetainArtifacts => options.retain_artifacts = value,
            // Cut-over bounds are tracked at whole-second precision.
            OptionFlag::CutoverThreshold => {
                options.cutover_threshold = value.map(|d| Duration::from_secs(d.as_secs()))
            }
        }
    }
}

/// Typed option record produced once at submission time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub singleton_context: bool,
    #[serde(default)]
    pub singleton_table: bool,
    #[serde(default)]
    pub allow_concurrent: bool,
    #[serde(default)]
    pub postpone_launch: bool,
    #[serde(default)]
    pub postpone_completion: bool,
    #[serde(default)]
    pub in_order_completion: bool,
    #[serde(default)]
    pub declarative: bool,
    #[serde(default)]
    pub prefer_instant_ddl: bool,
    #[serde(default, with = "humantime_option")]
    pub force_cut_over_after: Option<Duration>,
    #[serde(default, with = "humantime_option")]
    pub retain_artifacts: Option<Duration>,
    #[serde(default, with = "humantime_option")]
    pub cutover_threshold: Option<Duration>,
}

impl MigrationOptions {
    /// Render the options back into `--flag[=value]` form.
    pub fn to_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        let booleans = [
            (self.singleton, OptionFlag::Singleton),
            (self.singleton_context, OptionFlag::SingletonContext),
            (self.singleton_table, OptionFlag::SingletonTable),
            (self.allow_concurrent, OptionFlag::AllowConcurrent),
            (self.postpone_launch, OptionFlag::PostponeLaunch),
            (self.postpone_completion, OptionFlag::PostponeCompletion),
            (self.in_order_completion, OptionFlag::InOrderCompletion),
            (self.declarative, OptionFlag::Declarative),
            (self.prefer_instant_ddl, OptionFlag::PreferInstantDdl),
        ];
        for (set, flag) in booleans {
            if set {
                flags.push(format!("--{}", flag.name()));
            }
        }
        let durations = [
            (self.force_cut_over_after, OptionFlag::ForceCutOverAfter),
            (self.retain_artifacts, OptionFlag::RetainArtifacts),
            (self.cutover_threshold, OptionFlag::CutoverThreshold),
        ];
        for (value, flag) in durations {
            if let Some(d) = value {
                flags.push(format!("--{}={}", flag.name(), humantime::format_duration(d)));
            }
        }
        flags
    }
}

/// A parsed strategy string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStrategySetting {
    pub strategy: Strategy,
    pub options: MigrationOptions,
    /// The string as submitted, whitespace collapsed
    pub raw: String,
}

impl DdlStrategySetting {
    /// Parse `<strategy> [--flag[=value] ...]`. Flags may use one or two
    /// leading dashes; unknown flags and strategy-illegal flags are errors.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let mut words = raw.split_whitespace();
        let Some(head) = words.next() else {
            return Err(CoreError::InvalidStrategy {
                strategy: raw.to_string(),
                reason: "strategy must not be empty".to_string(),
            });
        };
        let strategy: Strategy = head.parse()?;

        let mut options = MigrationOptions::default();
        for word in words {
            let Some(body) = word.strip_prefix("--").or_else(|| word.strip_prefix('-')) else {
                return Err(CoreError::InvalidStrategy {
                    strategy: raw.to_string(),
                    reason: format!("expected a --flag, found '{}'", word),
                });
            };
            let (name, value) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };
            let flag = OptionFlag::lookup(name).ok_or_else(|| CoreError::UnknownOption {
                option: name.to_string(),
            })?;
            if !strategy.supports(flag) {
                return Err(CoreError::UnsupportedOption {
                    option: flag.name().to_string(),
                    strategy: strategy.to_string(),
                });
            }
            let duration = match (flag.takes_value(), value) {
                (true, Some(text)) => Some(humantime::parse_duration(text).map_err(|e| {
                    CoreError::InvalidOptionValue {
                        option: name.to_string(),
                        reason: e.to_string(),
                    }
                })?),
                (true, None) => {
                    return Err(CoreError::InvalidOptionValue {
                        option: name.to_string(),
                        reason: "a duration is required, e.g. =10s".to_string(),
                    })
                }
                (false, Some(_)) => {
                    return Err(CoreError::InvalidOptionValue {
                        option: name.to_string(),
                        reason: "flag does not take a value".to_string(),
                    })
                }
                (false, None) => None,
            };
            flag.apply(&mut options, duration);
        }

        Ok(Self {
            strategy,
            options,
            raw: raw.split_whitespace().collect::<Vec<_>>().join(" "),
        })
    }
}

impl fmt::Display for DdlStrategySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy.as_str())?;
        for flag in self.options.to_flags() {
            write!(f, " {}", flag)?;
        }
        Ok(())
    }
}

impl FromStr for DdlStrategySetting {
    type Err = CoreError;
    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[path = "strategy_test.rs"]
mod tests;
