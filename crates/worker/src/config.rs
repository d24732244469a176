//! Worker configuration loaded from environment variables.

use std::time::Duration;

use riskcast_core::config::{non_empty, parse_positive_or, ConfigError};
use riskcast_core::source::script::DEFAULT_TIMEOUT;

/// Added to the script timeout to get the default stale-claim threshold.
pub const STALE_MARGIN: Duration = Duration::from_secs(60);

/// Which probability source the job uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Run the external probability script.
    Script,
    /// Compute deterministic synthetic probabilities in-process.
    Synthetic,
}

/// Settings for the probability source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Path of the script (required for [`SourceKind::Script`]).
    pub script_path: Option<String>,
    /// Program that runs the script; `None` executes the script directly.
    pub interpreter: Option<String>,
    /// Working directory for the script process.
    pub working_directory: Option<String>,
    pub timeout: Duration,
}

/// Job runner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// How often the runner polls for queued jobs.
    pub poll_interval: Duration,
    /// A `running` job claimed longer ago than this is treated as abandoned.
    pub stale_after: Duration,
    pub source: SourceConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                                          |
    /// |----------------------------|--------------------------------------------------|
    /// | `JOB_POLL_INTERVAL_MS`     | `1000`                                           |
    /// | `PROBABILITY_SOURCE`       | `script` if `PROBABILITY_SCRIPT` is set, else `synthetic` |
    /// | `PROBABILITY_SCRIPT`       | unset                                            |
    /// | `PROBABILITY_INTERPRETER`  | `python3` (empty runs the script directly)       |
    /// | `PROBABILITY_TIMEOUT_SECS` | `60`                                             |
    /// | `PROBABILITY_WORKDIR`      | unset                                            |
    /// | `JOB_STALE_AFTER_SECS`     | script timeout + 60                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let poll_interval =
            Duration::from_millis(parse_positive_or(&lookup, "JOB_POLL_INTERVAL_MS", 1000)?);

        let script_path = non_empty(lookup("PROBABILITY_SCRIPT"));

        let kind = match non_empty(lookup("PROBABILITY_SOURCE")).as_deref() {
            Some("script") => SourceKind::Script,
            Some("synthetic") => SourceKind::Synthetic,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "PROBABILITY_SOURCE",
                    value: other.to_string(),
                    reason: "expected `script` or `synthetic`".to_string(),
                })
            }
            None if script_path.is_some() => SourceKind::Script,
            None => SourceKind::Synthetic,
        };

        if kind == SourceKind::Script && script_path.is_none() {
            return Err(ConfigError::Missing {
                var: "PROBABILITY_SCRIPT",
            });
        }

        // Unset means python3; set-but-empty means run the script directly.
        let interpreter = match lookup("PROBABILITY_INTERPRETER") {
            None => Some("python3".to_string()),
            Some(value) => non_empty(Some(value)),
        };

        let timeout = Duration::from_secs(parse_positive_or(
            &lookup,
            "PROBABILITY_TIMEOUT_SECS",
            DEFAULT_TIMEOUT.as_secs(),
        )?);

        let stale_after = Duration::from_secs(parse_positive_or(
            &lookup,
            "JOB_STALE_AFTER_SECS",
            (timeout + STALE_MARGIN).as_secs(),
        )?);

        Ok(Self {
            poll_interval,
            stale_after,
            source: SourceConfig {
                kind,
                script_path,
                interpreter,
                working_directory: non_empty(lookup("PROBABILITY_WORKDIR")),
                timeout,
            },
        })
    }
}
