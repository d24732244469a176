//! The probability source selected by configuration.

use riskcast_core::config::ConfigError;
use riskcast_core::probabilities::ProbabilityPayload;
use riskcast_core::source::script::ScriptSource;
use riskcast_core::source::synthetic::SyntheticSource;
use riskcast_core::source::{ProbabilitySource, SourceError, WeatherQuery};

use crate::config::{SourceConfig, SourceKind};

/// One of the built-in probability sources.
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Script(ScriptSource),
    Synthetic(SyntheticSource),
}

impl ConfiguredSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        match config.kind {
            SourceKind::Synthetic => Ok(Self::Synthetic(SyntheticSource)),
            SourceKind::Script => {
                let path = config.script_path.as_deref().ok_or(ConfigError::Missing {
                    var: "PROBABILITY_SCRIPT",
                })?;
                let mut source = ScriptSource::new(path).with_timeout(config.timeout);
                if let Some(interpreter) = &config.interpreter {
                    source = source.with_interpreter(interpreter);
                }
                if let Some(dir) = &config.working_directory {
                    source = source.with_working_directory(dir);
                }
                Ok(Self::Script(source))
            }
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Script(_) => "script",
            Self::Synthetic(_) => "synthetic",
        }
    }
}

impl ProbabilitySource for ConfiguredSource {
    async fn fetch(&self, query: &WeatherQuery) -> Result<ProbabilityPayload, SourceError> {
        match self {
            Self::Script(source) => source.fetch(query).await,
            Self::Synthetic(source) => source.fetch(query).await,
        }
    }
}
