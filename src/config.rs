//! Execution Configuration
//!
//! Loads the settings an [`Execution`](crate::Execution) starts with from
//! YAML. Every field is optional:
//!
//! ```yaml
//! language: de
//! stop_at_fatal_error: false
//! activated_options:
//!   - ingest:extra-checks
//! dispensed_with:
//!   - ingest:cleanup
//! ```

use std::collections::HashSet;
use std::fs;

use log::{debug, info};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::localization::Language;

/// Settings an engine is configured with.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub language: Language,
    pub stop_at_fatal_error: bool,
    /// Optional parts to run; `None` runs none.
    pub activated_options: Option<HashSet<String>>,
    /// Dispensable and optional parts to skip.
    pub dispensed_with: Option<HashSet<String>>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            stop_at_fatal_error: true,
            activated_options: None,
            dispensed_with: None,
        }
    }
}

impl ExecutionConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: ExecutionConfig = serde_yaml::from_str(yaml)?;
        debug!(
            "Configuration: language {}, {} options, {} dispensed",
            config.language,
            config.activated_options.as_ref().map_or(0, HashSet::len),
            config.dispensed_with.as_ref().map_or(0, HashSet::len)
        );
        Ok(config)
    }
}

/// Loads a configuration from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stepwise::config::load_config;
/// use stepwise::sink::LogEventProcessor;
/// use stepwise::Execution;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_config("execution.yaml")?;
///     let execution = Execution::from_config(&config, Arc::new(LogEventProcessor::new("app")));
///     println!("Running in {}", execution.language());
///     Ok(())
/// }
/// ```
pub fn load_config(path: &str) -> Result<ExecutionConfig, ConfigError> {
    info!("Loading execution configuration from: {}", path);

    let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;

    ExecutionConfig::from_yaml_str(&yaml)
}
