//! Error Types

use thiserror::Error;

/// Failure while closing an event processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("event writer thread panicked")]
    WriterPanicked,
}

/// Failure while loading an execution configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_processor_error_message() {
        assert_eq!(
            ProcessorError::WriterPanicked.to_string(),
            "event writer thread panicked"
        );
    }

    #[test]
    fn test_config_read_error_keeps_source() {
        let error = ConfigError::Read {
            path: "missing.yaml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(
            error.to_string(),
            "could not read configuration 'missing.yaml': no such file"
        );
        assert!(error.source().is_some());
    }
}
