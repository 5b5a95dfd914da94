//! Structured error types for tickscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Sampler has already been started")]
    AlreadyStarted,

    #[error("Sampler has not been started")]
    NotStarted,

    #[error("Invalid sampler configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid thread name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Failed to spawn {name} thread: {error}")]
    SpawnFailed {
        name: String,
        error: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write sampler report: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_display() {
        assert_eq!(
            SamplerError::AlreadyStarted.to_string(),
            "Sampler has already been started"
        );
        assert_eq!(
            SamplerError::NotStarted.to_string(),
            "Sampler has not been started"
        );
    }

    #[test]
    fn test_invalid_pattern_wraps_regex_error() {
        let err: SamplerError = regex::Regex::new("(unclosed").unwrap_err().into();
        assert!(err.to_string().starts_with("Invalid thread name pattern"));
    }

    #[test]
    fn test_spawn_failed_names_thread() {
        let err = SamplerError::SpawnFailed {
            name: "tickscope-sampler".to_string(),
            error: std::io::Error::new(std::io::ErrorKind::Other, "no threads left"),
        };
        assert!(err.to_string().contains("tickscope-sampler"));
        assert!(err.to_string().contains("no threads left"));
    }
}
