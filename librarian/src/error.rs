use std::path::PathBuf;
use std::time::Duration;

use llm_client::LlmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibrarianError {
    #[error("File not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Completion service error: {0}")]
    Service(#[from] LlmError),

    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LibrarianError {
    /// Whether another extraction attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LibrarianError::Service(e) => e.is_retryable(),
            LibrarianError::SchemaViolation(_) | LibrarianError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Map an IO error for `path`, keeping NotFound distinct
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            LibrarianError::NotFound { path }
        } else {
            LibrarianError::Io { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, LibrarianError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = LibrarianError::io(
            "missing.tsv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, LibrarianError::NotFound { .. }));
        assert_eq!(err.to_string(), "File not found: missing.tsv");

        let err = LibrarianError::io(
            "locked.tsv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, LibrarianError::Io { .. }));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LibrarianError::SchemaViolation("themes".into()).is_retryable());
        assert!(LibrarianError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(
            LibrarianError::Service(LlmError::RateLimited { retry_after: None }).is_retryable()
        );
        assert!(
            !LibrarianError::Service(LlmError::MissingApiKey {
                provider: "Gemini".into(),
                env_var: "GEMINI_API_KEY".into(),
            })
            .is_retryable()
        );
        assert!(!LibrarianError::Cancelled.is_retryable());
        assert!(!LibrarianError::Format("bad year".into()).is_retryable());
    }
}
