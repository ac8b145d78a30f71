//! Crate-level error type.

use thiserror::Error;

use crate::emit::EmitError;
use crate::loader::LoadError;
use crate::resilience::SourceTimeoutError;
use crate::schema::SchemaError;
use crate::secrets::SecretResolutionError;
use crate::validation::ValidationErrors;

/// Exit code for a run that failed validation.
pub const EXIT_VALIDATION: u8 = 1;
/// Exit code for every other failure.
pub const EXIT_FAILURE: u8 = 2;

/// Any failure of a compilation run.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    SecretResolution(#[from] SecretResolutionError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error("compilation cancelled")]
    Cancelled,
}

impl CompileError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            CompileError::Validation(_) => EXIT_VALIDATION,
            _ => EXIT_FAILURE,
        }
    }

    /// Timeouts are the only failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompileError::Load(e) => e.is_retryable(),
            CompileError::SecretResolution(SecretResolutionError::Timeout { .. }) => true,
            _ => false,
        }
    }

    /// Short stage name, used as a metrics label.
    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Schema(_) => "schema",
            CompileError::Load(LoadError::Timeout(SourceTimeoutError { .. })) => "timeout",
            CompileError::Load(_) => "load",
            CompileError::Validation(_) => "validation",
            CompileError::SecretResolution(SecretResolutionError::Timeout { .. }) => "timeout",
            CompileError::SecretResolution(_) => "secrets",
            CompileError::Emit(_) => "emit",
            CompileError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CompileError::Validation(ValidationErrors::new(Vec::new())).exit_code(), 1);
        assert_eq!(CompileError::Cancelled.exit_code(), 2);
    }

    #[test]
    fn test_only_timeouts_retry() {
        let timeout = CompileError::Load(LoadError::Timeout(SourceTimeoutError {
            origin: "file:a.toml".into(),
            budget: Duration::from_secs(1),
        }));
        assert!(timeout.is_retryable());
        assert_eq!(timeout.stage(), "timeout");
        assert!(!CompileError::Cancelled.is_retryable());
    }
}
