use std::fmt;

use archsketch_core::{BuildError, ValidationFailure};

/// Why a single attempt did not produce a valid specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The model call itself failed (network, timeout, empty reply).
    ModelCall(String),
    /// The model answered but the answer was rejected.
    Validation(ValidationFailure),
}

impl AttemptFailure {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttemptFailure::ModelCall(_) => "ModelCallFailure",
            AttemptFailure::Validation(failure) => failure.kind.as_str(),
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            AttemptFailure::ModelCall(detail) => detail,
            AttemptFailure::Validation(failure) => &failure.detail,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind_name(), self.detail())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("max attempts must be at least 1")]
    InvalidAttempts,

    #[error("no valid specification after {attempts_used} attempt(s); last failure: {last_failure}")]
    Exhausted {
        last_failure: AttemptFailure,
        attempts_used: u32,
    },

    /// The specification was valid but could not be rendered. Never retried.
    #[error("diagram build failed after {attempts_used} attempt(s): {source}")]
    Build {
        #[source]
        source: BuildError,
        attempts_used: u32,
    },

    #[error("generation cancelled after {attempts_used} attempt(s)")]
    Cancelled { attempts_used: u32 },
}

impl GenerationError {
    /// Model calls that completed before the error, zero for [`GenerationError::InvalidAttempts`].
    pub fn attempts_used(&self) -> u32 {
        match self {
            GenerationError::InvalidAttempts => 0,
            GenerationError::Exhausted { attempts_used, .. }
            | GenerationError::Build { attempts_used, .. }
            | GenerationError::Cancelled { attempts_used } => *attempts_used,
        }
    }

    /// Stable name for callers that report errors as data.
    pub fn kind_name(&self) -> &'static str {
        match self {
            GenerationError::InvalidAttempts => "InvalidAttempts",
            GenerationError::Exhausted { last_failure, .. } => last_failure.kind_name(),
            GenerationError::Build { .. } => "BuildError",
            GenerationError::Cancelled { .. } => "Cancelled",
        }
    }
}
