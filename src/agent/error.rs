// Agent error types
//
// Construction fails with `ValidationError`; a run fails with
// `GenerationError`, which names the stage that broke and keeps the
// provider error as its source.

use std::fmt;
use thiserror::Error;

use crate::providers::ProviderError;

/// Where in the loop a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    InitialGeneration,
    /// Critique call of a round (rounds count from 1)
    Reflection { round: u32 },
    /// Refinement call of a round (rounds count from 1)
    Refinement { round: u32 },
}

impl Stage {
    /// Round number, or `None` for the initial generation
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::InitialGeneration => None,
            Self::Reflection { round } | Self::Refinement { round } => Some(*round),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialGeneration => write!(f, "initial generation"),
            Self::Reflection { round } => write!(f, "reflection round {}", round),
            Self::Refinement { round } => write!(f, "refinement round {}", round),
        }
    }
}

/// The requested model cannot be used; no agent was built
#[derive(Debug, Error)]
#[error("model validation failed for {model:?}")]
pub struct ValidationError {
    pub model: String,
    #[source]
    pub source: ProviderError,
}

/// Why a stage failed
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The caller's cancellation token fired while the stage was in flight
    #[error("cancelled")]
    Cancelled,
}

/// A run aborted at `stage`
#[derive(Debug, Error)]
#[error("{stage} failed")]
pub struct GenerationError {
    pub stage: Stage,
    #[source]
    pub failure: Failure,
}

impl GenerationError {
    pub(crate) fn provider(stage: Stage, error: ProviderError) -> Self {
        Self {
            stage,
            failure: Failure::Provider(error),
        }
    }

    pub(crate) fn cancelled(stage: Stage) -> Self {
        Self {
            stage,
            failure: Failure::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.failure, Failure::Cancelled)
    }

    /// The underlying provider error, unless the run was cancelled
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match &self.failure {
            Failure::Provider(e) => Some(e),
            Failure::Cancelled => None,
        }
    }
}
