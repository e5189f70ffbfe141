// Reflection agent — generate, critique and refine code with an LLM
//
// Usage:
//   let provider = create_provider("ollama", &HttpConfig::default())?;
//   let agent = ReflectionAgent::new(provider, AgentConfig::default()).await?;
//   let code = agent.run("Create a function to sum integers").await?;

pub mod error;
pub mod prompts;
pub mod reflection;

use std::num::NonZeroU32;

use crate::config::constants::{DEFAULT_LANGUAGE, DEFAULT_MAX_REFLECTIONS, DEFAULT_MODEL};

pub use error::{Failure, GenerationError, Stage, ValidationError};
pub use prompts::critique_approves;
pub use reflection::{Reflection, ReflectionAgent, StopReason};

/// Per-run settings, fixed once the agent is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Model id passed to the provider on every call
    pub model: String,
    /// Upper bound on critique/refine rounds
    pub max_reflections: NonZeroU32,
    /// Emit a trace line per stage
    pub debug: bool,
    /// Language the templates ask for (e.g. "Go", "Rust")
    pub language: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_reflections: NonZeroU32::new(DEFAULT_MAX_REFLECTIONS)
                .unwrap_or(NonZeroU32::MIN),
            debug: false,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl AgentConfig {
    pub fn new(model: impl Into<String>, max_reflections: NonZeroU32) -> Self {
        Self {
            model: model.into(),
            max_reflections,
            ..Self::default()
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}
