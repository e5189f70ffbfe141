// Socrates - reflection-loop code generator
// Library exports

pub mod agent;
pub mod config;
pub mod providers;

pub use agent::{AgentConfig, GenerationError, Reflection, ReflectionAgent, StopReason};
pub use providers::{LlmProvider, ProviderError};
