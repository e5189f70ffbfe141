// Project-wide constants
//
// Centralised here so defaults have one source of truth.
// Import via `use crate::config::constants::*;`.

/// Model used when neither the config file, the environment nor the CLI names one.
pub const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";

/// Default upper bound on critique/refine rounds.
pub const DEFAULT_MAX_REFLECTIONS: u32 = 3;

/// Language the prompt templates ask the model to write.
pub const DEFAULT_LANGUAGE: &str = "Go";

/// Task used by the CLI when `--task` is omitted.
pub const DEFAULT_TASK: &str = "Create a function to sum any number of integers";

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Default Ollama host when neither the config nor `OLLAMA_HOST` sets one.
pub const DEFAULT_OLLAMA_HOST: &str = "127.0.0.1";

/// Default Ollama port.
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Default base URL for the hosted OpenAI-compatible backend.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Per-request HTTP timeout. Local models can take minutes on a large prompt.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Total attempts (first try included) for transient transport failures.
/// A failed request surfaces at once unless `[http] max_attempts` says otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Config directory under the user's home.
pub const CONFIG_DIR: &str = ".socrates";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";
