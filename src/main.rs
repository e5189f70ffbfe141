// Socrates - reflection-loop code generator
// Main entry point

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use socrates::agent::{ReflectionAgent, StopReason};
use socrates::config::constants::DEFAULT_TASK;
use socrates::config::{load_config, Overrides};
use socrates::providers::create_provider_from_entry;

/// Generate code with an LLM, then critique and refine it until it holds up
#[derive(Parser, Debug)]
#[command(name = "socrates")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The task for which the agent should generate code
    #[arg(short, long, default_value = DEFAULT_TASK)]
    task: String,

    /// Model to use for chat [default: qwen2.5-coder:7b]
    #[arg(short, long)]
    model: Option<String>,

    /// Max number of reflection rounds (at least 1) [default: 3]
    #[arg(short, long)]
    reflections: Option<NonZeroU32>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// LLM backend (ollama, openai) [default: ollama]
    #[arg(short, long)]
    provider: Option<String>,

    /// Language to generate [default: Go]
    #[arg(short, long)]
    language: Option<String>,

    /// Config file [default: ~/.socrates/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Abort the run after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.task.trim().is_empty() {
        bail!("Task description cannot be empty.");
    }

    let rust_log = std::env::var("RUST_LOG").ok();
    init_tracing(tracing_filter(cli.debug, rust_log.as_deref())?);

    let mut config = load_config(cli.config.as_deref())?;
    config
        .apply(Overrides {
            model: cli.model,
            max_reflections: cli.reflections,
            debug: cli.debug,
            provider: cli.provider,
            language: cli.language,
        })
        .context("Invalid command-line options")?;
    config.validate()?;

    let provider = create_provider_from_entry(&config.provider, &config.http)?;
    tracing::debug!("Using provider {}", provider.name());

    let agent = ReflectionAgent::new(provider, config.agent.clone())
        .await
        .context("Error creating agent")?;

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, cli.timeout);

    let reflection = agent
        .run_until(&cli.task, &cancel)
        .await
        .context("Error during generation")?;

    match reflection.stop {
        StopReason::Approved { round } => {
            tracing::info!("Critique approved the code in round {}", round)
        }
        StopReason::Exhausted => tracing::info!(
            "Stopped after {} reflection round(s) without approval",
            reflection.rounds
        ),
    }

    println!("{}", reflection.artifact);
    Ok(())
}

/// Agent debug traces are gated by the agent's own flag, so the filter
/// always lets them through
const AGENT_TRACE_DIRECTIVE: &str = "socrates::agent=info";

/// `RUST_LOG` when set and valid, else `info` with `--debug` and `warn` without
fn tracing_filter(debug: bool, rust_log: Option<&str>) -> Result<EnvFilter> {
    let base = rust_log
        .filter(|spec| !spec.trim().is_empty())
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(if debug { "info" } else { "warn" }));

    Ok(base.add_directive(AGENT_TRACE_DIRECTIVE.parse::<Directive>()?))
}

/// Traces go to stderr so stdout carries only the generated code
fn init_tracing(filter: EnvFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancel the run on Ctrl-C, or once `timeout_secs` have passed
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout_secs: Option<u64>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            on_signal.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!("Timed out after {}s, cancelling run", secs);
            on_deadline.cancel();
        });
    }
}
