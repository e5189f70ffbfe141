// Reflection loop — one generation, then up to N critique/refine rounds

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::error::{GenerationError, Stage, ValidationError};
use super::prompts::{critique_approves, critique_prompt, generation_prompt, refinement_prompt};
use super::AgentConfig;
use crate::providers::LlmProvider;

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The critique of `round` approved the code
    Approved { round: u32 },
    /// Every round ran and each critique asked for changes
    Exhausted,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflection {
    /// Final code
    pub artifact: String,
    /// Critiques received
    pub rounds: u32,
    pub stop: StopReason,
}

/// Drives a provider through generate → critique → refine
///
/// The agent holds no mutable state, so one instance can serve several
/// runs and independent agents can share a provider.
pub struct ReflectionAgent {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl ReflectionAgent {
    /// Validate `config.model` against the provider and build the agent.
    ///
    /// Nothing is generated if validation fails.
    pub async fn new(
        provider: Arc<dyn LlmProvider>,
        config: AgentConfig,
    ) -> Result<Self, ValidationError> {
        provider
            .validate_model(&config.model)
            .await
            .map_err(|source| ValidationError {
                model: config.model.clone(),
                source,
            })?;

        let agent = Self { provider, config };
        agent.trace(format_args!(
            "Debug mode is enabled. Using {} model {} for up to {} reflection round(s).",
            agent.provider.name(),
            agent.config.model,
            agent.config.max_reflections
        ));
        Ok(agent)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Produce code for `task` and return it.
    pub async fn run(&self, task: &str) -> Result<String, GenerationError> {
        let never = CancellationToken::new();
        self.run_until(task, &never)
            .await
            .map(|reflection| reflection.artifact)
    }

    /// Produce code for `task`, aborting the in-flight call when `cancel` fires.
    ///
    /// The first failing call ends the run; its stage is reported and no
    /// earlier artifact is returned in its place.
    pub async fn run_until(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<Reflection, GenerationError> {
        let language = self.config.language.as_str();

        self.trace(format_args!("Generating initial code for task:\n{}", task));
        let mut code = self
            .call(Stage::InitialGeneration, generation_prompt(language, task), cancel)
            .await?;
        self.trace(format_args!("Initial output:\n{}", code));

        for round in 1..=self.config.max_reflections.get() {
            self.trace(format_args!("Reflection round {}...", round));

            let critique = self
                .call(
                    Stage::Reflection { round },
                    critique_prompt(language, task, &code),
                    cancel,
                )
                .await?;
            self.trace(format_args!("Critique:\n{}", critique));

            if critique_approves(&critique) {
                self.trace(format_args!("No changes needed. Final code is ready."));
                return Ok(Reflection {
                    artifact: code,
                    rounds: round,
                    stop: StopReason::Approved { round },
                });
            }

            code = self
                .call(
                    Stage::Refinement { round },
                    refinement_prompt(language, task, &code, &critique),
                    cancel,
                )
                .await?;
            self.trace(format_args!("Updated code:\n{}", code));
        }

        Ok(Reflection {
            artifact: code,
            rounds: self.config.max_reflections.get(),
            stop: StopReason::Exhausted,
        })
    }

    async fn call(
        &self,
        stage: Stage,
        prompt: String,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.trace(format_args!("Cancelled during {}", stage));
                Err(GenerationError::cancelled(stage))
            }
            result = self.provider.chat(&self.config.model, &prompt) => {
                result.map_err(|e| GenerationError::provider(stage, e))
            }
        }
    }

    fn trace(&self, message: fmt::Arguments<'_>) {
        if self.config.debug {
            tracing::info!(target: "socrates::agent", "{}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::error::Failure;
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::num::NonZeroU32;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Step in a scripted conversation
    enum Reply {
        Text(&'static str),
        Fail(ProviderError),
        Hang,
    }

    /// Provider that answers chat calls from a fixed script, in order
    struct ScriptedProvider {
        valid: bool,
        script: Mutex<VecDeque<Reply>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                valid: true,
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn rejecting() -> Arc<Self> {
            Arc::new(Self {
                valid: false,
                script: Mutex::new(VecDeque::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn prompt(&self, idx: usize) -> String {
            self.prompts.lock().unwrap()[idx].clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, _model: &str, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected chat call");
            match reply {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Fail(e) => Err(e),
                Reply::Hang => std::future::pending().await,
            }
        }

        async fn validate_model(&self, model: &str) -> Result<(), ProviderError> {
            if self.valid {
                Ok(())
            } else {
                Err(ProviderError::ModelUnavailable {
                    model: model.to_string(),
                    hint: "run 'ollama pull test' to download it".to_string(),
                })
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn config(max_reflections: u32) -> AgentConfig {
        AgentConfig::new("test-model", NonZeroU32::new(max_reflections).unwrap())
    }

    fn server_error() -> ProviderError {
        ProviderError::Api {
            provider: "scripted".to_string(),
            status: 500,
            body: "boom".to_string(),
        }
    }

    async fn agent_with(provider: &Arc<ScriptedProvider>, max_reflections: u32) -> ReflectionAgent {
        ReflectionAgent::new(provider.clone(), config(max_reflections))
            .await
            .unwrap()
    }

    // ── construction ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_new_keeps_config() {
        let provider = ScriptedProvider::new(vec![]);
        let agent = ReflectionAgent::new(provider.clone(), config(3).with_debug(true))
            .await
            .unwrap();

        assert_eq!(agent.config().model, "test-model");
        assert_eq!(agent.config().max_reflections.get(), 3);
        assert!(agent.config().debug);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_new_fails_when_model_unavailable() {
        let provider = ScriptedProvider::rejecting();
        let result = ReflectionAgent::new(provider.clone(), config(3)).await;

        let err = result.err().expect("validation should fail");
        assert_eq!(err.model, "test-model");
        assert!(matches!(err.source, ProviderError::ModelUnavailable { .. }));
        assert_eq!(provider.calls(), 0, "chat must not run when validation fails");
    }

    // ── termination policy ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_early_stop_in_first_round_returns_initial_code() {
        let provider = ScriptedProvider::new(vec![
            Reply::Text("func Hello() string { return \"hello\" }"),
            Reply::Text("No changes needed."),
        ]);
        let agent = agent_with(&provider, 3).await;

        let result = agent
            .run_until("Create a Hello function", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.artifact, "func Hello() string { return \"hello\" }");
        assert_eq!(result.stop, StopReason::Approved { round: 1 });
        assert_eq!(result.rounds, 1);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_sum_integers_scenario_stops_after_second_critique() {
        let provider = ScriptedProvider::new(vec![
            Reply::Text("func Sum(a, b int) int { return a + b }"),
            Reply::Text("Add error handling."),
            Reply::Text("func Sum(nums ...int) (int, error) { ... }"),
            Reply::Text("No changes needed."),
        ]);
        let agent = agent_with(&provider, 2).await;

        let code = agent.run("Create a function to sum integers").await.unwrap();

        assert_eq!(code, "func Sum(nums ...int) (int, error) { ... }");
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn test_exhausts_all_rounds_and_returns_last_refinement() {
        let provider = ScriptedProvider::new(vec![
            Reply::Text("v0"),
            Reply::Text("fix 1"),
            Reply::Text("v1"),
            Reply::Text("fix 2"),
            Reply::Text("v2"),
            Reply::Text("fix 3"),
            Reply::Text("v3"),
        ]);
        let agent = agent_with(&provider, 3).await;

        let result = agent
            .run_until("task", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.artifact, "v3");
        assert_eq!(result.stop, StopReason::Exhausted);
        assert_eq!(result.rounds, 3);
        assert_eq!(provider.calls(), 1 + 2 * 3);
    }

    #[tokio::test]
    async fn test_qualified_approval_still_stops() {
        let provider = ScriptedProvider::new(vec![
            Reply::Text("v0"),
            Reply::Text("fix it"),
            Reply::Text("v1"),
            Reply::Text("Looks fine. NO CHANGES NEEDED unless inputs can overflow."),
        ]);
        let agent = agent_with(&provider, 5).await;

        let result = agent
            .run_until("task", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.artifact, "v1");
        assert_eq!(result.stop, StopReason::Approved { round: 2 });
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn test_single_round_without_approval() {
        let provider = ScriptedProvider::new(vec![
            Reply::Text("v0"),
            Reply::Text("rename things"),
            Reply::Text("v1"),
        ]);
        let agent = agent_with(&provider, 1).await;

        assert_eq!(agent.run("task").await.unwrap(), "v1");
        assert_eq!(provider.calls(), 3);
    }

    // ── prompt threading ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_prompts_carry_task_current_code_and_critique() {
        let provider = ScriptedProvider::new(vec![
            Reply::Text("v0"),
            Reply::Text("handle empty input"),
            Reply::Text("v1"),
            Reply::Text("No changes needed."),
        ]);
        let agent = ReflectionAgent::new(provider.clone(), config(3).with_language("Rust"))
            .await
            .unwrap();

        agent.run("sum a slice").await.unwrap();

        let generate = provider.prompt(0);
        assert!(generate.starts_with("Generate Rust code"));
        assert!(generate.contains("<task>sum a slice</task>"));

        let critique1 = provider.prompt(1);
        assert!(critique1.starts_with("Analyze the Rust code"));
        assert!(critique1.contains("<code>v0</code>"));

        let refine1 = provider.prompt(2);
        assert!(refine1.starts_with("Revise the Rust code"));
        assert!(refine1.contains("<code>v0</code>"));
        assert!(refine1.contains("<critique>handle empty input</critique>"));

        let critique2 = provider.prompt(3);
        assert!(critique2.contains("<code>v1</code>"));
        assert!(critique2.contains("<task>sum a slice</task>"));
    }

    // ── failure semantics ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_initial_generation_failure() {
        let provider = ScriptedProvider::new(vec![Reply::Fail(server_error())]);
        let agent = agent_with(&provider, 3).await;

        let err = agent.run("task").await.unwrap_err();

        assert_eq!(err.stage, Stage::InitialGeneration);
        assert!(matches!(
            err.provider_error(),
            Some(ProviderError::Api { status: 500, .. })
        ));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_critique_failure_attributes_round() {
        let provider = ScriptedProvider::new(vec![
            Reply::Text("v0"),
            Reply::Text("fix"),
            Reply::Text("v1"),
            Reply::Fail(server_error()),
        ]);
        let agent = agent_with(&provider, 3).await;

        let err = agent.run("task").await.unwrap_err();

        assert_eq!(err.stage, Stage::Reflection { round: 2 });
        assert_eq!(err.to_string(), "reflection round 2 failed");
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn test_refinement_failure_stops_further_rounds() {
        let provider = ScriptedProvider::new(vec![
            Reply::Text("v0"),
            Reply::Text("fix 1"),
            Reply::Text("v1"),
            Reply::Text("fix 2"),
            Reply::Fail(ProviderError::EmptyResponse {
                provider: "scripted".to_string(),
            }),
        ]);
        let agent = agent_with(&provider, 3).await;

        let err = agent.run("task").await.unwrap_err();

        assert_eq!(err.stage, Stage::Refinement { round: 2 });
        assert!(matches!(err.failure, Failure::Provider(ProviderError::EmptyResponse { .. })));
        // 1 initial + 2 for round 1 + critique and failed refine for round 2
        assert_eq!(provider.calls(), 1 + 2 * (2 - 1) + 2);
    }

    // ── debug tracing ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_debug_mode_does_not_change_outcome() {
        let script = || {
            vec![
                Reply::Text("v0"),
                Reply::Text("fix"),
                Reply::Text("v1"),
                Reply::Text("No changes needed."),
            ]
        };

        let quiet = ScriptedProvider::new(script());
        let loud = ScriptedProvider::new(script());
        let quiet_agent = ReflectionAgent::new(quiet.clone(), config(3)).await.unwrap();
        let loud_agent = ReflectionAgent::new(loud.clone(), config(3).with_debug(true))
            .await
            .unwrap();

        let never = CancellationToken::new();
        let a = quiet_agent.run_until("task", &never).await.unwrap();
        let b = loud_agent.run_until("task", &never).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(quiet.calls(), loud.calls());
    }

    /// Shared in-memory sink for a test subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Build an agent and run it to completion with every event captured
    async fn run_captured(config: AgentConfig) -> (Reflection, String) {
        use tracing::instrument::WithSubscriber;

        let provider = ScriptedProvider::new(vec![
            Reply::Text("v0"),
            Reply::Text("fix"),
            Reply::Text("v1"),
            Reply::Text("No changes needed."),
        ]);
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();

        let result = async {
            let agent = ReflectionAgent::new(provider, config).await.unwrap();
            agent.run_until("task", &CancellationToken::new()).await.unwrap()
        }
        .with_subscriber(subscriber)
        .await;

        (result, logs.contents())
    }

    #[tokio::test]
    async fn test_debug_traces_every_stage() {
        let (result, logs) = run_captured(config(3).with_debug(true)).await;

        assert_eq!(result.stop, StopReason::Approved { round: 2 });
        for line in [
            "Debug mode is enabled. Using scripted model test-model",
            "Generating initial code for task:",
            "Initial output:",
            "Reflection round 1...",
            "Critique:",
            "Updated code:",
            "Reflection round 2...",
            "No changes needed. Final code is ready.",
        ] {
            assert!(logs.contains(line), "missing {:?} in:\n{}", line, logs);
        }
        assert!(logs.contains("socrates::agent"));
        assert!(!logs.contains("Reflection round 3"));
    }

    #[tokio::test]
    async fn test_debug_off_emits_nothing() {
        let (result, logs) = run_captured(config(3)).await;

        assert_eq!(result.stop, StopReason::Approved { round: 2 });
        assert!(!logs.contains("socrates::agent"), "unexpected output:\n{}", logs);
    }

    // ── cancellation ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_calls() {
        let provider = ScriptedProvider::new(vec![Reply::Text("v0")]);
        let agent = agent_with(&provider, 3).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = agent.run_until("task", &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.stage, Stage::InitialGeneration);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_critique() {
        let provider = ScriptedProvider::new(vec![Reply::Text("v0"), Reply::Hang]);
        let agent = agent_with(&provider, 3).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            trigger.cancel();
        });

        let err = agent.run_until("task", &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.stage, Stage::Reflection { round: 1 });
        assert_eq!(provider.calls(), 2);
    }

    // ── concurrency ───────────────────────────────────────────────────────────

    /// Answers by looking at the prompt, so call order across runs does not matter
    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn chat(&self, _model: &str, prompt: &str) -> Result<String, ProviderError> {
            tokio::task::yield_now().await;
            if prompt.starts_with("Analyze") {
                return Ok("No changes needed.".to_string());
            }
            let task = prompt
                .split("<task>")
                .nth(1)
                .and_then(|rest| rest.split("</task>").next())
                .unwrap_or_default();
            Ok(format!("code for {}", task))
        }

        async fn validate_model(&self, _model: &str) -> Result<(), ProviderError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_independent_agents_share_a_provider() {
        let provider: Arc<dyn LlmProvider> = Arc::new(EchoProvider);
        let first = ReflectionAgent::new(provider.clone(), config(2)).await.unwrap();
        let second = ReflectionAgent::new(provider, config(2).with_debug(true))
            .await
            .unwrap();

        let (a, b) = tokio::join!(first.run("parse a date"), second.run("reverse a list"));

        assert_eq!(a.unwrap(), "code for parse a date");
        assert_eq!(b.unwrap(), "code for reverse a list");
    }
}
