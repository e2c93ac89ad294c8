//! The batch orchestrator: validates the request, fans generation out
//! across models and prompts, runs the judge pass, and assembles the
//! final report.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::BenchError;
use crate::judge::{self, JudgeConfig};
use crate::provider::ChatProvider;
use crate::registry::{ModelRegistry, ModelSpec};

use super::generation::run_model;
use super::types::{BatchReport, BatchRequest, BatchStats, ModelResult};

/// Tuning knobs for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Maximum provider calls in flight across the whole batch. The two
    /// fan-out layers (models x prompts) share this budget; without it the
    /// fan-out width is their product, which exhausts sockets on large
    /// batches.
    pub max_in_flight: usize,
    /// Upper bound on any single provider or judge call
    pub request_timeout: Duration,
    /// Sampling temperature for candidate generations
    pub temperature: f32,
    /// Judge pass configuration
    pub judge: JudgeConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            request_timeout: Duration::from_secs(120),
            temperature: 0.7,
            judge: JudgeConfig::default(),
        }
    }
}

/// Runs benchmark batches against a provider and a model registry.
///
/// Both collaborators are injected; the orchestrator owns no global state
/// and can be constructed freely, one per deployment configuration.
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<dyn ModelRegistry>,
    config: BenchConfig,
}

impl Orchestrator {
    /// Creates a new orchestrator with the default configuration.
    pub fn new(provider: Arc<dyn ChatProvider>, registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            provider,
            registry,
            config: BenchConfig::default(),
        }
    }

    /// Creates a new orchestrator with an explicit configuration.
    pub fn with_config(
        provider: Arc<dyn ChatProvider>,
        registry: Arc<dyn ModelRegistry>,
        config: BenchConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
        }
    }

    /// Sets the cap on concurrent provider calls.
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.config.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Sets the per-call timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Replaces the judge configuration.
    pub fn judge(mut self, judge: JudgeConfig) -> Self {
        self.config.judge = judge;
        self
    }

    /// Runs one batch: every selected model against every prompt, then the
    /// judge pass, then the aggregate recompute.
    ///
    /// Only validation and registry failures are returned as errors; every
    /// downstream failure is absorbed into the report so partial results
    /// always come back rather than the whole batch being discarded.
    pub async fn run(&self, request: BatchRequest) -> Result<BatchReport, BenchError> {
        let (models, system_prompt, prompts) = self.validate(request).await?;
        log::debug!(
            "starting batch: {} models x {} prompts",
            models.len(),
            prompts.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let shared_system = Arc::new(system_prompt.clone());
        let shared_prompts = Arc::new(prompts.clone());
        let mut results = self
            .generate_all(&models, &shared_system, &shared_prompts, &semaphore)
            .await;

        // Full barrier: every model and prompt has finished generating
        // before any judge call goes out.
        judge::score_batch(
            self.provider.as_ref(),
            &self.config.judge,
            self.config.request_timeout,
            &prompts,
            &mut results,
            &semaphore,
        )
        .await;

        for model in &mut results {
            model.recompute_average_score();
        }

        let stats = BatchStats::compute(&results, prompts.len());
        Ok(BatchReport {
            success: true,
            results,
            stats,
            system_prompt,
            prompts,
        })
    }

    /// Rejects malformed batches before any network call is made.
    async fn validate(
        &self,
        request: BatchRequest,
    ) -> Result<(Vec<ModelSpec>, String, Vec<String>), BenchError> {
        let BatchRequest {
            selected_model_ids,
            system_prompt,
            prompts,
        } = request;

        if selected_model_ids.is_empty() || prompts.is_empty() {
            return Err(BenchError::InvalidRequest(
                "Missing required fields".to_string(),
            ));
        }

        let prompts: Vec<String> = prompts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if prompts.is_empty() {
            return Err(BenchError::InvalidRequest(
                "No valid prompts provided".to_string(),
            ));
        }

        let models = self.registry.find(&selected_model_ids).await?;
        if models.is_empty() {
            return Err(BenchError::ModelsNotFound("No models found".to_string()));
        }

        Ok((models, system_prompt, prompts))
    }

    /// Fans generation out across models, each model's own fan-out running
    /// inside a spawned task. A task that dies unexpectedly is converted
    /// into a top-level model error and does not abort its siblings;
    /// dropping this future drops the `JoinSet` and with it every task
    /// still in flight.
    async fn generate_all(
        &self,
        models: &[ModelSpec],
        system_prompt: &Arc<String>,
        prompts: &Arc<Vec<String>>,
        semaphore: &Arc<Semaphore>,
    ) -> Vec<ModelResult> {
        let config = Arc::new(self.config.clone());
        let mut tasks = JoinSet::new();
        for (position, model) in models.iter().enumerate() {
            let task = run_model(
                Arc::clone(&self.provider),
                model.clone(),
                Arc::clone(system_prompt),
                Arc::clone(prompts),
                Arc::clone(&config),
                Arc::clone(semaphore),
            );
            tasks.spawn(async move { (position, task.await) });
        }

        // Results arrive in completion order; slot them back into request
        // order. A slot a panicked task never filled becomes a top-level
        // model error.
        let mut slots: Vec<Option<ModelResult>> = models.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => slots[position] = Some(result),
                Err(err) => log::warn!("model generation task aborted: {err}"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.unwrap_or_else(|| {
                    ModelResult::failed(&models[position], "model run aborted unexpectedly")
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::types::PromptResult;
    use crate::chat::{ChatMessage, Usage};
    use crate::provider::{CallParams, ChatCompletion};
    use crate::registry::StaticRegistry;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const JUDGE_MODEL: &str = "openai/gpt-4o";

    /// Stub provider: echoes prompts, fails scripted (model, prompt)
    /// pairs, answers judge calls with a fixed reply, and tracks the peak
    /// number of concurrent calls.
    struct StubProvider {
        fail_on: HashSet<(String, String)>,
        judge_reply: Option<String>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
        judge_prompts: Mutex<Vec<String>>,
    }

    impl StubProvider {
        fn new() -> Self {
            Self {
                fail_on: HashSet::new(),
                judge_reply: Some("4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0".to_string()),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
                judge_prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, model: &str, prompt: &str) -> Self {
            self.fail_on.insert((model.to_string(), prompt.to_string()));
            self
        }

        fn with_judge_reply(mut self, reply: Option<&str>) -> Self {
            self.judge_reply = reply.map(str::to_string);
            self
        }

        fn peak(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn chat(
            &self,
            model: &str,
            messages: &[ChatMessage],
            _params: &CallParams,
        ) -> Result<ChatCompletion, BenchError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let prompt = messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();

            if model == JUDGE_MODEL {
                self.judge_prompts.lock().unwrap().push(prompt);
                return match &self.judge_reply {
                    Some(reply) => Ok(ChatCompletion {
                        text: reply.clone(),
                        usage: Usage::default(),
                    }),
                    None => Err(BenchError::Provider("judge unreachable".into())),
                };
            }

            if self.fail_on.contains(&(model.to_string(), prompt.clone())) {
                return Err(BenchError::Provider("upstream exploded".into()));
            }

            Ok(ChatCompletion {
                text: format!("{model} says: {prompt}"),
                usage: Usage {
                    prompt_tokens: 100,
                    completion_tokens: 50,
                    total_tokens: 150,
                },
            })
        }
    }

    fn spec(id: &str) -> ModelSpec {
        ModelSpec {
            id: id.to_string(),
            name: id.to_uppercase(),
            provider: "acme".to_string(),
            context_length: 8192,
            prompt_price: 1e-6,
            completion_price: 2e-6,
            open_source: false,
            retains_data: false,
        }
    }

    fn orchestrator(provider: StubProvider, ids: &[&str]) -> Orchestrator {
        let registry = StaticRegistry::new(ids.iter().copied().map(spec));
        Orchestrator::new(Arc::new(provider), Arc::new(registry))
    }

    fn request(ids: &[&str], prompts: &[&str]) -> BatchRequest {
        BatchRequest {
            selected_model_ids: ids.iter().map(|s| s.to_string()).collect(),
            system_prompt: String::new(),
            prompts: prompts.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn empty_model_list_is_rejected() {
        let orch = orchestrator(StubProvider::new(), &["acme/a"]);
        let err = orch.run(request(&[], &["p"])).await.unwrap_err();
        assert!(matches!(err, BenchError::InvalidRequest(_)));
        assert!(err.to_string().contains("Missing required fields"));
    }

    #[tokio::test]
    async fn whitespace_only_prompts_are_rejected() {
        let orch = orchestrator(StubProvider::new(), &["acme/a"]);
        let err = orch.run(request(&["acme/a"], &["   ", ""])).await.unwrap_err();
        assert!(err.to_string().contains("No valid prompts provided"));
    }

    #[tokio::test]
    async fn unknown_ids_are_dropped_and_all_unknown_is_not_found() {
        let orch = orchestrator(StubProvider::new(), &["acme/a"]);
        let report = orch
            .run(request(&["acme/a", "acme/ghost"], &["p"]))
            .await
            .unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].model_id, "acme/a");

        let orch = orchestrator(StubProvider::new(), &["acme/a"]);
        let err = orch.run(request(&["acme/ghost"], &["p"])).await.unwrap_err();
        assert!(matches!(err, BenchError::ModelsNotFound(_)));
        assert!(err.to_string().contains("No models found"));
    }

    #[tokio::test]
    async fn report_shape_matches_request() {
        let orch = orchestrator(StubProvider::new(), &["acme/a", "acme/b"]);
        let report = orch
            .run(request(&["acme/a", "acme/b"], &["p0", " p1 ", "p2"]))
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.prompts, vec!["p0", "p1", "p2"]);
        for model in &report.results {
            assert_eq!(model.prompt_results.len(), 3);
            let indices: Vec<usize> =
                model.prompt_results.iter().map(|r| r.prompt_index).collect();
            assert_eq!(indices, vec![0, 1, 2]);
        }
        assert_eq!(report.stats.total_attempts, 6);
        assert_eq!(report.stats.succeeded, 6);
        assert_eq!(report.stats.failed, 0);
    }

    #[tokio::test]
    async fn one_failing_pair_leaves_siblings_intact() {
        let provider = StubProvider::new().failing_on("acme/a", "p1");
        let orch = orchestrator(provider, &["acme/a", "acme/b"]);
        let report = orch
            .run(request(&["acme/a", "acme/b"], &["p0", "p1", "p2"]))
            .await
            .unwrap();

        let broken = &report.results[0];
        assert_eq!(broken.prompt_results.len(), 3);
        let failed: Vec<&PromptResult> = broken
            .prompt_results
            .iter()
            .filter(|r| !r.succeeded())
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].prompt_index, 1);
        assert!(failed[0].response.is_empty());
        assert_eq!(failed[0].response_time, 0);
        assert_eq!(failed[0].cost, 0.0);

        // Aggregates over the two survivors; total cost over all three.
        let per_call = crate::cost::completion_cost(100, 50, 1e-6, 2e-6);
        assert!((broken.average_cost - per_call).abs() < 1e-12);
        assert!((broken.total_cost - 2.0 * per_call).abs() < 1e-8);
        assert!(broken.average_score > 0.0);

        let healthy = &report.results[1];
        assert!(healthy.prompt_results.iter().all(|r| r.succeeded()));
        assert_eq!(report.stats.succeeded, 5);
        assert_eq!(report.stats.failed, 1);
    }

    #[tokio::test]
    async fn judge_failure_falls_back_for_every_survivor() {
        let provider = StubProvider::new().with_judge_reply(None);
        let orch = orchestrator(provider, &["acme/a", "acme/b", "acme/c"]);
        let report = orch
            .run(request(&["acme/a", "acme/b", "acme/c"], &["p0"]))
            .await
            .unwrap();

        for model in &report.results {
            let score = model.prompt_results[0].score;
            assert!(
                (3.5..=5.0).contains(&score),
                "expected fallback in [3.5, 5.0], got {score}"
            );
        }
    }

    #[tokio::test]
    async fn scores_from_judge_reach_the_averages() {
        let provider = StubProvider::new().with_judge_reply(Some("3.0, 5.0"));
        let orch = orchestrator(provider, &["acme/a", "acme/b"]);
        let report = orch
            .run(request(&["acme/a", "acme/b"], &["p0"]))
            .await
            .unwrap();

        assert_eq!(report.results[0].prompt_results[0].score, 3.0);
        assert_eq!(report.results[1].prompt_results[0].score, 5.0);
        assert_eq!(report.results[0].average_score, 3.0);
        assert_eq!(report.results[1].average_score, 5.0);
    }

    #[tokio::test]
    async fn fan_out_respects_the_concurrency_cap() {
        let provider = Arc::new(StubProvider::new());
        let registry = StaticRegistry::new(["acme/a", "acme/b", "acme/c"].map(spec));
        let orch = Orchestrator::new(provider.clone(), Arc::new(registry)).max_in_flight(2);

        orch.run(request(
            &["acme/a", "acme/b", "acme/c"],
            &["p0", "p1", "p2", "p3"],
        ))
        .await
        .unwrap();

        assert!(
            provider.peak() <= 2,
            "peak concurrency {} exceeded the cap",
            provider.peak()
        );
    }

    #[tokio::test]
    async fn system_prompt_is_prepended_for_generation() {
        let provider = Arc::new(StubProvider::new());
        let registry = StaticRegistry::new(["acme/a"].map(spec));
        let orch = Orchestrator::new(provider.clone(), Arc::new(registry));

        let mut req = request(&["acme/a"], &["p0"]);
        req.system_prompt = "answer in French".to_string();
        let report = orch.run(req).await.unwrap();

        assert_eq!(report.system_prompt, "answer in French");
        // The stub echoes the last (user) message, so the response still
        // carries the prompt rather than the system text.
        assert!(report.results[0].prompt_results[0].response.ends_with("p0"));
    }

    #[tokio::test]
    async fn judge_sees_each_prompt_once() {
        let provider = Arc::new(StubProvider::new());
        let registry = StaticRegistry::new(["acme/a", "acme/b"].map(spec));
        let orch = Orchestrator::new(provider.clone(), Arc::new(registry));

        orch.run(request(&["acme/a", "acme/b"], &["alpha", "beta"]))
            .await
            .unwrap();

        let prompts = provider.judge_prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().any(|p| p.contains("alpha")));
        assert!(prompts.iter().any(|p| p.contains("beta")));
        // Both candidate responses appear in the judge request.
        assert!(prompts.iter().all(|p| p.contains("ACME/A") && p.contains("ACME/B")));
    }
}
