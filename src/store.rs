//! The persistence seam: a collaborator that records finished runs.
//!
//! Persistence is strictly best-effort relative to the batch response.
//! The report handed to the caller is already final when any of this
//! runs; a store failure is logged and never surfaced.

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::bench::BatchReport;
use crate::error::BenchError;

/// One persisted (model, prompt) outcome. Only error-free results are
/// recorded, which is why the record carries no error field.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub prompt_id: String,
    pub model_name: String,
    pub response_time: u64,
    pub cost: f64,
    pub score: f64,
    pub response: String,
}

/// Durable storage for benchmark runs. Each operation is idempotent per
/// call; the driver makes no attempt at exactly-once delivery.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Opens a run record and returns its id.
    async fn create_run(&self, owner_id: &str, succeeded: usize) -> Result<String, BenchError>;

    /// Records the prompts of a run; returns one id per prompt, in order.
    async fn create_prompt_records(
        &self,
        run_id: &str,
        system_prompt: &str,
        prompts: &[String],
    ) -> Result<Vec<String>, BenchError>;

    /// Records the per-pair results of a run.
    async fn create_result_records(
        &self,
        run_id: &str,
        records: &[ResultRecord],
    ) -> Result<(), BenchError>;
}

/// Write a finished report to the store. Failures are absorbed: the
/// response to the caller was computed before this ran and must not
/// change because storage is unavailable.
pub async fn persist_report(store: &dyn ResultStore, owner_id: &str, report: &BatchReport) {
    if let Err(err) = try_persist(store, owner_id, report).await {
        log::warn!("failed to persist benchmark results for {owner_id}: {err}");
    }
}

async fn try_persist(
    store: &dyn ResultStore,
    owner_id: &str,
    report: &BatchReport,
) -> Result<(), BenchError> {
    let run_id = store.create_run(owner_id, report.stats.succeeded).await?;
    let prompt_ids = store
        .create_prompt_records(&run_id, &report.system_prompt, &report.prompts)
        .await?;

    let mut records = Vec::new();
    for model in &report.results {
        for result in model.prompt_results.iter().filter(|r| r.succeeded()) {
            let Some(prompt_id) = prompt_ids.get(result.prompt_index) else {
                continue;
            };
            records.push(ResultRecord {
                prompt_id: prompt_id.clone(),
                model_name: model.model_name.clone(),
                response_time: result.response_time,
                cost: result.cost,
                score: result.score,
                response: result.response.clone(),
            });
        }
    }
    store.create_result_records(&run_id, &records).await
}

/// One stored run, as kept by [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct StoredRun {
    pub owner_id: String,
    pub succeeded: usize,
    pub system_prompt: String,
    pub prompts: Vec<String>,
    pub records: Vec<ResultRecord>,
}

/// In-memory store. Useful for tests and for running the server without
/// a database behind it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: Mutex<Vec<(String, StoredRun)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored runs, in insertion order.
    pub async fn runs(&self) -> Vec<(String, StoredRun)> {
        self.runs.lock().await.clone()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn create_run(&self, owner_id: &str, succeeded: usize) -> Result<String, BenchError> {
        let run_id = Uuid::new_v4().to_string();
        self.runs.lock().await.push((
            run_id.clone(),
            StoredRun {
                owner_id: owner_id.to_string(),
                succeeded,
                ..StoredRun::default()
            },
        ));
        Ok(run_id)
    }

    async fn create_prompt_records(
        &self,
        run_id: &str,
        system_prompt: &str,
        prompts: &[String],
    ) -> Result<Vec<String>, BenchError> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|(id, _)| id == run_id)
            .map(|(_, run)| run)
            .ok_or_else(|| BenchError::Storage(format!("unknown run id: {run_id}")))?;
        run.system_prompt = system_prompt.to_string();
        run.prompts = prompts.to_vec();
        Ok((0..prompts.len())
            .map(|index| format!("{run_id}:{index}"))
            .collect())
    }

    async fn create_result_records(
        &self,
        run_id: &str,
        records: &[ResultRecord],
    ) -> Result<(), BenchError> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|(id, _)| id == run_id)
            .map(|(_, run)| run)
            .ok_or_else(|| BenchError::Storage(format!("unknown run id: {run_id}")))?;
        run.records.extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::types::{BatchStats, ModelResult, PromptResult};
    use crate::registry::ModelSpec;

    fn report() -> BatchReport {
        let spec = ModelSpec {
            id: "acme/a".into(),
            name: "Acme A".into(),
            provider: "acme".into(),
            context_length: 8192,
            prompt_price: 0.0,
            completion_price: 0.0,
            open_source: false,
            retains_data: false,
        };
        let results = vec![ModelResult::from_prompt_results(
            &spec,
            vec![
                PromptResult::success(0, "p0", "r0", 42, 0.001),
                PromptResult::failure(1, "p1", "broken"),
            ],
        )];
        let stats = BatchStats::compute(&results, 2);
        BatchReport {
            success: true,
            results,
            stats,
            system_prompt: "sp".into(),
            prompts: vec!["p0".into(), "p1".into()],
        }
    }

    #[tokio::test]
    async fn persist_writes_only_successful_results() {
        let store = MemoryStore::new();
        persist_report(&store, "owner-1", &report()).await;

        let runs = store.runs().await;
        assert_eq!(runs.len(), 1);
        let (_, run) = &runs[0];
        assert_eq!(run.owner_id, "owner-1");
        assert_eq!(run.succeeded, 1);
        assert_eq!(run.prompts.len(), 2);
        assert_eq!(run.records.len(), 1);
        assert_eq!(run.records[0].model_name, "Acme A");
        assert_eq!(run.records[0].response_time, 42);
    }

    struct BrokenStore;

    #[async_trait]
    impl ResultStore for BrokenStore {
        async fn create_run(&self, _: &str, _: usize) -> Result<String, BenchError> {
            Err(BenchError::Storage("disk on fire".into()))
        }

        async fn create_prompt_records(
            &self,
            _: &str,
            _: &str,
            _: &[String],
        ) -> Result<Vec<String>, BenchError> {
            unreachable!("create_run already failed")
        }

        async fn create_result_records(
            &self,
            _: &str,
            _: &[ResultRecord],
        ) -> Result<(), BenchError> {
            unreachable!("create_run already failed")
        }
    }

    #[tokio::test]
    async fn persist_absorbs_store_failures() {
        // Must not panic or propagate; the failure is only logged.
        persist_report(&BrokenStore, "owner-1", &report()).await;
    }
}
