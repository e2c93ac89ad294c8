use serde::{Deserialize, Serialize};

use crate::cost::round_to_decimals;
use crate::registry::ModelSpec;

/// One benchmark invocation: which models to run against which prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    /// Registry ids of the candidate models
    pub selected_model_ids: Vec<String>,
    /// Shared system prompt, applied to every prompt when non-empty
    #[serde(default)]
    pub system_prompt: String,
    /// The prompts to run
    pub prompts: Vec<String>,
}

/// Outcome of generating with one (model, prompt) pair.
///
/// Invariant: `error` is set exactly when `response` is empty and
/// `response_time`/`cost` are zero. `score` starts at the unscored
/// sentinel 0 and is written once by the scoring stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResult {
    /// Position of the prompt within the batch
    pub prompt_index: usize,
    /// The prompt text, kept for judge prompting and persistence
    pub prompt: String,
    /// Generated response text, empty on failure
    pub response: String,
    /// Wall-clock generation time in milliseconds, 0 on failure
    pub response_time: u64,
    /// Monetary cost of the call, 0 on failure
    pub cost: f64,
    /// Judge-assigned quality score, 0 until scored
    pub score: f64,
    /// Failure description when the pair could not be generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PromptResult {
    pub fn success(
        prompt_index: usize,
        prompt: impl Into<String>,
        response: impl Into<String>,
        response_time: u64,
        cost: f64,
    ) -> Self {
        Self {
            prompt_index,
            prompt: prompt.into(),
            response: response.into(),
            response_time,
            cost,
            score: 0.0,
            error: None,
        }
    }

    pub fn failure(prompt_index: usize, prompt: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            prompt_index,
            prompt: prompt.into(),
            response: String::new(),
            response_time: 0,
            cost: 0.0,
            score: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome for one model across all prompts in the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResult {
    /// Registry id of the model, copied at run time
    pub model_id: String,
    /// Display name of the model
    pub model_name: String,
    /// Upstream provider name
    pub provider: String,
    /// Whether the model weights are openly available
    pub open_source: bool,
    /// Per-prompt results, in prompt order
    pub prompt_results: Vec<PromptResult>,
    /// Mean judge score over error-free results, 0 when none
    pub average_score: f64,
    /// Mean cost over error-free results, 0 when none
    pub average_cost: f64,
    /// Mean response time over error-free results, 0 when none
    pub average_response_time: f64,
    /// Cost summed over all results, failed pairs contributing 0
    pub total_cost: f64,
    /// Set when the whole model run failed before any prompt completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelResult {
    /// Assemble a model result from its per-prompt outcomes, computing the
    /// cost and latency aggregates. `average_score` stays at the sentinel
    /// until the scoring stage has run.
    pub fn from_prompt_results(spec: &ModelSpec, prompt_results: Vec<PromptResult>) -> Self {
        let succeeded: Vec<&PromptResult> =
            prompt_results.iter().filter(|r| r.succeeded()).collect();
        let (average_cost, average_response_time) = if succeeded.is_empty() {
            (0.0, 0.0)
        } else {
            let count = succeeded.len() as f64;
            (
                succeeded.iter().map(|r| r.cost).sum::<f64>() / count,
                succeeded.iter().map(|r| r.response_time as f64).sum::<f64>() / count,
            )
        };
        let total_cost = prompt_results.iter().map(|r| r.cost).sum();

        Self {
            model_id: spec.id.clone(),
            model_name: spec.name.clone(),
            provider: spec.provider.clone(),
            open_source: spec.open_source,
            prompt_results,
            average_score: 0.0,
            average_cost,
            average_response_time,
            total_cost,
            error: None,
        }
    }

    /// A model whose entire run failed before any prompt produced a result.
    pub fn failed(spec: &ModelSpec, error: impl Into<String>) -> Self {
        Self {
            model_id: spec.id.clone(),
            model_name: spec.name.clone(),
            provider: spec.provider.clone(),
            open_source: spec.open_source,
            prompt_results: Vec::new(),
            average_score: 0.0,
            average_cost: 0.0,
            average_response_time: 0.0,
            total_cost: 0.0,
            error: Some(error.into()),
        }
    }

    /// Recompute `average_score` from the now-scored prompt results, mean
    /// over error-free entries rounded to one decimal place. Supersedes
    /// the provisional zero set during generation.
    pub fn recompute_average_score(&mut self) {
        let scored: Vec<f64> = self
            .prompt_results
            .iter()
            .filter(|r| r.succeeded())
            .map(|r| r.score)
            .collect();
        self.average_score = if scored.is_empty() {
            0.0
        } else {
            round_to_decimals(scored.iter().sum::<f64>() / scored.len() as f64, 1)
        };
    }
}

/// Run-wide summary over every (model, prompt) attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total_models: usize,
    pub total_prompts: usize,
    pub total_attempts: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Mean of per-model average response times, over models with at
    /// least one successful prompt
    pub average_response_time: f64,
    /// Cost summed across all models
    pub total_cost: f64,
}

impl BatchStats {
    pub fn compute(results: &[ModelResult], total_prompts: usize) -> Self {
        let succeeded: usize = results
            .iter()
            .map(|m| m.prompt_results.iter().filter(|r| r.succeeded()).count())
            .sum();
        let total_attempts = results.len() * total_prompts;
        let responsive: Vec<&ModelResult> = results
            .iter()
            .filter(|m| m.prompt_results.iter().any(|r| r.succeeded()))
            .collect();
        let average_response_time = if responsive.is_empty() {
            0.0
        } else {
            responsive
                .iter()
                .map(|m| m.average_response_time)
                .sum::<f64>()
                / responsive.len() as f64
        };

        Self {
            total_models: results.len(),
            total_prompts,
            total_attempts,
            succeeded,
            failed: total_attempts - succeeded,
            average_response_time,
            total_cost: results.iter().map(|m| m.total_cost).sum(),
        }
    }
}

/// Everything the caller gets back from one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub success: bool,
    pub results: Vec<ModelResult>,
    pub stats: BatchStats,
    pub system_prompt: String,
    /// The non-empty, trimmed prompts actually run
    pub prompts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ModelSpec {
        ModelSpec {
            id: "acme/one".into(),
            name: "Acme One".into(),
            provider: "acme".into(),
            context_length: 8192,
            prompt_price: 1e-6,
            completion_price: 2e-6,
            open_source: true,
            retains_data: false,
        }
    }

    fn mixed_results() -> Vec<PromptResult> {
        vec![
            PromptResult::success(0, "p0", "r0", 100, 0.002),
            PromptResult::failure(1, "p1", "connection reset"),
            PromptResult::success(2, "p2", "r2", 300, 0.004),
        ]
    }

    #[test]
    fn failure_holds_the_error_invariant() {
        let result = PromptResult::failure(3, "p", "boom");
        assert!(result.error.is_some());
        assert!(result.response.is_empty());
        assert_eq!(result.response_time, 0);
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn aggregates_skip_failed_results() {
        let model = ModelResult::from_prompt_results(&spec(), mixed_results());
        assert!((model.average_cost - 0.003).abs() < 1e-12);
        assert_eq!(model.average_response_time, 200.0);
    }

    #[test]
    fn total_cost_sums_all_results() {
        let model = ModelResult::from_prompt_results(&spec(), mixed_results());
        assert!((model.total_cost - 0.006).abs() < 1e-8);
    }

    #[test]
    fn all_failed_yields_zero_aggregates() {
        let results = vec![
            PromptResult::failure(0, "p0", "x"),
            PromptResult::failure(1, "p1", "y"),
        ];
        let mut model = ModelResult::from_prompt_results(&spec(), results);
        model.recompute_average_score();
        assert_eq!(model.average_score, 0.0);
        assert_eq!(model.average_cost, 0.0);
        assert_eq!(model.average_response_time, 0.0);
        assert_eq!(model.total_cost, 0.0);
    }

    #[test]
    fn average_score_rounds_to_one_decimal() {
        let mut model = ModelResult::from_prompt_results(&spec(), mixed_results());
        model.prompt_results[0].score = 4.0;
        model.prompt_results[2].score = 4.25;
        model.recompute_average_score();
        assert_eq!(model.average_score, 4.1);
    }

    #[test]
    fn stats_count_attempts_and_split_by_outcome() {
        let model_a = ModelResult::from_prompt_results(&spec(), mixed_results());
        let model_b = ModelResult::failed(&spec(), "registry hiccup");
        let stats = BatchStats::compute(&[model_a, model_b], 3);

        assert_eq!(stats.total_models, 2);
        assert_eq!(stats.total_prompts, 3);
        assert_eq!(stats.total_attempts, 6);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 4);
        // Only the responsive model contributes to the latency average.
        assert_eq!(stats.average_response_time, 200.0);
    }

    #[test]
    fn batch_request_accepts_camel_case_json() {
        let req: BatchRequest = serde_json::from_str(
            r#"{"selectedModelIds": ["a"], "systemPrompt": "sp", "prompts": ["p"]}"#,
        )
        .unwrap();
        assert_eq!(req.selected_model_ids, ["a"]);
        assert_eq!(req.system_prompt, "sp");
    }

    #[test]
    fn system_prompt_defaults_to_empty() {
        let req: BatchRequest =
            serde_json::from_str(r#"{"selectedModelIds": ["a"], "prompts": ["p"]}"#).unwrap();
        assert!(req.system_prompt.is_empty());
    }

    #[test]
    fn prompt_result_serializes_camel_case_without_null_error() {
        let json =
            serde_json::to_string(&PromptResult::success(0, "p", "r", 10, 0.1)).unwrap();
        assert!(json.contains("\"promptIndex\":0"));
        assert!(json.contains("\"responseTime\":10"));
        assert!(!json.contains("error"));
    }
}
