//! Runs the judge pass over a finished generation phase and writes the
//! resolved scores back into the prompt results.

use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::bench::types::ModelResult;
use crate::chat::ChatMessage;
use crate::error::BenchError;
use crate::provider::{CallParams, ChatProvider};

use super::parser::{parse_scores, ParsedScores};
use super::{build_judge_prompt, JudgeConfig, JudgeEntry};

/// One judge call to make: which prompt, which response slots (positions
/// into the model-result list), and the assembled judge prompt.
struct JudgeJob {
    prompt_index: usize,
    slots: Vec<usize>,
    judge_prompt: String,
}

/// Score every prompt in the batch. Must only be called once generation
/// has completed for all models and prompts: the judge compares same-prompt
/// responses from multiple models in one request, so partial arrival
/// cannot be scored incrementally.
///
/// Judge calls for distinct prompts run concurrently under the shared
/// semaphore; write-back happens afterwards, so no two writers ever touch
/// the same result. Prompts with no eligible responses are skipped and
/// their scores stay at the sentinel.
pub(crate) async fn score_batch(
    provider: &dyn ChatProvider,
    config: &JudgeConfig,
    request_timeout: Duration,
    prompts: &[String],
    results: &mut [ModelResult],
    semaphore: &Semaphore,
) {
    let jobs = collect_jobs(config, prompts, results);
    if jobs.is_empty() {
        return;
    }

    let params = CallParams {
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    };

    let calls = jobs.iter().map(|job| async move {
        let _permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return (job, Err(BenchError::Provider("batch cancelled".into())));
            }
        };
        let messages = [ChatMessage::user().content(job.judge_prompt.as_str()).build()];
        match timeout(
            request_timeout,
            provider.chat(&config.model, &messages, &params),
        )
        .await
        {
            Ok(result) => (job, result.map(|completion| completion.text)),
            Err(_) => (
                job,
                Err(BenchError::Http(format!(
                    "judge request timed out after {request_timeout:?}"
                ))),
            ),
        }
    });
    let replies = join_all(calls).await;

    let mut rng = rand::thread_rng();
    for (job, reply) in replies {
        let aligned = align_reply(job, reply, config);
        for (&slot, parsed) in job.slots.iter().zip(aligned) {
            let score = parsed.unwrap_or_else(|| config.fallback.sample(&mut rng));
            write_back(&mut results[slot], job.prompt_index, score);
        }
    }
}

/// Collect, per prompt, the responses eligible for judging: models with no
/// top-level error whose result for that prompt is error-free.
fn collect_jobs(
    config: &JudgeConfig,
    prompts: &[String],
    results: &[ModelResult],
) -> Vec<JudgeJob> {
    (0..prompts.len())
        .filter_map(|prompt_index| {
            let mut slots = Vec::new();
            let mut entries = Vec::new();
            for (position, model) in results.iter().enumerate() {
                if model.error.is_some() {
                    continue;
                }
                let eligible = model
                    .prompt_results
                    .iter()
                    .find(|r| r.prompt_index == prompt_index && r.succeeded());
                if let Some(result) = eligible {
                    slots.push(position);
                    entries.push(JudgeEntry {
                        model_name: model.model_name.clone(),
                        provider: model.provider.clone(),
                        response: result.response.clone(),
                    });
                }
            }
            if slots.is_empty() {
                return None;
            }
            Some(JudgeJob {
                prompt_index,
                judge_prompt: build_judge_prompt(
                    &prompts[prompt_index],
                    &entries,
                    config.score_range,
                ),
                slots,
            })
        })
        .collect()
}

/// Turn one judge reply into one `Option<f64>` per slot. Every failure
/// mode resolves the same way (fallback for the unresolved slots) but is
/// logged under its own cause.
fn align_reply(
    job: &JudgeJob,
    reply: Result<String, BenchError>,
    config: &JudgeConfig,
) -> Vec<Option<f64>> {
    let expected = job.slots.len();
    match reply {
        Ok(text) => match parse_scores(&text, expected, config.score_range) {
            ParsedScores::Complete(scores) => scores.into_iter().map(Some).collect(),
            ParsedScores::Partial(aligned) => {
                log::warn!(
                    "judge returned {}/{} scores for prompt {}",
                    aligned.iter().flatten().count(),
                    expected,
                    job.prompt_index
                );
                aligned
            }
            ParsedScores::Unparseable => {
                log::warn!(
                    "judge reply for prompt {} contained no scores",
                    job.prompt_index
                );
                vec![None; expected]
            }
        },
        Err(err) => {
            log::warn!("judge call failed for prompt {}: {err}", job.prompt_index);
            vec![None; expected]
        }
    }
}

/// Match back from a judged slot to the originating result by prompt index
/// and error-freeness, not by array position: the collected subset order
/// may not equal the original model order when a model errored on this
/// prompt.
fn write_back(model: &mut ModelResult, prompt_index: usize, score: f64) {
    if let Some(result) = model
        .prompt_results
        .iter_mut()
        .find(|r| r.prompt_index == prompt_index && r.succeeded())
    {
        result.score = score;
    }
}
