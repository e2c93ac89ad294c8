//! The generation stage: one (model, prompt) call, and the per-model
//! fan-out across prompts.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::chat::ChatMessage;
use crate::cost::completion_cost;
use crate::provider::{CallParams, ChatProvider};
use crate::registry::ModelSpec;

use super::orchestrator::BenchConfig;
use super::types::{ModelResult, PromptResult};

/// Hard ceiling on completion tokens per call, independent of the model's
/// context window.
const MAX_COMPLETION_TOKENS: u32 = 1000;

/// Completion-token budget for one call: capped at 1000 and at 30% of the
/// model's context window, so one request can neither overflow the context
/// nor run away on cost.
pub(crate) fn clamp_max_tokens(context_length: u32) -> u32 {
    MAX_COMPLETION_TOKENS.min((f64::from(context_length) * 0.3).floor() as u32)
}

/// Message list for one generation: the shared system prompt when set,
/// then the prompt under test.
pub(crate) fn build_messages(system_prompt: &str, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !system_prompt.is_empty() {
        messages.push(ChatMessage::system().content(system_prompt).build());
    }
    messages.push(ChatMessage::user().content(prompt).build());
    messages
}

/// Generate one (model, prompt) pair. Never returns an error: every
/// failure mode ends up in the result's error field so sibling tasks in
/// the fan-out are unaffected.
pub(crate) async fn generate_one(
    provider: &dyn ChatProvider,
    model: &ModelSpec,
    system_prompt: &str,
    prompt: &str,
    prompt_index: usize,
    config: &BenchConfig,
) -> PromptResult {
    let messages = build_messages(system_prompt, prompt);
    let params = CallParams {
        max_tokens: clamp_max_tokens(model.context_length),
        temperature: config.temperature,
    };

    let start = Instant::now();
    let outcome = timeout(
        config.request_timeout,
        provider.chat(&model.id, &messages, &params),
    )
    .await;

    match outcome {
        Ok(Ok(completion)) => {
            let elapsed = start.elapsed().as_millis() as u64;
            let cost = completion_cost(
                completion.usage.prompt_tokens,
                completion.usage.completion_tokens,
                model.prompt_price,
                model.completion_price,
            );
            PromptResult::success(prompt_index, prompt, completion.text, elapsed, cost)
        }
        Ok(Err(err)) => {
            log::warn!("generation failed for {} prompt {prompt_index}: {err}", model.id);
            PromptResult::failure(prompt_index, prompt, err.to_string())
        }
        Err(_) => {
            log::warn!(
                "generation timed out for {} prompt {prompt_index} after {:?}",
                model.id,
                config.request_timeout
            );
            PromptResult::failure(
                prompt_index,
                prompt,
                format!("request timed out after {:?}", config.request_timeout),
            )
        }
    }
}

/// Run one model against every prompt concurrently, each call gated on the
/// batch-wide semaphore. `join_all` keeps the results in prompt order no
/// matter which network call returns first.
pub(crate) async fn run_model(
    provider: Arc<dyn ChatProvider>,
    model: ModelSpec,
    system_prompt: Arc<String>,
    prompts: Arc<Vec<String>>,
    config: Arc<BenchConfig>,
    semaphore: Arc<Semaphore>,
) -> ModelResult {
    let tasks = prompts.iter().enumerate().map(|(prompt_index, prompt)| {
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let model = &model;
        let system_prompt = &system_prompt;
        let config = &config;
        async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return PromptResult::failure(prompt_index, prompt.as_str(), "batch cancelled")
                }
            };
            generate_one(
                provider.as_ref(),
                model,
                system_prompt,
                prompt,
                prompt_index,
                config,
            )
            .await
        }
    });

    let prompt_results = join_all(tasks).await;
    ModelResult::from_prompt_results(&model, prompt_results)
}
