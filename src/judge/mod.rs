//! The judge scoring stage: a second, prompt-scoped pass that asks a
//! fixed, more capable model to rank the candidate responses.

mod parser;
mod scorer;

pub use parser::{parse_scores, ParsedScores};
pub(crate) use scorer::score_batch;

use rand::Rng;

/// A closed numeric interval used for clamping and for fallback draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Uniform draw from the range.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        if self.min >= self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Configuration of the judge pass.
///
/// The fallback range is a product policy, not a correctness requirement:
/// the reference behavior scores unjudgeable responses optimistically, and
/// a deployment that would rather penalize them sets `fallback` to a low
/// band instead.
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Model used for scoring, never for user-facing output
    pub model: String,
    /// Token budget for the judge reply; scores are terse
    pub max_tokens: u32,
    /// Low temperature favors deterministic scoring
    pub temperature: f32,
    /// Range every parsed score is clamped into
    pub score_range: ScoreRange,
    /// Range fallback scores are drawn from when the judge cannot be used
    pub fallback: ScoreRange,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o".to_string(),
            max_tokens: 100,
            temperature: 0.1,
            score_range: ScoreRange::new(1.0, 5.0),
            fallback: ScoreRange::new(3.5, 5.0),
        }
    }
}

/// One candidate response offered to the judge for a given prompt.
#[derive(Debug, Clone)]
pub(crate) struct JudgeEntry {
    pub model_name: String,
    pub provider: String,
    pub response: String,
}

/// The single user message sent to the judge for one prompt: the original
/// prompt plus every collected response, labeled, with an instruction to
/// return exactly one score per response, comma-separated, in order.
pub(crate) fn build_judge_prompt(
    prompt: &str,
    entries: &[JudgeEntry],
    range: ScoreRange,
) -> String {
    let mut sections = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        sections.push(format!(
            "{}. {} ({}):\n{}",
            position + 1,
            entry.model_name,
            entry.provider,
            entry.response
        ));
    }

    format!(
        "You are judging {count} AI responses to the same prompt.\n\n\
         Prompt:\n{prompt}\n\n\
         Responses:\n{responses}\n\n\
         Rate the quality of each response on a scale from {min} to {max}. \
         Reply with exactly {count} numbers separated by commas, in the same \
         order as the responses above, and nothing else. Example: 4.5, 3.0, 5.0",
        count = entries.len(),
        prompt = prompt,
        responses = sections.join("\n\n"),
        min = range.min,
        max = range.max,
    )
}
