//! Prompt template, tier parameters and response post-processing
//!
//! The template matches the format the coaching model was fine-tuned on.
//! Changing any byte of it requires retraining the model.

use super::GenerationConfig;
use crate::types::SeverityTier;

const SYSTEM_HEADER: &str = "<|start_header_id|>system<|end_header_id|>\n\n";
const USER_HEADER: &str = "<|start_header_id|>user<|end_header_id|>\n\n";
const END_OF_TURN: &str = "<|eot_id|>";

/// Marker after which the assistant turn begins
pub const ASSISTANT_MARKER: &str = "<|start_header_id|>assistant<|end_header_id|>\n\n";

/// Fixed coaching instruction
pub const SYSTEM_INSTRUCTION: &str = "You are an expert driving coach. Analyze EVERY item in the sensor data. \
Give SPECIFIC feedback on harsh brakes, accelerations, corners, bumps, jerk, \
and speed variance. Be honest about issues but encouraging. Always mention \
detected events.";

/// Stop markers shared by every tier
pub const STOP_SEQUENCES: &[&str] = &["<|eot_id|>", "<|start_header_id|>"];

/// Generation parameters indexed by [`SeverityTier::ordinal`]
const TIER_CONFIGS: [GenerationConfig; 3] = [
    // LOW
    GenerationConfig {
        max_tokens: 200,
        temperature: 0.35,
        top_p: 0.95,
        repeat_penalty: 1.10,
        stop_sequences: STOP_SEQUENCES,
    },
    // MEDIUM
    GenerationConfig {
        max_tokens: 200,
        temperature: 0.35,
        top_p: 0.95,
        repeat_penalty: 1.10,
        stop_sequences: STOP_SEQUENCES,
    },
    // HIGH: longer, more conservative feedback
    GenerationConfig {
        max_tokens: 320,
        temperature: 0.15,
        top_p: 0.85,
        repeat_penalty: 1.20,
        stop_sequences: STOP_SEQUENCES,
    },
];

/// Generation parameters for a severity tier
pub const fn generation_config(tier: SeverityTier) -> GenerationConfig {
    TIER_CONFIGS[tier.ordinal()]
}

/// Wrap a summary block in the chat template. The summary is inserted verbatim.
pub fn build_prompt(summary: &str) -> String {
    let mut prompt = String::with_capacity(
        SYSTEM_HEADER.len() + SYSTEM_INSTRUCTION.len() + summary.len() + 160,
    );
    prompt.push_str(SYSTEM_HEADER);
    prompt.push_str(SYSTEM_INSTRUCTION);
    prompt.push_str(END_OF_TURN);
    prompt.push_str(USER_HEADER);
    prompt.push_str(summary);
    prompt.push_str(END_OF_TURN);
    prompt.push_str(ASSISTANT_MARKER);
    prompt
}

/// Strip an echoed template from raw model output.
///
/// When the assistant marker is present only the text after its last
/// occurrence and before the next end-of-turn is kept.
pub fn extract_response(raw: &str) -> String {
    match raw.rsplit_once(ASSISTANT_MARKER) {
        Some((_, tail)) => tail.split(END_OF_TURN).next().unwrap_or(tail).trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Apply literal, case-sensitive replacements in order.
///
/// Empty patterns are skipped.
pub fn apply_substitutions(text: &str, substitutions: &[(String, String)]) -> String {
    substitutions
        .iter()
        .filter(|(from, _)| !from.is_empty())
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}
