//! Deterministic generator for UI wiring and tests

use anyhow::Result;
use async_trait::async_trait;

use super::{GenerationConfig, TextGenerator};

/// Text returned for every prompt by [`StubGenerator`]
pub const STUB_RESPONSE: &str = "This is a stubbed coaching response.\n\n\
Detected driving events:\n\
- Harsh braking and acceleration patterns observed\n\
- Speed variations present\n\n\
Use real LLM for actual feedback.";

/// Returns [`STUB_RESPONSE`] without looking at the prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        tracing::trace!(prompt_length = prompt.len(), max_tokens = config.max_tokens, "Stub generation");
        Ok(STUB_RESPONSE.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "stub"
    }
}
