//! LLM Backend Module
//!
//! The model is an opaque text generator behind [`TextGenerator`]. All access
//! goes through [`InferenceGateway`], which owns the single inference slot,
//! builds the frozen prompt and picks generation parameters by severity tier.
//!
//! ## Backends
//!
//! - [`StubGenerator`]: canned response, no model required
//! - `MistralRsBackend` (feature `llm`): GGUF model via mistral.rs, CPU by
//!   default, CUDA with the `cuda` feature

use anyhow::Result;
use async_trait::async_trait;

mod gateway;
pub mod prompt;
mod stub;

#[cfg(feature = "llm")]
mod mistral_rs;
#[cfg(feature = "llm")]
pub use mistral_rs::{is_cuda_available, MistralRsBackend};

pub use gateway::{GatewayError, GatewayStats, InferenceGateway, InferencePermit};
pub use stub::{StubGenerator, STUB_RESPONSE};

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f32,
    pub stop_sequences: &'static [&'static str],
}

/// Opaque text-generation capability.
///
/// Implementations need not be reentrant; the gateway never issues two calls
/// at once.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` (already fully templated)
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// Get the backend name for logging
    fn backend_name(&self) -> &'static str;
}
