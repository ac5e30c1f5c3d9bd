//! Inference Gateway - single-slot access to the text generator
//!
//! The generator is injected once. Every call holds the gateway's only
//! semaphore permit for its full duration, so the generator never sees two
//! requests at once no matter how many sessions or callers exist.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::prompt::{apply_substitutions, build_prompt, extract_response, generation_config};
use super::TextGenerator;
use crate::types::{FeedbackMode, SeverityTier};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("inference capability not initialized")]
    NotInitialized,

    #[error("inference capability already initialized")]
    AlreadyInitialized,

    #[error("inference slot is busy")]
    Busy,

    #[error("generation failed: {0}")]
    Generation(String),
}

/// Proof of holding the inference slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct InferencePermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Default)]
struct Counters {
    inference_count: u64,
    failures: u64,
    total_latency_ms: f64,
    per_tier: [u64; 3],
}

pub struct InferenceGateway {
    generator: OnceLock<Arc<dyn TextGenerator>>,
    slot: Arc<Semaphore>,
    coach_substitutions: Vec<(String, String)>,
    stats: Mutex<Counters>,
    busy_rejections: AtomicU64,
}

impl InferenceGateway {
    /// Empty gateway; inject a generator before use.
    pub fn new(coach_substitutions: Vec<(String, String)>) -> Self {
        Self {
            generator: OnceLock::new(),
            slot: Arc::new(Semaphore::new(1)),
            coach_substitutions,
            stats: Mutex::new(Counters::default()),
            busy_rejections: AtomicU64::new(0),
        }
    }

    /// Gateway with a generator already injected.
    pub fn with_generator(
        generator: Arc<dyn TextGenerator>,
        coach_substitutions: Vec<(String, String)>,
    ) -> Self {
        let gateway = Self::new(coach_substitutions);
        // A fresh OnceLock always accepts the first value
        let _ = gateway.generator.set(generator);
        gateway
    }

    /// Install the generator. Only the first call succeeds.
    pub fn inject(&self, generator: Arc<dyn TextGenerator>) -> Result<(), GatewayError> {
        let name = generator.backend_name();
        self.generator.set(generator).map_err(|_| GatewayError::AlreadyInitialized)?;
        info!(backend = name, "Inference generator injected");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.generator.get().is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.generator.get().map(|g| g.backend_name())
    }

    /// Take the slot without waiting.
    pub fn try_reserve(&self) -> Result<InferencePermit, GatewayError> {
        if !self.is_initialized() {
            return Err(GatewayError::NotInitialized);
        }
        match Arc::clone(&self.slot).try_acquire_owned() {
            Ok(permit) => Ok(InferencePermit { _permit: permit }),
            Err(_) => {
                self.busy_rejections.fetch_add(1, Ordering::Relaxed);
                Err(GatewayError::Busy)
            }
        }
    }

    /// Wait for the slot.
    pub async fn reserve(&self) -> Result<InferencePermit, GatewayError> {
        if !self.is_initialized() {
            return Err(GatewayError::NotInitialized);
        }
        // The semaphore is never closed
        let permit = Arc::clone(&self.slot)
            .acquire_owned()
            .await
            .map_err(|_| GatewayError::Busy)?;
        Ok(InferencePermit { _permit: permit })
    }

    /// Wait for the slot, then generate coaching text for a summary.
    pub async fn generate(
        &self,
        summary: &str,
        tier: SeverityTier,
        mode: FeedbackMode,
    ) -> Result<String, GatewayError> {
        let permit = self.reserve().await?;
        self.generate_with(permit, summary, tier, mode).await
    }

    /// Generate while holding an already reserved slot.
    ///
    /// The permit is released when this returns.
    pub async fn generate_with(
        &self,
        permit: InferencePermit,
        summary: &str,
        tier: SeverityTier,
        mode: FeedbackMode,
    ) -> Result<String, GatewayError> {
        let generator = self.generator.get().ok_or(GatewayError::NotInitialized)?;
        let config = generation_config(tier);
        let prompt = build_prompt(summary);

        debug!(
            backend = generator.backend_name(),
            tier = %tier,
            max_tokens = config.max_tokens,
            prompt_length = prompt.len(),
            "Starting inference"
        );

        let start = Instant::now();
        let result = generator.generate(&prompt, &config).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        drop(permit);

        let mut stats = self.stats.lock().await;
        match result {
            Ok(raw) => {
                stats.inference_count += 1;
                stats.total_latency_ms += elapsed_ms;
                stats.per_tier[tier.ordinal()] += 1;
                drop(stats);

                let text = extract_response(&raw);
                debug!(tier = %tier, latency_ms = elapsed_ms, response_length = text.len(), "Inference complete");
                Ok(match mode {
                    FeedbackMode::Driver => text,
                    FeedbackMode::Coach => apply_substitutions(&text, &self.coach_substitutions),
                })
            }
            Err(e) => {
                stats.failures += 1;
                drop(stats);
                warn!(tier = %tier, error = %e, "Inference failed");
                Err(GatewayError::Generation(format!("{e:#}")))
            }
        }
    }

    pub async fn stats(&self) -> GatewayStats {
        let stats = self.stats.lock().await;
        GatewayStats {
            backend: self.backend_name(),
            inference_count: stats.inference_count,
            failures: stats.failures,
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            avg_latency_ms: if stats.inference_count > 0 {
                stats.total_latency_ms / stats.inference_count as f64
            } else {
                0.0
            },
            low: stats.per_tier[SeverityTier::Low.ordinal()],
            medium: stats.per_tier[SeverityTier::Medium.ordinal()],
            high: stats.per_tier[SeverityTier::High.ordinal()],
        }
    }
}

impl std::fmt::Debug for InferenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceGateway")
            .field("backend", &self.backend_name())
            .field("available_permits", &self.slot.available_permits())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayStats {
    pub backend: Option<&'static str>,
    pub inference_count: u64,
    pub failures: u64,
    pub busy_rejections: u64,
    pub avg_latency_ms: f64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

impl std::fmt::Display for GatewayStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Inference ({}): {} completions ({:.1}ms avg) - {} low, {} medium, {} high, {} failures, {} busy",
            self.backend.unwrap_or("none"),
            self.inference_count,
            self.avg_latency_ms,
            self.low,
            self.medium,
            self.high,
            self.failures,
            self.busy_rejections
        )
    }
}
