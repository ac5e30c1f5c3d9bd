//! Mistral.rs LLM Backend
//!
//! Runs the fine-tuned coaching model from a GGUF file. The prompt arrives
//! fully templated, so it is sent as a raw completion without any chat
//! formatting. Detects CUDA at runtime:
//! - **CUDA available** (requires `cuda` feature): GPU inference
//! - **CPU fallback**: CPU inference

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::{GenerationConfig, TextGenerator};

/// Mistral.rs backend using GGUF models with optional CUDA GPU support
pub struct MistralRsBackend {
    mistralrs: Arc<mistralrs::MistralRs>,
    model_path: String,
    uses_gpu: bool,
}

/// Check if CUDA is available at runtime.
///
/// Returns `true` only if the binary was compiled with the `cuda` feature
/// AND CUDA libraries/drivers are detected on the system.
pub fn is_cuda_available() -> bool {
    #[cfg(feature = "cuda")]
    {
        std::env::var("CUDA_VISIBLE_DEVICES").is_ok()
            || Path::new("/usr/local/cuda").exists()
            || Path::new("/opt/cuda").exists()
            || Path::new("/usr/lib/x86_64-linux-gnu/libcuda.so").exists()
    }
    #[cfg(not(feature = "cuda"))]
    {
        false
    }
}

impl MistralRsBackend {
    /// Load a GGUF model from the specified path
    pub async fn load(model_path: &Path) -> Result<Self> {
        use candle_core::Device;
        use mistralrs::{
            AutoDeviceMapParams, DefaultSchedulerMethod, DeviceMapSetting, LoaderBuilder,
            MistralRsBuilder, ModelDType, ModelSelected, SchedulerConfig, TokenSource,
        };

        let uses_gpu = is_cuda_available();
        tracing::info!(
            model_path = %model_path.display(),
            uses_gpu = uses_gpu,
            "Loading GGUF coaching model with mistral.rs backend"
        );

        if !model_path.exists() {
            anyhow::bail!("Model file not found: {}", model_path.display());
        }

        let start = std::time::Instant::now();

        let device = if uses_gpu {
            #[cfg(feature = "cuda")]
            {
                Device::cuda_if_available(0).context("Failed to initialize CUDA device")?
            }
            #[cfg(not(feature = "cuda"))]
            {
                Device::Cpu
            }
        } else {
            Device::Cpu
        };

        let model_dir = model_path
            .parent()
            .and_then(|p| p.to_str())
            .unwrap_or(".")
            .to_string();
        let model_filename = model_path
            .file_name()
            .and_then(|n| n.to_str())
            .context("Invalid model filename")?
            .to_string();

        let model = ModelSelected::GGUF {
            tok_model_id: None,
            quantized_model_id: model_dir,
            quantized_filename: model_filename,
            dtype: ModelDType::Auto,
            topology: None,
            max_seq_len: 2048,
            max_batch_size: 1,
        };

        let loader = LoaderBuilder::new(model)
            .build()
            .context("Failed to build loader")?;

        let pipeline = tokio::task::spawn_blocking(move || {
            loader.load_model_from_hf(
                None,                                                        // revision
                TokenSource::CacheToken,                                     // token_source
                &ModelDType::Auto,                                           // dtype
                &device,                                                     // device
                false,                                                       // silent
                DeviceMapSetting::Auto(AutoDeviceMapParams::default_text()), // mapper
                None,                                                        // in_situ_quant
                None,                                                        // paged_attn_config
            )
        })
        .await
        .context("Task join error")?
        .context("Failed to load model")?;

        // One request at a time; the gateway already serializes callers
        let mistralrs = MistralRsBuilder::new(
            pipeline,
            SchedulerConfig::DefaultScheduler {
                method: DefaultSchedulerMethod::Fixed(std::num::NonZeroUsize::MIN),
            },
            false, // throughput_logging
            None,  // search_embedding_model
        )
        .build()
        .await;

        tracing::info!(
            load_time_secs = start.elapsed().as_secs_f32(),
            uses_gpu = uses_gpu,
            "Coaching model loaded ({})",
            if uses_gpu { "GPU" } else { "CPU" }
        );

        Ok(Self {
            mistralrs,
            model_path: model_path.display().to_string(),
            uses_gpu,
        })
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }
}

#[async_trait]
impl TextGenerator for MistralRsBackend {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        use mistralrs::{NormalRequest, Request, RequestMessage, Response, SamplingParams, StopTokens};

        tracing::debug!(
            prompt_length = prompt.len(),
            max_tokens = config.max_tokens,
            temperature = config.temperature,
            "Sending request to mistral.rs"
        );

        let (tx, mut rx) = tokio::sync::mpsc::channel(100);

        let request = Request::Normal(Box::new(NormalRequest {
            messages: RequestMessage::Completion {
                text: prompt.to_string(),
                echo_prompt: false,
                best_of: Some(1),
            },
            sampling_params: SamplingParams {
                temperature: Some(config.temperature),
                top_k: None,
                top_p: Some(config.top_p),
                max_len: Some(config.max_tokens),
                stop_toks: Some(StopTokens::Seqs(
                    config.stop_sequences.iter().map(ToString::to_string).collect(),
                )),
                logits_bias: None,
                n_choices: 1,
                top_n_logprobs: 0,
                frequency_penalty: None,
                presence_penalty: None,
                dry_params: None,
                min_p: None,
                repetition_penalty: Some(config.repeat_penalty),
            },
            response: tx,
            return_raw_logits: false,
            return_logprobs: false,
            is_streaming: false,
            id: 0,
            constraint: mistralrs::Constraint::None,
            suffix: None,
            tool_choice: None,
            tools: None,
            logits_processors: None,
            web_search_options: None,
            model_id: None,
            truncate_sequence: false,
        }));

        // Send in a blocking context to keep the runtime responsive
        let mistralrs = Arc::clone(&self.mistralrs);
        tokio::task::spawn_blocking(move || {
            mistralrs
                .send_request(request)
                .map_err(|e| anyhow::anyhow!("Failed to send request: {:?}", e))
        })
        .await
        .context("Task join error")??;

        // No timeout: a stalled call only blocks its own task
        let text: String = loop {
            let response = rx
                .recv()
                .await
                .context("No response received from mistral.rs (channel closed)")?;

            match response {
                Response::Chunk(_) | Response::CompletionChunk(_) => continue,
                Response::Done(result) => {
                    break result
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.message.content)
                        .context("No text in Done response")?;
                }
                Response::CompletionDone(result) => {
                    break result
                        .choices
                        .into_iter()
                        .next()
                        .map(|choice| choice.text)
                        .context("No text in CompletionDone response")?;
                }
                Response::InternalError(e) => {
                    anyhow::bail!("Internal error from mistral.rs: {}", e)
                }
                Response::ValidationError(e) => {
                    anyhow::bail!("Validation error: {}", e)
                }
                Response::ModelError(e, resp) => {
                    anyhow::bail!("Model error: {} (response: {:?})", e, resp)
                }
                Response::CompletionModelError(e, resp) => {
                    anyhow::bail!("Completion model error: {} (response: {:?})", e, resp)
                }
                Response::ImageGeneration(_)
                | Response::Speech { .. }
                | Response::Raw { .. }
                | Response::Embeddings { .. } => {
                    anyhow::bail!("Unexpected response type (image/speech/raw/embeddings)")
                }
            }
        };

        tracing::debug!(response_length = text.len(), "Received response from mistral.rs");
        Ok(text)
    }

    fn backend_name(&self) -> &'static str {
        if self.uses_gpu {
            "Mistral.rs (CUDA)"
        } else {
            "Mistral.rs (CPU)"
        }
    }
}
