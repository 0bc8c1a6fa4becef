//! Completion requests with exponential backoff on rate limits.
//!
//! [`CompletionClient`] owns the retry policy; [`CompletionEndpoint`] is the
//! wire boundary it drives. The production endpoint is [`LlmEndpoint`], a
//! thin adapter over an `edgequake_llm` provider; tests substitute a
//! scripted endpoint.
//!
//! ## Retry Strategy
//!
//! Only [`CompletionError::RateLimited`] is retried. With the default budget
//! of 5 attempts and a 1 s unit the waits are 1 s → 2 s → 4 s → 8 s, and the
//! fifth rate-limited attempt is reported as
//! [`ResearchError::RateLimitExceeded`]. Every other failure kind is
//! returned on the spot.

use crate::config::{ResearchConfig, DEFAULT_MODEL};
use crate::error::{CompletionError, ResearchError};
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// What goes over the wire for one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: usize,
}

/// Generated text plus usage figures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Rate-limited attempts that preceded this success.
    pub retries: u32,
}

/// A language-model completion endpoint.
#[async_trait]
pub trait CompletionEndpoint: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError>;
}

// ── Production endpoint ──────────────────────────────────────────────────

/// [`CompletionEndpoint`] backed by an `edgequake_llm` provider.
pub struct LlmEndpoint {
    provider: Arc<dyn LLMProvider>,
    temperature: Option<f32>,
}

impl LlmEndpoint {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: Option<f32>) -> Self {
        Self {
            provider,
            temperature,
        }
    }

    /// Resolve the provider from `config` and wrap it.
    pub fn from_config(config: &ResearchConfig) -> Result<Self, ResearchError> {
        Ok(Self::new(resolve_provider(config)?, config.temperature))
    }
}

#[async_trait]
impl CompletionEndpoint for LlmEndpoint {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let messages = vec![ChatMessage::user(&request.prompt)];
        let options = CompletionOptions {
            temperature: self.temperature,
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_llm_error(&e))?;

        Ok(Completion {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
            retries: 0,
        })
    }
}

static RE_RATE_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rate[\s_-]?limit|too many requests|\b429\b|quota|throttl").unwrap()
});

static RE_AUTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bauth|unauthori[sz]ed|forbidden|api[\s_-]?key|\b401\b|\b403\b").unwrap()
});

static RE_INVALID_REQUEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)invalid[\s_-]?request|bad request|malformed|\b400\b|\b422\b|token limit")
        .unwrap()
});

static RE_NETWORK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)network|connect|timed?[\s_-]?out|dns|tls|broken pipe|reset by peer").unwrap()
});

/// Map a provider error onto a [`CompletionError`] kind.
///
/// Typed variants are trusted as-is. Only the free-text variants
/// (`ApiError`, `ProviderError`, `Unknown`) go through
/// [`classify_provider_error`], since some providers report a 429 there.
pub fn classify_llm_error(err: &LlmError) -> CompletionError {
    let msg = err.to_string();
    match err {
        LlmError::RateLimited(_) => CompletionError::RateLimited(msg),
        LlmError::AuthError(_) | LlmError::ConfigError(_) => CompletionError::Auth(msg),
        LlmError::InvalidRequest(_)
        | LlmError::TokenLimitExceeded { .. }
        | LlmError::ModelNotFound(_) => CompletionError::InvalidRequest(msg),
        LlmError::NetworkError(_) | LlmError::Timeout => CompletionError::Network(msg),
        LlmError::ApiError(_) | LlmError::ProviderError(_) | LlmError::Unknown(_) => {
            classify_provider_error(&msg)
        }
        _ => CompletionError::Other(msg),
    }
}

/// Map a free-text provider error message onto a [`CompletionError`] kind.
///
/// Rate limiting is checked first: a 429 body often also mentions the API key.
pub fn classify_provider_error(message: &str) -> CompletionError {
    let msg = message.to_string();
    if RE_RATE_LIMIT.is_match(message) {
        CompletionError::RateLimited(msg)
    } else if RE_AUTH.is_match(message) {
        CompletionError::Auth(msg)
    } else if RE_INVALID_REQUEST.is_match(message) {
        CompletionError::InvalidRequest(msg)
    } else if RE_NETWORK.is_match(message) {
        CompletionError::Network(msg)
    } else {
        CompletionError::Other(msg)
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`OPENAI_API_KEY`** present → OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ResearchConfig) -> Result<Arc<dyn LLMProvider>, ResearchError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ResearchError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ResearchError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ResearchError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

// ── Retrying client ──────────────────────────────────────────────────────

/// Wait before retry `attempt` (0-based): `unit * 2^attempt`.
pub fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(2u32.saturating_pow(attempt))
}

/// Sends prompts to a [`CompletionEndpoint`] with rate-limit backoff.
#[derive(Clone)]
pub struct CompletionClient {
    endpoint: Arc<dyn CompletionEndpoint>,
    max_tokens: usize,
    max_retries: u32,
    backoff_unit: Duration,
    progress: Option<ProgressCallback>,
}

impl CompletionClient {
    /// Build a client taking its budget and callback from `config`.
    pub fn new(endpoint: Arc<dyn CompletionEndpoint>, config: &ResearchConfig) -> Self {
        Self {
            endpoint,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries.max(1),
            backoff_unit: config.backoff_unit(),
            progress: config.progress_callback.clone(),
        }
    }

    /// Resolve the provider named by `config` and build a client over it.
    pub fn from_config(config: &ResearchConfig) -> Result<Self, ResearchError> {
        let endpoint = LlmEndpoint::from_config(config)?;
        Ok(Self::new(Arc::new(endpoint), config))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Send `prompt`, retrying only on rate limits.
    ///
    /// The returned text is trimmed of surrounding whitespace.
    pub async fn request(&self, prompt: &str) -> Result<Completion, ResearchError> {
        let start = Instant::now();
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            max_tokens: self.max_tokens,
        };

        for attempt in 0..self.max_retries {
            match self.endpoint.complete(&request).await {
                Ok(mut completion) => {
                    debug!(
                        "{} input tokens, {} output tokens, {:?}, {} retries",
                        completion.input_tokens,
                        completion.output_tokens,
                        start.elapsed(),
                        attempt
                    );
                    completion.text = completion.text.trim().to_string();
                    completion.retries = attempt;
                    return Ok(completion);
                }
                Err(CompletionError::RateLimited(detail)) => {
                    if attempt + 1 < self.max_retries {
                        let wait = backoff_delay(self.backoff_unit, attempt);
                        warn!(
                            "Rate limit reached (attempt {}/{}). Retrying in {:?}",
                            attempt + 1,
                            self.max_retries,
                            wait
                        );
                        if let Some(cb) = &self.progress {
                            cb.on_retry(attempt + 1, self.max_retries, wait);
                        }
                        sleep(wait).await;
                    } else {
                        error!(
                            "Rate limit exceeded after {} attempts: {}",
                            self.max_retries, detail
                        );
                        if let Some(cb) = &self.progress {
                            cb.on_rate_limit_exhausted(self.max_retries);
                        }
                        return Err(ResearchError::RateLimitExceeded {
                            attempts: self.max_retries,
                            detail,
                        });
                    }
                }
                Err(other) => {
                    warn!("Completion failed without retry: {}", other);
                    return Err(ResearchError::Upstream(other));
                }
            }
        }

        // max_retries >= 1, so the loop always returns.
        Err(ResearchError::Internal(
            "completion loop ended without a result".to_string(),
        ))
    }
}
