//! Configuration for summarisation and literature-review runs.
//!
//! Every knob lives in [`ResearchConfig`], built via its
//! [`ResearchConfigBuilder`]. The excerpt length sent to the model is not a
//! knob: see [`crate::prompts::EXCERPT_CHARS`].

use crate::error::ResearchError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Configuration for a summarisation or literature-review run.
///
/// Built via [`ResearchConfig::builder()`] or using
/// [`ResearchConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_litreview::ResearchConfig;
///
/// let config = ResearchConfig::builder()
///     .model("gpt-4.1-mini")
///     .max_retries(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 1500);
/// ```
#[derive(Clone)]
pub struct ResearchConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini".
    /// If None, uses [`DEFAULT_MODEL`] or `EDGEQUAKE_MODEL`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum tokens the model may generate per request. Default: 1500.
    pub max_tokens: usize,

    /// Total attempts per request when the endpoint keeps rate limiting. Default: 5.
    ///
    /// Other failures (bad key, malformed request, network fault) are never
    /// retried regardless of this value.
    pub max_retries: u32,

    /// Backoff unit in milliseconds. Default: 1000.
    ///
    /// The wait before retry `n` (0-based) is `backoff_unit_ms * 2^n`:
    /// 1 s → 2 s → 4 s → 8 s with the default.
    pub backoff_unit_ms: u64,

    /// Sampling temperature. None leaves the provider default in place.
    pub temperature: Option<f32>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receiver for extraction, per-paper and retry events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            max_tokens: 1500,
            max_retries: 5,
            backoff_unit_ms: 1000,
            temperature: None,
            password: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ResearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResearchConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("backoff_unit_ms", &self.backoff_unit_ms)
            .field("temperature", &self.temperature)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ResearchConfig {
    /// Create a new builder for `ResearchConfig`.
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

/// Builder for [`ResearchConfig`].
#[derive(Debug)]
pub struct ResearchConfigBuilder {
    config: ResearchConfig,
}

impl ResearchConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    /// At least one attempt is always made.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn backoff_unit_ms(mut self, ms: u64) -> Self {
        self.config.backoff_unit_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ResearchConfig, ResearchError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ResearchError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        // 2^31 units is already decades of waiting; anything beyond overflows.
        if c.max_retries > 32 {
            return Err(ResearchError::InvalidConfig(format!(
                "max_retries must be ≤ 32, got {}",
                c.max_retries
            )));
        }
        Ok(self.config)
    }
}
