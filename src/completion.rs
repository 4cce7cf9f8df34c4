//! Text-completion boundary.
//!
//! The pipeline only ever needs "prompt in, text out". [`CompletionService`]
//! captures exactly that, so the extractor and the synthesizer can be driven
//! by a real provider in production and by a deterministic stub in tests.
//!
//! [`LlmCompletionService`] adapts any `edgequake_llm::LLMProvider` (OpenAI,
//! Anthropic, Gemini, Ollama, …) to the boundary. No streaming, no function
//! calling: structured output is requested by prompt instruction only.

use crate::config::ReportConfig;
use crate::error::ReportError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Model used when the provider is Ollama and no model was configured.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3:instruct";

/// Model used for every other provider when no model was configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// One request to the completion backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Informational; the backend was bound to its model at construction.
    pub model: Option<String>,
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, config: &ReportConfig) -> Self {
        Self {
            model: config.model.clone(),
            system: None,
            prompt: prompt.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Failure reported by a completion backend.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("empty response")]
    EmptyResponse,
}

/// A black-box text-completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// [`CompletionService`] backed by an edgequake-llm provider.
pub struct LlmCompletionService {
    provider: Arc<dyn LLMProvider>,
}

impl LlmCompletionService {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for LlmCompletionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCompletionService")
            .field("provider", &"<dyn LLMProvider>")
            .finish()
    }
}

#[async_trait]
impl CompletionService for LlmCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let start = Instant::now();
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.push(ChatMessage::user(request.prompt.as_str()));

        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CompletionError::ApiRequestFailed(e.to_string()))?;

        debug!(
            "Completion: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(response.content)
    }
}

/// Default model for a named provider.
pub fn default_model_for(provider_name: &str) -> &'static str {
    if provider_name.eq_ignore_ascii_case("ollama") {
        DEFAULT_OLLAMA_MODEL
    } else {
        DEFAULT_MODEL
    }
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn CompletionService>, ReportError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ReportError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(LlmCompletionService::new(provider)))
}

/// Resolve the completion backend, from most-specific to least-specific.
///
/// 1. **Pre-built service** (`config.completion`): used as-is; this is how
///    tests inject a stub.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or the
///    provider's default model.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_completion_service(
    config: &ReportConfig,
) -> Result<Arc<dyn CompletionService>, ReportError> {
    if let Some(ref service) = config.completion {
        return Ok(Arc::clone(service));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReportError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider ollama.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(LlmCompletionService::new(llm_provider)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl CompletionService for Fixed {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn default_models() {
        assert_eq!(default_model_for("ollama"), DEFAULT_OLLAMA_MODEL);
        assert_eq!(default_model_for("Ollama"), DEFAULT_OLLAMA_MODEL);
        assert_eq!(default_model_for("openai"), DEFAULT_MODEL);
    }

    #[test]
    fn request_inherits_config_sampling() {
        let config = ReportConfig::builder()
            .model("llama3:instruct")
            .temperature(0.5)
            .max_tokens(1024)
            .build()
            .unwrap();
        let req = CompletionRequest::new("hello", &config).with_system("be terse");
        assert_eq!(req.model.as_deref(), Some("llama3:instruct"));
        assert_eq!(req.temperature, 0.5);
        assert_eq!(req.max_tokens, 1024);
        assert_eq!(req.system.as_deref(), Some("be terse"));
    }

    #[test]
    fn prebuilt_service_takes_priority() {
        let service: Arc<dyn CompletionService> = Arc::new(Fixed("ok"));
        let config = ReportConfig::builder()
            .completion(Arc::clone(&service))
            .provider_name("does-not-exist")
            .build()
            .unwrap();
        let resolved = resolve_completion_service(&config).unwrap();
        let req = CompletionRequest::new("ping", &config);
        let answer = tokio_test::block_on(resolved.complete(&req)).unwrap();
        assert_eq!(answer, "ok");
    }
}
