use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use std::time::Duration;

use archsketch_core::Settings;

const SYSTEM_PROMPT: &str = "You convert architecture descriptions into JSON diagram specifications. \
Reply with JSON only.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("build LLM: {0}")]
    Setup(String),

    #[error("chat: {0}")]
    Call(String),

    #[error("LLM returned empty text")]
    EmptyResponse,

    #[error("LLM call timed out after {0}s")]
    Timeout(u64),
}

/// Text-in, text-out access to a language model.
///
/// Implementations must be safe to call concurrently; the orchestrator shares
/// one client across generation requests.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Short human-readable label, used in logs.
    fn describe(&self) -> String;
}

fn map_backend(provider: &str) -> Result<LLMBackend, ModelError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(ModelError::UnknownProvider(other.to_string())),
    }
}

/// [`ModelClient`] backed by the `llm` crate. A provider handle is built per
/// call, so the client itself holds only configuration.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl LlmClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, ModelError> {
        map_backend(&settings.provider)?;
        Ok(Self {
            provider: settings.provider.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout_secs: settings.request_timeout_secs,
        })
    }

    async fn chat(&self, prompt: &str) -> Result<String, ModelError> {
        let backend = map_backend(&self.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.model)
            .system(SYSTEM_PROMPT)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);

        if !self.api_key.is_empty() {
            builder = builder.api_key(&self.api_key);
        }

        let llm = builder.build().map_err(|e| ModelError::Setup(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(prompt).build()];

        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| ModelError::Call(e.to_string()))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ModelError::EmptyResponse),
        }
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        tracing::debug!(provider = %self.provider, model = %self.model, prompt_len = prompt.len(), "sending prompt");
        match tokio::time::timeout(Duration::from_secs(self.timeout_secs), self.chat(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout(self.timeout_secs)),
        }
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.provider, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_map_to_backends() {
        for provider in ["openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek"] {
            assert!(map_backend(provider).is_ok(), "{provider}");
        }
    }

    #[test]
    fn unknown_provider_is_rejected_up_front() {
        let settings = Settings {
            provider: "carrier-pigeon".into(),
            model: "x".into(),
            ..Settings::default()
        };
        assert_eq!(
            LlmClient::from_settings(&settings).unwrap_err(),
            ModelError::UnknownProvider("carrier-pigeon".into())
        );
    }

    #[test]
    fn describe_names_provider_and_model() {
        let settings = Settings {
            provider: "ollama".into(),
            model: "llama3".into(),
            ..Settings::default()
        };
        let client = LlmClient::from_settings(&settings).unwrap();
        assert_eq!(client.describe(), "ollama (llama3)");
    }
}
