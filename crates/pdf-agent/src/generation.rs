//! Text generation backends.
//!
//! - **[`DisabledGenerator`]**: every call fails; `query` then reports the error.
//! - **[`OllamaGenerator`]**: `POST /api/generate` with `stream: false`.
//! - **[`OpenAIGenerator`]**: `POST /v1/chat/completions`, prompt sent as a single user message.
//!
//! The generated text is returned as-is.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use pdf_agent_core::generation::GenerationProvider;

use crate::config::GenerationConfig;
use crate::http::{build_client, post_json_with_retry};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled; set [generation] provider in the config")
    }
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/api/generate", self.url),
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}

/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_OPENAI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/chat/completions", self.url),
            Some(self.api_key.as_str()),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
    }
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stub;

    #[tokio::test]
    async fn test_disabled_generator_fails() {
        let generator = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(generator.model_name(), "disabled");
        assert!(generator.generate("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_ollama_generate_sends_prompt_and_returns_text() {
        let server = stub::serve(vec![(
            200,
            r#"{"model":"llama3","response":"Paris.","done":true}"#.into(),
        )])
        .await;
        let generator = OllamaGenerator {
            client: stub::client(),
            url: server.url.clone(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            max_retries: 0,
        };

        let text = generator.generate("What is the capital?").await.unwrap();
        assert_eq!(text, "Paris.");
        let request = server.request(0);
        assert_eq!(request["model"], "llama3");
        assert_eq!(request["prompt"], "What is the capital?");
        assert_eq!(request["stream"], false);
    }

    #[tokio::test]
    async fn test_ollama_missing_response_field() {
        let server = stub::serve(vec![(200, r#"{"done":true}"#.into())]).await;
        let generator = OllamaGenerator {
            client: stub::client(),
            url: server.url.clone(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            max_retries: 0,
        };
        assert!(generator.generate("q").await.is_err());
    }

    #[tokio::test]
    async fn test_openai_chat_completion() {
        let server = stub::serve(vec![(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"Berlin."}}]}"#.into(),
        )])
        .await;
        let generator = OpenAIGenerator {
            client: stub::client(),
            url: server.url.clone(),
            api_key: "test-key".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_retries: 0,
        };
        assert_eq!(generator.generate("q").await.unwrap(), "Berlin.");
        assert_eq!(server.request(0)["messages"][0]["content"], "q");
    }
}
