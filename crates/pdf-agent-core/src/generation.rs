//! Text generation provider trait.
//!
//! Concrete backends (Ollama, OpenAI) live in the `pdf-agent` app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Maps a fully assembled prompt to generated text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}
