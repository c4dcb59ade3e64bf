//! Question answering over the collection.
//!
//! ```text
//! question ─▶ Retriever ─▶ (empty? NoResults) ─▶ assemble ─▶ GenerationProvider ─▶ Answer
//! ```

use std::sync::Arc;

use pdf_agent_core::context::{assemble, PromptTemplate};
use pdf_agent_core::generation::GenerationProvider;
use pdf_agent_core::retrieve::Retriever;
use pdf_agent_core::{Error, Result};

pub const NO_RESULTS_MESSAGE: &str = "No matching results found!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Nothing scored above the relevance threshold.
    NoResults,
    Answer {
        text: String,
        /// Distinct source ids of the context chunks, in rank order.
        sources: Vec<String>,
    },
}

impl QueryOutcome {
    /// User-facing text: the no-results message or `Response: <answer>\n`.
    pub fn render(&self) -> String {
        match self {
            QueryOutcome::NoResults => NO_RESULTS_MESSAGE.to_string(),
            QueryOutcome::Answer { text, .. } => format!("Response: {}\n", text),
        }
    }
}

pub struct QueryEngine {
    retriever: Retriever,
    generator: Arc<dyn GenerationProvider>,
    template: PromptTemplate,
}

impl QueryEngine {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn GenerationProvider>,
        template: PromptTemplate,
    ) -> Self {
        Self {
            retriever,
            generator,
            template,
        }
    }

    pub async fn answer(&self, question: &str) -> Result<QueryOutcome> {
        let results = self.retriever.retrieve(question).await?;
        if results.is_empty() {
            tracing::info!("no chunks above the relevance threshold");
            return Ok(QueryOutcome::NoResults);
        }

        let prompt = assemble(&results, question, self.template.as_str())?;
        tracing::debug!(
            chunks = results.len(),
            prompt_chars = prompt.chars().count(),
            model = self.generator.model_name(),
            "generating answer"
        );
        let text = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| Error::generation(format!("{:#}", e)))?;

        let mut sources: Vec<String> = Vec::new();
        for result in &results {
            if !sources.contains(&result.chunk.source_id) {
                sources.push(result.chunk.source_id.clone());
            }
        }

        Ok(QueryOutcome::Answer { text, sources })
    }

    /// Answer `question`, folding any failure into `Error: <failure>`.
    pub async fn respond(&self, question: &str) -> String {
        match self.answer(question).await {
            Ok(outcome) => outcome.render(),
            Err(e) => format!("Error: {}", e),
        }
    }
}
