//! Typed failures for the ingestion and retrieval pipeline.
//!
//! An empty retrieval is not represented here: "no results" is a normal
//! outcome and surfaces as an empty result vector.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid chunking parameters, missing ingestion input, bad config values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single input document could not be read or decoded.
    #[error("failed to read source '{source_id}': {message}")]
    SourceRead { source_id: String, message: String },

    /// The embedding provider failed or returned malformed output.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A record's dimensionality disagrees with the collection.
    #[error("embedding dimensionality mismatch: collection has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The persistence layer failed; the store keeps its last durable state.
    #[error("vector store I/O error: {0}")]
    StoreIo(String),

    /// The generation provider failed.
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("invalid prompt template: {0}")]
    Template(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn store_io(err: impl std::fmt::Display) -> Self {
        Error::StoreIo(err.to_string())
    }

    pub fn embedding(err: impl std::fmt::Display) -> Self {
        Error::Embedding(err.to_string())
    }

    pub fn generation(err: impl std::fmt::Display) -> Self {
        Error::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimensionality mismatch: collection has 768, got 384"
        );

        let err = Error::SourceRead {
            source_id: "a.pdf".into(),
            message: "truncated".into(),
        };
        assert!(err.to_string().contains("a.pdf"));
    }

    #[test]
    fn test_anyhow_conversion_keeps_chain_text() {
        let source = anyhow::anyhow!("connection refused").context("calling Ollama");
        let err = Error::embedding(format!("{:#}", source));
        assert_eq!(
            err.to_string(),
            "embedding failed: calling Ollama: connection refused"
        );
    }
}
