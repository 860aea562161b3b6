//! Error types shared across the pipeline.
//!
//! Document-level variants are caught at the document boundary and the
//! document is dropped from the report. Collection-level variants are caught
//! by the batch runner. `EmbeddingUnavailable` is only produced at startup.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an [`Embedder`](crate::embedding::Embedder).
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Model weights, config or tokenizer could not be loaded
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    /// Failed to tokenize input text
    #[error("Tokenization failed: {0}")]
    Tokenization(String),
    /// Forward pass or pooling failed
    #[error("Inference failed: {0}")]
    Inference(String),
    /// The service returned a different number of vectors than inputs
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
    /// A vector's length differs from the embedder's declared dimension
    #[error("Expected {expected}-dimensional embedding, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no input spec at {0}")]
    MissingInputSpec(PathBuf),

    #[error("malformed input spec {path}: {reason}")]
    MalformedInputSpec { path: PathBuf, reason: String },

    #[error("document not found: {0}")]
    MissingDocumentFile(PathBuf),

    #[error("failed to parse {path}: {reason}")]
    DocumentParse { path: PathBuf, reason: String },

    #[error("embedding {document} timed out after {secs}s")]
    EmbeddingTimeout { document: String, secs: u64 },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("worker task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// True for failures that drop a single document but leave the rest of
    /// its collection intact.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingDocumentFile(_)
                | PipelineError::DocumentParse { .. }
                | PipelineError::EmbeddingTimeout { .. }
                | PipelineError::Embedding(_)
                | PipelineError::Task(_)
        )
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
