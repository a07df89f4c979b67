//! Embedding providers.
//!
//! An [`Embedder`] maps a text string or encoded image bytes onto a
//! fixed-length vector. The production implementation is [`ClipEmbedder`],
//! which runs CLIP locally through fastembed so text and images share one
//! vector space.

mod clip;
mod image_facts;

pub use clip::ClipEmbedder;
pub use image_facts::{decode_image, ImageFacts};

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model returned {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Something that can be embedded.
#[derive(Debug, Clone)]
pub enum EmbeddingInput<'a> {
    Text(&'a str),
    Image(&'a [u8]),
}

pub trait Embedder: Send + Sync {
    /// Model identifier, for logs and diagnostics.
    fn name(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds an encoded image (PNG, JPEG, WebP, ...).
    fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbeddingError>;

    fn embed(&self, input: &EmbeddingInput<'_>) -> Result<Vec<f32>, EmbeddingError> {
        match input {
            EmbeddingInput::Text(text) => self.embed_text(text),
            EmbeddingInput::Image(bytes) => self.embed_image(bytes),
        }
    }
}

/// Rejects blank text before it reaches a model.
pub fn require_text(text: &str) -> Result<&str, EmbeddingError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EmbeddingError::InvalidInput("text is empty".to_string()));
    }
    Ok(trimmed)
}
