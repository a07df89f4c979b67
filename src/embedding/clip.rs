//! CLIP embedding model wrapper for fastembed.
//!
//! Loads the text and vision halves of the same CLIP checkpoint so a text
//! query can be searched against image vectors and vice versa.

use fastembed::{ImageEmbedding, ImageInitOptions, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

use super::{decode_image, require_text, Embedder, EmbeddingError};

/// Text and image encoders of one CLIP model.
/// Uses a Mutex per encoder because fastembed's embed() requires &mut self.
pub struct ClipEmbedder {
    text: Mutex<TextEmbedding>,
    vision: Mutex<ImageEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl ClipEmbedder {
    /// Create the embedder, downloading model files on first use.
    ///
    /// Models are cached in the `models/` subdirectory of `cache_dir`.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, EmbeddingError> {
        let (text_model, image_model) = Self::parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        log::info!("loading CLIP model '{model_name}' from {}", models_dir.display());

        let mut text = TextEmbedding::try_new(
            InitOptions::new(text_model)
                .with_cache_dir(models_dir.clone())
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let vision = ImageEmbedding::try_new(
            ImageInitOptions::new(image_model)
                .with_cache_dir(models_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut text)?;

        Ok(Self {
            text: Mutex::new(text),
            vision: Mutex::new(vision),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    /// Parse model name string to the matching fastembed text and image models.
    fn parse_model_name(
        name: &str,
    ) -> Result<(fastembed::EmbeddingModel, fastembed::ImageEmbeddingModel), EmbeddingError> {
        match name.to_lowercase().as_str() {
            "clip-vit-b-32" | "clipvitb32" | "openai/clip-vit-base-patch32" => Ok((
                fastembed::EmbeddingModel::ClipVitB32,
                fastembed::ImageEmbeddingModel::ClipVitB32,
            )),
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: clip-vit-b-32",
                name
            ))),
        }
    }

    /// Probe the text encoder to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model
            .embed(vec!["test"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e)))?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
    }

    fn check_dimensions(&self, embedding: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
        if embedding.len() != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }
        Ok(embedding)
    }
}

impl Embedder for ClipEmbedder {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = require_text(text)?;

        let mut model = self.text.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embedding = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))?;

        self.check_dimensions(embedding)
    }

    fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
        // undecodable bytes surface as InvalidInput, not as a model failure
        decode_image(bytes)?;

        let mut model = self.vision.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let embedding = model
            .embed_bytes(&[bytes], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))?;

        self.check_dimensions(embedding)
    }
}
