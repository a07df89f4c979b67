use image::{ColorType, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use super::EmbeddingError;

/// Decodes image bytes, reporting undecodable input as `InvalidInput`.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, EmbeddingError> {
    if bytes.is_empty() {
        return Err(EmbeddingError::InvalidInput("image is empty".to_string()));
    }
    image::load_from_memory(bytes)
        .map_err(|e| EmbeddingError::InvalidInput(format!("cannot decode image: {}", e)))
}

/// Technical properties of an encoded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFacts {
    pub width: u32,
    pub height: u32,
    /// Upper-case container name, e.g. `PNG` or `JPEG`.
    pub format: String,
    /// Channel layout, e.g. `RGB`, `RGBA` or `L` for grayscale.
    pub mode: String,
    pub size: u64,
}

fn color_mode(color: ColorType) -> String {
    match color {
        ColorType::L8 | ColorType::L16 => "L".to_string(),
        ColorType::La8 | ColorType::La16 => "LA".to_string(),
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB".to_string(),
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}

impl ImageFacts {
    pub fn inspect(bytes: &[u8]) -> Result<Self, EmbeddingError> {
        let format = image::guess_format(bytes)
            .map_err(|e| EmbeddingError::InvalidInput(format!("unknown image format: {}", e)))?;
        let img = decode_image(bytes)?;
        let (width, height) = img.dimensions();

        Ok(Self {
            width,
            height,
            format: format!("{:?}", format).to_uppercase(),
            mode: color_mode(img.color()),
            size: bytes.len() as u64,
        })
    }
}
