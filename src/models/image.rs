use serde::{Deserialize, Serialize};

use crate::{embedding::ImageFacts, store::Payload};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Where an indexed image came from and what it looks like on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TechnicalMetadata {
    Local {
        dimensions: Dimensions,
        format: String,
        #[serde(default)]
        mode: String,
        size: u64,
    },
    Remote {
        url: String,
    },
}

impl From<&ImageFacts> for TechnicalMetadata {
    fn from(facts: &ImageFacts) -> Self {
        TechnicalMetadata::Local {
            dimensions: Dimensions {
                width: facts.width,
                height: facts.height,
            },
            format: facts.format.clone(),
            mode: facts.mode.clone(),
            size: facts.size,
        }
    }
}

/// Payload stored for images indexed by this service.
///
/// Collections may also hold images imported by other tools with a
/// different payload shape, so search results expose the raw payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub technical_metadata: TechnicalMetadata,
    #[serde(default)]
    pub content_features: Payload,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageRecommendation {
    /// The string id from the payload, or the numeric point id when absent.
    pub id: String,
    pub image: Payload,
    /// Similarity in `[0, 1]`, higher is better.
    pub similarity_score: f32,
    pub similarity_percent: f32,
    pub similarity_aspects: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageRecommendationResponse {
    pub recommendations: Vec<ImageRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}
