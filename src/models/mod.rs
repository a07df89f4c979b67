//! Entity and response shapes shared by the services, the API and the CLI.

mod image;
mod product;
mod user;

pub use image::{Dimensions, ImageRecommendation, ImageRecommendationResponse, ImageRecord, TechnicalMetadata};
pub use product::{Product, ProductHit, ProductInfo, ProductSearchResponse};
pub use user::{BasicInfo, Expertise, Preferences, User, UserMatch, UserMatchResponse, UserSeed};

use crate::{app::AppError, store::Payload};
use serde::{de::DeserializeOwned, Serialize};

/// Serializes an entity into a store payload. Entities must serialize to JSON objects.
pub fn to_payload<T: Serialize>(entity: &T) -> Result<Payload, AppError> {
    match serde_json::to_value(entity).map_err(|e| AppError::Other(e.into()))? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AppError::Other(anyhow::anyhow!(
            "entity serialized to {other} instead of an object"
        ))),
    }
}

pub fn from_payload<T: DeserializeOwned>(payload: Payload) -> Result<T, AppError> {
    serde_json::from_value(serde_json::Value::Object(payload))
        .map_err(|e| AppError::Other(anyhow::anyhow!("stored payload has unexpected shape: {e}")))
}
