//! Image-to-image recommendations.

use std::sync::Arc;

use serde_json::{json, Value};

use super::{paginate, parse_page_token, CollectionSpec, Explainer, ImageAspectExplainer, Limits};
use crate::{
    app::AppError,
    embedding::{Embedder, ImageFacts},
    models::{
        to_payload, ImageRecommendation, ImageRecommendationResponse, ImageRecord,
        TechnicalMetadata,
    },
    store::{percent, Payload, Point, PointId, ScoredPoint, VectorStore},
};

pub struct ImageRecommendationService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: CollectionSpec,
    limits: Limits,
    explainer: Box<dyn Explainer<Payload, Payload>>,
}

impl ImageRecommendationService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: CollectionSpec,
        limits: Limits,
    ) -> Self {
        Self {
            embedder,
            store,
            collection,
            limits,
            explainer: Box::new(ImageAspectExplainer),
        }
    }

    pub fn with_explainer(mut self, explainer: Box<dyn Explainer<Payload, Payload>>) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    pub fn ensure_collection(&self) -> Result<(), AppError> {
        self.collection.ensure(self.store.as_ref())
    }

    /// Embeds an image and upserts it with its labels and technical metadata.
    ///
    /// `source_url` marks images fetched over HTTP; their metadata records the
    /// URL instead of local file properties.
    pub fn index_image(
        &self,
        image_id: &str,
        bytes: &[u8],
        filename: &str,
        labels: Vec<String>,
        source_url: Option<&str>,
    ) -> Result<ImageRecord, AppError> {
        if image_id.trim().is_empty() {
            return Err(AppError::Validation("image id must not be empty".to_string()));
        }

        let facts = ImageFacts::inspect(bytes)?;
        let vector = self.embedder.embed_image(bytes)?;

        let technical_metadata = match source_url {
            Some(url) => TechnicalMetadata::Remote {
                url: url.to_string(),
            },
            None => TechnicalMetadata::from(&facts),
        };

        let mut content_features = Payload::new();
        content_features.insert("embedding_size".into(), json!(vector.len()));

        let record = ImageRecord {
            id: image_id.to_string(),
            filename: filename.to_string(),
            labels,
            technical_metadata,
            content_features,
        };

        let id = PointId::from_key(image_id);
        self.store.upsert(
            &self.collection.name,
            Point {
                id,
                vector,
                payload: to_payload(&record)?,
            },
        )?;

        log::debug!("indexed image {image_id} as point {id}");
        Ok(record)
    }

    /// Images closest to an already indexed one, never including the reference itself.
    pub fn find_similar(
        &self,
        reference_image_id: &str,
        limit: Option<usize>,
        page_token: Option<&str>,
    ) -> Result<ImageRecommendationResponse, AppError> {
        let limit = self.limits.resolve(limit)?;
        let offset = parse_page_token(page_token)?;

        let reference_id = PointId::from_key(reference_image_id);
        let reference = self.store.retrieve(&self.collection.name, reference_id)?;

        // one extra to detect a next page, one for the reference itself
        let raw = self
            .store
            .search(&self.collection.name, &reference.vector, limit + 2, offset)?;
        let page = paginate(raw, offset, limit, Some(reference_id));

        Ok(ImageRecommendationResponse {
            recommendations: self.recommendations(&reference.payload, page.items),
            next_token: page.next_token,
        })
    }

    /// Images closest to an uploaded one.
    pub fn search_by_image(
        &self,
        bytes: &[u8],
        limit: Option<usize>,
        page_token: Option<&str>,
    ) -> Result<ImageRecommendationResponse, AppError> {
        let limit = self.limits.resolve(limit)?;
        let offset = parse_page_token(page_token)?;

        let facts = ImageFacts::inspect(bytes)?;
        let vector = self.embedder.embed_image(bytes)?;

        let mut reference = Payload::new();
        reference.insert(
            "technical_metadata".into(),
            serde_json::to_value(TechnicalMetadata::from(&facts))
                .map_err(|e| AppError::Other(e.into()))?,
        );

        let raw = self
            .store
            .search(&self.collection.name, &vector, limit + 1, offset)?;
        let page = paginate(raw, offset, limit, None);

        Ok(ImageRecommendationResponse {
            recommendations: self.recommendations(&reference, page.items),
            next_token: page.next_token,
        })
    }

    fn recommendations(&self, reference: &Payload, hits: Vec<ScoredPoint>) -> Vec<ImageRecommendation> {
        hits.into_iter()
            .map(|hit| {
                let similarity = self.collection.distance.similarity(hit.score);
                let id = match hit.payload.get("id") {
                    Some(Value::String(id)) => id.clone(),
                    _ => hit.id.to_string(),
                };
                ImageRecommendation {
                    id,
                    similarity_aspects: self.explainer.explain(reference, &hit.payload),
                    image: hit.payload,
                    similarity_score: similarity,
                    similarity_percent: percent(similarity),
                }
            })
            .collect()
    }
}
