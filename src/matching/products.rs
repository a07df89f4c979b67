//! Multimodal product search: one collection, text or image queries.

use std::sync::Arc;

use serde_json::json;

use super::{paginate, parse_page_token, CollectionSpec, Explainer, Limits, ProductReasonExplainer};
use crate::{
    app::AppError,
    embedding::{Embedder, EmbeddingInput},
    models::{to_payload, Product, ProductHit, ProductInfo, ProductSearchResponse},
    store::{percent, Point, PointId, VectorStore},
};

/// A product search query. CLIP places both kinds in the same vector space.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductQuery {
    Text(String),
    Image(Vec<u8>),
}

pub struct ProductSearchService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: CollectionSpec,
    limits: Limits,
    explainer: Box<dyn Explainer<ProductQuery, ProductInfo>>,
}

impl ProductSearchService {
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
            explainer: Box::new(ProductReasonExplainer),
        }
    }

    pub fn with_explainer(
        mut self,
        explainer: Box<dyn Explainer<ProductQuery, ProductInfo>>,
    ) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    pub fn ensure_collection(&self) -> Result<(), AppError> {
        self.collection.ensure(self.store.as_ref())
    }

    /// Indexes a product from its image when one is given, otherwise from its text.
    ///
    /// Text and image vectors of one product live under separate points
    /// (`<id>:text`, `<id>:image`), so a product can be indexed both ways.
    pub fn index_product(&self, product: &Product, image: Option<&[u8]>) -> Result<PointId, AppError> {
        if product.id.trim().is_empty() {
            return Err(AppError::Validation("product id must not be empty".to_string()));
        }
        if product.name.trim().is_empty() {
            return Err(AppError::Validation("product name must not be empty".to_string()));
        }

        let (embedding_type, vector) = match image {
            Some(bytes) => ("image", self.embedder.embed_image(bytes)?),
            None => ("text", self.embedder.embed_text(&product.text())?),
        };

        let mut payload = to_payload(product)?;
        payload.insert("embedding_type".into(), json!(embedding_type));

        let id = PointId::from_key(&format!("{}:{}", product.id, embedding_type));
        self.store
            .upsert(&self.collection.name, Point { id, vector, payload })?;

        log::debug!("indexed product {} ({embedding_type}) as point {id}", product.id);
        Ok(id)
    }

    pub fn search(
        &self,
        query: &ProductQuery,
        limit: Option<usize>,
        page_token: Option<&str>,
    ) -> Result<ProductSearchResponse, AppError> {
        let limit = self.limits.resolve(limit)?;
        let offset = parse_page_token(page_token)?;

        let input = match query {
            ProductQuery::Text(text) => {
                if text.trim().is_empty() {
                    return Err(AppError::Validation("query must not be empty".to_string()));
                }
                EmbeddingInput::Text(text)
            }
            ProductQuery::Image(bytes) => EmbeddingInput::Image(bytes),
        };
        let vector = self.embedder.embed(&input)?;

        let raw = self
            .store
            .search(&self.collection.name, &vector, limit + 1, offset)?;
        let page = paginate(raw, offset, limit, None);

        let results: Vec<ProductHit> = page
            .items
            .into_iter()
            .map(|hit| {
                let product_info = ProductInfo::from_payload(&hit.payload);
                let similarity = self.collection.distance.similarity(hit.score);
                ProductHit {
                    score: similarity,
                    similarity_percent: percent(similarity),
                    match_reasons: self.explainer.explain(query, &product_info),
                    product_info,
                }
            })
            .collect();

        Ok(ProductSearchResponse {
            status: "success".to_string(),
            count: results.len(),
            results,
            next_token: page.next_token,
        })
    }
}
