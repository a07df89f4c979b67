//! Matching services.
//!
//! All three services follow the same round trip: turn the query into a
//! vector, ask the store for its nearest neighbours, and annotate each hit
//! with human-readable reasons produced by an [`Explainer`].
//!
//! Result order is the store's order; nothing here re-ranks.

mod explain;
mod images;
mod pagination;
mod products;
mod users;

pub use explain::{Explainer, ImageAspectExplainer, ProductReasonExplainer, UserReasonExplainer};
pub use images::ImageRecommendationService;
pub use pagination::{paginate, parse_page_token, Limits};
pub use products::{ProductQuery, ProductSearchService};
pub use users::UserMatchingService;

use crate::{
    app::AppError,
    store::{Distance, VectorStore},
};

/// Name and shape of the collection a service reads and writes.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
}

impl CollectionSpec {
    pub fn new(name: &str, dimension: usize, distance: Distance) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            distance,
        }
    }

    /// Creates the collection if needed and warns when an existing one was
    /// configured differently.
    pub fn ensure(&self, store: &dyn VectorStore) -> Result<(), AppError> {
        store.ensure_collection(&self.name, self.dimension, self.distance)?;

        if let Some(info) = store.collection_info(&self.name)? {
            if info.distance != self.distance || info.dimension != self.dimension {
                log::warn!(
                    "collection {} is {}d/{:?}, configured {}d/{:?}",
                    self.name,
                    info.dimension,
                    info.distance,
                    self.dimension,
                    self.distance
                );
            }
        }
        Ok(())
    }

    /// Number of points currently stored, 0 when the collection is missing.
    pub fn points_count(&self, store: &dyn VectorStore) -> Result<u64, AppError> {
        Ok(store
            .collection_info(&self.name)?
            .map(|info| info.points_count)
            .unwrap_or(0))
    }
}
