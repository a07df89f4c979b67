//! Vector store clients.
//!
//! Every service talks to the store through [`VectorStore`], so the Qdrant
//! REST client and the in-process [`MemoryStore`] are interchangeable.
//!
//! - `point`: point identifiers, payloads and distance metrics
//! - `qdrant`: blocking client for the Qdrant REST API
//! - `memory`: in-process store with brute-force nearest-neighbour search

mod memory;
mod point;
mod qdrant;

pub use memory::MemoryStore;
pub use point::{percent, CollectionInfo, Distance, Payload, Point, PointId, ScoredPoint};
pub use qdrant::QdrantStore;

/// Errors returned by vector store clients.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("collection {0} does not exist")]
    CollectionNotFound(String),

    #[error("point {key} not found in collection {collection}")]
    PointNotFound { collection: String, key: String },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    #[error("vector store error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("malformed vector store response: {0}")]
    Decode(String),
}

/// Operations the matching services need from a vector database.
pub trait VectorStore: Send + Sync {
    /// Creates the collection when it is absent. Existing collections are left untouched.
    fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError>;

    /// Returns `None` when the collection does not exist.
    fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError>;

    /// Inserts the point, replacing any point with the same id.
    fn upsert(&self, collection: &str, point: Point) -> Result<(), StoreError>;

    fn retrieve(&self, collection: &str, id: PointId) -> Result<Point, StoreError>;

    /// Nearest neighbours of `vector`, best first, skipping the first `offset` hits.
    fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError>;
}
