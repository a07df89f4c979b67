//! In-process vector store.
//!
//! Keeps every collection in memory and answers searches by brute force.
//! Scores follow Qdrant's conventions (cosine similarity, dot product, or
//! Euclidean distance) so services behave the same against either backend.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{CollectionInfo, Distance, Point, PointId, ScoredPoint, StoreError, VectorStore};

struct Collection {
    dimension: usize,
    distance: Distance,
    points: HashMap<PointId, Point>,
}

/// Vector store that lives entirely in the current process.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn l2_norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn score(distance: Distance, query: &[f32], query_norm: f32, target: &[f32]) -> f32 {
        match distance {
            Distance::Cosine => {
                let target_norm = Self::l2_norm(target);
                if query_norm < f32::EPSILON || target_norm < f32::EPSILON {
                    return 0.0;
                }
                let dot: f32 = query.iter().zip(target).map(|(a, b)| a * b).sum();
                dot / (query_norm * target_norm)
            }
            Distance::Dot => query.iter().zip(target).map(|(a, b)| a * b).sum(),
            Distance::Euclid => query
                .iter()
                .zip(target)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl VectorStore for MemoryStore {
    fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        let mut collections = self.write()?;
        collections.entry(name.to_string()).or_insert_with(|| {
            log::info!("creating in-memory collection {name} ({dimension}d, {distance:?})");
            Collection {
                dimension,
                distance,
                points: HashMap::new(),
            }
        });
        Ok(())
    }

    fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let collections = self.read()?;
        Ok(collections.get(name).map(|c| CollectionInfo {
            name: name.to_string(),
            points_count: c.points.len() as u64,
            dimension: c.dimension,
            distance: c.distance,
        }))
    }

    fn upsert(&self, collection: &str, point: Point) -> Result<(), StoreError> {
        let mut collections = self.write()?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        if point.vector.len() != target.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: target.dimension,
                got: point.vector.len(),
            });
        }

        target.points.insert(point.id, point);
        Ok(())
    }

    fn retrieve(&self, collection: &str, id: PointId) -> Result<Point, StoreError> {
        let collections = self.read()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        target
            .points
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::PointNotFound {
                collection: collection.to_string(),
                key: id.to_string(),
            })
    }

    fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let collections = self.read()?;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        if vector.len() != target.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: target.dimension,
                got: vector.len(),
            });
        }

        let query_norm = Self::l2_norm(vector);
        let mut results: Vec<ScoredPoint> = target
            .points
            .values()
            .map(|point| ScoredPoint {
                id: point.id,
                score: Self::score(target.distance, vector, query_norm, &point.vector),
                payload: point.payload.clone(),
            })
            .collect();

        let higher_is_better = target.distance.higher_is_better();
        results.sort_by(|a, b| {
            let ordering = if higher_is_better {
                b.score.partial_cmp(&a.score)
            } else {
                a.score.partial_cmp(&b.score)
            };
            ordering
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(results.into_iter().skip(offset).take(limit).collect())
    }
}
