use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Display;

/// Arbitrary JSON metadata stored next to a vector.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Numeric point identifier derived from a string key.
///
/// The id is the first 8 bytes (big-endian) of the SHA-256 digest of the key,
/// so the same key maps to the same point on every process and platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(u64);

impl PointId {
    pub fn from_key(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        PointId(u64::from_be_bytes(bytes))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PointId {
    fn from(id: u64) -> Self {
        PointId(id)
    }
}

impl Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Distance metric a collection is configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    Euclid,
    Dot,
}

impl Distance {
    /// Name used on the Qdrant wire.
    pub fn as_qdrant(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Euclid => "Euclid",
            Distance::Dot => "Dot",
        }
    }

    pub fn from_qdrant(name: &str) -> Option<Self> {
        match name {
            "Cosine" => Some(Distance::Cosine),
            "Euclid" => Some(Distance::Euclid),
            "Dot" => Some(Distance::Dot),
            _ => None,
        }
    }

    /// Whether a larger raw score means a closer match.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Distance::Euclid)
    }

    /// Maps a raw store score onto a similarity in `[0, 1]`, higher is better.
    ///
    /// Cosine and dot scores are clamped; a Euclidean distance `d` becomes `1 / (1 + d)`.
    pub fn similarity(&self, raw: f32) -> f32 {
        match self {
            Distance::Cosine | Distance::Dot => raw.clamp(0.0, 1.0),
            Distance::Euclid => 1.0 / (1.0 + raw.max(0.0)),
        }
    }
}

/// Similarity in `[0, 1]` as a percentage rounded to two decimals.
pub fn percent(similarity: f32) -> f32 {
    (similarity * 10_000.0).round() / 100.0
}

#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A search hit with the raw score reported by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    pub payload: Payload,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: u64,
    pub dimension: usize,
    pub distance: Distance,
}
