//! Cross-module tests. Everything runs against the in-memory store and a
//! deterministic fake embedder, so no model download or Qdrant server is needed.

mod images;

pub use fakes::*;
