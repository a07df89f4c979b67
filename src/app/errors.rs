use crate::{embedding::EmbeddingError, store::StoreError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Stable name of the error kind, exposed to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::DimensionMismatch { .. } => "DimensionMismatch",
            AppError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            AppError::Validation(_) => "ValidationError",
            AppError::Other(_) => "Internal",
        }
    }
}

impl From<EmbeddingError> for AppError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::InvalidInput(msg) => AppError::InvalidInput(msg),
            EmbeddingError::DimensionMismatch { expected, got } => {
                AppError::DimensionMismatch { expected, got }
            }
            other => AppError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PointNotFound { collection, key } => {
                AppError::NotFound(format!("point {key} in collection {collection}"))
            }
            StoreError::CollectionNotFound(name) => {
                AppError::NotFound(format!("collection {name}"))
            }
            StoreError::DimensionMismatch { expected, got } => {
                AppError::DimensionMismatch { expected, got }
            }
            StoreError::Unavailable(msg) => AppError::UpstreamUnavailable(msg),
            StoreError::Upstream { status, message } if status >= 500 => {
                AppError::UpstreamUnavailable(format!(
                    "vector store responded with {status}: {message}"
                ))
            }
            // the store is up but refused the request
            StoreError::Upstream { status, message } => AppError::Other(anyhow::anyhow!(
                "vector store rejected the request with {status}: {message}"
            )),
            StoreError::Decode(msg) => AppError::Other(anyhow::anyhow!(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_taxonomy() {
        let err: AppError = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(err.kind(), "UpstreamUnavailable");

        let err: AppError = StoreError::DimensionMismatch { expected: 512, got: 3 }.into();
        assert!(matches!(err, AppError::DimensionMismatch { expected: 512, got: 3 }));

        let err: AppError = StoreError::PointNotFound {
            collection: "user_profiles".into(),
            key: "42".into(),
        }
        .into();
        assert_eq!(err.kind(), "NotFound");
        assert!(err.to_string().contains("user_profiles"));
    }

    #[test]
    fn upstream_errors_split_on_status() {
        let err: AppError = StoreError::Upstream {
            status: 503,
            message: "overloaded".into(),
        }
        .into();
        assert_eq!(err.kind(), "UpstreamUnavailable");

        let err: AppError = StoreError::Upstream {
            status: 400,
            message: "Wrong input: Vector dimension error".into(),
        }
        .into();
        assert_eq!(err.kind(), "Internal");
        assert!(err.to_string().contains("Vector dimension error"));
    }

    #[test]
    fn embedding_errors_map_onto_taxonomy() {
        let err: AppError = EmbeddingError::InvalidInput("corrupt image".into()).into();
        assert_eq!(err.kind(), "InvalidInput");

        let err: AppError = EmbeddingError::EmbeddingFailed("onnx runtime".into()).into();
        assert_eq!(err.kind(), "UpstreamUnavailable");
    }
}
