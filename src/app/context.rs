//! Process-wide wiring: one embedder, one store client, three services.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use homedir::my_home;
use serde::Serialize;

use crate::{
    app::AppError,
    config::{Config, StoreBackend},
    embedding::{ClipEmbedder, Embedder},
    matching::{CollectionSpec, ImageRecommendationService, Limits, ProductSearchService, UserMatchingService},
    store::{CollectionInfo, MemoryStore, QdrantStore, VectorStore},
};

/// Base directory for `config.yaml` and the model cache.
///
/// `AFFINITY_BASE_PATH` wins; otherwise `~/.local/share/affinity`.
pub fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("AFFINITY_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("Could not determine home directory")?
        .context("Home directory path is empty")?;
    Ok(home.join(".local/share/affinity"))
}

/// Collection status as reported by the `collections` command.
#[derive(Debug, Serialize)]
pub struct CollectionStatus {
    pub name: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<CollectionInfo>,
}

/// Shared services, built once at startup and handed to the API and the CLI.
pub struct AppContext {
    pub users: UserMatchingService,
    pub images: ImageRecommendationService,
    pub products: ProductSearchService,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    seed_file: Option<PathBuf>,
}

impl AppContext {
    /// Wires the services around the given embedder and store.
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        let collections = &config.collections;
        let spec = |name: &str| CollectionSpec::new(name, collections.dimension, collections.distance);
        let limits = Limits {
            default: config.search.default_limit,
            max: config.search.max_limit,
        };
        let image_limits = Limits {
            default: config.search.image_default_limit,
            max: config.search.max_limit,
        };

        Self {
            users: UserMatchingService::new(
                embedder.clone(),
                store.clone(),
                spec(&collections.users),
                limits,
            ),
            images: ImageRecommendationService::new(
                embedder.clone(),
                store.clone(),
                spec(&collections.images),
                image_limits,
            ),
            products: ProductSearchService::new(
                embedder.clone(),
                store.clone(),
                spec(&collections.products),
                limits,
            ),
            embedder,
            store,
            seed_file: config.seed.users_file.clone(),
        }
    }

    /// Loads the embedding model and connects the configured store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = ClipEmbedder::new(
            &config.embedding.model,
            config.base_path().to_path_buf(),
            config.embedding.show_download_progress,
        )
        .context("failed to load embedding model")?;

        if embedder.dimensions() != config.collections.dimension {
            bail!(
                "model {} produces {}-d vectors but collections.dimension is {}",
                embedder.name(),
                embedder.dimensions(),
                config.collections.dimension
            );
        }

        let store: Arc<dyn VectorStore> = match config.store.backend {
            StoreBackend::Qdrant => {
                log::info!("using qdrant at {}", config.store.url);
                Arc::new(
                    QdrantStore::new(
                        &config.store.url,
                        config.store.api_key(),
                        Duration::from_secs(config.store.timeout_secs),
                    )
                    .context("failed to create qdrant client")?,
                )
            }
            StoreBackend::Memory => {
                log::warn!("using the in-memory store; indexed data is lost on exit");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::new(config, Arc::new(embedder), store))
    }

    pub fn ensure_collections(&self) -> Result<(), AppError> {
        self.users.ensure_collection()?;
        self.images.ensure_collection()?;
        self.products.ensure_collection()
    }

    /// Ensures all collections exist and seeds users into an empty collection.
    pub fn prepare(&self) -> Result<(), AppError> {
        self.ensure_collections()?;

        if let Some(path) = &self.seed_file {
            let seeded = self.users.seed_if_empty(path)?;
            if seeded > 0 {
                log::info!("indexed {seeded} seed users");
            }
        }
        Ok(())
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn collections(&self) -> Result<Vec<CollectionStatus>, AppError> {
        [
            self.users.collection(),
            self.images.collection(),
            self.products.collection(),
        ]
        .into_iter()
        .map(|spec| {
            let info = self.store.collection_info(&spec.name)?;
            Ok(CollectionStatus {
                name: spec.name.clone(),
                exists: info.is_some(),
                info,
            })
        })
        .collect()
    }
}
