use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::store::Distance;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
const DEFAULT_BODY_LIMIT_MB: usize = 25;

const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

/// CLIP ViT-B/32, shared by the text and image encoders
const DEFAULT_EMBEDDING_MODEL: &str = "clip-vit-b-32";
/// CLIP ViT-B/32 embedding size
const DEFAULT_DIMENSION: usize = 512;

const DEFAULT_USERS_COLLECTION: &str = "user_profiles";
const DEFAULT_IMAGES_COLLECTION: &str = "midjourney-images";
const DEFAULT_PRODUCTS_COLLECTION: &str = "multimodal_collection";

const DEFAULT_USERS_FILE: &str = "data/users.json";

const DEFAULT_LIMIT: usize = 5;
/// 3x3 grid in the image UI
const DEFAULT_IMAGE_LIMIT: usize = 9;
const DEFAULT_MAX_LIMIT: usize = 100;
/// Upper bound for `search.max_limit`
const MAX_LIMIT_CAP: usize = 10_000;
/// Upper bound for `server.body_limit_mb`
const BODY_LIMIT_MB_CAP: usize = 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Allow any origin, for a frontend served from elsewhere
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Request body limit in megabytes (base64 image uploads)
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cors: true,
            body_limit_mb: DEFAULT_BODY_LIMIT_MB,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Qdrant,
    /// Process-local store, contents are lost on exit
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Qdrant API key. `QDRANT_API_KEY` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_qdrant_url(),
            api_key: None,
            timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
        }
    }
}

impl StoreConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var("QDRANT_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name for embeddings (e.g., "clip-vit-b-32")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            show_download_progress: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default = "default_users_collection")]
    pub users: String,
    #[serde(default = "default_images_collection")]
    pub images: String,
    #[serde(default = "default_products_collection")]
    pub products: String,

    /// Vector size of every collection; must match the embedding model
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default)]
    pub distance: Distance,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            users: default_users_collection(),
            images: default_images_collection(),
            products: default_products_collection(),
            dimension: DEFAULT_DIMENSION,
            distance: Distance::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Users indexed at startup when the users collection is empty.
    /// Relative paths resolve against the working directory.
    #[serde(default = "default_users_file")]
    pub users_file: Option<PathBuf>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            users_file: default_users_file(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_image_limit")]
    pub image_default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            image_default_limit: DEFAULT_IMAGE_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_body_limit_mb() -> usize {
    DEFAULT_BODY_LIMIT_MB
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_store_timeout_secs() -> u64 {
    DEFAULT_STORE_TIMEOUT_SECS
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_users_collection() -> String {
    DEFAULT_USERS_COLLECTION.to_string()
}

fn default_images_collection() -> String {
    DEFAULT_IMAGES_COLLECTION.to_string()
}

fn default_products_collection() -> String {
    DEFAULT_PRODUCTS_COLLECTION.to_string()
}

fn default_users_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_USERS_FILE))
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_image_limit() -> usize {
    DEFAULT_IMAGE_LIMIT
}

fn default_max_limit() -> usize {
    DEFAULT_MAX_LIMIT
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub collections: CollectionsConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let collections = &self.collections;
        for (kind, name) in [
            ("users", &collections.users),
            ("images", &collections.images),
            ("products", &collections.products),
        ] {
            if name.trim().is_empty() {
                bail!("collections.{kind} must not be empty");
            }
        }

        if collections.dimension == 0 {
            bail!("collections.dimension must be greater than 0");
        }

        if self.store.timeout_secs == 0 {
            bail!("store.timeout_secs must be greater than 0");
        }

        if self.store.backend == StoreBackend::Qdrant && self.store.url.trim().is_empty() {
            bail!("store.url must be set for the qdrant backend");
        }

        let search = &self.search;
        if search.max_limit == 0 || search.max_limit > MAX_LIMIT_CAP {
            bail!(
                "search.max_limit must be between 1 and {MAX_LIMIT_CAP}, got {}",
                search.max_limit
            );
        }
        for (key, value) in [
            ("default_limit", search.default_limit),
            ("image_default_limit", search.image_default_limit),
        ] {
            if value == 0 || value > search.max_limit {
                bail!(
                    "search.{key} must be between 1 and {}, got {value}",
                    search.max_limit
                );
            }
        }

        self.listen_addr()?;

        if self.server.body_limit_mb == 0 || self.server.body_limit_mb > BODY_LIMIT_MB_CAP {
            bail!(
                "server.body_limit_mb must be between 1 and {BODY_LIMIT_MB_CAP}, got {}",
                self.server.body_limit_mb
            );
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .listen
            .parse()
            .with_context(|| format!("server.listen is not a socket address: {}", self.server.listen))
    }

    /// Directory holding `config.yaml` and downloaded models.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Loads `config.yaml` from `base_path`, writing defaults when it does not exist.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = self.base_path.join(CONFIG_FILE);
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(&path, config_str)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}
