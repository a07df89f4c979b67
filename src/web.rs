use crate::{
    app::{AppContext, AppError},
    config::{Config, ServerConfig},
    matching::ProductQuery,
    models::{ImageRecommendationResponse, ImageRecord, Product, ProductSearchResponse, User, UserMatchResponse},
};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{fmt::Debug, sync::Arc};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
struct SharedState {
    ctx: Arc<AppContext>,
}

pub fn router(ctx: Arc<AppContext>, server: &ServerConfig) -> Router {
    let shared_state = Arc::new(SharedState { ctx });

    let users = Router::new()
        .route("/match", post(match_users))
        .route("/index", post(index_user))
        .route("/health", get(users_health));

    let images = Router::new()
        .route("/search", post(search_images))
        .route("/similar", post(similar_images))
        .route("/index", post(index_image))
        .route("/health", get(images_health));

    let products = Router::new()
        .route("/search", post(search_products))
        .route("/index", post(index_product))
        .route("/health", get(products_health));

    let mut app = Router::new()
        .route("/", get(root))
        .nest("/api/users", users)
        .nest("/api/images", images)
        .nest("/api/products", products)
        .layer(DefaultBodyLimit::max(server.body_limit_mb * 1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        );

    if server.cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.with_state(shared_state)
}

async fn start_app(ctx: Arc<AppContext>, config: Config) -> anyhow::Result<()> {
    async fn shutdown_signal() {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("failed to install Ctrl+C handler: {err}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(err) => {
                    log::error!("failed to install signal handler: {err}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        log::warn!("shutting down");
    }

    let addr = config.listen_addr()?;
    let app = router(ctx, &config.server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Serves the API until Ctrl+C or SIGTERM.
///
/// Must be called outside of any async runtime: the store client is blocking.
pub fn start_daemon(ctx: AppContext, config: Config) -> anyhow::Result<()> {
    let ctx = Arc::new(ctx);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(start_app(ctx.clone(), config));

    // the last handle to the blocking clients is released outside the runtime
    drop(runtime);
    drop(ctx);
    result
}

// Wraps `AppError` so handlers can use `?` and still answer with JSON.
#[derive(Debug)]
struct HttpError(AppError);

impl HttpError {
    fn status(&self) -> StatusCode {
        match self.0 {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DimensionMismatch { .. } | AppError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self:?}");
        } else {
            log::debug!("{self:?}");
        }

        (
            status,
            Json(json!({"error": self.0.to_string(), "kind": self.0.kind()})),
        )
            .into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Decodes a base64 image field; `data:` URL prefixes are accepted.
fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, AppError> {
    require(field, value)?;
    let raw = match value.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => value,
    };
    STANDARD
        .decode(raw.trim())
        .map_err(|err| AppError::Validation(format!("{field} is not valid base64: {err}")))
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "Affinity API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn users_health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: "user-matching",
    })
}

async fn images_health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: "image-recommendation",
    })
}

async fn products_health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: "product-search",
    })
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserMatchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

async fn match_users(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<UserMatchRequest>, JsonRejection>,
) -> Result<Json<UserMatchResponse>, HttpError> {
    let Json(payload) = payload?;
    log::debug!("payload: {payload:?}");
    require("query", &payload.query)?;

    let ctx = state.ctx.clone();
    tokio::task::block_in_place(move || {
        ctx.users
            .find_matches(&payload.query, payload.limit, payload.page_token.as_deref())
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Debug, Serialize)]
pub struct IndexedResponse {
    pub id: String,
    pub point_id: u64,
}

async fn index_user(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<Json<IndexedResponse>, HttpError> {
    let Json(user) = payload?;
    log::debug!("payload: {user:?}");
    require("id", &user.id)?;

    let ctx = state.ctx.clone();
    tokio::task::block_in_place(move || {
        let point_id = ctx.users.index_user(&user)?;
        Ok(IndexedResponse {
            id: user.id,
            point_id: point_id.as_u64(),
        }
        .into())
    })
}

#[derive(Deserialize, Serialize)]
pub struct ImageSearchRequest {
    pub image_b64: String,
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

impl Debug for ImageSearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ImageSearchRequest {{ image_b64: [REDACTED], limit: {:?}, page_token: {:?} }}",
            self.limit, self.page_token
        )
    }
}

async fn search_images(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<ImageSearchRequest>, JsonRejection>,
) -> Result<Json<ImageRecommendationResponse>, HttpError> {
    let Json(payload) = payload?;
    log::debug!("payload: {payload:?}");
    let image = decode_b64("image_b64", &payload.image_b64)?;

    let ctx = state.ctx.clone();
    tokio::task::block_in_place(move || {
        ctx.images
            .search_by_image(&image, payload.limit, payload.page_token.as_deref())
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimilarImagesRequest {
    pub reference_image_id: String,
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

async fn similar_images(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<SimilarImagesRequest>, JsonRejection>,
) -> Result<Json<ImageRecommendationResponse>, HttpError> {
    let Json(payload) = payload?;
    log::debug!("payload: {payload:?}");
    require("reference_image_id", &payload.reference_image_id)?;

    let ctx = state.ctx.clone();
    tokio::task::block_in_place(move || {
        ctx.images
            .find_similar(
                &payload.reference_image_id,
                payload.limit,
                payload.page_token.as_deref(),
            )
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Deserialize, Serialize)]
pub struct IndexImageRequest {
    pub id: String,
    pub image_b64: String,
    pub filename: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Debug for IndexImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IndexImageRequest {{ id: {:?}, image_b64: [REDACTED], filename: {:?}, labels: {:?} }}",
            self.id, self.filename, self.labels
        )
    }
}

async fn index_image(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<IndexImageRequest>, JsonRejection>,
) -> Result<Json<ImageRecord>, HttpError> {
    let Json(payload) = payload?;
    log::debug!("payload: {payload:?}");
    require("id", &payload.id)?;
    let image = decode_b64("image_b64", &payload.image_b64)?;
    let filename = payload.filename.unwrap_or_else(|| payload.id.clone());

    let ctx = state.ctx.clone();
    tokio::task::block_in_place(move || {
        ctx.images
            .index_image(&payload.id, &image, &filename, payload.labels, None)
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Deserialize, Serialize)]
pub struct ProductSearchRequest {
    pub query: Option<String>,
    pub image_b64: Option<String>,
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

impl Debug for ProductSearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ProductSearchRequest {{ query: {:?}, image_b64: {}, limit: {:?}, page_token: {:?} }}",
            self.query,
            if self.image_b64.is_some() { "[REDACTED]" } else { "None" },
            self.limit,
            self.page_token
        )
    }
}

impl ProductSearchRequest {
    fn product_query(&self) -> Result<ProductQuery, AppError> {
        match (&self.query, &self.image_b64) {
            (Some(text), None) => {
                require("query", text)?;
                Ok(ProductQuery::Text(text.clone()))
            }
            (None, Some(image)) => Ok(ProductQuery::Image(decode_b64("image_b64", image)?)),
            _ => Err(AppError::Validation(
                "exactly one of query or image_b64 is required".to_string(),
            )),
        }
    }
}

async fn search_products(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<ProductSearchRequest>, JsonRejection>,
) -> Result<Json<ProductSearchResponse>, HttpError> {
    let Json(payload) = payload?;
    log::debug!("payload: {payload:?}");
    let query = payload.product_query()?;

    let ctx = state.ctx.clone();
    tokio::task::block_in_place(move || {
        ctx.products
            .search(&query, payload.limit, payload.page_token.as_deref())
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Deserialize, Serialize)]
pub struct IndexProductRequest {
    #[serde(flatten)]
    pub product: Product,
    pub image_b64: Option<String>,
}

impl Debug for IndexProductRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IndexProductRequest {{ product: {:?}, image_b64: {} }}",
            self.product,
            if self.image_b64.is_some() { "[REDACTED]" } else { "None" }
        )
    }
}

async fn index_product(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<IndexProductRequest>, JsonRejection>,
) -> Result<Json<IndexedResponse>, HttpError> {
    let Json(payload) = payload?;
    log::debug!("payload: {payload:?}");
    require("id", &payload.product.id)?;
    require("Product Name", &payload.product.name)?;
    let image = payload
        .image_b64
        .as_deref()
        .map(|b64| decode_b64("image_b64", b64))
        .transpose()?;

    let ctx = state.ctx.clone();
    tokio::task::block_in_place(move || {
        let point_id = ctx
            .products
            .index_product(&payload.product, image.as_deref())?;
        Ok(IndexedResponse {
            id: payload.product.id,
            point_id: point_id.as_u64(),
        }
        .into())
    })
}
