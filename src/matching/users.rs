//! Natural-language user matching.

use std::path::Path;
use std::sync::Arc;

use super::{paginate, parse_page_token, CollectionSpec, Explainer, Limits, UserReasonExplainer};
use crate::{
    app::AppError,
    embedding::Embedder,
    models::{from_payload, to_payload, User, UserMatch, UserMatchResponse, UserSeed},
    store::{percent, Point, PointId, VectorStore},
};

pub struct UserMatchingService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: CollectionSpec,
    limits: Limits,
    explainer: Box<dyn Explainer<str, User>>,
}

impl UserMatchingService {
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
            explainer: Box::new(UserReasonExplainer),
        }
    }

    pub fn with_explainer(mut self, explainer: Box<dyn Explainer<str, User>>) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    pub fn ensure_collection(&self) -> Result<(), AppError> {
        self.collection.ensure(self.store.as_ref())
    }

    /// Embeds the profile description and upserts it under the user's id.
    pub fn index_user(&self, user: &User) -> Result<PointId, AppError> {
        if user.id.trim().is_empty() {
            return Err(AppError::Validation("user id must not be empty".to_string()));
        }

        let vector = self.embedder.embed_text(&user.profile_text())?;
        let id = PointId::from_key(&user.id);

        self.store.upsert(
            &self.collection.name,
            Point {
                id,
                vector,
                payload: to_payload(user)?,
            },
        )?;

        log::debug!("indexed user {} as point {id}", user.id);
        Ok(id)
    }

    /// Indexes the users of a bootstrap file, but only into an empty collection.
    ///
    /// Returns the number of users indexed.
    pub fn seed_if_empty(&self, path: &Path) -> Result<usize, AppError> {
        let existing = self.collection.points_count(self.store.as_ref())?;
        if existing > 0 {
            log::debug!(
                "collection {} already holds {existing} users, skipping seed",
                self.collection.name
            );
            return Ok(0);
        }

        if !path.exists() {
            log::info!("no seed file at {}, starting with an empty collection", path.display());
            return Ok(0);
        }

        self.seed(path)
    }

    /// Indexes every user of a bootstrap file, overwriting existing profiles.
    pub fn seed(&self, path: &Path) -> Result<usize, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::InvalidInput(format!("cannot read {}: {}", path.display(), e)))?;
        let seed: UserSeed = serde_json::from_str(&raw)
            .map_err(|e| AppError::InvalidInput(format!("malformed seed file {}: {}", path.display(), e)))?;

        for user in &seed.users {
            self.index_user(user)?;
        }

        log::info!("seeded {} users from {}", seed.users.len(), path.display());
        Ok(seed.users.len())
    }

    /// Finds the profiles closest to a natural-language query.
    pub fn find_matches(
        &self,
        query: &str,
        limit: Option<usize>,
        page_token: Option<&str>,
    ) -> Result<UserMatchResponse, AppError> {
        let limit = self.limits.resolve(limit)?;
        let offset = parse_page_token(page_token)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("query must not be empty".to_string()));
        }

        let vector = self.embedder.embed_text(query)?;
        let raw = self
            .store
            .search(&self.collection.name, &vector, limit + 1, offset)?;
        let page = paginate(raw, offset, limit, None);

        let matches = page
            .items
            .into_iter()
            .map(|hit| {
                let user: User = from_payload(hit.payload)?;
                let similarity = self.collection.distance.similarity(hit.score);
                Ok(UserMatch {
                    match_reasons: self.explainer.explain(query, &user),
                    user,
                    compatibility_score: similarity,
                    similarity_percent: percent(similarity),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(UserMatchResponse {
            matches,
            query_understanding: format!("Looking for users matching: {query}"),
            next_token: page.next_token,
        })
    }
}
