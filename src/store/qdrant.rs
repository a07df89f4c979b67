//! Blocking client for the Qdrant REST API.
//!
//! Only the handful of endpoints the matching services need are wrapped:
//! collection get/create, point upsert, point retrieve and vector search.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    CollectionInfo, Distance, Payload, Point, PointId, ScoredPoint, StoreError, VectorStore,
};

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct RawPoint {
    id: Value,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct RawScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

/// Qdrant client speaking JSON over HTTP.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    /// Collection dimensions seen so far, used to reject bad upserts locally.
    dimensions: RwLock<HashMap<String, usize>>,
}

impl QdrantStore {
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key,
            dimensions: RwLock::new(HashMap::new()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        req
    }

    /// Sends the request and unwraps Qdrant's `{"result": ...}` envelope.
    /// A 404 is reported as `Ok(None)`.
    fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>, StoreError> {
        let resp = req
            .send()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let message = resp
                .json::<Value>()
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            log::warn!("qdrant responded with {status}: {message}");
            return Err(StoreError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = resp
            .json()
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(envelope.result))
    }

    fn remember_dimension(&self, collection: &str, dimension: usize) {
        if let Ok(mut dims) = self.dimensions.write() {
            dims.insert(collection.to_string(), dimension);
        }
    }

    fn known_dimension(&self, collection: &str) -> Result<usize, StoreError> {
        let cached = self
            .dimensions
            .read()
            .ok()
            .and_then(|dims| dims.get(collection).copied());
        if let Some(dimension) = cached {
            return Ok(dimension);
        }

        self.collection_info(collection)?
            .map(|info| info.dimension)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))
    }
}

impl VectorStore for QdrantStore {
    fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        if let Some(info) = self.collection_info(name)? {
            if info.dimension != dimension {
                log::warn!(
                    "collection {name} exists with dimension {} (configured {dimension})",
                    info.dimension
                );
            }
            return Ok(());
        }

        log::info!("creating collection {name} ({dimension}d, {distance:?})");
        let body = json!({
            "vectors": { "size": dimension, "distance": distance.as_qdrant() }
        });
        self.execute::<Value>(self.request(Method::PUT, &format!("/collections/{name}")).json(&body))?
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;

        self.remember_dimension(name, dimension);
        Ok(())
    }

    fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let result: Option<Value> =
            self.execute(self.request(Method::GET, &format!("/collections/{name}")))?;

        match result {
            None => Ok(None),
            Some(raw) => {
                let info = parse_collection_info(name, &raw)?;
                self.remember_dimension(name, info.dimension);
                Ok(Some(info))
            }
        }
    }

    fn upsert(&self, collection: &str, point: Point) -> Result<(), StoreError> {
        let expected = self.known_dimension(collection)?;
        if point.vector.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                got: point.vector.len(),
            });
        }

        let body = json!({
            "points": [{
                "id": point.id.as_u64(),
                "vector": point.vector,
                "payload": point.payload,
            }]
        });
        self.execute::<Value>(
            self.request(
                Method::PUT,
                &format!("/collections/{collection}/points?wait=true"),
            )
            .json(&body),
        )?
        .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        Ok(())
    }

    fn retrieve(&self, collection: &str, id: PointId) -> Result<Point, StoreError> {
        let body = json!({
            "ids": [id.as_u64()],
            "with_payload": true,
            "with_vector": true,
        });
        let points: Vec<RawPoint> = self
            .execute(
                self.request(Method::POST, &format!("/collections/{collection}/points"))
                    .json(&body),
            )?
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let raw = points
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::PointNotFound {
                collection: collection.to_string(),
                key: id.to_string(),
            })?;

        Ok(Point {
            id: parse_point_id(&raw.id)?,
            vector: raw
                .vector
                .ok_or_else(|| StoreError::Decode("point returned without vector".into()))?,
            payload: raw.payload.unwrap_or_default(),
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let expected = self.known_dimension(collection)?;
        if vector.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                got: vector.len(),
            });
        }

        let body = json!({
            "vector": vector,
            "limit": limit,
            "offset": offset,
            "with_payload": true,
        });
        let hits: Vec<RawScoredPoint> = self
            .execute(
                self.request(
                    Method::POST,
                    &format!("/collections/{collection}/points/search"),
                )
                .json(&body),
            )?
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        hits.into_iter()
            .map(|hit| {
                Ok(ScoredPoint {
                    id: parse_point_id(&hit.id)?,
                    score: hit.score,
                    payload: hit.payload.unwrap_or_default(),
                })
            })
            .collect()
    }
}

fn error_message(body: &Value) -> Option<String> {
    body.pointer("/status/error")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
}

fn parse_point_id(raw: &Value) -> Result<PointId, StoreError> {
    raw.as_u64()
        .map(PointId::from)
        .ok_or_else(|| StoreError::Decode(format!("unsupported point id {raw}")))
}

fn parse_collection_info(name: &str, raw: &Value) -> Result<CollectionInfo, StoreError> {
    let vectors = raw
        .pointer("/config/params/vectors")
        .ok_or_else(|| StoreError::Decode(format!("collection {name} has no vector params")))?;

    let dimension = vectors
        .get("size")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| {
            StoreError::Decode(format!("collection {name} uses named vectors, which are not supported"))
        })? as usize;

    let distance = vectors
        .get("distance")
        .and_then(|v| v.as_str())
        .and_then(Distance::from_qdrant)
        .ok_or_else(|| StoreError::Decode(format!("collection {name} has an unsupported distance")))?;

    Ok(CollectionInfo {
        name: name.to_string(),
        points_count: raw.get("points_count").and_then(|v| v.as_u64()).unwrap_or(0),
        dimension,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection_info() {
        let raw = json!({
            "status": "green",
            "points_count": 42,
            "config": {
                "params": { "vectors": { "size": 512, "distance": "Cosine" } }
            }
        });

        let info = parse_collection_info("user_profiles", &raw).unwrap();
        assert_eq!(info.points_count, 42);
        assert_eq!(info.dimension, 512);
        assert_eq!(info.distance, Distance::Cosine);
    }

    #[test]
    fn test_parse_collection_info_without_points_count() {
        let raw = json!({
            "points_count": null,
            "config": { "params": { "vectors": { "size": 3, "distance": "Euclid" } } }
        });

        let info = parse_collection_info("things", &raw).unwrap();
        assert_eq!(info.points_count, 0);
        assert_eq!(info.distance, Distance::Euclid);
    }

    #[test]
    fn test_parse_collection_info_rejects_named_vectors() {
        let raw = json!({
            "config": { "params": { "vectors": { "image": { "size": 512, "distance": "Cosine" } } } }
        });
        assert!(matches!(
            parse_collection_info("things", &raw),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_point_id() {
        assert_eq!(parse_point_id(&json!(7)).unwrap(), PointId::from(7));
        assert!(parse_point_id(&json!("5c56c793-69f3-4fbf-87e6-c4bf54c28c26")).is_err());
    }

    #[test]
    fn test_error_message() {
        let body = json!({ "status": { "error": "Wrong input: Vector dimension error" }, "time": 0.1 });
        assert_eq!(
            error_message(&body).as_deref(),
            Some("Wrong input: Vector dimension error")
        );
        assert_eq!(error_message(&json!({})), None);
    }

    #[test]
    fn test_unreachable_server_is_unavailable() {
        let store =
            QdrantStore::new("http://127.0.0.1:9/", None, Duration::from_secs(2)).unwrap();
        let result = store.collection_info("user_profiles");
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    mod stub {
        use std::sync::{Arc, Mutex};

        use axum::{
            body::Bytes,
            extract::State,
            http::{HeaderMap, Method, StatusCode, Uri},
            Json, Router,
        };
        use serde_json::{json, Value};

        #[derive(Debug, Clone)]
        pub struct Recorded {
            pub method: String,
            pub path: String,
            pub api_key: Option<String>,
            pub body: Value,
        }

        type Responder = dyn Fn(&str, &str) -> (StatusCode, Value) + Send + Sync;

        /// A fake Qdrant answering from a closure over `(method, path)` and
        /// recording every request it receives.
        pub struct Server {
            pub url: String,
            requests: Mutex<Vec<Recorded>>,
            respond: Box<Responder>,
        }

        impl Server {
            pub fn requests(&self) -> Vec<Recorded> {
                self.requests.lock().unwrap().clone()
            }

            pub fn count(&self, method: &str, path_prefix: &str) -> usize {
                self.requests()
                    .iter()
                    .filter(|r| r.method == method && r.path.starts_with(path_prefix))
                    .count()
            }
        }

        async fn record(
            State(server): State<Arc<Server>>,
            method: Method,
            uri: Uri,
            headers: HeaderMap,
            body: Bytes,
        ) -> (StatusCode, Json<Value>) {
            let (status, response) = (server.respond)(method.as_str(), uri.path());
            server.requests.lock().unwrap().push(Recorded {
                method: method.to_string(),
                path: uri
                    .path_and_query()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                api_key: headers
                    .get("api-key")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned),
                body: serde_json::from_slice(&body).unwrap_or(Value::Null),
            });
            (status, Json(response))
        }

        pub fn serve(
            respond: impl Fn(&str, &str) -> (StatusCode, Value) + Send + Sync + 'static,
        ) -> Arc<Server> {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.set_nonblocking(true).unwrap();

            let server = Arc::new(Server {
                url: format!("http://{}", listener.local_addr().unwrap()),
                requests: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            });

            let state = server.clone();
            std::thread::spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                    let app = Router::new().fallback(record).with_state(state);
                    axum::serve(listener, app).await.unwrap();
                });
            });

            server
        }

        pub fn ok(result: Value) -> (StatusCode, Value) {
            (StatusCode::OK, json!({ "result": result, "status": "ok", "time": 0.001 }))
        }

        pub fn not_found() -> (StatusCode, Value) {
            (
                StatusCode::NOT_FOUND,
                json!({ "status": { "error": "Not found: Collection doesn't exist!" } }),
            )
        }

        pub fn collection(size: usize) -> Value {
            json!({
                "status": "green",
                "points_count": 2,
                "config": { "params": { "vectors": { "size": size, "distance": "Cosine" } } }
            })
        }
    }

    fn client(server: &stub::Server) -> QdrantStore {
        QdrantStore::new(&server.url, Some("secret".into()), Duration::from_secs(5)).unwrap()
    }

    fn point(vector: Vec<f32>) -> Point {
        Point {
            id: PointId::from(1),
            vector,
            payload: Payload::new(),
        }
    }

    #[test]
    fn test_api_key_header_is_sent() {
        let server = stub::serve(|_, _| stub::ok(stub::collection(3)));
        let info = client(&server).collection_info("things").unwrap().unwrap();
        assert_eq!(info.dimension, 3);
        assert_eq!(info.points_count, 2);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/collections/things");
        assert_eq!(requests[0].api_key.as_deref(), Some("secret"));

        let anonymous = QdrantStore::new(&server.url, None, Duration::from_secs(5)).unwrap();
        anonymous.collection_info("things").unwrap();
        assert_eq!(server.requests()[1].api_key, None);
    }

    #[test]
    fn test_mismatched_vectors_are_rejected_locally() {
        let server = stub::serve(|_, _| stub::ok(stub::collection(3)));
        let store = client(&server);

        assert!(matches!(
            store.upsert("things", point(vec![1.0, 0.0])),
            Err(StoreError::DimensionMismatch { expected: 3, got: 2 })
        ));
        assert!(matches!(
            store.search("things", &[1.0, 0.0], 5, 0),
            Err(StoreError::DimensionMismatch { expected: 3, got: 2 })
        ));

        // the dimension was looked up once and remembered; nothing else was sent
        assert_eq!(server.requests().len(), 1);
        assert_eq!(server.count("PUT", "/collections/things/points"), 0);
        assert_eq!(server.count("POST", "/collections/things/points"), 0);
    }

    #[test]
    fn test_upsert_sends_point() {
        let server = stub::serve(|method, _| match method {
            "GET" => stub::ok(stub::collection(2)),
            _ => stub::ok(json!({ "operation_id": 1, "status": "completed" })),
        });
        let store = client(&server);

        let mut payload = Payload::new();
        payload.insert("id".into(), json!("u1"));
        store
            .upsert(
                "things",
                Point {
                    id: PointId::from(7),
                    vector: vec![0.5, 0.5],
                    payload,
                },
            )
            .unwrap();

        let upsert = server
            .requests()
            .into_iter()
            .find(|r| r.method == "PUT")
            .unwrap();
        assert_eq!(upsert.path, "/collections/things/points?wait=true");
        assert_eq!(
            upsert.body,
            json!({ "points": [{ "id": 7, "vector": [0.5, 0.5], "payload": { "id": "u1" } }] })
        );
    }

    #[test]
    fn test_retrieve_missing_point() {
        let server = stub::serve(|_, _| stub::ok(json!([])));
        let result = client(&server).retrieve("things", PointId::from(42));
        assert!(matches!(
            result,
            Err(StoreError::PointNotFound { ref key, .. }) if key == "42"
        ));
    }

    #[test]
    fn test_retrieve_point() {
        let server = stub::serve(|_, _| {
            stub::ok(json!([{ "id": 42, "vector": [0.1, 0.2], "payload": { "labels": ["a"] } }]))
        });
        let point = client(&server).retrieve("things", PointId::from(42)).unwrap();
        assert_eq!(point.id, PointId::from(42));
        assert_eq!(point.vector, vec![0.1, 0.2]);
        assert_eq!(point.payload.get("labels"), Some(&json!(["a"])));

        let request = &server.requests()[0];
        assert_eq!(request.path, "/collections/things/points");
        assert_eq!(request.body["ids"], json!([42]));
        assert_eq!(request.body["with_vector"], json!(true));
    }

    #[test]
    fn test_missing_collection() {
        let server = stub::serve(|method, path| {
            if method == "GET" && path == "/collections/things" {
                stub::ok(stub::collection(2))
            } else {
                stub::not_found()
            }
        });
        let store = client(&server);

        assert!(matches!(
            store.upsert("things", point(vec![1.0, 0.0])),
            Err(StoreError::CollectionNotFound(ref name)) if name == "things"
        ));
        assert!(matches!(
            store.search("things", &[1.0, 0.0], 5, 0),
            Err(StoreError::CollectionNotFound(ref name)) if name == "things"
        ));
        assert!(matches!(
            store.retrieve("things", PointId::from(1)),
            Err(StoreError::CollectionNotFound(_))
        ));

        // unknown collections never reach the points endpoints
        assert!(matches!(
            store.search("other", &[1.0, 0.0], 5, 0),
            Err(StoreError::CollectionNotFound(ref name)) if name == "other"
        ));
        assert_eq!(store.collection_info("other").unwrap(), None);
    }

    #[test]
    fn test_search_keeps_raw_scores() {
        let server = stub::serve(|method, _| match method {
            "GET" => stub::ok(stub::collection(2)),
            _ => stub::ok(json!([
                { "id": 7, "version": 0, "score": 0.42, "payload": { "id": "a" } },
                { "id": 9, "version": 0, "score": -0.1 }
            ])),
        });

        let hits = client(&server).search("things", &[1.0, 0.0], 3, 6).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, PointId::from(7));
        assert_eq!(hits[0].score, 0.42);
        assert_eq!(hits[0].payload.get("id"), Some(&json!("a")));
        assert_eq!(hits[1].id, PointId::from(9));
        assert_eq!(hits[1].score, -0.1);
        assert!(hits[1].payload.is_empty());

        let search = server
            .requests()
            .into_iter()
            .find(|r| r.method == "POST")
            .unwrap();
        assert_eq!(search.path, "/collections/things/points/search");
        assert_eq!(search.body["limit"], json!(3));
        assert_eq!(search.body["offset"], json!(6));
        assert_eq!(search.body["with_payload"], json!(true));
    }

    #[test]
    fn test_rejected_request_is_upstream_error() {
        let server = stub::serve(|method, _| match method {
            "GET" => stub::ok(stub::collection(2)),
            _ => (
                StatusCode::BAD_REQUEST,
                json!({ "status": { "error": "Wrong input: bad filter" }, "time": 0.0 }),
            ),
        });

        let result = client(&server).search("things", &[1.0, 0.0], 3, 0);
        match result {
            Err(StoreError::Upstream { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Wrong input: bad filter");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
