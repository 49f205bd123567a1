//! End-to-end cache-aside behavior through the full router.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use review_api::{ApiContext, CACHE_STATUS_HEADER, build_router};
use review_domain::{MediaType, Review};
use review_persistence::cache::{MemoryConnector, MemoryStore};
use review_persistence::{
    ConnectionConfig, ConnectionManager, InMemoryReviewRepository, PersistenceError,
    ReviewRepository,
};

const NAMESPACE: &str = "test";

/// Counts reads so cache hits can be told apart from handler calls.
#[derive(Default)]
struct CountingRepository {
    inner: InMemoryReviewRepository,
    reads: AtomicUsize,
    fail_reads: bool,
}

#[async_trait]
impl ReviewRepository for CountingRepository {
    async fn find_by_content_and_type(
        &self,
        media_type: MediaType,
        content_id: &str,
    ) -> review_persistence::Result<Vec<Review>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(PersistenceError::Scylla("connection reset".into()));
        }
        self.inner
            .find_by_content_and_type(media_type, content_id)
            .await
    }

    async fn insert(&self, review: &Review) -> review_persistence::Result<()> {
        self.inner.insert(review).await
    }

    async fn delete_one(&self, content_id: &str, user_id: &str) -> review_persistence::Result<bool> {
        self.inner.delete_one(content_id, user_id).await
    }
}

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    connection: ConnectionManager,
    reviews: Arc<CountingRepository>,
}

impl Harness {
    async fn new() -> Self {
        Self::build(CountingRepository::default(), true).await
    }

    async fn build(reviews: CountingRepository, cache_available: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.set_available(cache_available);

        let connection = ConnectionManager::new(
            Arc::new(MemoryConnector::new(Arc::clone(&store))),
            ConnectionConfig::default(),
        );
        // Single attempt, no supervisor: keeps paused-clock tests deterministic
        let _ = connection.connect().await;

        let reviews = Arc::new(reviews);
        let ctx = ApiContext::builder()
            .with_reviews(reviews.clone())
            .with_connection(connection.clone())
            .with_namespace(NAMESPACE)
            .with_ttl(Duration::from_secs(900))
            .build()
            .unwrap();

        Self {
            app: build_router(ctx),
            store,
            connection,
            reviews,
        }
    }

    fn reads(&self) -> usize {
        self.reviews.reads.load(Ordering::SeqCst)
    }

    async fn get(&self, uri: &str) -> Response {
        self.app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(&self, uri: &str, body: &Value) -> Response {
        self.app
            .clone()
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

fn cache_status(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(CACHE_STATUS_HEADER)
        .and_then(|value| value.to_str().ok())
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn new_review(content_id: &str, user_id: &str, media_type: &str) -> Value {
    json!({
        "contentId": content_id,
        "userId": user_id,
        "username": user_id,
        "review": "Worth watching twice",
        "spoilerContains": false,
        "mediaType": media_type,
    })
}

#[tokio::test]
async fn add_read_hit_delete_read_scenario() {
    let h = Harness::new().await;

    let added = h.post("/add", &new_review("c1", "u1", "movie")).await;
    assert_eq!(added.status(), StatusCode::CREATED);
    assert_eq!(body_json(added).await["message"], "Review added");

    let first = h.get("/movie/c1").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_status(&first), Some("MISS"));
    let first_body = body_bytes(first).await;
    assert!(h.store.contains_key("test:reviews:movie:c1"));

    let second = h.get("/movie/c1").await;
    assert_eq!(cache_status(&second), Some("HIT"));
    assert_eq!(
        second.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(body_bytes(second).await, first_body);
    assert_eq!(h.reads(), 1);

    let deleted = h
        .post("/delete", &json!({ "contentId": "c1", "userId": "u1" }))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(body_json(deleted).await["message"], "Review deleted");
    assert!(!h.store.contains_key("test:reviews:movie:c1"));

    let after = h.get("/movie/c1").await;
    assert_eq!(cache_status(&after), Some("MISS"));
    assert_eq!(body_json(after).await, json!([]));
    assert_eq!(h.reads(), 2);
}

#[tokio::test]
async fn write_invalidates_every_media_type_for_content() {
    let h = Harness::new().await;

    h.get("/movie/c1").await;
    h.get("/tv/c1").await;
    h.get("/movie/c2").await;
    assert_eq!(h.store.len(), 3);

    h.post("/add", &new_review("c1", "u1", "tv")).await;

    assert!(!h.store.contains_key("test:reviews:movie:c1"));
    assert!(!h.store.contains_key("test:reviews:tv:c1"));
    assert!(h.store.contains_key("test:reviews:movie:c2"));

    let reviews = body_json(h.get("/tv/c1").await).await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["userId"], "u1");
    assert_eq!(reviews[0]["mediaType"], "tv");
}

#[tokio::test(start_paused = true)]
async fn cached_reads_expire_after_ttl() {
    let h = Harness::new().await;

    h.get("/movie/c1").await;
    assert_eq!(cache_status(&h.get("/movie/c1").await), Some("HIT"));
    assert_eq!(h.reads(), 1);

    tokio::time::advance(Duration::from_secs(901)).await;

    assert_eq!(cache_status(&h.get("/movie/c1").await), Some("MISS"));
    assert_eq!(h.reads(), 2);
}

#[tokio::test]
async fn service_degrades_when_cache_is_unreachable() {
    let h = Harness::build(CountingRepository::default(), false).await;
    assert!(!h.connection.is_live());

    let added = h.post("/add", &new_review("c1", "u1", "movie")).await;
    assert_eq!(added.status(), StatusCode::CREATED);

    for _ in 0..2 {
        let response = h.get("/movie/c1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_status(&response), None);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
    }
    assert_eq!(h.reads(), 2);

    let health = body_json(h.get("/health").await).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["cache"]["live"], false);
    assert_eq!(health["cache"]["state"], "FAILED");
    assert!(health["cache"]["lastError"].is_string());
}

#[tokio::test]
async fn cache_failure_mid_request_falls_through_to_handler() {
    let h = Harness::new().await;
    h.get("/movie/c1").await;

    h.store.set_available(false);

    let response = h.get("/movie/c1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
    assert_eq!(h.reads(), 2);
    assert!(!h.connection.is_live());

    // Writes still succeed while invalidation is skipped
    let added = h.post("/add", &new_review("c1", "u1", "movie")).await;
    assert_eq!(added.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn upstream_errors_are_not_cached() {
    let failing = CountingRepository {
        fail_reads: true,
        ..CountingRepository::default()
    };
    let h = Harness::build(failing, true).await;

    for _ in 0..2 {
        let response = h.get("/movie/c1").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"]["code"],
            "PERSISTENCE_ERROR"
        );
    }

    assert!(h.store.is_empty());
    assert_eq!(h.reads(), 2);
}

#[tokio::test]
async fn unknown_media_type_is_rejected_and_not_cached() {
    let h = Harness::new().await;

    let response = h.get("/book/c1").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(cache_status(&response), None);
    assert_eq!(body_json(response).await["error"]["code"], "UNKNOWN_MEDIA_TYPE");
    assert!(h.store.is_empty());
    assert_eq!(h.reads(), 0);
}

#[tokio::test]
async fn invalid_writes_are_rejected() {
    let h = Harness::new().await;

    let response = h.post("/add", &new_review("", "u1", "movie")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "MISSING_FIELD");

    let response = h
        .post("/delete", &json!({ "contentId": "c1", "userId": " " }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = h.post("/add", &json!({ "contentId": "c1" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_INPUT");

    assert!(h.reviews.inner.is_empty().await);
}

#[tokio::test]
async fn health_reports_connection_and_hit_ratio() {
    let h = Harness::new().await;
    h.get("/movie/c1").await;
    h.get("/movie/c1").await;

    let response = h.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "review-service");
    assert_eq!(health["cache"]["state"], "CONNECTED");
    assert_eq!(health["cache"]["live"], true);
    assert_eq!(health["cache"]["hits"], 1);
    assert_eq!(health["cache"]["misses"], 1);
    assert_eq!(health["cache"]["hitRatio"], 0.5);
}

#[tokio::test]
async fn test_endpoint_reports_running() {
    let h = Harness::new().await;

    let response = h.get("/test").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"Review service is running");
}
