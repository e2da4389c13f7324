use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use quill_api::{
    create_api_router, ApiConfig, AppState, ArticleService, BackgroundDispatcher,
    CachedArticleRepository, HealthState,
};
use quill_api::constants::USER_ID_HEADER;
use quill_events::{InMemoryInteractionCounter, InMemoryMessageQueue, ReadEventProducer};
use quill_storage::cache::{CacheConfig, InMemoryCacheBackend, KvArticleCache};
use quill_test_utils::{fixtures, InMemoryArticleStore, ManualClock};
use serde_json::Value;
use tower::ServiceExt;

/// The full router over in-memory stores, with handles to everything behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryArticleStore>,
    pub queue: Arc<InMemoryMessageQueue>,
    pub counter: Arc<InMemoryInteractionCounter>,
    pub background: BackgroundDispatcher,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let clock = fixtures::clock();
        let store = Arc::new(InMemoryArticleStore::new());
        let backend = Arc::new(InMemoryCacheBackend::new(clock.clone()));
        let cache = Arc::new(KvArticleCache::new(backend, CacheConfig::default()));
        let queue = Arc::new(InMemoryMessageQueue::new(clock.clone()));
        let counter = Arc::new(InMemoryInteractionCounter::new());
        let background = BackgroundDispatcher::new(Duration::from_secs(1), 64);

        let repository = CachedArticleRepository::new(
            Arc::clone(&store),
            cache,
            Arc::new(fixtures::user_store()),
            Arc::new(ReadEventProducer::new(Arc::clone(&queue))),
            clock.clone(),
            background.clone(),
        );
        let articles = ArticleService::new(Arc::new(repository), counter.clone());
        let state = AppState::new(articles, HealthState::new(None, background.clone()));
        let router = create_api_router(state, &ApiConfig::default());

        Self {
            router,
            store,
            queue,
            counter,
            background,
            clock,
        }
    }

    /// Wait for cache writes and invalidations queued by earlier requests.
    pub async fn settle(&self) {
        self.background.drain().await;
    }

    pub async fn post(&self, uri: &str, user: Option<i64>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("valid request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, user: Option<i64>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        let request = builder.body(Body::empty()).expect("valid request");
        self.send(request).await
    }

    /// Raw body for non-JSON endpoints.
    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("valid request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, json)
    }
}
