//! Route tests for the article and operational endpoints
//!
//! Every request runs through the full router (CORS, observability, caller
//! extraction) over in-memory stores.

use std::time::Duration;

use axum::http::StatusCode;
use proptest::prelude::*;
use quill_api::jobs::spawn_read_event_consumer;
use quill_core::{ArticleStatus, ARTICLE_BIZ, READ_EVENT_TOPIC};
use quill_events::{ConsumerConfig, InteractionCounter};
use quill_test_utils::fixtures::{AUTHOR_ID, AUTHOR_NAME, STRANGER_ID};
use serde_json::json;
use tokio::sync::watch;

#[path = "support/app.rs"]
mod app;

use app::TestApp;

async fn publish(app: &TestApp, title: &str, content: &str) -> i64 {
    let (status, body) = app
        .post(
            "/articles/publish",
            Some(AUTHOR_ID),
            json!({ "title": title, "content": content }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "publish failed: {body}");
    body["id"].as_i64().expect("id in response")
}

// ============================================================================
// AUTHOR ENDPOINTS
// ============================================================================

#[tokio::test]
async fn test_edit_creates_then_updates_draft() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/articles/edit",
            Some(AUTHOR_ID),
            json!({ "title": "first", "content": "body" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().unwrap();
    assert!(id > 0);

    let (status, body) = app
        .post(
            "/articles/edit",
            Some(AUTHOR_ID),
            json!({ "id": id, "title": "second", "content": "body" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"].as_i64(), Some(id));

    let draft = app.store.peek_draft(id).await.unwrap();
    assert_eq!(draft.title, "second");
    assert_eq!(draft.status(), ArticleStatus::Unpublished);
    assert!(app.store.peek_published(id).await.is_none());
}

#[tokio::test]
async fn test_edit_rejects_blank_title() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/articles/edit", Some(AUTHOR_ID), json!({ "title": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn test_edit_of_someone_elses_article_is_not_found() {
    let app = TestApp::new();
    let id = publish(&app, "mine", "c").await;

    let (status, _) = app
        .post(
            "/articles/edit",
            Some(STRANGER_ID),
            json!({ "id": id, "title": "hijack" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.peek_draft(id).await.unwrap().title, "mine");
}

#[tokio::test]
async fn test_publish_writes_both_stores() {
    let app = TestApp::new();
    let id = publish(&app, "t", "c").await;

    let draft = app.store.peek_draft(id).await.unwrap();
    let published = app.store.peek_published(id).await.unwrap();
    assert_eq!(draft.status(), ArticleStatus::Published);
    assert_eq!(published.status(), ArticleStatus::Published);
    assert_eq!(draft.title, published.title);
}

#[tokio::test]
async fn test_list_returns_summaries_newest_first() {
    let app = TestApp::new();
    let older = publish(&app, "older", "c").await;
    app.clock.advance(10);
    let newer = publish(&app, "newer", "x".repeat(500).as_str()).await;
    app.settle().await;

    let (status, body) = app
        .post(
            "/articles/list",
            Some(AUTHOR_ID),
            json!({ "offset": 0, "limit": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"].as_i64(), Some(newer));
    assert_eq!(items[1]["id"].as_i64(), Some(older));
    assert!(items[0].get("content").is_none());
    assert!(items[0]["abstract"].as_str().unwrap().len() < 500);
}

#[tokio::test]
async fn test_list_rejects_bad_paging() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/articles/list",
            Some(AUTHOR_ID),
            json!({ "offset": -1, "limit": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/articles/list", Some(AUTHOR_ID), json!({ "limit": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detail_is_author_only() {
    let app = TestApp::new();
    let id = publish(&app, "t", "full body").await;

    let (status, body) = app.get(&format!("/articles/detail/{id}"), Some(AUTHOR_ID)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "full body");

    let (status, _) = app
        .get(&format!("/articles/detail/{id}"), Some(STRANGER_ID))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/articles/detail/424242", Some(AUTHOR_ID)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// READER ENDPOINT
// ============================================================================

#[tokio::test]
async fn test_pub_detail_counts_reads_through_consumer() {
    let app = TestApp::new();
    let id = publish(&app, "t", "c").await;
    app.settle().await;

    for _ in 0..3 {
        let (status, body) = app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authorName"], AUTHOR_NAME);
        assert_eq!(body["status"], ArticleStatus::Published.as_u8());
    }
    app.settle().await;
    assert_eq!(app.queue.published(READ_EVENT_TOPIC).await.len(), 3);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = spawn_read_event_consumer(
        app.queue.clone(),
        app.counter.clone(),
        ConsumerConfig::default()
            .with_group("routes-test")
            .with_poll_interval(Duration::from_millis(10)),
        shutdown_rx,
    );
    for _ in 0..200 {
        if app.counter.get(ARTICLE_BIZ, id).await.unwrap().read_cnt == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    shutdown_tx.send(true).unwrap();
    consumer.await.unwrap();

    let (status, body) = app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["readCnt"], 3);
    assert_eq!(body["likeCnt"], 0);
}

#[tokio::test]
async fn test_withdraw_hides_published_article() {
    let app = TestApp::new();
    let id = publish(&app, "t", "c").await;
    app.settle().await;
    let (status, _) = app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/articles/withdraw", Some(AUTHOR_ID), json!({ "id": id }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.store.peek_draft(id).await.unwrap().status(),
        ArticleStatus::Private
    );
}

#[tokio::test]
async fn test_withdraw_by_stranger_is_not_found() {
    let app = TestApp::new();
    let id = publish(&app, "t", "c").await;

    let (status, _) = app
        .post("/articles/withdraw", Some(STRANGER_ID), json!({ "id": id }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.store.peek_published(id).await.unwrap().status(),
        ArticleStatus::Published
    );
}

#[tokio::test]
async fn test_pub_detail_of_unknown_article_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.get("/articles/pub/31337", Some(STRANGER_ID)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ARTICLE_NOT_FOUND");
}

#[tokio::test]
async fn test_withdrawn_article_reads_are_not_counted() {
    let app = TestApp::new();
    let id = publish(&app, "t", "c").await;
    app.settle().await;
    app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
    app.settle().await;
    assert_eq!(app.queue.published(READ_EVENT_TOPIC).await.len(), 1);

    app.post("/articles/withdraw", Some(AUTHOR_ID), json!({ "id": id }))
        .await;
    for _ in 0..3 {
        let (status, _) = app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    app.settle().await;
    assert_eq!(app.queue.published(READ_EVENT_TOPIC).await.len(), 1);
}

// ============================================================================
// LIKES AND COLLECTIONS
// ============================================================================

#[tokio::test]
async fn test_like_then_unlike_updates_published_view() {
    let app = TestApp::new();
    let id = publish(&app, "t", "c").await;
    app.settle().await;

    for _ in 0..2 {
        let (status, body) = app
            .post(
                "/articles/pub/like",
                Some(STRANGER_ID),
                json!({ "id": id, "like": true }),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());
    }
    let (_, body) = app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
    assert_eq!(body["likeCnt"], 1);

    let (status, _) = app
        .post(
            "/articles/pub/like",
            Some(STRANGER_ID),
            json!({ "id": id, "like": false }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
    assert_eq!(body["likeCnt"], 0);
}

#[tokio::test]
async fn test_collect_counts_each_reader_once() {
    let app = TestApp::new();
    let id = publish(&app, "t", "c").await;
    app.settle().await;

    for cid in [7, 8] {
        let (status, _) = app
            .post(
                "/articles/pub/collect",
                Some(STRANGER_ID),
                json!({ "id": id, "cid": cid }),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    let (status, _) = app
        .post("/articles/pub/collect", Some(AUTHOR_ID), json!({ "id": id }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let interaction = app.counter.get(ARTICLE_BIZ, id).await.unwrap();
    assert_eq!(interaction.collect_cnt, 2);
    let (_, body) = app.get(&format!("/articles/pub/{id}"), Some(STRANGER_ID)).await;
    assert_eq!(body["collectCnt"], 2);
}

#[tokio::test]
async fn test_interactions_reject_non_positive_ids() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/articles/pub/like",
            Some(STRANGER_ID),
            json!({ "id": 0, "like": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/articles/pub/collect", Some(STRANGER_ID), json!({ "id": -3 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/articles/pub/like", None, json!({ "id": 1, "like": true }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// OPERATIONAL ENDPOINTS
// ============================================================================

#[tokio::test]
async fn test_health_endpoints_without_database() {
    let app = TestApp::new();

    let (status, body) = app.get("/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_exposes_request_counters() {
    let app = TestApp::new();
    app.get("/health/live", None).await;

    let (status, text) = app.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("quill_http_requests_total"));
}

// ============================================================================
// CALLER IDENTITY
// ============================================================================

#[tokio::test]
async fn test_missing_caller_header_is_unauthorized() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/articles/edit", None, json!({ "title": "t" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(app.store.draft_count().await, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Non-positive caller ids never reach the store.
    #[test]
    fn prop_non_positive_caller_is_unauthorized(user in i64::MIN..=0) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let app = TestApp::new();
            let (status, _) = app
                .post("/articles/edit", Some(user), json!({ "title": "t" }))
                .await;
            prop_assert_eq!(status, StatusCode::UNAUTHORIZED);
            prop_assert_eq!(app.store.draft_count().await, 0);
            Ok(())
        })?;
    }
}
