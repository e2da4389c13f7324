//! Article REST API Routes
//!
//! Author endpoints (`edit`, `publish`, `withdraw`, `list`, `detail`) act on
//! the caller's own drafts. `pub/:id` is the reader view; `pub/like` and
//! `pub/collect` record reader interactions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use quill_core::ArticleId;

use crate::error::{ApiError, ApiResult};
use crate::extractors::Caller;
use crate::services::ArticleService;
use crate::state::AppState;
use crate::types::{
    validate_article_id, ArticleRequest, ArticleView, CollectRequest, IdResponse, LikeRequest,
    PageRequest, WithdrawRequest,
};

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /articles/edit - Save a draft
pub async fn edit(
    State(service): State<ArticleService>,
    Caller(user_id): Caller,
    Json(req): Json<ArticleRequest>,
) -> ApiResult<Json<IdResponse>> {
    req.validate()?;
    let id = service.save(req.into_article(user_id)).await?;
    Ok(Json(IdResponse { id }))
}

/// POST /articles/publish - Publish an article
pub async fn publish(
    State(service): State<ArticleService>,
    Caller(user_id): Caller,
    Json(req): Json<ArticleRequest>,
) -> ApiResult<Json<IdResponse>> {
    req.validate()?;
    let id = service.publish(req.into_article(user_id)).await?;
    tracing::info!(article_id = id, author_id = user_id, "Article published");
    Ok(Json(IdResponse { id }))
}

/// POST /articles/withdraw - Hide a published article
pub async fn withdraw(
    State(service): State<ArticleService>,
    Caller(user_id): Caller,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<StatusCode> {
    service.withdraw(req.id, user_id).await?;
    tracing::info!(article_id = req.id, author_id = user_id, "Article withdrawn");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /articles/list - The caller's articles, newest first
pub async fn list(
    State(service): State<ArticleService>,
    Caller(user_id): Caller,
    Json(page): Json<PageRequest>,
) -> ApiResult<Json<Vec<ArticleView>>> {
    let page = page.normalized()?;
    let articles = service
        .get_by_author(user_id, page.offset, page.limit)
        .await?;
    Ok(Json(articles.iter().map(ArticleView::summary).collect()))
}

/// GET /articles/detail/:id - Full draft, for its author only
pub async fn detail(
    State(service): State<ArticleService>,
    Caller(user_id): Caller,
    Path(id): Path<ArticleId>,
) -> ApiResult<Json<ArticleView>> {
    let article = service.get_by_id(id).await?;
    if article.author_id() != user_id {
        tracing::warn!(article_id = id, user_id, "Draft requested by someone other than its author");
        return Err(ApiError::article_not_found(id));
    }
    Ok(Json(ArticleView::detail(article)))
}

/// GET /articles/pub/:id - Published article with author name and counters
pub async fn pub_detail(
    State(service): State<ArticleService>,
    Caller(user_id): Caller,
    Path(id): Path<ArticleId>,
) -> ApiResult<Json<ArticleView>> {
    let (article, interaction) = service.published_view(id, user_id).await?;
    Ok(Json(ArticleView::published(article, &interaction)))
}

/// POST /articles/pub/like - Like or unlike an article
pub async fn like(
    State(service): State<ArticleService>,
    Caller(user_id): Caller,
    Json(req): Json<LikeRequest>,
) -> ApiResult<StatusCode> {
    validate_article_id(req.id)?;
    service.like(req.id, user_id, req.like).await?;
    tracing::debug!(article_id = req.id, user_id, like = req.like, "Like recorded");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /articles/pub/collect - File an article into a collection
pub async fn collect(
    State(service): State<ArticleService>,
    Caller(user_id): Caller,
    Json(req): Json<CollectRequest>,
) -> ApiResult<StatusCode> {
    validate_article_id(req.id)?;
    service.collect(req.id, req.cid, user_id).await?;
    tracing::debug!(article_id = req.id, user_id, cid = req.cid, "Collect recorded");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the article routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/edit", post(edit))
        .route("/publish", post(publish))
        .route("/withdraw", post(withdraw))
        .route("/list", post(list))
        .route("/detail/:id", get(detail))
        .route("/pub/:id", get(pub_detail))
        .route("/pub/like", post(like))
        .route("/pub/collect", post(collect))
}
