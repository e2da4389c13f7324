//! Request and response types for the HTTP API.

use chrono::DateTime;
use quill_core::{abstract_of, Article, ArticleId, TimestampMs, UserId};
use quill_events::Interaction;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;
use crate::error::{ApiError, ApiResult};

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// REQUESTS
// ============================================================================

/// Body of `POST /articles/edit` and `POST /articles/publish`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleRequest {
    #[serde(default)]
    pub id: ArticleId,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl ArticleRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.id < 0 {
            return Err(ApiError::invalid_range("id", 0, ArticleId::MAX));
        }
        if self.title.trim().is_empty() {
            return Err(ApiError::missing_field("title"));
        }
        Ok(())
    }

    pub fn into_article(self, author_id: UserId) -> Article {
        let mut article = Article::draft(author_id, self.title, self.content);
        article.id = self.id;
        article
    }
}

/// Body of `POST /articles/withdraw`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub id: ArticleId,
}

/// Body of `POST /articles/pub/like`. `like: false` takes the like back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LikeRequest {
    pub id: ArticleId,
    pub like: bool,
}

/// Body of `POST /articles/pub/collect`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollectRequest {
    pub id: ArticleId,
    /// Target collection of the caller.
    #[serde(default)]
    pub cid: i64,
}

/// Ids in interaction requests must name a stored article.
pub fn validate_article_id(id: ArticleId) -> ApiResult<()> {
    if id <= 0 {
        return Err(ApiError::invalid_range("id", 1, ArticleId::MAX));
    }
    Ok(())
}

/// Body of `POST /articles/list`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub offset: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Reject negative offsets and empty pages; cap the page size.
    pub fn normalized(self) -> ApiResult<Self> {
        if self.offset < 0 {
            return Err(ApiError::invalid_range("offset", 0, i64::MAX));
        }
        if self.limit <= 0 {
            return Err(ApiError::invalid_range("limit", 1, MAX_PAGE_SIZE));
        }
        Ok(Self {
            offset: self.offset,
            limit: self.limit.min(MAX_PAGE_SIZE),
        })
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

/// `{"id": N}` returned by the write endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: ArticleId,
}

/// Article as rendered to clients.
///
/// Lists carry `abstract` instead of `content`; the published view adds the
/// author name and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub id: ArticleId,
    pub title: String,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub author_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub status: u8,
    pub ctime: String,
    pub utime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_cnt: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_cnt: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collect_cnt: Option<i64>,
}

impl ArticleView {
    fn base(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            summary: None,
            content: None,
            author_id: article.author.id,
            author_name: None,
            status: article.status.as_u8(),
            ctime: format_millis(article.ctime),
            utime: format_millis(article.utime),
            read_cnt: None,
            like_cnt: None,
            collect_cnt: None,
        }
    }

    /// List entry: abstract only.
    pub fn summary(article: &Article) -> Self {
        Self {
            summary: Some(abstract_of(&article.content)),
            ..Self::base(article)
        }
    }

    /// Author's own view of a draft.
    pub fn detail(article: Article) -> Self {
        Self {
            content: Some(article.content.clone()),
            ..Self::base(&article)
        }
    }

    /// Reader's view of a published article.
    pub fn published(article: Article, interaction: &Interaction) -> Self {
        Self {
            content: Some(article.content.clone()),
            author_name: Some(article.author.name.clone()),
            read_cnt: Some(interaction.read_cnt),
            like_cnt: Some(interaction.like_cnt),
            collect_cnt: Some(interaction.collect_cnt),
            ..Self::base(&article)
        }
    }
}

/// Render epoch milliseconds as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_millis(millis: TimestampMs) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format(DATE_TIME_FORMAT).to_string())
        .unwrap_or_default()
}
