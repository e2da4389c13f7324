//! Events flowing through the message queue

use serde::{Deserialize, Serialize};

use crate::{ArticleId, UserId};

/// Topic carrying [`ReadEvent`]s.
pub const READ_EVENT_TOPIC: &str = "read_article";

/// Business domain name used when counting interactions on articles.
pub const ARTICLE_BIZ: &str = "article";

/// "Article N was read by user U".
///
/// Emitted once per successful published-detail fetch and consumed
/// at-least-once, so consumers must tolerate duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadEvent {
    pub article_id: ArticleId,
    pub reader_id: UserId,
}

impl ReadEvent {
    pub fn new(article_id: ArticleId, reader_id: UserId) -> Self {
        Self {
            article_id,
            reader_id,
        }
    }

    /// Partition key; keeps events for one article ordered.
    pub fn key(&self) -> String {
        self.article_id.to_string()
    }
}
