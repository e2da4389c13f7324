//! Article domain model

use serde::{Deserialize, Serialize};

use crate::{ArticleId, ArticleStatus, TimestampMs, UserId};

/// Number of characters kept when an article body is reduced to its abstract.
pub const ABSTRACT_CHARS: usize = 100;

/// Author reference carried on an article.
///
/// `name` is only filled on published-detail reads, where the display name
/// is resolved through the user lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Author {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
        }
    }

    pub fn named(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// An article as seen by the repository and service layers.
///
/// The same shape is used for the draft and the published copy; which store
/// it came from is a property of the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    pub author: Author,
    pub status: ArticleStatus,
    pub ctime: TimestampMs,
    pub utime: TimestampMs,
}

impl Article {
    /// A not-yet-persisted draft.
    pub fn draft(author_id: UserId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            content: content.into(),
            author: Author::new(author_id),
            status: ArticleStatus::Unpublished,
            ctime: 0,
            utime: 0,
        }
    }

    pub fn author_id(&self) -> UserId {
        self.author.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// First [`ABSTRACT_CHARS`] characters of the content.
    pub fn abstract_text(&self) -> String {
        abstract_of(&self.content)
    }

    /// Copy of this article with the content reduced to its abstract.
    pub fn to_summary(&self) -> Article {
        Article {
            content: self.abstract_text(),
            ..self.clone()
        }
    }
}

/// Truncate `content` to at most [`ABSTRACT_CHARS`] characters.
///
/// Counts Unicode scalar values, so multi-byte text is never split
/// mid-character.
pub fn abstract_of(content: &str) -> String {
    match content.char_indices().nth(ABSTRACT_CHARS) {
        Some((byte_idx, _)) => content[..byte_idx].to_string(),
        None => content.to_string(),
    }
}
