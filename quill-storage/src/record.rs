//! Row-level records as stored in the article tables.

use quill_core::{Article, ArticleId, ArticleStatus, Author, TimestampMs, UserId};
use serde::{Deserialize, Serialize};

/// One row of either `articles` (drafts) or `published_articles`.
///
/// Both tables share this shape and are keyed by the same id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub status: i16,
    pub ctime: TimestampMs,
    pub utime: TimestampMs,
}

impl ArticleRecord {
    pub fn status(&self) -> ArticleStatus {
        ArticleStatus::from_i16(self.status)
    }

    /// Convert to the domain form. The author name is left empty.
    pub fn into_article(self) -> Article {
        Article {
            id: self.id,
            title: self.title,
            content: self.content,
            author: Author::new(self.author_id),
            status: ArticleStatus::from_i16(self.status),
            ctime: self.ctime,
            utime: self.utime,
        }
    }
}

impl From<&Article> for ArticleRecord {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            content: article.content.clone(),
            author_id: article.author.id,
            status: article.status.as_i16(),
            ctime: article.ctime,
            utime: article.utime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_maps_to_article() {
        let record = ArticleRecord {
            id: 5,
            title: "t".into(),
            content: "c".into(),
            author_id: 9,
            status: ArticleStatus::Private.as_i16(),
            ctime: 1,
            utime: 2,
        };
        let article = record.clone().into_article();
        assert_eq!(article.author, Author::new(9));
        assert_eq!(article.status, ArticleStatus::Private);
        assert_eq!(ArticleRecord::from(&article), record);
    }
}
