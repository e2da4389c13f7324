//! Article Service
//!
//! Status transitions for articles. Saving keeps an article private to its
//! author, publishing copies it to the published store, withdrawing hides
//! it again without deleting anything.

use std::sync::Arc;

use quill_core::{
    Article, ArticleId, ArticleStatus, EntityKind, QuillResult, StorageError, UserId, ARTICLE_BIZ,
};
use quill_events::{Interaction, InteractionCounter};

use crate::repository::ArticleRepository;

/// Article operations exposed to the HTTP layer.
#[derive(Clone)]
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    interactions: Arc<dyn InteractionCounter>,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticleRepository>, interactions: Arc<dyn InteractionCounter>) -> Self {
        Self { repo, interactions }
    }

    /// Save a draft. Creates it when `article.id` is not set yet.
    pub async fn save(&self, mut article: Article) -> QuillResult<ArticleId> {
        article.status = ArticleStatus::Unpublished;
        if article.is_persisted() {
            self.repo.update(&article).await?;
            Ok(article.id)
        } else {
            self.repo.create(&article).await
        }
    }

    /// Publish an article, creating the draft on the way if needed.
    pub async fn publish(&self, mut article: Article) -> QuillResult<ArticleId> {
        article.status = ArticleStatus::Published;
        self.repo.sync(&article).await
    }

    /// Hide an article from readers. Only its author may do this.
    pub async fn withdraw(&self, id: ArticleId, author_id: UserId) -> QuillResult<()> {
        self.repo
            .sync_status(id, author_id, ArticleStatus::Private)
            .await
    }

    pub async fn get_by_author(
        &self,
        author_id: UserId,
        offset: i64,
        limit: i64,
    ) -> QuillResult<Vec<Article>> {
        self.repo.get_by_author(author_id, offset, limit).await
    }

    pub async fn get_by_id(&self, id: ArticleId) -> QuillResult<Article> {
        self.repo.get_by_id(id).await
    }

    pub async fn get_pub_by_id(&self, id: ArticleId, reader_id: UserId) -> QuillResult<Article> {
        self.repo.get_pub_by_id(id, reader_id).await
    }

    /// Counters for a published article.
    pub async fn interaction(&self, id: ArticleId) -> QuillResult<Interaction> {
        Ok(self.interactions.get(ARTICLE_BIZ, id).await?)
    }

    /// Published article and its counters, fetched concurrently.
    ///
    /// A withdrawn article reads as missing.
    pub async fn published_view(
        &self,
        id: ArticleId,
        reader_id: UserId,
    ) -> QuillResult<(Article, Interaction)> {
        let (article, interaction) =
            tokio::try_join!(self.get_pub_by_id(id, reader_id), self.interaction(id))?;
        if article.status != ArticleStatus::Published {
            return Err(StorageError::NotFound {
                entity: EntityKind::PublishedArticle,
                id,
            }
            .into());
        }
        Ok((article, interaction))
    }

    /// Like (`like == true`) or take back a like on an article.
    pub async fn like(&self, id: ArticleId, uid: UserId, like: bool) -> QuillResult<()> {
        if like {
            self.interactions.like(ARTICLE_BIZ, id, uid).await?;
        } else {
            self.interactions.cancel_like(ARTICLE_BIZ, id, uid).await?;
        }
        Ok(())
    }

    /// File an article into collection `cid` of `uid`.
    pub async fn collect(&self, id: ArticleId, cid: i64, uid: UserId) -> QuillResult<()> {
        self.interactions.collect(ARTICLE_BIZ, id, cid, uid).await?;
        Ok(())
    }
}
