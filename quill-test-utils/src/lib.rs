//! Quill Test Utilities
//!
//! Shared test infrastructure for the Quill workspace:
//! - Proptest generators for articles and statuses
//! - Fixtures for common scenarios
//! - Assertions comparing the draft and published copies of an article

pub use quill_core::{
    abstract_of, Article, ArticleId, ArticleStatus, Author, ManualClock, ReadEvent, UserId,
    ABSTRACT_CHARS,
};
pub use quill_storage::memory::{InMemoryArticleStore, InMemoryUserStore};
pub use quill_storage::{ArticleRecord, UserProfile};

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Quill domain types.

    use super::*;
    use proptest::prelude::*;

    /// Any status, including `Unknown`.
    pub fn arb_status() -> impl Strategy<Value = ArticleStatus> {
        prop_oneof![
            Just(ArticleStatus::Unknown),
            Just(ArticleStatus::Unpublished),
            Just(ArticleStatus::Published),
            Just(ArticleStatus::Private),
        ]
    }

    /// Statuses that may be written to a store.
    pub fn arb_persistable_status() -> impl Strategy<Value = ArticleStatus> {
        prop_oneof![
            Just(ArticleStatus::Unpublished),
            Just(ArticleStatus::Published),
            Just(ArticleStatus::Private),
        ]
    }

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        1i64..10_000
    }

    pub fn arb_title() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ]{1,64}"
    }

    /// Article bodies around the abstract boundary, mixing ASCII and
    /// multi-byte characters.
    pub fn arb_content() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![Just('a'), Just('z'), Just(' '), Just('é'), Just('文'), Just('🦀')],
            0..(ABSTRACT_CHARS * 3),
        )
        .prop_map(|chars| chars.into_iter().collect())
    }

    /// A not-yet-persisted draft for `author_id`.
    pub fn arb_draft(author_id: UserId) -> impl Strategy<Value = Article> {
        (arb_title(), arb_content())
            .prop_map(move |(title, content)| Article::draft(author_id, title, content))
    }

    pub fn arb_read_event() -> impl Strategy<Value = ReadEvent> {
        (1i64..1_000, arb_user_id()).prop_map(|(article_id, reader)| ReadEvent::new(article_id, reader))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common test scenarios.

    use super::*;
    use std::sync::Arc;

    /// Author id used throughout the repository scenarios.
    pub const AUTHOR_ID: UserId = 7;

    /// A user who owns nothing.
    pub const STRANGER_ID: UserId = 999;

    /// Display name registered for [`AUTHOR_ID`] by [`user_store`].
    pub const AUTHOR_NAME: &str = "seven";

    /// A fresh draft by [`AUTHOR_ID`] with title "t" and content "c".
    pub fn simple_draft() -> Article {
        Article::draft(AUTHOR_ID, "t", "c")
    }

    /// A draft whose body is well past the abstract length.
    pub fn long_draft(author_id: UserId) -> Article {
        Article::draft(author_id, "long", "x".repeat(ABSTRACT_CHARS * 5))
    }

    /// A draft whose body is larger than `bytes`.
    pub fn oversized_draft(author_id: UserId, bytes: usize) -> Article {
        Article::draft(author_id, "huge", "h".repeat(bytes + 1))
    }

    /// A user directory knowing [`AUTHOR_ID`].
    pub fn user_store() -> InMemoryUserStore {
        let users = InMemoryUserStore::new();
        users
            .insert(UserProfile::new(AUTHOR_ID, AUTHOR_NAME))
            .expect("fresh user store is writable");
        users
    }

    /// A manual clock starting at a fixed, non-zero instant.
    pub fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(1_700_000_000_000))
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over store contents.

    use super::*;

    /// Both stores hold the same title, content and status for `id`.
    pub async fn assert_stores_agree(store: &InMemoryArticleStore, id: ArticleId) {
        let draft = store
            .peek_draft(id)
            .await
            .unwrap_or_else(|| panic!("draft {id} missing"));
        let published = store
            .peek_published(id)
            .await
            .unwrap_or_else(|| panic!("published {id} missing"));
        assert_eq!(draft.title, published.title, "title differs for {id}");
        assert_eq!(draft.content, published.content, "content differs for {id}");
        assert_eq!(draft.status, published.status, "status differs for {id}");
        assert_eq!(draft.author_id, published.author_id, "author differs for {id}");
    }

    /// `id` has the given status in both stores.
    pub async fn assert_status_everywhere(
        store: &InMemoryArticleStore,
        id: ArticleId,
        status: ArticleStatus,
    ) {
        let draft = store.peek_draft(id).await.map(|r| r.status());
        let published = store.peek_published(id).await.map(|r| r.status());
        assert_eq!(draft, Some(status), "draft status for {id}");
        assert_eq!(published, Some(status), "published status for {id}");
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_drafts_start_unpublished(draft in arb_draft(3)) {
            prop_assert_eq!(draft.status, ArticleStatus::Unpublished);
            prop_assert_eq!(draft.id, 0);
            prop_assert_eq!(draft.author_id(), 3);
        }

        #[test]
        fn prop_persistable_statuses_are_persistable(status in arb_persistable_status()) {
            prop_assert!(status.is_persistable());
        }
    }
}
