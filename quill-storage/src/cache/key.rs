//! Namespaced cache keys.
//!
//! `CacheKey` has a private inner struct, so a key can only be built through
//! one of the namespace constructors below. Two namespaces can never collide.

use std::fmt;

use quill_core::{ArticleId, UserId};

/// The independent cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// An author's first page of article summaries.
    FirstPage,
    /// A single draft article, pre-fetched for the detail view.
    Article,
    /// A published article with its author name resolved.
    Published,
    /// A user profile.
    User,
}

impl CacheNamespace {
    pub const fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::FirstPage => "first_page",
            CacheNamespace::Article => "article",
            CacheNamespace::Published => "published",
            CacheNamespace::User => "user",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    namespace: CacheNamespace,
    encoded: String,
}

impl CacheKey {
    fn build(namespace: CacheNamespace, encoded: String) -> Self {
        Self {
            inner: KeyInner { namespace, encoded },
        }
    }

    pub fn first_page(author_id: UserId) -> Self {
        Self::build(
            CacheNamespace::FirstPage,
            format!("article:first_page:{author_id}"),
        )
    }

    pub fn article(id: ArticleId) -> Self {
        Self::build(CacheNamespace::Article, format!("article:{id}"))
    }

    pub fn published(id: ArticleId) -> Self {
        Self::build(CacheNamespace::Published, format!("article:pub:{id}"))
    }

    pub fn user(id: UserId) -> Self {
        Self::build(CacheNamespace::User, format!("user:info:{id}"))
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.inner.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.inner.encoded
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.encoded.as_bytes()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(CacheKey::first_page(7).as_str(), "article:first_page:7");
        assert_eq!(CacheKey::article(3).as_str(), "article:3");
        assert_eq!(CacheKey::published(3).as_str(), "article:pub:3");
        assert_eq!(CacheKey::user(3).as_str(), "user:info:3");
    }

    proptest! {
        #[test]
        fn prop_namespaces_never_collide(id in 0i64..i64::MAX) {
            let keys = [
                CacheKey::first_page(id),
                CacheKey::article(id),
                CacheKey::published(id),
                CacheKey::user(id),
            ];
            for (i, a) in keys.iter().enumerate() {
                for b in keys.iter().skip(i + 1) {
                    prop_assert_ne!(a.as_str(), b.as_str());
                }
            }
        }
    }
}
