//! Enum types for Quill entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ARTICLE STATUS
// ============================================================================

/// Lifecycle status of an article.
///
/// The numeric codes are the persisted representation and are stable.
/// `Unknown` is never written; it is what an unrecognized code decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum ArticleStatus {
    #[default]
    Unknown,
    Unpublished,
    Published,
    Private,
}

impl ArticleStatus {
    pub const fn as_u8(self) -> u8 {
        match self {
            ArticleStatus::Unknown => 0,
            ArticleStatus::Unpublished => 1,
            ArticleStatus::Published => 2,
            ArticleStatus::Private => 3,
        }
    }

    /// Column value for `SMALLINT` status columns.
    pub const fn as_i16(self) -> i16 {
        self.as_u8() as i16
    }

    pub fn from_i16(code: i16) -> Self {
        u8::try_from(code).map(Self::from).unwrap_or(ArticleStatus::Unknown)
    }

    pub const fn as_db_str(self) -> &'static str {
        match self {
            ArticleStatus::Unknown => "unknown",
            ArticleStatus::Unpublished => "unpublished",
            ArticleStatus::Published => "published",
            ArticleStatus::Private => "private",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, ArticleStatusParseError> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(ArticleStatus::Unknown),
            "unpublished" => Ok(ArticleStatus::Unpublished),
            "published" => Ok(ArticleStatus::Published),
            "private" => Ok(ArticleStatus::Private),
            _ => Err(ArticleStatusParseError(s.to_string())),
        }
    }

    /// Whether this status may be written to a store.
    pub const fn is_persistable(self) -> bool {
        !matches!(self, ArticleStatus::Unknown)
    }
}

impl From<u8> for ArticleStatus {
    fn from(code: u8) -> Self {
        match code {
            1 => ArticleStatus::Unpublished,
            2 => ArticleStatus::Published,
            3 => ArticleStatus::Private,
            _ => ArticleStatus::Unknown,
        }
    }
}

impl From<ArticleStatus> for u8 {
    fn from(status: ArticleStatus) -> Self {
        status.as_u8()
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = ArticleStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid article status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleStatusParseError(pub String);

impl fmt::Display for ArticleStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid article status: {}", self.0)
    }
}

impl std::error::Error for ArticleStatusParseError {}

// ============================================================================
// ENTITY KIND
// ============================================================================

/// Entity discriminator used in error messages and cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Article,
    PublishedArticle,
    User,
    Interaction,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EntityKind::Article => "Article",
            EntityKind::PublishedArticle => "PublishedArticle",
            EntityKind::User => "User",
            EntityKind::Interaction => "Interaction",
        };
        f.write_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(ArticleStatus::Unknown.as_u8(), 0);
        assert_eq!(ArticleStatus::Unpublished.as_u8(), 1);
        assert_eq!(ArticleStatus::Published.as_u8(), 2);
        assert_eq!(ArticleStatus::Private.as_u8(), 3);
    }

    #[test]
    fn test_status_serializes_as_number() {
        let json = serde_json::to_string(&ArticleStatus::Published).unwrap();
        assert_eq!(json, "2");
        let parsed: ArticleStatus = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, ArticleStatus::Private);
    }

    #[test]
    fn test_unknown_code_decodes_to_unknown() {
        let parsed: ArticleStatus = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, ArticleStatus::Unknown);
        assert_eq!(ArticleStatus::from_i16(-1), ArticleStatus::Unknown);
        assert!(!ArticleStatus::Unknown.is_persistable());
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            "PUBLISHED".parse::<ArticleStatus>().unwrap(),
            ArticleStatus::Published
        );
        let err = "draft".parse::<ArticleStatus>().unwrap_err();
        assert!(err.to_string().contains("draft"));
    }

    proptest! {
        #[test]
        fn prop_i16_code_roundtrip(code in 1i16..=3) {
            prop_assert_eq!(ArticleStatus::from_i16(code).as_i16(), code);
        }

        #[test]
        fn prop_display_parses_back(code in 0u8..=3) {
            let status = ArticleStatus::from(code);
            prop_assert_eq!(status.to_string().parse::<ArticleStatus>().unwrap(), status);
        }
    }
}
