//! Quote record and validation rules.
//!
//! # Responsibility
//! - Define `Quote` and its opaque identifier `QuoteId`.
//! - Enforce non-empty `text`/`category` on construction and deserialization.
//!
//! # Invariants
//! - `QuoteId` is never blank. Numeric ids from remote sources are normalized
//!   to their decimal string form so `1` and `"1"` are the same id.
//! - A deserialized `Quote` has already passed `Quote::validate()`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Opaque quote identifier.
///
/// Local quotes get a UUID v4 string; remote quotes keep the id the remote
/// source assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QuoteId(String);

impl QuoteId {
    /// Generates a fresh identifier that cannot collide with remote integer ids.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parses a caller-provided identifier, rejecting blank values.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, QuoteValidationError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(QuoteValidationError::EmptyId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QuoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for QuoteId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for QuoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(value) => QuoteId::parse(value).map_err(serde::de::Error::custom),
            RawId::Number(value) => Ok(QuoteId(value.to_string())),
        }
    }
}

/// Validation failures at the quote write boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteValidationError {
    EmptyId,
    EmptyText,
    EmptyCategory,
    /// Another quote already has the same text (case-insensitive).
    DuplicateText(String),
    /// Another quote already uses this id.
    DuplicateId(QuoteId),
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "quote id cannot be empty"),
            Self::EmptyText => write!(f, "quote text cannot be empty"),
            Self::EmptyCategory => write!(f, "quote category cannot be empty"),
            Self::DuplicateText(text) => write!(f, "quote already exists: `{text}`"),
            Self::DuplicateId(id) => write!(f, "quote id already in use: {id}"),
        }
    }
}

impl Error for QuoteValidationError {}

/// Canonical quote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuoteRecord")]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    /// Case-sensitive grouping key.
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Unvalidated wire shape used by `Deserialize for Quote`.
#[derive(Deserialize)]
struct QuoteRecord {
    id: QuoteId,
    text: String,
    category: String,
    #[serde(default)]
    author: Option<String>,
}

impl TryFrom<QuoteRecord> for Quote {
    type Error = QuoteValidationError;

    fn try_from(value: QuoteRecord) -> Result<Self, Self::Error> {
        let quote = Quote::with_id(value.id, value.text, value.category)?;
        Ok(match value.author {
            Some(author) => quote.with_author(author),
            None => quote,
        })
    }
}

impl Quote {
    /// Creates a quote with a freshly generated id.
    ///
    /// `text` and `category` are trimmed before validation.
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, QuoteValidationError> {
        Self::with_id(QuoteId::generate(), text, category)
    }

    /// Creates a quote with a caller-provided id.
    ///
    /// Used by import/sync paths where identity already exists externally.
    pub fn with_id(
        id: QuoteId,
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, QuoteValidationError> {
        let quote = Self {
            id,
            text: text.into().trim().to_string(),
            category: category.into().trim().to_string(),
            author: None,
        };
        quote.validate()?;
        Ok(quote)
    }

    /// Attaches an author; blank values clear it.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        let author = author.into().trim().to_string();
        self.author = if author.is_empty() { None } else { Some(author) };
        self
    }

    /// Checks field-level invariants.
    ///
    /// # Errors
    /// - `EmptyId`, `EmptyText` or `EmptyCategory` when the value is blank.
    pub fn validate(&self) -> Result<(), QuoteValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(QuoteValidationError::EmptyId);
        }
        if self.text.trim().is_empty() {
            return Err(QuoteValidationError::EmptyText);
        }
        if self.category.trim().is_empty() {
            return Err(QuoteValidationError::EmptyCategory);
        }
        Ok(())
    }

    /// Key used for duplicate-text detection.
    pub fn dedup_key(&self) -> String {
        text_dedup_key(&self.text)
    }

    /// Whether the fields reconciliation compares differ from `other`.
    pub fn content_differs(&self, other: &Quote) -> bool {
        self.text != other.text || self.category != other.category
    }
}

/// Normalizes quote text for duplicate detection: trimmed, inner whitespace
/// collapsed, lowercased.
pub fn text_dedup_key(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{text_dedup_key, Quote, QuoteId, QuoteValidationError};

    #[test]
    fn new_trims_fields_and_generates_id() {
        let quote = Quote::new("  Stay hungry  ", " life ").expect("valid quote");
        assert_eq!(quote.text, "Stay hungry");
        assert_eq!(quote.category, "life");
        assert!(!quote.id.as_str().is_empty());
    }

    #[test]
    fn new_rejects_blank_fields() {
        assert_eq!(
            Quote::new("   ", "life").unwrap_err(),
            QuoteValidationError::EmptyText
        );
        assert_eq!(
            Quote::new("text", "\t").unwrap_err(),
            QuoteValidationError::EmptyCategory
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(QuoteId::generate(), QuoteId::generate());
    }

    #[test]
    fn numeric_and_string_ids_are_equivalent() {
        let from_number: QuoteId = serde_json::from_str("7").unwrap();
        let from_text: QuoteId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(from_number, from_text);
        assert_eq!(from_number, QuoteId::from(7));
    }

    #[test]
    fn blank_string_id_is_rejected() {
        assert!(serde_json::from_str::<QuoteId>("\"  \"").is_err());
    }

    #[test]
    fn dedup_key_ignores_case_and_spacing() {
        assert_eq!(text_dedup_key("  Be   Kind "), text_dedup_key("be kind"));
    }

    #[test]
    fn deserialized_fields_are_trimmed_like_constructed_ones() {
        let quote: Quote = serde_json::from_str(
            r#"{"id": 3, "text": "  a  ", "category": " c ", "author": " Ann "}"#,
        )
        .unwrap();
        let expected = Quote::with_id(QuoteId::from(3), "a", "c")
            .unwrap()
            .with_author("Ann");
        assert_eq!(quote, expected);

        let blank = serde_json::from_str::<Quote>(r#"{"id": 3, "text": " ", "category": "c"}"#);
        assert!(blank.is_err());
    }

    #[test]
    fn blank_author_is_dropped() {
        let quote = Quote::new("text", "c").unwrap().with_author("  ");
        assert_eq!(quote.author, None);
    }
}
