//! Import candidate classification.
//!
//! # Responsibility
//! - Turn loosely shaped JSON records into accepted quotes or typed rejections.
//! - Parse import documents that hold either one record or an array.
//!
//! # Invariants
//! - One bad record never fails the batch; it is classified as rejected.
//! - Accepted records without an id get a fresh one.

use crate::model::quote::{Quote, QuoteId, QuoteValidationError};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Reason a candidate record was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotAnObject,
    MissingText,
    MissingCategory,
    InvalidId,
    /// Id already used locally or earlier in the same batch.
    DuplicateId(QuoteId),
    /// Text already present (case-insensitive).
    DuplicateText,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record is not an object"),
            Self::MissingText => write!(f, "missing non-empty string `text`"),
            Self::MissingCategory => write!(f, "missing non-empty string `category`"),
            Self::InvalidId => write!(f, "`id` must be a non-empty string or a number"),
            Self::DuplicateId(id) => write!(f, "id already in use: {id}"),
            Self::DuplicateText => write!(f, "quote text already exists"),
        }
    }
}

impl From<QuoteValidationError> for RejectReason {
    fn from(value: QuoteValidationError) -> Self {
        match value {
            QuoteValidationError::EmptyId => Self::InvalidId,
            QuoteValidationError::EmptyText => Self::MissingText,
            QuoteValidationError::EmptyCategory => Self::MissingCategory,
            QuoteValidationError::DuplicateText(_) => Self::DuplicateText,
            QuoteValidationError::DuplicateId(id) => Self::DuplicateId(id),
        }
    }
}

/// Classification of one import candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Accepted(Quote),
    Rejected(RejectReason),
}

/// One skipped record in an import batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRejection {
    /// Position of the record in the submitted batch.
    pub index: usize,
    pub reason: RejectReason,
}

/// Result of an import batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub accepted: Vec<Quote>,
    pub rejected: Vec<ImportRejection>,
}

/// Classifies one candidate record in isolation.
///
/// Store-level checks (duplicate ids/text against existing quotes) happen in
/// `QuoteStore::import_many`.
pub fn classify_candidate(value: &Value) -> Candidate {
    let Some(record) = value.as_object() else {
        return Candidate::Rejected(RejectReason::NotAnObject);
    };

    let Some(text) = non_empty_str(record.get("text")) else {
        return Candidate::Rejected(RejectReason::MissingText);
    };
    let Some(category) = non_empty_str(record.get("category")) else {
        return Candidate::Rejected(RejectReason::MissingCategory);
    };

    let id = match record.get("id") {
        None | Some(Value::Null) => QuoteId::generate(),
        Some(raw) => match serde_json::from_value::<QuoteId>(raw.clone()) {
            Ok(id) => id,
            Err(_) => return Candidate::Rejected(RejectReason::InvalidId),
        },
    };

    match Quote::with_id(id, text, category) {
        Ok(quote) => match non_empty_str(record.get("author")) {
            Some(author) => Candidate::Accepted(quote.with_author(author)),
            None => Candidate::Accepted(quote),
        },
        Err(err) => Candidate::Rejected(err.into()),
    }
}

/// Splits an import document into candidate records.
///
/// Accepts a JSON array or a single JSON object.
///
/// # Errors
/// - Returns a message when the document is not JSON or its top-level value is
///   neither an array nor an object.
pub fn parse_import_document(document: &str) -> Result<Vec<Value>, String> {
    let value: Value =
        serde_json::from_str(document).map_err(|err| format!("invalid JSON: {err}"))?;
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(_) => Ok(vec![value]),
        _ => Err("expected a JSON array or object".to_string()),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}
