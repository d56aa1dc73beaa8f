//! Quote repository contracts and key-value implementation.
//!
//! # Responsibility
//! - Load/save the quote collection as one JSON array in durable storage.
//! - Load/save the selected category filter (durable) and the last viewed
//!   quote id (session).
//!
//! # Invariants
//! - A loaded collection has unique ids and passes `Quote::validate()`.
//! - Legacy records persisted without an `id` receive a fresh one on load.

use crate::model::category::CategoryFilter;
use crate::model::quote::{Quote, QuoteId};
use crate::storage::{KeyValueStore, KvError};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Durable key holding the JSON-encoded quote collection.
pub const QUOTES_KEY: &str = "quotes";
/// Durable key holding the last selected category filter.
pub const SELECTED_CATEGORY_KEY: &str = "selectedCategory";
/// Session key holding the id of the last displayed quote.
pub const LAST_VIEWED_KEY: &str = "lastViewedQuote";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for quote persistence.
#[derive(Debug)]
pub enum RepoError {
    Kv(KvError),
    Encode(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kv(err) => write!(f, "storage failure: {err}"),
            Self::Encode(err) => write!(f, "failed to encode quotes: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Kv(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<KvError> for RepoError {
    fn from(value: KvError) -> Self {
        Self::Kv(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Outcome of reading the persisted quote collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedQuotes {
    /// Nothing persisted yet (or storage could not be read).
    Absent,
    /// Persisted value exists but is not a valid quote collection.
    Malformed(String),
    Loaded(Vec<Quote>),
}

impl LoadedQuotes {
    /// Collapses absent/malformed into an empty collection.
    pub fn into_quotes(self) -> Vec<Quote> {
        match self {
            Self::Loaded(quotes) => quotes,
            Self::Absent | Self::Malformed(_) => Vec::new(),
        }
    }
}

/// Repository interface used by the quote store.
pub trait QuoteRepository: Send + Sync {
    /// Reads the persisted collection. Never fails.
    fn load_quotes(&self) -> LoadedQuotes;
    /// Replaces the persisted collection.
    fn save_quotes(&self, quotes: &[Quote]) -> RepoResult<()>;
    fn load_selected_category(&self) -> RepoResult<Option<CategoryFilter>>;
    fn save_selected_category(&self, filter: &CategoryFilter) -> RepoResult<()>;
    fn load_last_viewed(&self) -> RepoResult<Option<QuoteId>>;
    fn save_last_viewed(&self, id: &QuoteId) -> RepoResult<()>;
}

/// Quote repository over a durable and a session key-value store.
pub struct KvQuoteRepository<D: KeyValueStore, S: KeyValueStore> {
    durable: D,
    session: S,
}

impl<D: KeyValueStore, S: KeyValueStore> KvQuoteRepository<D, S> {
    pub fn new(durable: D, session: S) -> Self {
        Self { durable, session }
    }
}

impl<D: KeyValueStore, S: KeyValueStore> QuoteRepository for KvQuoteRepository<D, S> {
    fn load_quotes(&self) -> LoadedQuotes {
        let raw = match self.durable.get(QUOTES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadedQuotes::Absent,
            Err(err) => {
                warn!("event=quotes_load module=repo status=error error={err}");
                return LoadedQuotes::Absent;
            }
        };

        match decode_quotes(&raw) {
            Ok(quotes) => {
                debug!(
                    "event=quotes_load module=repo status=ok count={}",
                    quotes.len()
                );
                LoadedQuotes::Loaded(quotes)
            }
            Err(reason) => {
                warn!("event=quotes_load module=repo status=malformed reason={reason}");
                LoadedQuotes::Malformed(reason)
            }
        }
    }

    fn save_quotes(&self, quotes: &[Quote]) -> RepoResult<()> {
        let encoded = serde_json::to_string(quotes)?;
        self.durable.set(QUOTES_KEY, &encoded)?;
        debug!(
            "event=quotes_save module=repo status=ok count={}",
            quotes.len()
        );
        Ok(())
    }

    fn load_selected_category(&self) -> RepoResult<Option<CategoryFilter>> {
        let raw = self.durable.get(SELECTED_CATEGORY_KEY)?;
        Ok(raw.map(|value| CategoryFilter::parse(&value)))
    }

    fn save_selected_category(&self, filter: &CategoryFilter) -> RepoResult<()> {
        self.durable.set(SELECTED_CATEGORY_KEY, filter.as_str())?;
        Ok(())
    }

    fn load_last_viewed(&self) -> RepoResult<Option<QuoteId>> {
        let raw = self.session.get(LAST_VIEWED_KEY)?;
        Ok(raw.and_then(|value| QuoteId::parse(value).ok()))
    }

    fn save_last_viewed(&self, id: &QuoteId) -> RepoResult<()> {
        self.session.set(LAST_VIEWED_KEY, id.as_str())?;
        Ok(())
    }
}

/// Persisted record shape; `id` is optional for data written before ids.
#[derive(Deserialize)]
struct StoredQuote {
    #[serde(default)]
    id: Option<QuoteId>,
    text: String,
    category: String,
    #[serde(default)]
    author: Option<String>,
}

fn decode_quotes(raw: &str) -> Result<Vec<Quote>, String> {
    let records: Vec<StoredQuote> =
        serde_json::from_str(raw).map_err(|err| format!("invalid quote array: {err}"))?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut quotes = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let id = record.id.unwrap_or_else(QuoteId::generate);
        let mut quote = Quote::with_id(id, record.text, record.category)
            .map_err(|err| format!("record {index}: {err}"))?;
        if let Some(author) = record.author {
            quote = quote.with_author(author);
        }
        if !seen.insert(quote.id.clone()) {
            return Err(format!("record {index}: duplicate id {}", quote.id));
        }
        quotes.push(quote);
    }
    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use super::{decode_quotes, KvQuoteRepository, LoadedQuotes, QuoteRepository, QUOTES_KEY};
    use crate::storage::{KeyValueStore, MemoryKeyValueStore};

    #[test]
    fn decode_assigns_ids_to_legacy_records() {
        let quotes = decode_quotes(r#"[{"text":"a","category":"c"}]"#).unwrap();
        assert_eq!(quotes.len(), 1);
        assert!(!quotes[0].id.as_str().is_empty());
    }

    #[test]
    fn decode_rejects_duplicate_ids() {
        let err = decode_quotes(
            r#"[{"id":1,"text":"a","category":"c"},{"id":"1","text":"b","category":"c"}]"#,
        )
        .unwrap_err();
        assert!(err.contains("duplicate id"));
    }

    #[test]
    fn load_reports_malformed_value_without_failing() {
        let durable = MemoryKeyValueStore::new();
        durable.set(QUOTES_KEY, "{not json").unwrap();
        let repo = KvQuoteRepository::new(durable, MemoryKeyValueStore::new());

        assert!(matches!(repo.load_quotes(), LoadedQuotes::Malformed(_)));
    }

    #[test]
    fn load_rejects_record_with_blank_text() {
        let durable = MemoryKeyValueStore::new();
        durable
            .set(QUOTES_KEY, r#"[{"id":"x","text":"  ","category":"c"}]"#)
            .unwrap();
        let repo = KvQuoteRepository::new(durable, MemoryKeyValueStore::new());

        assert!(matches!(repo.load_quotes(), LoadedQuotes::Malformed(_)));
    }
}
