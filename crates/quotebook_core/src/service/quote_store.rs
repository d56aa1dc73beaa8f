//! Quote store: the authoritative in-memory collection and its mirror.
//!
//! # Responsibility
//! - Serve read paths (filter, categories, random pick) from memory.
//! - Apply writes (add, remove, import, sync merge) and persist them.
//!
//! # Invariants
//! - No two held quotes share an id.
//! - The collection lock is never held across an `.await`; persistence runs
//!   under the lock so mirror writes happen in mutation order.
//! - When persistence fails the in-memory mutation stays applied and the
//!   caller receives `StoreError::Storage`.
//! - After a failed write the mirror is marked stale; the next collection
//!   write attempt re-saves it even when nothing else changed.

use crate::model::category::{CategoryFilter, ALL_CATEGORIES};
use crate::model::quote::{text_dedup_key, Quote, QuoteId, QuoteValidationError};
use crate::repo::quote_repo::{LoadedQuotes, QuoteRepository, RepoError, RepoResult};
use crate::service::import::{
    classify_candidate, parse_import_document, Candidate, ImportRejection, ImportReport,
    RejectReason,
};
use crate::sync::reconcile::reconcile;
use log::{info, warn};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Quote store operation error.
#[derive(Debug)]
pub enum StoreError {
    /// Input rejected; nothing changed.
    Validation(QuoteValidationError),
    /// Mirror write failed after the in-memory change was applied.
    Storage(RepoError),
    /// Import document is not JSON or has the wrong top-level shape.
    MalformedData(String),
    /// Export encoding failed.
    Export(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "changes kept in memory but not saved: {err}"),
            Self::MalformedData(message) => write!(f, "malformed quote data: {message}"),
            Self::Export(err) => write!(f, "failed to export quotes: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::MalformedData(_) => None,
            Self::Export(err) => Some(err),
        }
    }
}

impl From<QuoteValidationError> for StoreError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

/// No quote matches the current filter.
///
/// A display state ("no quote available"), not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyPoolError;

impl Display for EmptyPoolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "no quote available")
    }
}

impl Error for EmptyPoolError {}

/// Summary of a remote merge committed into the store.
#[derive(Debug)]
pub struct MergeCommit {
    pub conflicts: usize,
    pub added: usize,
    /// Set when the mirror could not be brought in line with the collection.
    pub persist_error: Option<RepoError>,
}

/// Uniformly picks one quote from `pool`.
///
/// # Errors
/// - `EmptyPoolError` when `pool` is empty.
pub fn pick_random(pool: &[Quote]) -> Result<&Quote, EmptyPoolError> {
    pool.choose(&mut rand::thread_rng()).ok_or(EmptyPoolError)
}

/// Built-in quotes used when nothing valid is persisted.
pub fn seed_quotes() -> Vec<Quote> {
    const SEEDS: &[(&str, &str, &str, &str)] = &[
        (
            "seed-1",
            "The best way to predict the future is to invent it.",
            "inspiration",
            "Alan Kay",
        ),
        (
            "seed-2",
            "Life is what happens when you're busy making other plans.",
            "life",
            "John Lennon",
        ),
        (
            "seed-3",
            "I am so clever that sometimes I don't understand a single word of what I am saying.",
            "humor",
            "Oscar Wilde",
        ),
        (
            "seed-4",
            "Do what you can, with what you have, where you are.",
            "inspiration",
            "Theodore Roosevelt",
        ),
        (
            "seed-5",
            "In the middle of difficulty lies opportunity.",
            "life",
            "Albert Einstein",
        ),
    ];

    SEEDS
        .iter()
        .filter_map(|(id, text, category, author)| {
            let id = QuoteId::parse(id).ok()?;
            Quote::with_id(id, *text, *category)
                .ok()
                .map(|quote| quote.with_author(*author))
        })
        .collect()
}

/// Process-wide quote store, shared by handle (`Arc<QuoteStore<_>>`).
pub struct QuoteStore<R: QuoteRepository> {
    repo: R,
    quotes: Mutex<Vec<Quote>>,
    mirror_stale: AtomicBool,
}

impl<R: QuoteRepository> QuoteStore<R> {
    /// Opens the store from the persisted mirror.
    ///
    /// Absent or malformed data falls back to `seed_quotes()`. A persisted
    /// empty collection stays empty.
    pub fn open(repo: R) -> Self {
        let quotes = match repo.load_quotes() {
            LoadedQuotes::Loaded(quotes) => quotes,
            LoadedQuotes::Absent => {
                info!("event=store_open module=service status=seeded reason=absent");
                seed_quotes()
            }
            LoadedQuotes::Malformed(_) => {
                warn!("event=store_open module=service status=seeded reason=malformed");
                seed_quotes()
            }
        };
        info!(
            "event=store_open module=service status=ok count={}",
            quotes.len()
        );
        Self {
            repo,
            quotes: Mutex::new(quotes),
            mirror_stale: AtomicBool::new(false),
        }
    }

    /// Reads the persisted mirror without touching the in-memory collection.
    ///
    /// Absent or malformed data yields an empty collection.
    pub fn load(&self) -> Vec<Quote> {
        self.repo.load_quotes().into_quotes()
    }

    /// Writes `quotes` to the persisted mirror.
    pub fn save(&self, quotes: &[Quote]) -> Result<(), StoreError> {
        self.repo.save_quotes(quotes)?;
        Ok(())
    }

    /// Adds a quote with a fresh id.
    ///
    /// # Errors
    /// - `Validation` for blank text/category or a case-insensitive duplicate
    ///   of an existing text.
    /// - `Storage` when the mirror write fails (the quote is still held).
    pub fn add(&self, text: &str, category: &str) -> Result<Quote, StoreError> {
        let quote = Quote::new(text, category)?;
        let key = quote.dedup_key();

        let mut quotes = self.lock_quotes();
        if quotes.iter().any(|existing| existing.dedup_key() == key) {
            return Err(QuoteValidationError::DuplicateText(quote.text).into());
        }
        quotes.push(quote.clone());
        info!(
            "event=quote_add module=service status=ok count={}",
            quotes.len()
        );
        self.persist(&quotes)?;
        Ok(quote)
    }

    /// Removes the quote with `id`; returns whether one was removed.
    ///
    /// An absent id changes nothing and performs no mirror write unless the
    /// mirror is stale.
    pub fn remove_by_id(&self, id: &QuoteId) -> Result<bool, StoreError> {
        let mut quotes = self.lock_quotes();
        let Some(position) = quotes.iter().position(|quote| quote.id == *id) else {
            self.repair_mirror(&quotes)?;
            return Ok(false);
        };
        quotes.remove(position);
        info!(
            "event=quote_remove module=service status=ok count={}",
            quotes.len()
        );
        self.persist(&quotes)?;
        Ok(true)
    }

    /// Imports candidate records, skipping invalid or duplicate ones.
    ///
    /// Persists once for the batch, and only when something was accepted or
    /// the mirror is stale.
    pub fn import_many(&self, records: &[Value]) -> Result<ImportReport, StoreError> {
        let mut quotes = self.lock_quotes();
        let mut ids: HashSet<QuoteId> = quotes.iter().map(|quote| quote.id.clone()).collect();
        let mut texts: HashSet<String> = quotes.iter().map(Quote::dedup_key).collect();
        let mut report = ImportReport::default();

        for (index, record) in records.iter().enumerate() {
            let verdict = match classify_candidate(record) {
                Candidate::Accepted(quote) if ids.contains(&quote.id) => {
                    Candidate::Rejected(RejectReason::DuplicateId(quote.id))
                }
                Candidate::Accepted(quote) if texts.contains(&quote.dedup_key()) => {
                    Candidate::Rejected(RejectReason::DuplicateText)
                }
                other => other,
            };

            match verdict {
                Candidate::Accepted(quote) => {
                    ids.insert(quote.id.clone());
                    texts.insert(quote.dedup_key());
                    report.accepted.push(quote);
                }
                Candidate::Rejected(reason) => {
                    report.rejected.push(ImportRejection { index, reason });
                }
            }
        }

        report.imported = report.accepted.len();
        info!(
            "event=quote_import module=service status=ok imported={} rejected={}",
            report.imported,
            report.rejected.len()
        );
        if report.imported > 0 {
            quotes.extend(report.accepted.iter().cloned());
            self.persist(&quotes)?;
        } else {
            self.repair_mirror(&quotes)?;
        }
        Ok(report)
    }

    /// Imports a JSON document holding one record or an array of records.
    ///
    /// # Errors
    /// - `MalformedData` when the document cannot be parsed; nothing changes.
    pub fn import_json(&self, document: &str) -> Result<ImportReport, StoreError> {
        let records = parse_import_document(document).map_err(|reason| {
            warn!("event=quote_import module=service status=malformed");
            StoreError::MalformedData(reason)
        })?;
        self.import_many(&records)
    }

    /// Exports the collection as a pretty-printed JSON array.
    pub fn export_json(&self) -> Result<String, StoreError> {
        let quotes = self.lock_quotes();
        serde_json::to_string_pretty(&*quotes).map_err(StoreError::Export)
    }

    /// Distinct categories in lexicographic order.
    pub fn all_categories(&self) -> Vec<String> {
        self.lock_quotes()
            .iter()
            .map(|quote| quote.category.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Filter options for UI: the `all` sentinel followed by `all_categories()`.
    pub fn category_options(&self) -> Vec<String> {
        std::iter::once(ALL_CATEGORIES.to_string())
            .chain(
                self.all_categories()
                    .into_iter()
                    .filter(|category| category != ALL_CATEGORIES),
            )
            .collect()
    }

    pub fn filter(&self, filter: &CategoryFilter) -> Vec<Quote> {
        self.lock_quotes()
            .iter()
            .filter(|quote| filter.matches(quote))
            .cloned()
            .collect()
    }

    /// Picks a random quote matching `filter` and records it as last viewed.
    pub fn show_random(&self, filter: &CategoryFilter) -> Result<Quote, EmptyPoolError> {
        let pool = self.filter(filter);
        let quote = pick_random(&pool)?.clone();
        if let Err(err) = self.repo.save_last_viewed(&quote.id) {
            warn!("event=last_viewed_save module=service status=error error={err}");
        }
        Ok(quote)
    }

    /// The last viewed quote this session, if it still exists.
    pub fn last_viewed(&self) -> Option<Quote> {
        let id = match self.repo.load_last_viewed() {
            Ok(id) => id?,
            Err(err) => {
                warn!("event=last_viewed_load module=service status=error error={err}");
                return None;
            }
        };
        self.get(&id)
    }

    /// The persisted category filter; `All` when absent or unreadable.
    pub fn selected_category(&self) -> CategoryFilter {
        match self.repo.load_selected_category() {
            Ok(filter) => filter.unwrap_or_default(),
            Err(err) => {
                warn!("event=selected_category_load module=service status=error error={err}");
                CategoryFilter::All
            }
        }
    }

    pub fn select_category(&self, filter: &CategoryFilter) -> Result<(), StoreError> {
        self.repo.save_selected_category(filter)?;
        Ok(())
    }

    pub fn get(&self, id: &QuoteId) -> Option<Quote> {
        self.lock_quotes()
            .iter()
            .find(|quote| quote.id == *id)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<Quote> {
        self.lock_quotes().clone()
    }

    pub fn len(&self) -> usize {
        self.lock_quotes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_quotes().is_empty()
    }

    /// Whether the last collection write to the mirror failed.
    pub fn mirror_is_stale(&self) -> bool {
        self.mirror_stale.load(Ordering::Acquire)
    }

    /// Reconciles `remote` against the current collection and commits.
    ///
    /// Snapshot, merge and replace happen under one lock hold, so concurrent
    /// writes land either before or after the commit. A no-op merge performs
    /// no mirror write unless the mirror is stale.
    pub fn merge_remote(&self, remote: &[Quote]) -> MergeCommit {
        let mut quotes = self.lock_quotes();
        let outcome = reconcile(&quotes, remote);
        if outcome.is_noop() {
            let persist_error = if self.mirror_is_stale() {
                self.write_mirror(&quotes).err()
            } else {
                None
            };
            return MergeCommit {
                conflicts: 0,
                added: 0,
                persist_error,
            };
        }

        *quotes = outcome.merged;
        let persist_error = self.write_mirror(&quotes).err();
        MergeCommit {
            conflicts: outcome.conflicts,
            added: outcome.added,
            persist_error,
        }
    }

    fn persist(&self, quotes: &[Quote]) -> Result<(), StoreError> {
        self.write_mirror(quotes).map_err(StoreError::Storage)
    }

    fn repair_mirror(&self, quotes: &[Quote]) -> Result<(), StoreError> {
        if self.mirror_is_stale() {
            info!("event=quotes_persist module=service status=retry");
            self.persist(quotes)?;
        }
        Ok(())
    }

    /// Saves the held collection and tracks whether the mirror matches it.
    fn write_mirror(&self, quotes: &[Quote]) -> RepoResult<()> {
        match self.repo.save_quotes(quotes) {
            Ok(()) => {
                self.mirror_stale.store(false, Ordering::Release);
                Ok(())
            }
            Err(err) => {
                self.mirror_stale.store(true, Ordering::Release);
                warn!("event=quotes_persist module=service status=error error={err}");
                Err(err)
            }
        }
    }

    fn lock_quotes(&self) -> MutexGuard<'_, Vec<Quote>> {
        self.quotes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
