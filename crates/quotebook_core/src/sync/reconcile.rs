//! Local/remote merge with a remote-wins conflict policy.
//!
//! # Invariants
//! - Reconciliation never removes a local quote.
//! - A shared id whose `text` or `category` differs takes the remote values
//!   and counts as exactly one conflict.
//! - `added == merged.len() - local.len()`.

use crate::model::quote::{Quote, QuoteId};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Result of merging a remote collection into a local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub merged: Vec<Quote>,
    pub conflicts: usize,
    pub added: usize,
}

impl ReconcileOutcome {
    /// Whether the merge changed the local collection at all.
    pub fn is_noop(&self) -> bool {
        self.conflicts == 0 && self.added == 0
    }

    /// The single user-facing notification for this merge, if any.
    pub fn notification(&self) -> Option<SyncNotification> {
        SyncNotification::for_counts(self.conflicts, self.added)
    }
}

/// User-facing summary of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncNotification {
    ConflictsResolved(usize),
    QuotesFetched(usize),
}

impl SyncNotification {
    /// Conflicts take precedence over additions; a no-op merge is silent.
    pub fn for_counts(conflicts: usize, added: usize) -> Option<Self> {
        if conflicts > 0 {
            Some(Self::ConflictsResolved(conflicts))
        } else if added > 0 {
            Some(Self::QuotesFetched(added))
        } else {
            None
        }
    }
}

impl Display for SyncNotification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConflictsResolved(count) => {
                write!(f, "{count} conflicts resolved, remote wins")
            }
            Self::QuotesFetched(count) => write!(f, "{count} new quotes fetched"),
        }
    }
}

/// Merges `remote` into a copy of `local`.
///
/// Remote-only quotes are appended in remote order. A remote collection that
/// repeats an id is applied in order, so the later record overwrites the
/// earlier one.
pub fn reconcile(local: &[Quote], remote: &[Quote]) -> ReconcileOutcome {
    let mut merged = local.to_vec();
    let mut index_by_id: HashMap<QuoteId, usize> = merged
        .iter()
        .enumerate()
        .map(|(index, quote)| (quote.id.clone(), index))
        .collect();
    let mut conflicts = 0;

    for remote_quote in remote {
        match index_by_id.get(&remote_quote.id) {
            Some(&index) => {
                let entry = &mut merged[index];
                if entry.content_differs(remote_quote) {
                    entry.text = remote_quote.text.clone();
                    entry.category = remote_quote.category.clone();
                    if remote_quote.author.is_some() {
                        entry.author = remote_quote.author.clone();
                    }
                    conflicts += 1;
                }
            }
            None => {
                index_by_id.insert(remote_quote.id.clone(), merged.len());
                merged.push(remote_quote.clone());
            }
        }
    }

    let added = merged.len() - local.len();
    ReconcileOutcome {
        merged,
        conflicts,
        added,
    }
}

#[cfg(test)]
mod tests {
    use super::{reconcile, SyncNotification};
    use crate::model::quote::{Quote, QuoteId};

    fn quote(id: &str, text: &str, category: &str) -> Quote {
        Quote::with_id(QuoteId::parse(id).unwrap(), text, category).unwrap()
    }

    #[test]
    fn matching_content_is_neither_conflict_nor_addition() {
        let local = vec![quote("1", "A", "X")];
        let outcome = reconcile(&local, &local.clone());
        assert_eq!(outcome.merged, local);
        assert!(outcome.is_noop());
        assert_eq!(outcome.notification(), None);
    }

    #[test]
    fn category_only_change_counts_as_conflict() {
        let local = vec![quote("1", "A", "X")];
        let remote = vec![quote("1", "A", "Y")];
        let outcome = reconcile(&local, &remote);
        assert_eq!(outcome.conflicts, 1);
        assert_eq!(outcome.merged[0].category, "Y");
    }

    #[test]
    fn local_author_survives_remote_without_author() {
        let local = vec![quote("1", "A", "X").with_author("Ada")];
        let remote = vec![quote("1", "B", "X")];
        let outcome = reconcile(&local, &remote);
        assert_eq!(outcome.merged[0].author.as_deref(), Some("Ada"));
    }

    #[test]
    fn repeated_remote_id_is_added_once() {
        let remote = vec![quote("9", "A", "X"), quote("9", "B", "X")];
        let outcome = reconcile(&[], &remote);
        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].text, "B");
        assert_eq!(outcome.added, 1);
    }

    #[test]
    fn conflicts_take_precedence_in_notification() {
        assert_eq!(
            SyncNotification::for_counts(2, 3),
            Some(SyncNotification::ConflictsResolved(2))
        );
        assert_eq!(
            SyncNotification::for_counts(0, 3).map(|n| n.to_string()),
            Some("3 new quotes fetched".to_string())
        );
        assert_eq!(
            SyncNotification::ConflictsResolved(1).to_string(),
            "1 conflicts resolved, remote wins"
        );
    }
}
