//! Scan-scoped set of record ids already assigned to a group.
//!
//! Stages only read the set. The orchestrator folds each stage's groups
//! into it once the stage has finished, which is what keeps every record in
//! at most one group.

use std::collections::HashSet;

use super::DuplicateGroup;
use crate::scanner::FileRecord;

/// Ids of records that belong to a group.
#[derive(Debug, Default, Clone)]
pub struct ClaimedSet {
    ids: HashSet<String>,
}

impl ClaimedSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is already in a group.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of claimed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing has been claimed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Claim every member of `groups`.
    pub fn claim_groups(&mut self, groups: &[DuplicateGroup]) {
        for group in groups {
            for id in group.member_ids() {
                let fresh = self.ids.insert(id.to_string());
                debug_assert!(fresh, "record {id} claimed twice");
            }
        }
    }

    /// Records in `records` that are not yet claimed, in their original order.
    #[must_use]
    pub fn unclaimed<'a>(&self, records: &'a [FileRecord]) -> Vec<&'a FileRecord> {
        records.iter().filter(|r| !self.contains(&r.id)).collect()
    }
}
