//! Registry of activity ids already merged into the log.
//!
//! Rebuilt from the persisted log at the start of every run, it guarantees a
//! physical activity is consumed at most once across runs.

use std::collections::BTreeSet;

use crate::models::{MergedLogRecord, SourceId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumedIds {
    ids: BTreeSet<SourceId>,
}

impl ConsumedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every id embedded in the given records
    pub fn from_records(records: &[MergedLogRecord]) -> Self {
        let mut registry = Self::new();
        for record in records {
            registry.mark_consumed(record.source_ids());
        }
        registry
    }

    /// True if any of `ids` has already been consumed
    pub fn is_consumed(&self, ids: &[SourceId]) -> bool {
        ids.iter().any(|id| self.ids.contains(id))
    }

    pub fn mark_consumed(&mut self, ids: &[SourceId]) {
        self.ids.extend(ids.iter().cloned());
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceId> {
        self.ids.iter()
    }
}
