//! In-memory index over a store's records
//!
//! - Primary map: `FxHashMap<RecordId, Record>` for O(1) point lookups
//! - Unique map: constrained value → owning id, for entities that declare one
//! - Sorted view: `(sort key, id)` pairs, built lazily and cached until a
//!   mutation invalidates it
//!
//! Range queries binary-search the first entry at or above the lower bound
//! and stop at the first entry past the upper bound.

use std::sync::Arc;

use parking_lot::Mutex;
use planstore_core::{Envelope, EnvelopeRef, Record, RecordId};
use rustc_hash::FxHashMap;

use crate::entity::Entity;

type SortedView<K> = Arc<Vec<(K, RecordId)>>;

/// A pending change to the index, persisted before it is applied
#[derive(Debug, Clone)]
pub(crate) enum Change<F> {
    /// Insert a new record or overwrite an existing one
    Upsert(Record<F>),
    /// Remove a record
    Remove(RecordId),
    /// Swap in an entirely new envelope
    ReplaceAll(Envelope<F>),
}

/// Index over one store's records
pub struct RecordIndex<E: Entity> {
    by_id: FxHashMap<RecordId, Record<E::Fields>>,
    unique: FxHashMap<String, RecordId>,
    next_id: RecordId,
    sorted: Mutex<Option<SortedView<E::SortKey>>>,
}

impl<E: Entity> RecordIndex<E> {
    /// Build an index from a validated envelope
    pub fn from_envelope(envelope: Envelope<E::Fields>) -> Self {
        let mut by_id = FxHashMap::default();
        let mut unique = FxHashMap::default();
        by_id.reserve(envelope.records.len());
        for record in envelope.records {
            if let Some(key) = E::unique_key(&record.fields) {
                unique.insert(key.value, record.id);
            }
            by_id.insert(record.id, record);
        }
        RecordIndex {
            by_id,
            unique,
            next_id: envelope.next_id,
            sorted: Mutex::new(None),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when there are no records
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Next id to assign
    pub fn next_id(&self) -> RecordId {
        self.next_id
    }

    /// Point lookup
    pub fn get(&self, id: RecordId) -> Option<&Record<E::Fields>> {
        self.by_id.get(&id)
    }

    /// Id of the record holding a unique value, if any
    pub fn unique_owner(&self, value: &str) -> Option<RecordId> {
        self.unique.get(value).copied()
    }

    /// Records matching a filter, ascending by sort key then id
    pub fn query(&self, filter: &E::Filter) -> Vec<Record<E::Fields>> {
        let view = self.sorted_view();
        let (lower, upper) = E::key_range(filter);

        if let (Some(lo), Some(hi)) = (&lower, &upper) {
            if lo > hi {
                return Vec::new();
            }
        }

        let start = match &lower {
            Some(lo) => view.partition_point(|(key, _)| key < lo),
            None => 0,
        };

        let mut out = Vec::new();
        for (key, id) in &view[start..] {
            if let Some(hi) = &upper {
                if key > hi {
                    break;
                }
            }
            if let Some(record) = self.by_id.get(id) {
                if E::matches(&record.fields, filter) {
                    out.push(record.clone());
                }
            }
        }
        out
    }

    /// Deep copy of the whole index as an envelope, ascending by id
    pub fn to_envelope(&self) -> Envelope<E::Fields> {
        let mut records: Vec<_> = self.by_id.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Envelope {
            next_id: self.next_id,
            records,
        }
    }

    /// The envelope that would result from applying `change`, borrowed
    pub(crate) fn preview<'a>(&'a self, change: &'a Change<E::Fields>) -> EnvelopeRef<'a, E::Fields> {
        let (next_id, mut records): (RecordId, Vec<&Record<E::Fields>>) = match change {
            Change::Upsert(record) => {
                let mut records: Vec<_> = self
                    .by_id
                    .values()
                    .filter(|r| r.id != record.id)
                    .collect();
                records.push(record);
                (self.next_id.max(record.id.saturating_add(1)), records)
            }
            Change::Remove(id) => (
                self.next_id,
                self.by_id.values().filter(|r| r.id != *id).collect(),
            ),
            Change::ReplaceAll(envelope) => (envelope.next_id, envelope.records.iter().collect()),
        };
        records.sort_by_key(|r| r.id);
        EnvelopeRef { next_id, records }
    }

    /// Apply a change that has already been persisted
    pub(crate) fn apply(&mut self, change: Change<E::Fields>) {
        match change {
            Change::Upsert(record) => self.upsert(record),
            Change::Remove(id) => {
                self.remove(id);
            }
            Change::ReplaceAll(envelope) => *self = Self::from_envelope(envelope),
        }
    }

    fn upsert(&mut self, record: Record<E::Fields>) {
        let new_key = E::unique_key(&record.fields);
        self.next_id = self.next_id.max(record.id.saturating_add(1));

        match self.by_id.get(&record.id) {
            Some(old) => {
                if E::sort_key(&old.fields) != E::sort_key(&record.fields) {
                    self.invalidate();
                }
                if let Some(old_key) = E::unique_key(&old.fields) {
                    self.unique.remove(&old_key.value);
                }
            }
            None => self.invalidate(),
        }

        if let Some(key) = new_key {
            self.unique.insert(key.value, record.id);
        }
        self.by_id.insert(record.id, record);
    }

    fn remove(&mut self, id: RecordId) -> Option<Record<E::Fields>> {
        let removed = self.by_id.remove(&id)?;
        if let Some(key) = E::unique_key(&removed.fields) {
            self.unique.remove(&key.value);
        }
        self.invalidate();
        Some(removed)
    }

    fn invalidate(&self) {
        *self.sorted.lock() = None;
    }

    fn sorted_view(&self) -> SortedView<E::SortKey> {
        let mut cached = self.sorted.lock();
        if let Some(view) = cached.as_ref() {
            return Arc::clone(view);
        }
        let mut entries: Vec<_> = self
            .by_id
            .values()
            .map(|r| (E::sort_key(&r.fields), r.id))
            .collect();
        entries.sort();
        let view = Arc::new(entries);
        *cached = Some(Arc::clone(&view));
        view
    }

    #[cfg(test)]
    pub(crate) fn is_view_cached(&self) -> bool {
        self.sorted.lock().is_some()
    }
}
