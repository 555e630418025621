use std::collections::{vec_deque, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};

use feedbridge_core::{EventId, EventRecord};

/// Ordered, deduplicated working set of chat records.
///
/// Three views over one set of records are kept in lockstep:
///
/// * `records`: newest first, strictly descending by id;
/// * `by_id`: lookup by id;
/// * `raw`: every cached raw text, so re-delivery of an already seen frame
///   is a no-op.
///
/// Live traffic arrives in increasing id order and lands at the head.
/// Backfill from the event log can be older than anything cached and is
/// spliced in at its sorted position.
pub struct RecencyCache {
    records: VecDeque<Arc<EventRecord>>,
    by_id: HashMap<EventId, Arc<EventRecord>>,
    raw: HashSet<String>,
    max_records: Option<usize>,
}

impl RecencyCache {
    pub fn new() -> Self {
        Self::with_capacity_limit(None)
    }

    /// `max_records` bounds the cache; the oldest records are evicted first.
    pub fn with_capacity_limit(max_records: Option<usize>) -> Self {
        Self {
            records: VecDeque::new(),
            by_id: HashMap::new(),
            raw: HashSet::new(),
            max_records,
        }
    }

    /// Insert a live record, normally at the head.
    ///
    /// Falls back to a sorted insert when the id is not newer than the
    /// current head. Returns `None` if the record was already seen.
    pub fn append(&mut self, record: EventRecord) -> Option<Arc<EventRecord>> {
        if !self.is_new(&record) {
            return None;
        }
        let fits_head = self
            .records
            .front()
            .map_or(true, |head| record.id > head.id);
        if !fits_head {
            debug!(id = %record.id, "live record older than head, merging");
            return self.insert_at_sorted(record);
        }
        Some(self.insert_at(0, record))
    }

    /// Insert a backfilled record at its sorted position.
    ///
    /// Returns `None` when the raw text or id is already cached.
    pub fn merge(&mut self, record: EventRecord) -> Option<Arc<EventRecord>> {
        if !self.is_new(&record) {
            return None;
        }
        self.insert_at_sorted(record)
    }

    /// Every cached record, newest first.
    pub fn snapshot(&self) -> vec_deque::Iter<'_, Arc<EventRecord>> {
        self.records.iter()
    }

    pub fn get(&self, id: &EventId) -> Option<&Arc<EventRecord>> {
        self.by_id.get(id)
    }

    pub fn contains_raw(&self, raw_text: &str) -> bool {
        self.raw.contains(raw_text)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn is_new(&self, record: &EventRecord) -> bool {
        if self.raw.contains(&record.raw_text) {
            return false;
        }
        if self.by_id.contains_key(&record.id) {
            warn!(id = %record.id, "distinct record reuses a cached id, dropping");
            return false;
        }
        true
    }

    fn insert_at_sorted(&mut self, record: EventRecord) -> Option<Arc<EventRecord>> {
        // First position whose id is smaller than the new one.
        let pos = self.records.partition_point(|r| r.id > record.id);
        if let Some(max) = self.max_records {
            if pos >= max {
                debug!(id = %record.id, "record older than the capped window, skipping");
                return None;
            }
        }
        Some(self.insert_at(pos, record))
    }

    fn insert_at(&mut self, pos: usize, record: EventRecord) -> Arc<EventRecord> {
        let record = Arc::new(record);
        self.raw.insert(record.raw_text.clone());
        self.by_id.insert(record.id.clone(), Arc::clone(&record));
        self.records.insert(pos, Arc::clone(&record));
        self.evict();
        record
    }

    fn evict(&mut self) {
        let Some(max) = self.max_records else {
            return;
        };
        while self.records.len() > max {
            if let Some(old) = self.records.pop_back() {
                self.by_id.remove(&old.id);
                self.raw.remove(&old.raw_text);
            }
        }
    }
}

impl Default for RecencyCache {
    fn default() -> Self {
        Self::new()
    }
}
