use tracing::info;

use feedbridge_core::EventRecord;
use feedbridge_store::{EventLog, Result};

use crate::cache::RecencyCache;

/// Load persisted records into `cache`: the newest `limit` of them, or the
/// whole log when `limit` is `None`.
///
/// The log answers newest-first; the page is reversed and merged oldest-first
/// one record at a time, so anything already cached from live traffic is
/// skipped by content. Returns how many records were inserted.
pub fn load_history(
    cache: &mut RecencyCache,
    log: &EventLog,
    limit: Option<usize>,
) -> Result<usize> {
    let mut page = log.latest(limit)?;
    page.reverse();

    let fetched = page.len();
    let inserted = page
        .into_iter()
        .filter_map(|(id, entry)| cache.merge(EventRecord::from_entry(id, entry)))
        .count();

    info!(fetched, inserted, cached = cache.len(), "history backfill complete");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedbridge_core::{EventFields, EventId, LogEntry};
    use rusqlite::Connection;

    fn entry(msg: &str) -> LogEntry {
        LogEntry {
            raw_text: format!("raw:{msg}"),
            fields: EventFields {
                message: msg.to_string(),
                date: String::new(),
                time: String::new(),
                origin_host: "h".to_string(),
                is_self: false,
            },
        }
    }

    #[test]
    fn backfill_orders_and_dedups_against_live_records() {
        let log = EventLog::new(Connection::open_in_memory().unwrap()).unwrap();
        let mut ids = Vec::new();
        for (i, m) in ["a", "b", "c"].iter().enumerate() {
            ids.push(log.append_at(&entry(m), 100 + i as i64).unwrap());
        }

        // A live record raced in before the load finished.
        let mut cache = RecencyCache::new();
        let live = log.append_at(&entry("live"), 200).unwrap();
        cache.append(EventRecord::from_entry(live, entry("live")));
        // ...and one of the persisted records was already seen live too.
        cache.append(EventRecord::from_entry(ids[2].clone(), entry("c")));

        let inserted = load_history(&mut cache, &log, Some(100)).unwrap();
        assert_eq!(inserted, 2);

        let order: Vec<&str> = cache.snapshot().map(|r| r.message()).collect();
        assert_eq!(order, ["live", "c", "b", "a"]);
    }

    #[test]
    fn backfill_respects_limit() {
        let log = EventLog::new(Connection::open_in_memory().unwrap()).unwrap();
        for i in 0..10 {
            log.append_at(&entry(&i.to_string()), 1000 + i).unwrap();
        }
        let mut cache = RecencyCache::new();
        load_history(&mut cache, &log, Some(3)).unwrap();
        let ids: Vec<EventId> = cache.snapshot().map(|r| r.id.clone()).collect();
        assert_eq!(ids, [EventId::new(1009, 0), EventId::new(1008, 0), EventId::new(1007, 0)]);
    }

    #[test]
    fn unbounded_backfill_loads_the_whole_log() {
        let log = EventLog::new(Connection::open_in_memory().unwrap()).unwrap();
        let total = 10_050;
        for i in 0..total {
            log.append_at(&entry(&format!("m{i}")), 1_000 + i).unwrap();
        }
        let mut cache = RecencyCache::new();
        let inserted = load_history(&mut cache, &log, None).unwrap();
        assert_eq!(inserted, total as usize);
        assert_eq!(cache.len(), total as usize);

        let newest = cache.snapshot().next().unwrap();
        assert_eq!(newest.message(), format!("m{}", total - 1));
        let oldest = cache.snapshot().last().unwrap();
        assert_eq!(oldest.message(), "m0");
    }
}
