use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use feedbridge_core::{EventFields, EventId, LogEntry};

use crate::db::init_db;
use crate::error::{Result, StoreError};

/// Append-only chat log.
///
/// Ids follow the `<millis>-<seq>` scheme: the wall-clock millisecond of the
/// append, plus a sequence number that only increments when several appends
/// land in the same millisecond (or the clock steps backwards). Ids handed out
/// by one log are therefore strictly increasing.
pub struct EventLog {
    db: Mutex<Connection>,
    /// Last id handed out, as `(millis, seq)`.
    last: Mutex<(i64, u64)>,
}

impl EventLog {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        let last: (i64, u64) = conn
            .query_row(
                "SELECT millis, seq FROM event_log ORDER BY millis DESC, seq DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .unwrap_or((0, 0));
        Ok(Self {
            db: Mutex::new(conn),
            last: Mutex::new(last),
        })
    }

    /// Persist one entry and return its freshly assigned id.
    pub fn append(&self, entry: &LogEntry) -> Result<EventId> {
        self.append_at(entry, chrono::Utc::now().timestamp_millis())
    }

    /// [`append`](Self::append) with an explicit clock reading.
    pub fn append_at(&self, entry: &LogEntry, now_millis: i64) -> Result<EventId> {
        let fields = serde_json::to_string(&entry.fields)?;
        let db = self.db.lock().expect("event log mutex poisoned");
        let mut last = self.last.lock().expect("event log mutex poisoned");

        let next = if now_millis > last.0 {
            (now_millis, 0)
        } else {
            (last.0, last.1 + 1)
        };

        db.execute(
            "INSERT INTO event_log (millis, seq, raw_text, fields) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![next.0, next.1 as i64, entry.raw_text, fields],
        )?;
        *last = next;

        let id = EventId::new(next.0, next.1);
        debug!(id = %id, "event appended");
        Ok(id)
    }

    /// Reverse range query: entries with `start <= id <= end`, newest first,
    /// at most `limit` of them. `None` bounds and a `None` limit are open.
    pub fn range_query(
        &self,
        start: Option<&EventId>,
        end: Option<&EventId>,
        limit: Option<usize>,
    ) -> Result<Vec<(EventId, LogEntry)>> {
        let lo = start.map(split_id).transpose()?.unwrap_or((i64::MIN, 0));
        let hi = end
            .map(split_id)
            .transpose()?
            .unwrap_or((i64::MAX, u64::MAX >> 1));

        // SQLite treats a negative LIMIT as no limit
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

        let db = self.db.lock().expect("event log mutex poisoned");
        let mut stmt = db.prepare(
            "SELECT millis, seq, raw_text, fields FROM event_log
             WHERE (millis > ?1 OR (millis = ?1 AND seq >= ?2))
               AND (millis < ?3 OR (millis = ?3 AND seq <= ?4))
             ORDER BY millis DESC, seq DESC
             LIMIT ?5",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![lo.0, lo.1 as i64, hi.0, hi.1 as i64, limit],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            let (millis, seq, raw_text, fields) = row?;
            let fields: EventFields = serde_json::from_str(&fields)?;
            out.push((
                EventId::new(millis, seq as u64),
                LogEntry { raw_text, fields },
            ));
        }
        Ok(out)
    }

    /// Newest `limit` entries, or the whole log: the startup backfill page.
    pub fn latest(&self, limit: Option<usize>) -> Result<Vec<(EventId, LogEntry)>> {
        self.range_query(None, None, limit)
    }
}

fn split_id(id: &EventId) -> Result<(i64, u64)> {
    let (millis, seq) = id
        .as_str()
        .split_once('-')
        .ok_or_else(|| StoreError::BadId(id.to_string()))?;
    let millis = millis
        .parse()
        .map_err(|_| StoreError::BadId(id.to_string()))?;
    let seq = seq.parse().map_err(|_| StoreError::BadId(id.to_string()))?;
    Ok((millis, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(msg: &str) -> LogEntry {
        LogEntry {
            raw_text: format!(">> 「 {msg} 」(2024/05/01 12:00:00 君 h) <<"),
            fields: EventFields {
                message: msg.to_string(),
                date: "2024/05/01".to_string(),
                time: "12:00:00".to_string(),
                origin_host: "h".to_string(),
                is_self: false,
            },
        }
    }

    fn log() -> EventLog {
        EventLog::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn ids_increase_within_one_millisecond() {
        let log = log();
        let a = log.append_at(&entry("a"), 1000).unwrap();
        let b = log.append_at(&entry("b"), 1000).unwrap();
        let c = log.append_at(&entry("c"), 1001).unwrap();
        assert_eq!(a.as_str(), "1000-0");
        assert_eq!(b.as_str(), "1000-1");
        assert_eq!(c.as_str(), "1001-0");
    }

    #[test]
    fn clock_step_back_still_increases() {
        let log = log();
        let a = log.append_at(&entry("a"), 2000).unwrap();
        let b = log.append_at(&entry("b"), 1500).unwrap();
        assert!(b > a);
        assert_eq!(b.as_str(), "2000-1");
    }

    #[test]
    fn range_query_is_reverse_and_bounded() {
        let log = log();
        for (i, m) in ["a", "b", "c", "d"].iter().enumerate() {
            log.append_at(&entry(m), 1000 + i as i64).unwrap();
        }
        let page = log.latest(Some(3)).unwrap();
        let msgs: Vec<&str> = page.iter().map(|(_, e)| e.fields.message.as_str()).collect();
        assert_eq!(msgs, ["d", "c", "b"]);

        let start = EventId::from("1001-0");
        let end = EventId::from("1002-0");
        let mid = log.range_query(Some(&start), Some(&end), Some(10)).unwrap();
        let msgs: Vec<&str> = mid.iter().map(|(_, e)| e.fields.message.as_str()).collect();
        assert_eq!(msgs, ["c", "b"]);
    }

    #[test]
    fn open_limit_returns_every_entry() {
        let log = log();
        for i in 0..5 {
            log.append_at(&entry(&i.to_string()), 3000 + i).unwrap();
        }
        let all = log.latest(None).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].0.as_str(), "3004-0");
        assert_eq!(all[4].0.as_str(), "3000-0");
    }

    #[test]
    fn reopen_continues_after_last_id() {
        let conn = Connection::open_in_memory().unwrap();
        let log = EventLog::new(conn).unwrap();
        log.append_at(&entry("a"), 5000).unwrap();
        // Same connection handed back in: the sequence resumes from disk state.
        let conn = log.db.into_inner().unwrap();
        let log = EventLog::new(conn).unwrap();
        let id = log.append_at(&entry("b"), 10).unwrap();
        assert_eq!(id.as_str(), "5000-1");
    }

    #[test]
    fn malformed_bound_is_rejected() {
        let log = log();
        let bad = EventId::from("nonsense");
        assert!(matches!(
            log.range_query(Some(&bad), None, Some(1)),
            Err(StoreError::BadId(_))
        ));
    }
}
