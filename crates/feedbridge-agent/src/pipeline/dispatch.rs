use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use feedbridge_core::{BridgeConfig, BridgeError, EventRecord, LogEntry};
use feedbridge_history::{load_history, RecencyCache};
use feedbridge_protocol::StreamFramer;
use feedbridge_store::EventLog;

use crate::backends::Backends;
use crate::ignore::IgnoreFilter;
use crate::keywords::KeywordEngine;
use crate::pipeline::context::{Broadcast, ReplySink};
use crate::pipeline::router::{CommandContext, CommandRouter};

/// Owns the recency cache and drives every extracted record through the
/// pipeline. The only component that mutates the cache.
pub struct Dispatcher {
    framer: StreamFramer,
    log: EventLog,
    cache: RecencyCache,
    router: CommandRouter,
    keywords: Arc<KeywordEngine>,
    ignore: IgnoreFilter,
    backends: Backends,
    prefix: String,
    broadcaster: Arc<dyn Broadcast>,
    sink: Arc<dyn ReplySink>,
}

impl Dispatcher {
    /// Build the framer, cache, router and ignore filter from `config`.
    pub fn new(
        config: &BridgeConfig,
        log: EventLog,
        keywords: Arc<KeywordEngine>,
        backends: Backends,
        broadcaster: Arc<dyn Broadcast>,
        sink: Arc<dyn ReplySink>,
    ) -> Result<Self, BridgeError> {
        let router = CommandRouter::from_config(&config.commands)
            .map_err(|e| BridgeError::Config(format!("command prefix: {e}")))?;
        let ignore = IgnoreFilter::new(&config.ignore.patterns)
            .map_err(|e| BridgeError::Config(format!("ignore pattern: {e}")))?;
        if !ignore.is_empty() {
            info!(patterns = ignore.len(), "ignore patterns loaded");
        }

        Ok(Self {
            framer: StreamFramer::new(config.feed.min_chunk_bytes),
            log,
            cache: RecencyCache::with_capacity_limit(config.cache.max_records),
            router,
            keywords,
            ignore,
            backends,
            prefix: config.commands.prefix.clone(),
            broadcaster,
            sink,
        })
    }

    pub fn cache(&self) -> &RecencyCache {
        &self.cache
    }

    pub fn keywords(&self) -> &KeywordEngine {
        &self.keywords
    }

    /// Merge persisted records into the cache, at most `limit` of them when
    /// set.
    ///
    /// Must finish before live chunks are handled.
    pub fn load_history(&mut self, limit: Option<usize>) -> Result<usize, BridgeError> {
        let inserted = load_history(&mut self.cache, &self.log, limit)?;
        info!(inserted, cached = self.cache.len(), "history loaded");
        Ok(inserted)
    }

    /// Process every frame in `chunk`, in document order.
    ///
    /// Each record is fully handled (broadcast plus routing) before the next
    /// one starts. Only event log failures are returned; handler, broadcast
    /// and reply failures are logged. Returns the number of new records.
    pub async fn handle_chunk(&mut self, chunk: &[u8]) -> Result<usize, BridgeError> {
        let frames = self.framer.extract(chunk);
        if frames.is_empty() {
            return Ok(0);
        }

        let mut handled = 0;
        for frame in frames {
            if self.cache.contains_raw(&frame.raw) {
                debug!("duplicate frame skipped");
                continue;
            }
            let entry = LogEntry {
                raw_text: frame.raw,
                fields: frame.fields,
            };
            let id = self.log.append(&entry)?;
            let Some(record) = self.cache.append(EventRecord::from_entry(id, entry)) else {
                continue;
            };
            self.process(&record).await;
            handled += 1;
        }
        Ok(handled)
    }

    async fn process(&self, record: &EventRecord) {
        let broadcast = async {
            if let Err(e) = self.broadcaster.broadcast(record).await {
                warn!(id = %record.id, error = %e, "broadcast failed");
            }
        };

        let route = async {
            if record.is_self() {
                return;
            }
            let ctx = CommandContext {
                cache: &self.cache,
                keywords: &self.keywords,
                backends: &self.backends,
                sink: self.sink.as_ref(),
                prefix: &self.prefix,
                now: Local::now().fixed_offset(),
            };
            if !self.router.route(record.message(), &ctx).await {
                self.keywords
                    .test(record, &self.ignore, self.sink.as_ref())
                    .await;
            }
        };

        tokio::join!(broadcast, route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::mock::Recorder;
    use feedbridge_core::config::MatchSignal;
    use feedbridge_core::EventFields;
    use feedbridge_store::SqliteKeywordStore;
    use rusqlite::Connection;

    fn frame(message: &str, time: &str, is_self: bool) -> String {
        let star = if is_self { " *" } else { "" };
        format!(">> 「 {message} 」(2024/03/13 {time} 君 a.example{star}) <<")
    }

    async fn dispatcher(config: &BridgeConfig, recorder: Arc<Recorder>) -> Dispatcher {
        let log = EventLog::new(Connection::open_in_memory().unwrap()).unwrap();
        let store = SqliteKeywordStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let keywords = Arc::new(KeywordEngine::new(Arc::new(store)));
        keywords.register("foo", "bar").await.unwrap();
        Dispatcher::new(
            config,
            log,
            keywords,
            Backends::none(),
            recorder.clone(),
            recorder,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn records_are_cached_broadcast_and_routed_in_order() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&BridgeConfig::default(), rec.clone()).await;

        let chunk = format!(
            "{}\r\n{}\n",
            frame("!calc 2*3", "10:00:00", false),
            frame("hello", "10:00:01", false)
        );
        assert_eq!(d.handle_chunk(chunk.as_bytes()).await.unwrap(), 2);

        assert_eq!(d.cache().len(), 2);
        let newest: Vec<_> = d.cache().snapshot().map(|r| r.message().to_string()).collect();
        assert_eq!(newest, vec!["hello", "!calc 2*3"]);
        assert_eq!(rec.broadcasts().len(), 2);
        assert_eq!(rec.replies(), vec!["= 6".to_string()]);
    }

    #[tokio::test]
    async fn unmatched_messages_fall_back_to_keywords() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&BridgeConfig::default(), rec.clone()).await;

        let chunk = frame("so much food", "10:00:00", false);
        d.handle_chunk(chunk.as_bytes()).await.unwrap();
        assert_eq!(rec.replies(), vec!["bar".to_string()]);

        let chunk = frame("nothing to see", "10:00:01", false);
        d.handle_chunk(chunk.as_bytes()).await.unwrap();
        assert_eq!(rec.replies().len(), 1);
    }

    #[tokio::test]
    async fn quirk_runs_keywords_after_an_earlier_command_match() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&BridgeConfig::default(), rec.clone()).await;

        // calc matches, keyword (last entry) does not: alerts still fire
        let chunk = frame("!calc 1+1 food", "10:00:00", false);
        d.handle_chunk(chunk.as_bytes()).await.unwrap();
        let replies = rec.replies();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].starts_with("error:"));
        assert_eq!(replies[1], "bar");
    }

    #[tokio::test]
    async fn any_entry_signal_suppresses_keyword_fallback() {
        let mut config = BridgeConfig::default();
        config.commands.match_signal = MatchSignal::AnyEntry;
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&config, rec.clone()).await;

        let chunk = frame("!calc 1+1 food", "10:00:00", false);
        d.handle_chunk(chunk.as_bytes()).await.unwrap();
        assert_eq!(rec.replies().len(), 1);
    }

    #[tokio::test]
    async fn self_authored_records_are_not_routed() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&BridgeConfig::default(), rec.clone()).await;

        let chunk = frame("!calc 1+1 foo", "10:00:00", true);
        assert_eq!(d.handle_chunk(chunk.as_bytes()).await.unwrap(), 1);
        assert_eq!(rec.broadcasts().len(), 1);
        assert!(rec.replies().is_empty());
    }

    #[tokio::test]
    async fn replayed_frames_are_skipped() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&BridgeConfig::default(), rec.clone()).await;

        let chunk = frame("hello there", "10:00:00", false);
        assert_eq!(d.handle_chunk(chunk.as_bytes()).await.unwrap(), 1);
        assert_eq!(d.handle_chunk(chunk.as_bytes()).await.unwrap(), 0);
        assert_eq!(d.cache().len(), 1);
        assert_eq!(rec.broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn noise_chunks_are_dropped() {
        let rec = Arc::new(Recorder::default());
        let mut d = dispatcher(&BridgeConfig::default(), rec.clone()).await;
        assert_eq!(d.handle_chunk(b"\n").await.unwrap(), 0);
        assert!(d.cache().is_empty());
    }

    #[tokio::test]
    async fn history_load_then_live_append() {
        let conn = Connection::open_in_memory().unwrap();
        let log = EventLog::new(conn).unwrap();
        for (i, msg) in ["one", "two"].iter().enumerate() {
            log.append_at(
                &LogEntry {
                    raw_text: format!("raw {msg}"),
                    fields: EventFields {
                        message: msg.to_string(),
                        date: "2024/03/13".into(),
                        time: "09:00:00".into(),
                        origin_host: "a.example".into(),
                        is_self: false,
                    },
                },
                1_000 + i as i64,
            )
            .unwrap();
        }

        let rec = Arc::new(Recorder::default());
        let store = SqliteKeywordStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let mut d = Dispatcher::new(
            &BridgeConfig::default(),
            log,
            Arc::new(KeywordEngine::new(Arc::new(store))),
            Backends::none(),
            rec.clone(),
            rec.clone(),
        )
        .unwrap();

        assert_eq!(d.load_history(BridgeConfig::default().cache.backfill_limit).unwrap(), 2);
        let chunk = frame("three", "10:00:00", false);
        d.handle_chunk(chunk.as_bytes()).await.unwrap();

        let order: Vec<_> = d.cache().snapshot().map(|r| r.message().to_string()).collect();
        assert_eq!(order, vec!["three", "two", "one"]);
        // backfilled records are not re-broadcast
        assert_eq!(rec.broadcasts().len(), 1);
    }

    #[test]
    fn bad_ignore_pattern_is_a_config_error() {
        let mut config = BridgeConfig::default();
        config.ignore.patterns = vec!["(".into()];
        let log = EventLog::new(Connection::open_in_memory().unwrap()).unwrap();
        let store = SqliteKeywordStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let rec = Arc::new(Recorder::default());
        let err = Dispatcher::new(
            &config,
            log,
            Arc::new(KeywordEngine::new(Arc::new(store))),
            Backends::none(),
            rec.clone(),
            rec,
        )
        .err()
        .unwrap();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
