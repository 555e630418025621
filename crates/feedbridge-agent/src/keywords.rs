//! Keyword alerts: registered words trigger their stored reply when they
//! appear anywhere in a message body.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use feedbridge_core::EventRecord;
use feedbridge_store::{KeywordStore, Result};

use crate::ignore::IgnoreFilter;
use crate::pipeline::ReplySink;

/// Local mirror of the keyword names held by a [`KeywordStore`].
///
/// The mirror is refreshed by [`sync`](Self::sync) and patched on each
/// successful register/unregister; it may briefly lag the store.
pub struct KeywordEngine {
    store: Arc<dyn KeywordStore>,
    names: RwLock<BTreeSet<String>>,
}

impl KeywordEngine {
    /// Empty mirror; call [`sync`](Self::sync) before first use.
    pub fn new(store: Arc<dyn KeywordStore>) -> Self {
        Self {
            store,
            names: RwLock::new(BTreeSet::new()),
        }
    }

    /// Reload the mirror from the store. Returns the number of names.
    pub async fn sync(&self) -> Result<usize> {
        let keys = self.store.list_keys().await?;
        let count = keys.len();
        *self.names.write().expect("keyword mirror lock poisoned") = keys;
        info!(count, "keyword mirror synchronised");
        Ok(count)
    }

    /// Store `name → value` unless `name` is taken. Returns whether it was added.
    pub async fn register(&self, name: &str, value: &str) -> Result<bool> {
        let added = self.store.set_if_absent(name, value).await?;
        if added {
            self.names
                .write()
                .expect("keyword mirror lock poisoned")
                .insert(name.to_string());
            info!(keyword = %name, "keyword registered");
        }
        Ok(added)
    }

    /// Returns whether `name` existed.
    pub async fn unregister(&self, name: &str) -> Result<bool> {
        let removed = self.store.delete(name).await?;
        if removed {
            self.names
                .write()
                .expect("keyword mirror lock poisoned")
                .remove(name);
            info!(keyword = %name, "keyword removed");
        }
        Ok(removed)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.names
            .read()
            .expect("keyword mirror lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Reply with the value of every registered keyword found in the message.
    ///
    /// Lookups run concurrently; this returns once all of them have settled.
    /// Returns the number of replies sent.
    pub async fn test(
        &self,
        record: &EventRecord,
        ignore: &IgnoreFilter,
        sink: &dyn ReplySink,
    ) -> usize {
        if ignore.should_ignore(record) {
            debug!(id = %record.id, "record ignored for keyword alerts");
            return 0;
        }

        let message = record.message();
        let hits: Vec<String> = self
            .names
            .read()
            .expect("keyword mirror lock poisoned")
            .iter()
            .filter(|name| !name.is_empty() && message.contains(name.as_str()))
            .cloned()
            .collect();
        if hits.is_empty() {
            return 0;
        }

        let lookups = hits.iter().map(|name| async move {
            match self.store.get(name).await {
                Ok(Some(value)) => match sink.send(&value).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(keyword = %name, error = %e, "keyword reply failed");
                        false
                    }
                },
                // removed from the store since the last sync
                Ok(None) => false,
                Err(e) => {
                    warn!(keyword = %name, error = %e, "keyword lookup failed");
                    false
                }
            }
        });
        join_all(lookups).await.into_iter().filter(|sent| *sent).count()
    }
}
