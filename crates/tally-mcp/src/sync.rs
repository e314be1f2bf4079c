//! Mirror refresh.
//!
//! The store's change feed says only that *something* changed, so every
//! notification triggers a full rebuild of the bounded window: query the
//! `window` most recent documents and replace the mirror with them.
//!
//! With [`RefreshStrategy::Swap`] the new snapshot is built first and swapped
//! in, so readers see either the old or the new window. With
//! [`RefreshStrategy::ClearFirst`] the mirror is cleared before the query is
//! awaited; a read issued while the query is in flight sees an empty mirror,
//! and a failed query leaves it empty.

use crate::mirror::{MirrorCache, Snapshot};
use async_trait::async_trait;
use std::sync::Arc;
use tally_core::{MirrorConfig, Record, RefreshStrategy};
use tally_store::{ChangeFeed, QueryOptions, RecordStore, StoreError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Rebuilds the mirror from the store.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// Resynchronize the mirror. Returns the number of records it now holds.
    async fn refresh(&self) -> Result<usize, StoreError>;
}

/// Full refresh of the `window` most recent records.
pub struct WindowSynchronizer {
    store: Arc<dyn RecordStore>,
    mirror: Arc<MirrorCache>,
    window: usize,
    index: String,
    strategy: RefreshStrategy,
}

impl WindowSynchronizer {
    pub fn new(store: Arc<dyn RecordStore>, mirror: Arc<MirrorCache>, config: &MirrorConfig) -> Self {
        Self {
            store,
            mirror,
            window: config.window,
            index: config.index.clone(),
            strategy: config.strategy,
        }
    }

    /// Query the window and decode it, most recent first.
    async fn fetch(&self) -> Result<Vec<Record>, StoreError> {
        let result = self
            .store
            .query(
                &self.index,
                QueryOptions {
                    include_docs: true,
                    descending: true,
                    limit: Some(self.window),
                },
            )
            .await?;

        let records = result
            .rows
            .into_iter()
            .filter_map(|row| {
                let doc = row.doc?;
                match Record::from_document(&doc) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(id = %row.id, error = %e, "Skipping undecodable document");
                        None
                    }
                }
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl Synchronizer for WindowSynchronizer {
    async fn refresh(&self) -> Result<usize, StoreError> {
        match self.strategy {
            RefreshStrategy::Swap => {
                let records = self.fetch().await?;
                self.mirror.replace(Snapshot::from_records(records));
            }
            RefreshStrategy::ClearFirst => {
                self.mirror.clear();
                for record in self.fetch().await? {
                    self.mirror.put(record);
                }
            }
        }

        let count = self.mirror.len();
        tracing::debug!(records = count, strategy = ?self.strategy, "Mirror refreshed");
        Ok(count)
    }
}

/// Refresh once per change notification until the feed closes.
///
/// Notifications are handled one at a time. If the task falls behind, the
/// missed notifications collapse into a single refresh. A failed refresh is
/// logged and the task keeps listening.
pub fn spawn_listener(sync: Arc<dyn Synchronizer>, mut feed: ChangeFeed) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Coalesced change notifications");
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Change feed closed, stopping listener");
                    break;
                }
            }

            if let Err(e) = sync.refresh().await {
                tracing::warn!(error = %e, "Mirror refresh failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tally_store::{DelResult, Document, MemoryStore, PutResult, QueryResult};
    use tokio::sync::Notify;

    /// Memory store whose queries can be made to fail or to pause.
    #[derive(Default)]
    struct ControlledStore {
        inner: MemoryStore,
        fail_queries: AtomicBool,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    #[async_trait]
    impl RecordStore for ControlledStore {
        async fn ready(&self) -> Result<(), StoreError> {
            self.inner.ready().await
        }

        async fn put(&self, doc: Document) -> Result<PutResult, StoreError> {
            self.inner.put(doc).await
        }

        async fn get(&self, id: &str) -> Result<Document, StoreError> {
            self.inner.get(id).await
        }

        async fn del(&self, id: &str) -> Result<DelResult, StoreError> {
            self.inner.del(id).await
        }

        async fn query(&self, index: &str, opts: QueryOptions) -> Result<QueryResult, StoreError> {
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail_queries.load(Ordering::SeqCst) {
                return Err(StoreError::IndexNotFound {
                    index: index.to_string(),
                });
            }
            self.inner.query(index, opts).await
        }

        fn subscribe(&self) -> ChangeFeed {
            self.inner.subscribe()
        }
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn config(window: usize, strategy: RefreshStrategy) -> MirrorConfig {
        MirrorConfig {
            window,
            strategy,
            ..MirrorConfig::default()
        }
    }

    async fn seed(store: &dyn RecordStore, count: i64) {
        for i in 0..count {
            store
                .put(doc(json!({"id": format!("t{i}"), "text": format!("todo {i}"), "created": i})))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn refresh_loads_most_recent_window() {
        let store = Arc::new(MemoryStore::new());
        seed(store.as_ref(), 5).await;
        let mirror = Arc::new(MirrorCache::new());
        let sync = WindowSynchronizer::new(store, mirror.clone(), &config(3, RefreshStrategy::Swap));

        assert_eq!(sync.refresh().await.unwrap(), 3);
        let ids: Vec<_> = mirror.all().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["t4", "t3", "t2"]);
    }

    #[tokio::test]
    async fn refresh_drops_deleted_records() {
        let store = Arc::new(MemoryStore::new());
        seed(store.as_ref(), 2).await;
        let mirror = Arc::new(MirrorCache::new());
        let sync =
            WindowSynchronizer::new(store.clone(), mirror.clone(), &config(10, RefreshStrategy::Swap));

        sync.refresh().await.unwrap();
        store.del("t1").await.unwrap();
        sync.refresh().await.unwrap();

        assert!(mirror.get("t1").is_none());
        assert!(mirror.get("t0").is_some());
    }

    #[tokio::test]
    async fn undecodable_documents_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(doc(json!({"id": "bad", "created": 2})))
            .await
            .unwrap();
        store
            .put(doc(json!({"id": "good", "text": "ok", "created": 1})))
            .await
            .unwrap();
        let mirror = Arc::new(MirrorCache::new());
        let sync = WindowSynchronizer::new(store, mirror.clone(), &config(10, RefreshStrategy::Swap));

        assert_eq!(sync.refresh().await.unwrap(), 1);
        assert!(mirror.get("good").is_some());
    }

    #[tokio::test]
    async fn failed_swap_keeps_last_good_snapshot() {
        let store = Arc::new(ControlledStore::default());
        seed(store.as_ref(), 2).await;
        let mirror = Arc::new(MirrorCache::new());
        let sync =
            WindowSynchronizer::new(store.clone(), mirror.clone(), &config(10, RefreshStrategy::Swap));

        sync.refresh().await.unwrap();
        store.fail_queries.store(true, Ordering::SeqCst);

        assert!(sync.refresh().await.is_err());
        assert_eq!(mirror.len(), 2);
    }

    #[tokio::test]
    async fn failed_clear_first_leaves_mirror_empty() {
        let store = Arc::new(ControlledStore::default());
        seed(store.as_ref(), 2).await;
        let mirror = Arc::new(MirrorCache::new());
        let sync = WindowSynchronizer::new(
            store.clone(),
            mirror.clone(),
            &config(10, RefreshStrategy::ClearFirst),
        );

        sync.refresh().await.unwrap();
        assert_eq!(mirror.len(), 2);
        store.fail_queries.store(true, Ordering::SeqCst);

        assert!(sync.refresh().await.is_err());
        assert!(mirror.is_empty());
    }

    /// Pause a refresh inside its query and report what a reader sees.
    async fn observe_mid_refresh(strategy: RefreshStrategy) -> (bool, bool) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let store = Arc::new(ControlledStore {
            gate: Some((entered.clone(), release.clone())),
            ..ControlledStore::default()
        });
        seed(store.as_ref(), 1).await;

        let mirror = Arc::new(MirrorCache::new());
        mirror.put(
            Record::from_document(&doc(json!({"id": "t0", "text": "todo 0", "created": 0})))
                .unwrap(),
        );
        let sync = Arc::new(WindowSynchronizer::new(
            store.clone(),
            mirror.clone(),
            &config(10, strategy),
        ));

        let task = tokio::spawn({
            let sync = sync.clone();
            async move { sync.refresh().await }
        });

        entered.notified().await;
        let visible_during = mirror.get("t0").is_some();
        release.notify_one();
        task.await.unwrap().unwrap();
        let visible_after = mirror.get("t0").is_some();

        (visible_during, visible_after)
    }

    #[tokio::test]
    async fn clear_first_exposes_transient_empty_window() {
        assert_eq!(observe_mid_refresh(RefreshStrategy::ClearFirst).await, (false, true));
    }

    #[tokio::test]
    async fn swap_never_exposes_empty_window() {
        assert_eq!(observe_mid_refresh(RefreshStrategy::Swap).await, (true, true));
    }

    #[tokio::test]
    async fn listener_refreshes_on_change() {
        let store = Arc::new(MemoryStore::new());
        let mirror = Arc::new(MirrorCache::new());
        let sync: Arc<dyn Synchronizer> = Arc::new(WindowSynchronizer::new(
            store.clone(),
            mirror.clone(),
            &config(10, RefreshStrategy::Swap),
        ));
        let handle = spawn_listener(sync, store.subscribe());

        store
            .put(doc(json!({"id": "a", "text": "Buy milk", "created": 1})))
            .await
            .unwrap();

        let mut seen = false;
        for _ in 0..100 {
            if mirror.get("a").is_some() {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(seen, "listener should have refreshed the mirror");
    }

    #[tokio::test]
    async fn listener_stops_when_feed_closes() {
        let store = MemoryStore::new();
        let feed = store.subscribe();
        let mirror = Arc::new(MirrorCache::new());
        let sync: Arc<dyn Synchronizer> = Arc::new(WindowSynchronizer::new(
            Arc::new(MemoryStore::new()),
            mirror,
            &config(10, RefreshStrategy::Swap),
        ));

        let handle = spawn_listener(sync, feed);
        drop(store);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener should exit")
            .unwrap();
    }
}
