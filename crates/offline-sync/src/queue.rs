//! Durable, priority-ordered offline mutation queue.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::watch;

use greenmate_core::network::NetworkStatus;
use greenmate_core::storage::KeyValueStore;
use greenmate_core::sync::{
    flush_order, NewSyncItem, OfflineState, QueueInfo, SyncCycleTrigger, SyncItem, SyncSummary,
};

use crate::client::SyncTransport;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::types::SyncRequest;

/// Storage key holding the serialized queue.
pub const QUEUE_STORAGE_KEY: &str = "greenmate_offline_queue";
/// Storage key holding the RFC 3339 time of the last completed flush.
pub const LAST_SYNC_STORAGE_KEY: &str = "greenmate_last_sync";

type StateListener = Arc<dyn Fn(&OfflineState) + Send + Sync>;
type DroppedItemListener = Arc<dyn Fn(&SyncItem) + Send + Sync>;

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// Handle returned by [`OfflineSyncQueue::subscribe`] and
/// [`OfflineSyncQueue::on_item_dropped`].
///
/// The listener stays registered until [`Subscription::unsubscribe`] is called.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

struct ListenerSet<L> {
    next_id: AtomicU64,
    entries: Arc<Mutex<BTreeMap<u64, L>>>,
}

impl<L: Clone + Send + 'static> ListenerSet<L> {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn insert(&self, listener: L) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock_or_recover(&self.entries).insert(id, listener);

        let entries: Weak<Mutex<BTreeMap<u64, L>>> = Arc::downgrade(&self.entries);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(entries) = entries.upgrade() {
                    lock_or_recover(&entries).remove(&id);
                }
            })),
        }
    }

    fn snapshot(&self) -> Vec<L> {
        lock_or_recover(&self.entries).values().cloned().collect()
    }
}

/// Clears the in-progress flag when a flush ends, however it ends.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<SyncItem>,
    last_sync: Option<DateTime<Utc>>,
}

/// Accepts mutations while offline, persists them, and replays them in
/// priority order once the network is available.
///
/// `enqueue` and `sync_all` never fail; per-item failures are recorded on the
/// item and surfaced through [`OfflineSyncQueue::get_state`],
/// [`OfflineSyncQueue::get_queue_info`] and subscriptions.
pub struct OfflineSyncQueue {
    config: SyncConfig,
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn SyncTransport>,
    network: watch::Receiver<bool>,
    state: Mutex<QueueState>,
    sync_in_progress: AtomicBool,
    /// Bumped by `clear_all`; a flush started under an older value stops.
    clear_generation: AtomicU64,
    listeners: ListenerSet<StateListener>,
    dropped_listeners: ListenerSet<DroppedItemListener>,
}

impl OfflineSyncQueue {
    /// Build a queue and reload whatever a previous session persisted.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn SyncTransport>,
        network: &NetworkStatus,
    ) -> Self {
        let state = Self::load(store.as_ref());
        info!(
            "[OfflineSync] Queue loaded: {} item(s), {} pending",
            state.items.len(),
            state.items.iter().filter(|i| !i.synced).count()
        );

        Self {
            config: SyncConfig {
                batch_size: config.batch_size.max(1),
                max_retries: config.max_retries.max(1),
                ..config
            },
            store,
            transport,
            network: network.subscribe(),
            state: Mutex::new(state),
            sync_in_progress: AtomicBool::new(false),
            clear_generation: AtomicU64::new(0),
            listeners: ListenerSet::new(),
            dropped_listeners: ListenerSet::new(),
        }
    }

    fn load(store: &dyn KeyValueStore) -> QueueState {
        let items = match store.get(QUEUE_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<SyncItem>>(&raw) {
                Ok(items) => items,
                Err(e) => {
                    warn!("[OfflineSync] Discarding corrupt persisted queue: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("[OfflineSync] Failed to read persisted queue: {}", e);
                Vec::new()
            }
        };

        let last_sync = match store.get(LAST_SYNC_STORAGE_KEY) {
            Ok(Some(raw)) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("[OfflineSync] Failed to read last sync time: {}", e);
                None
            }
        };

        QueueState { items, last_sync }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_online(&self) -> bool {
        *self.network.borrow()
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.sync_in_progress.load(Ordering::Acquire)
    }

    /// A fresh receiver on the network signal this queue reads.
    pub fn network_watch(&self) -> watch::Receiver<bool> {
        self.network.clone()
    }

    pub fn pending_count(&self) -> usize {
        lock_or_recover(&self.state)
            .items
            .iter()
            .filter(|i| !i.synced)
            .count()
    }

    /// Snapshot of every queued item, in insertion order.
    pub fn items(&self) -> Vec<SyncItem> {
        lock_or_recover(&self.state).items.clone()
    }

    /// Record a mutation and return the id it was stored under.
    ///
    /// The queue is written to storage before this returns. When online and
    /// idle, a flush is spawned on the current tokio runtime.
    pub fn enqueue(self: &Arc<Self>, request: NewSyncItem) -> String {
        let now = Utc::now();
        let (id, dropped) = {
            let mut state = lock_or_recover(&self.state);
            let mut item = SyncItem::new(request, now);
            if state.items.iter().any(|existing| existing.id == item.id) {
                let fresh = uuid::Uuid::new_v4().to_string();
                warn!(
                    "[OfflineSync] Item id '{}' already queued; storing as '{}'",
                    item.id, fresh
                );
                item.id = fresh;
            }
            debug!(
                "[OfflineSync] Enqueued {} {} ({:?} priority) as {}",
                item.action.http_method(),
                item.resource_type().as_str(),
                item.priority,
                item.id
            );
            let id = item.id.clone();
            state.items.push(item);
            (id, self.persist_locked(&mut state, now))
        };

        self.report_dropped(&dropped);
        self.notify();

        if self.is_online() && !self.is_sync_in_progress() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let queue = Arc::clone(self);
                    handle.spawn(async move {
                        queue.flush(SyncCycleTrigger::Enqueue).await;
                    });
                }
                Err(_) => debug!("[OfflineSync] No async runtime; deferring flush"),
            }
        }

        id
    }

    /// Flush every pending item. Returns zero counts when offline or when
    /// another flush is already running.
    pub async fn sync_all(&self) -> SyncSummary {
        self.flush(SyncCycleTrigger::Manual).await
    }

    /// UI entry point (pull-to-refresh); same as [`Self::sync_all`].
    pub async fn force_sync(&self) -> SyncSummary {
        self.sync_all().await
    }

    pub(crate) async fn flush(&self, trigger: SyncCycleTrigger) -> SyncSummary {
        if !self.is_online() {
            debug!("[OfflineSync] Skipping {} flush: offline", trigger.as_str());
            return SyncSummary::default();
        }
        let Some(guard) = FlushGuard::acquire(&self.sync_in_progress) else {
            debug!(
                "[OfflineSync] Skipping {} flush: another flush is running",
                trigger.as_str()
            );
            return SyncSummary::default();
        };
        self.notify();

        let (generation, mut pending) = {
            let state = lock_or_recover(&self.state);
            let pending: Vec<SyncItem> = state
                .items
                .iter()
                .filter(|item| !item.synced)
                .cloned()
                .collect();
            (self.clear_generation.load(Ordering::Acquire), pending)
        };
        pending.sort_by(flush_order);

        if !pending.is_empty() {
            info!(
                "[OfflineSync] Flushing {} pending item(s) (trigger={}, batch_size={})",
                pending.len(),
                trigger.as_str(),
                self.config.batch_size
            );
        }

        let mut summary = SyncSummary::default();
        let mut cleared = false;
        for chunk in pending.chunks(self.config.batch_size) {
            let Some(batch) = self.still_pending(chunk, generation) else {
                cleared = true;
                break;
            };
            if batch.is_empty() {
                continue;
            }

            let outcomes = join_all(batch.iter().map(|item| self.sync_item(item))).await;
            let now = Utc::now();

            let dropped = {
                let mut state = lock_or_recover(&self.state);
                for (item, outcome) in batch.iter().zip(&outcomes) {
                    match outcome {
                        Ok(()) => summary.success += 1,
                        Err(e) => {
                            summary.failed += 1;
                            warn!(
                                "[OfflineSync] Sync failed for {} {} (attempt {}, {}): {}",
                                item.resource_type().as_str(),
                                item.id,
                                item.retry_count + 1,
                                e.retry_class().as_str(),
                                e
                            );
                        }
                    }
                }
                if self.clear_generation.load(Ordering::Acquire) != generation {
                    cleared = true;
                    Vec::new()
                } else {
                    for (item, outcome) in batch.iter().zip(outcomes) {
                        let Some(stored) = state.items.iter_mut().find(|i| i.id == item.id)
                        else {
                            debug!("[OfflineSync] Item {} left the queue mid-flush", item.id);
                            continue;
                        };
                        match outcome {
                            Ok(()) => stored.mark_synced(now),
                            Err(e) => stored.record_failure(now, e.to_string()),
                        }
                    }
                    self.persist_locked(&mut state, now)
                }
            };
            self.report_dropped(&dropped);
            if cleared {
                break;
            }
        }

        if cleared {
            info!(
                "[OfflineSync] Queue cleared during {} flush; remaining items not sent",
                trigger.as_str()
            );
        } else {
            let now = Utc::now();
            let dropped = {
                let mut state = lock_or_recover(&self.state);
                if self.clear_generation.load(Ordering::Acquire) == generation {
                    let mut dropped = self.cleanup_locked(&mut state, now);
                    state.last_sync = Some(now);
                    if let Err(e) = self.store.set(LAST_SYNC_STORAGE_KEY, &now.to_rfc3339()) {
                        warn!("[OfflineSync] Failed to persist last sync time: {}", e);
                    }
                    dropped.extend(self.persist_locked(&mut state, now));
                    dropped
                } else {
                    Vec::new()
                }
            };
            self.report_dropped(&dropped);
        }

        drop(guard);
        self.notify();

        if summary.attempted() > 0 {
            info!(
                "[OfflineSync] Flush complete (trigger={}): {} synced, {} failed",
                trigger.as_str(),
                summary.success,
                summary.failed
            );
        }
        summary
    }

    /// The part of `chunk` still queued and unsynced, or `None` once the
    /// queue has been cleared since `generation` was read.
    fn still_pending(&self, chunk: &[SyncItem], generation: u64) -> Option<Vec<SyncItem>> {
        let state = lock_or_recover(&self.state);
        if self.clear_generation.load(Ordering::Acquire) != generation {
            return None;
        }
        Some(
            chunk
                .iter()
                .filter(|item| state.items.iter().any(|i| i.id == item.id && !i.synced))
                .cloned()
                .collect(),
        )
    }

    async fn sync_item(&self, item: &SyncItem) -> Result<()> {
        let request = SyncRequest::for_item(item)?;
        let response = self.transport.send(request).await?;
        debug!(
            "[OfflineSync] Synced {} {} (status {})",
            item.resource_type().as_str(),
            item.id,
            response.status
        );
        Ok(())
    }

    /// Publish a connectivity transition and flush when it came back online.
    pub async fn handle_connectivity_change(&self, online: bool) -> SyncSummary {
        info!(
            "[OfflineSync] Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        self.notify();
        if online {
            self.flush(SyncCycleTrigger::Reconnect).await
        } else {
            SyncSummary::default()
        }
    }

    pub fn get_state(&self) -> OfflineState {
        let state = lock_or_recover(&self.state);
        OfflineState {
            is_online: self.is_online(),
            last_sync: state.last_sync,
            pending_items: state.items.iter().filter(|i| !i.synced).count(),
            sync_in_progress: self.is_sync_in_progress(),
        }
    }

    pub fn get_queue_info(&self) -> QueueInfo {
        QueueInfo::from_items(&lock_or_recover(&self.state).items)
    }

    /// Register a state listener, called after every state change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&OfflineState) + Send + Sync + 'static,
    {
        self.listeners.insert(Arc::new(listener))
    }

    /// Register a listener for unsynced items discarded by cleanup.
    pub fn on_item_dropped<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncItem) + Send + Sync + 'static,
    {
        self.dropped_listeners.insert(Arc::new(listener))
    }

    /// Empty the queue and erase its persisted state (logout).
    pub fn clear_all(&self) -> greenmate_core::Result<()> {
        let result = {
            let mut state = lock_or_recover(&self.state);
            self.clear_generation.fetch_add(1, Ordering::AcqRel);
            let cleared = state.items.len();
            state.items.clear();
            state.last_sync = None;
            info!("[OfflineSync] Cleared {} queued item(s)", cleared);
            self.store
                .remove(QUEUE_STORAGE_KEY)
                .and_then(|_| self.store.remove(LAST_SYNC_STORAGE_KEY))
        };
        if let Err(e) = &result {
            error!("[OfflineSync] Failed to erase persisted queue: {}", e);
        }
        self.notify();
        result
    }

    /// Write the queue, pruning under storage pressure. Returns the unsynced
    /// items that had to be dropped.
    fn persist_locked(&self, state: &mut QueueState, now: DateTime<Utc>) -> Vec<SyncItem> {
        let mut dropped = Vec::new();

        let mut serialized = match serde_json::to_string(&state.items) {
            Ok(serialized) => serialized,
            Err(e) => {
                error!("[OfflineSync] Failed to serialize queue: {}", e);
                return dropped;
            }
        };

        if serialized.len() > self.config.storage_budget_bytes {
            warn!(
                "[OfflineSync] Queue is {} bytes, over the {} byte budget; forcing cleanup",
                serialized.len(),
                self.config.storage_budget_bytes
            );
            dropped.extend(self.force_cleanup_locked(state, now));
            match serde_json::to_string(&state.items) {
                Ok(pruned) => serialized = pruned,
                Err(e) => {
                    error!("[OfflineSync] Failed to serialize queue: {}", e);
                    return dropped;
                }
            }
        }

        let Err(first) = self.store.set(QUEUE_STORAGE_KEY, &serialized) else {
            return dropped;
        };
        warn!(
            "[OfflineSync] Failed to persist queue ({}); forcing cleanup and retrying",
            first
        );
        dropped.extend(self.force_cleanup_locked(state, now));
        let retry = serde_json::to_string(&state.items)
            .map_err(greenmate_core::Error::from)
            .and_then(|pruned| self.store.set(QUEUE_STORAGE_KEY, &pruned));
        if let Err(e) = retry {
            error!(
                "[OfflineSync] Queue still not persisted after cleanup ({} item(s) in memory): {}",
                state.items.len(),
                e
            );
        }
        dropped
    }

    /// Regular end-of-flush cleanup: expired synced items and exhausted items.
    fn cleanup_locked(&self, state: &mut QueueState, now: DateTime<Utc>) -> Vec<SyncItem> {
        let synced_cutoff = now - to_chrono(self.config.synced_retention);
        let max_retries = self.config.max_retries;
        self.retain_locked(state, "cleanup", |item| {
            if item.synced {
                item.last_attempt.unwrap_or(item.timestamp) >= synced_cutoff
            } else {
                !item.is_exhausted(max_retries)
            }
        })
    }

    /// Storage-pressure cleanup: every synced item, exhausted items, and
    /// anything past the maximum age.
    fn force_cleanup_locked(&self, state: &mut QueueState, now: DateTime<Utc>) -> Vec<SyncItem> {
        let age_cutoff = now - to_chrono(self.config.max_item_age);
        let max_retries = self.config.max_retries;
        self.retain_locked(state, "forced cleanup", |item| {
            !item.synced && !item.is_exhausted(max_retries) && item.timestamp >= age_cutoff
        })
    }

    fn retain_locked(
        &self,
        state: &mut QueueState,
        reason: &str,
        keep: impl Fn(&SyncItem) -> bool,
    ) -> Vec<SyncItem> {
        let (kept, removed): (Vec<_>, Vec<_>) =
            std::mem::take(&mut state.items).into_iter().partition(keep);
        state.items = kept;

        let (synced, unsynced): (Vec<_>, Vec<_>) = removed.into_iter().partition(|i| i.synced);
        if !synced.is_empty() {
            debug!(
                "[OfflineSync] {} removed {} synced item(s)",
                reason,
                synced.len()
            );
        }
        for item in &unsynced {
            warn!(
                "[OfflineSync] {} dropped unsynced {} {} after {} attempt(s){}",
                reason,
                item.resource_type().as_str(),
                item.id,
                item.retry_count,
                item.last_error
                    .as_deref()
                    .map(|e| format!(", last error: {}", e))
                    .unwrap_or_default()
            );
        }
        unsynced
    }

    fn notify(&self) {
        let listeners = self.listeners.snapshot();
        if listeners.is_empty() {
            return;
        }
        let snapshot = self.get_state();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn report_dropped(&self, dropped: &[SyncItem]) {
        if dropped.is_empty() {
            return;
        }
        let listeners = self.dropped_listeners.snapshot();
        for item in dropped {
            for listener in &listeners {
                listener(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::types::SyncResponse;
    use async_trait::async_trait;
    use greenmate_core::storage::MemoryStore;
    use greenmate_core::sync::{
        CareLogPayload, NotePayload, PlantPayload, ResourceType, SyncAction, SyncPriority,
    };
    use serde_json::Value;
    use std::collections::HashSet;

    #[derive(Default)]
    struct MockTransport {
        calls: Mutex<Vec<SyncRequest>>,
        failing: Mutex<HashSet<String>>,
        fail_all: AtomicBool,
        delay: Option<Duration>,
    }

    impl MockTransport {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        fn fail_item(&self, id: &str) {
            self.failing.lock().unwrap().insert(id.to_string());
        }

        fn called_ids(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.item_id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SyncTransport for MockTransport {
        async fn send(&self, request: SyncRequest) -> Result<SyncResponse> {
            self.calls.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_all.load(Ordering::SeqCst)
                || self.failing.lock().unwrap().contains(&request.item_id)
            {
                return Err(SyncError::api(500, "boom"));
            }
            Ok(SyncResponse {
                status: 201,
                body: Value::Null,
            })
        }
    }

    struct Harness {
        queue: Arc<OfflineSyncQueue>,
        transport: Arc<MockTransport>,
        network: NetworkStatus,
        store: Arc<MemoryStore>,
    }

    fn harness_with(config: SyncConfig, transport: MockTransport, store: MemoryStore) -> Harness {
        let store = Arc::new(store);
        let transport = Arc::new(transport);
        let network = NetworkStatus::new(false);
        let queue = Arc::new(OfflineSyncQueue::new(
            config,
            store.clone(),
            transport.clone(),
            &network,
        ));
        Harness {
            queue,
            transport,
            network,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(SyncConfig::default(), MockTransport::default(), MemoryStore::new())
    }

    fn note(id: &str) -> NewSyncItem {
        NewSyncItem::new(
            id,
            SyncAction::Create,
            NotePayload {
                title: Some(format!("note {}", id)),
                content: "repotted".to_string(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn enqueue_is_durable_across_restart() {
        let h = harness();
        h.queue.enqueue(note("a"));
        h.queue.enqueue(note("b"));
        h.queue.enqueue(note("c"));

        let reloaded = OfflineSyncQueue::new(
            SyncConfig::default(),
            h.store.clone(),
            h.transport.clone(),
            &h.network,
        );
        assert_eq!(reloaded.get_state().pending_items, 3);
        assert_eq!(
            reloaded.items().iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[tokio::test]
    async fn sync_all_while_offline_is_a_noop() {
        let h = harness();
        h.queue.enqueue(note("a"));

        let summary = h.queue.sync_all().await;

        assert_eq!(summary, SyncSummary::default());
        assert!(h.transport.called_ids().is_empty());
        assert_eq!(h.queue.get_state().pending_items, 1);
    }

    #[tokio::test]
    async fn overlapping_flushes_only_run_once() {
        let h = harness_with(
            SyncConfig::default(),
            MockTransport::with_delay(Duration::from_millis(50)),
            MemoryStore::new(),
        );
        h.queue.enqueue(note("a"));
        h.network.set_online(true);

        let (first, second) = tokio::join!(h.queue.sync_all(), h.queue.sync_all());

        assert_eq!(first.success, 1);
        assert_eq!(second, SyncSummary::default());
        assert_eq!(h.transport.called_ids(), vec!["a"]);
        assert!(!h.queue.is_sync_in_progress());
    }

    #[tokio::test]
    async fn flush_orders_by_priority_then_age() {
        let h = harness_with(
            SyncConfig::default().with_batch_size(1),
            MockTransport::default(),
            MemoryStore::new(),
        );
        h.queue.enqueue(note("low").with_priority(SyncPriority::Low));
        h.queue.enqueue(note("high").with_priority(SyncPriority::High));
        h.queue.enqueue(note("normal-1"));
        h.queue.enqueue(note("normal-2").with_priority(SyncPriority::Normal));
        h.network.set_online(true);

        let summary = h.queue.sync_all().await;

        assert_eq!(summary.success, 4);
        assert_eq!(
            h.transport.called_ids(),
            vec!["high", "normal-1", "normal-2", "low"]
        );
    }

    #[tokio::test]
    async fn synced_items_are_never_resent() {
        let h = harness();
        h.queue.enqueue(note("a"));
        h.network.set_online(true);

        assert_eq!(h.queue.sync_all().await.success, 1);
        assert_eq!(h.queue.sync_all().await, SyncSummary::default());

        assert_eq!(h.transport.called_ids(), vec!["a"]);
        let info = h.queue.get_queue_info();
        assert_eq!(info.synced, 1);
        assert_eq!(info.unsynced, 0);
        assert!(h.queue.get_state().last_sync.is_some());
    }

    #[tokio::test]
    async fn exhausted_items_are_dropped_and_reported() {
        let h = harness();
        h.transport.fail_all.store(true, Ordering::SeqCst);
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let sink = dropped.clone();
        let _sub = h
            .queue
            .on_item_dropped(move |item| sink.lock().unwrap().push(item.id.clone()));

        h.queue.enqueue(note("poison"));
        h.network.set_online(true);

        h.queue.sync_all().await;
        h.queue.sync_all().await;
        let items = h.queue.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].retry_count, 2);
        assert_eq!(items[0].last_error.as_deref(), Some("API error (500): boom"));
        assert_eq!(h.queue.get_queue_info().failed, 1);

        let summary = h.queue.sync_all().await;
        assert_eq!(summary.failed, 1);
        assert!(h.queue.items().is_empty());
        assert_eq!(h.queue.get_queue_info().unsynced, 0);
        assert_eq!(*dropped.lock().unwrap(), vec!["poison".to_string()]);
    }

    #[tokio::test]
    async fn update_without_resource_id_fails_without_network_call() {
        let h = harness();
        h.queue
            .enqueue(NewSyncItem::new("upd", SyncAction::Update, PlantPayload::default()));
        h.network.set_online(true);

        let summary = h.queue.sync_all().await;

        assert_eq!(summary.failed, 1);
        assert!(h.transport.called_ids().is_empty());
        assert_eq!(h.queue.items()[0].retry_count, 1);
    }

    #[tokio::test]
    async fn duplicate_id_gets_fresh_id() {
        let h = harness();
        let first = h.queue.enqueue(note("same"));
        let second = h.queue.enqueue(note("same"));

        assert_eq!(first, "same");
        assert_ne!(second, "same");
        let ids: HashSet<String> = h.queue.items().into_iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn subscribers_see_changes_until_unsubscribed() {
        let h = harness();
        let seen = Arc::new(Mutex::new(Vec::<OfflineState>::new()));
        let sink = seen.clone();
        let sub = h
            .queue
            .subscribe(move |state| sink.lock().unwrap().push(state.clone()));

        h.queue.enqueue(note("a"));
        h.network.set_online(true);
        h.queue.sync_all().await;

        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 3);
            assert_eq!(seen[0].pending_items, 1);
            assert!(!seen[0].is_online);
            assert!(seen[1].sync_in_progress);
            assert!(!seen[2].sync_in_progress);
            assert_eq!(seen[2].pending_items, 0);
        }

        sub.unsubscribe();
        h.queue.enqueue(note("b"));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn corrupt_persisted_queue_starts_empty() {
        let store = MemoryStore::new();
        store.set(QUEUE_STORAGE_KEY, "{not json").unwrap();
        let h = harness_with(SyncConfig::default(), MockTransport::default(), store);

        assert_eq!(h.queue.get_queue_info().total, 0);
        h.queue.enqueue(note("a"));
        assert_eq!(h.queue.get_queue_info().total, 1);
    }

    fn synced_item(id: &str, age: chrono::Duration) -> SyncItem {
        let created = Utc::now() - age;
        let mut item = SyncItem::new(
            NewSyncItem::new(
                id,
                SyncAction::Create,
                CareLogPayload {
                    plant_id: "plant-1".to_string(),
                    notes: Some("x".repeat(200)),
                    ..Default::default()
                },
            ),
            created,
        );
        item.mark_synced(created);
        item
    }

    #[tokio::test]
    async fn over_budget_write_forces_cleanup_of_synced_items() {
        let seeded: Vec<SyncItem> = (0..10)
            .map(|i| synced_item(&format!("old-{}", i), chrono::Duration::days(2)))
            .collect();
        let seeded_json = serde_json::to_string(&seeded).unwrap();
        let store = MemoryStore::new();
        store.set(QUEUE_STORAGE_KEY, &seeded_json).unwrap();

        let config = SyncConfig::default().with_storage_budget(seeded_json.len());
        let h = harness_with(config, MockTransport::default(), store);
        let id = h.queue.enqueue(note("fresh"));

        let persisted: Vec<SyncItem> =
            serde_json::from_str(&h.store.get(QUEUE_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, id);
        assert_eq!(persisted[0].resource_type(), ResourceType::Note);
    }

    #[tokio::test]
    async fn quota_error_triggers_cleanup_and_single_retry() {
        let seeded: Vec<SyncItem> = (0..5)
            .map(|i| synced_item(&format!("old-{}", i), chrono::Duration::hours(1)))
            .collect();
        let seeded_json = serde_json::to_string(&seeded).unwrap();
        let store = MemoryStore::with_capacity(seeded_json.len() + 16);
        store.set(QUEUE_STORAGE_KEY, &seeded_json).unwrap();

        let h = harness_with(SyncConfig::default(), MockTransport::default(), store);
        h.queue.enqueue(note("fresh"));

        let persisted: Vec<SyncItem> =
            serde_json::from_str(&h.store.get(QUEUE_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(
            persisted.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["fresh"]
        );
    }

    #[tokio::test]
    async fn regular_cleanup_keeps_recent_synced_items() {
        let seeded = vec![
            synced_item("stale", chrono::Duration::hours(25)),
            synced_item("recent", chrono::Duration::hours(1)),
        ];
        let store = MemoryStore::new();
        store
            .set(QUEUE_STORAGE_KEY, &serde_json::to_string(&seeded).unwrap())
            .unwrap();
        let h = harness_with(SyncConfig::default(), MockTransport::default(), store);
        h.network.set_online(true);

        h.queue.sync_all().await;

        let ids: Vec<String> = h.queue.items().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["recent".to_string()]);
    }

    #[tokio::test]
    async fn clear_all_erases_persisted_state() {
        let h = harness();
        h.queue.enqueue(note("a"));
        h.network.set_online(true);
        h.queue.sync_all().await;
        assert!(h.store.get(LAST_SYNC_STORAGE_KEY).unwrap().is_some());

        h.queue.clear_all().expect("clear");

        assert_eq!(h.queue.get_queue_info(), QueueInfo::default());
        assert_eq!(h.queue.get_state().last_sync, None);
        assert_eq!(h.store.get(QUEUE_STORAGE_KEY).unwrap(), None);
        assert_eq!(h.store.get(LAST_SYNC_STORAGE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn clear_all_stops_a_running_flush() {
        let h = harness_with(
            SyncConfig::default().with_batch_size(1),
            MockTransport::with_delay(Duration::from_millis(30)),
            MemoryStore::new(),
        );
        h.queue.enqueue(note("a"));
        h.queue.enqueue(note("b"));
        h.queue.enqueue(note("c"));
        h.network.set_online(true);

        let queue = Arc::clone(&h.queue);
        let flush = tokio::spawn(async move { queue.sync_all().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.queue.clear_all().expect("clear");
        flush.await.expect("flush task");

        assert_eq!(h.transport.called_ids(), vec!["a"]);
        assert!(h.queue.items().is_empty());
        assert_eq!(h.queue.get_state().last_sync, None);
        assert_eq!(h.store.get(QUEUE_STORAGE_KEY).unwrap(), None);
        assert_eq!(h.store.get(LAST_SYNC_STORAGE_KEY).unwrap(), None);
        assert!(!h.queue.is_sync_in_progress());
    }

    #[tokio::test]
    async fn items_dropped_by_forced_cleanup_mid_flush_are_not_sent() {
        let now = Utc::now();
        let seeded = vec![
            SyncItem::new(note("fresh").with_priority(SyncPriority::High), now),
            SyncItem::new(
                note("stale").with_priority(SyncPriority::Low),
                now - chrono::Duration::days(8),
            ),
        ];
        let store = MemoryStore::new();
        store
            .set(QUEUE_STORAGE_KEY, &serde_json::to_string(&seeded).unwrap())
            .unwrap();
        let config = SyncConfig::default()
            .with_batch_size(1)
            .with_storage_budget(1);
        let h = harness_with(config, MockTransport::default(), store);
        let dropped = Arc::new(Mutex::new(Vec::new()));
        let sink = dropped.clone();
        let _sub = h
            .queue
            .on_item_dropped(move |item| sink.lock().unwrap().push(item.id.clone()));
        h.network.set_online(true);

        let summary = h.queue.sync_all().await;

        assert_eq!(summary, SyncSummary { success: 1, failed: 0 });
        assert_eq!(h.transport.called_ids(), vec!["fresh"]);
        assert_eq!(*dropped.lock().unwrap(), vec!["stale".to_string()]);
        assert!(h.queue.items().is_empty());
    }

    #[tokio::test]
    async fn partial_batch_failure_is_recorded_per_item() {
        let h = harness();
        h.transport.fail_item("bad");
        h.queue.enqueue(note("good"));
        h.queue.enqueue(note("bad"));
        h.network.set_online(true);

        let summary = h.queue.sync_all().await;

        assert_eq!(summary, SyncSummary { success: 1, failed: 1 });
        let items = h.queue.items();
        let bad = items.iter().find(|i| i.id == "bad").unwrap();
        assert!(!bad.synced);
        assert_eq!(bad.retry_count, 1);
        assert!(bad.last_attempt.is_some());
    }
}
