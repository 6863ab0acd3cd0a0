//! Background flush triggers: connectivity transitions and the periodic timer.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use greenmate_core::sync::{backoff_seconds, SyncCycleTrigger, SyncSummary};

use crate::queue::OfflineSyncQueue;

#[derive(Debug, Default)]
pub struct SyncRuntimeState {
    pub background_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncRuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_running(&self) -> bool {
        self.background_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Flushes that failed everything they attempted, in a row.
fn next_failure_streak(streak: u32, summary: SyncSummary) -> u32 {
    if summary.failed > 0 && summary.success == 0 {
        streak.saturating_add(1)
    } else if summary.attempted() > 0 {
        0
    } else {
        streak
    }
}

fn periodic_delay(interval: Duration, jitter_bound: Duration, failure_streak: u32) -> Duration {
    let jitter_ms = match u64::try_from(jitter_bound.as_millis()).unwrap_or(u64::MAX) {
        0 => 0,
        bound => rand::thread_rng().gen_range(0..=bound),
    };
    let backoff = if failure_streak > 0 {
        Duration::from_secs(backoff_seconds(failure_streak))
    } else {
        Duration::ZERO
    };
    interval + backoff + Duration::from_millis(jitter_ms)
}

pub async fn ensure_background_engine_started(
    queue: Arc<OfflineSyncQueue>,
    runtime: Arc<SyncRuntimeState>,
) {
    let mut guard = runtime.background_task.lock().await;
    if let Some(handle) = guard.as_ref() {
        if !handle.is_finished() {
            return;
        }
        guard.take();
    }

    let handle = tokio::spawn(async move {
        let mut network = queue.network_watch();
        let mut was_online = *network.borrow_and_update();
        let mut signal_open = true;
        let mut failure_streak: u32 = 0;
        // First tick picks up whatever an earlier session left behind.
        let mut next_tick = Instant::now();
        info!(
            "[OfflineSync] Background engine started ({})",
            if was_online { "online" } else { "offline" }
        );

        loop {
            tokio::select! {
                changed = network.changed(), if signal_open => {
                    if changed.is_err() {
                        debug!("[OfflineSync] Network signal closed; periodic flushes only");
                        signal_open = false;
                        continue;
                    }
                    let online = *network.borrow_and_update();
                    if online == was_online {
                        continue;
                    }
                    was_online = online;
                    let summary = queue.handle_connectivity_change(online).await;
                    failure_streak = next_failure_streak(failure_streak, summary);
                }
                _ = tokio::time::sleep_until(next_tick) => {
                    if queue.is_online() && !queue.is_sync_in_progress() && queue.pending_count() > 0 {
                        let summary = queue.flush(SyncCycleTrigger::Periodic).await;
                        failure_streak = next_failure_streak(failure_streak, summary);
                        if failure_streak > 0 {
                            debug!(
                                "[OfflineSync] {} consecutive failed flush(es); backing off {}s",
                                failure_streak,
                                backoff_seconds(failure_streak)
                            );
                        }
                    }
                    // Connectivity wakeups leave this deadline alone.
                    next_tick = Instant::now()
                        + periodic_delay(
                            queue.config().sync_interval,
                            queue.config().sync_jitter,
                            failure_streak,
                        );
                }
            }
        }
    });
    *guard = Some(handle);
}

pub async fn ensure_background_engine_stopped(runtime: Arc<SyncRuntimeState>) {
    let mut guard = runtime.background_task.lock().await;
    if let Some(handle) = guard.take() {
        handle.abort();
        info!("[OfflineSync] Background engine stopped");
    }
}
