use std::sync::Arc;

use greenmate_core::network::NetworkStatus;
use greenmate_core::storage::KeyValueStore;

use crate::client::{HttpSyncClient, StoredTokenProvider, SyncTransport};
use crate::config::SyncConfig;
use crate::engine::{
    ensure_background_engine_started, ensure_background_engine_stopped, SyncRuntimeState,
};
use crate::queue::OfflineSyncQueue;

/// Application-session owner of the offline sync queue and its collaborators.
pub struct SyncContext {
    config: SyncConfig,
    store: Arc<dyn KeyValueStore>,
    network: Arc<NetworkStatus>,
    queue: Arc<OfflineSyncQueue>,
    runtime: Arc<SyncRuntimeState>,
}

impl SyncContext {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn KeyValueStore>,
        network: Arc<NetworkStatus>,
        transport: Arc<dyn SyncTransport>,
    ) -> Self {
        let queue = Arc::new(OfflineSyncQueue::new(
            config.clone(),
            Arc::clone(&store),
            transport,
            &network,
        ));
        Self {
            config,
            store,
            network,
            queue,
            runtime: Arc::new(SyncRuntimeState::new()),
        }
    }

    /// Wire the reqwest transport, reading the bearer token from `store`.
    pub fn with_http_transport(
        config: SyncConfig,
        store: Arc<dyn KeyValueStore>,
        network: Arc<NetworkStatus>,
    ) -> Self {
        let tokens = Arc::new(StoredTokenProvider::new(Arc::clone(&store)));
        let client = HttpSyncClient::with_timeout(&config.api_base_url, tokens, config.request_timeout);
        Self::new(config, store, network, Arc::new(client))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    pub fn network(&self) -> Arc<NetworkStatus> {
        Arc::clone(&self.network)
    }

    pub fn queue(&self) -> Arc<OfflineSyncQueue> {
        Arc::clone(&self.queue)
    }

    pub fn runtime(&self) -> Arc<SyncRuntimeState> {
        Arc::clone(&self.runtime)
    }

    pub async fn start_background_sync(&self) {
        ensure_background_engine_started(self.queue(), self.runtime()).await;
    }

    pub async fn stop_background_sync(&self) {
        ensure_background_engine_stopped(self.runtime()).await;
    }

    /// Stop flushing and erase everything queued for the signed-out user.
    pub async fn logout(&self) -> greenmate_core::Result<()> {
        self.stop_background_sync().await;
        self.queue.clear_all()
    }
}
