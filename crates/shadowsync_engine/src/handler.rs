//! Sync handler: the façade over queue, strategy and policy.

use crate::cloud::{CloudDataPlane, CloudSubscriptions, NoopSubscriptions};
use crate::config::{Direction, EngineConfig, StrategyConfig, SyncConfiguration};
use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::queue::RequestQueue;
use crate::request::SyncRequest;
use crate::strategy::{build_strategy, SyncStrategy};
use parking_lot::RwLock;
use serde_json::Value;
use shadowsync_document::ShadowKey;
use shadowsync_store::{ShadowStore, SyncInformation};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinates shadow syncing between the local store and the cloud.
///
/// External collaborators push edge events here; the handler filters them
/// by synced-set membership and direction, turns them into requests and
/// feeds the active strategy. It also owns lifecycle: strategy swaps,
/// direction changes, connectivity transitions and configuration reloads,
/// each of which re-seeds a full sync.
///
/// The handler is an owned root object: construct it at startup and share
/// it by reference. Push methods never fail; a request that may not be
/// enqueued is silently dropped.
pub struct SyncHandler {
    engine: EngineConfig,
    queue: Arc<RequestQueue>,
    strategy: RwLock<Arc<dyn SyncStrategy>>,
    strategy_config: RwLock<StrategyConfig>,
    direction: Arc<RwLock<Direction>>,
    synced: RwLock<HashSet<ShadowKey>>,
    context: RwLock<Option<Arc<SyncContext>>>,
    parallelism: RwLock<usize>,
    subscriptions: Arc<dyn CloudSubscriptions>,
}

impl SyncHandler {
    /// Creates a handler with the realtime strategy selected.
    pub fn new(engine: EngineConfig) -> Self {
        let queue = Arc::new(RequestQueue::new(engine.queue_capacity));
        let strategy_config = StrategyConfig::default();
        let strategy = build_strategy(&strategy_config, Arc::clone(&queue), &engine);
        Self {
            engine,
            queue,
            strategy: RwLock::new(strategy),
            strategy_config: RwLock::new(strategy_config),
            direction: Arc::new(RwLock::new(Direction::default())),
            synced: RwLock::new(HashSet::new()),
            context: RwLock::new(None),
            parallelism: RwLock::new(crate::config::DEFAULT_PARALLELISM),
            subscriptions: Arc::new(NoopSubscriptions),
        }
    }

    /// Attaches a cloud subscription control.
    pub fn with_subscriptions(mut self, subscriptions: Arc<dyn CloudSubscriptions>) -> Self {
        self.subscriptions = subscriptions;
        self
    }

    /// The current sync direction.
    pub fn direction(&self) -> Direction {
        *self.direction.read()
    }

    /// Returns true if the shadow is in the synced set.
    pub fn is_shadow_synced(&self, key: &ShadowKey) -> bool {
        self.synced.read().contains(key)
    }

    /// Returns true if a fatal error stopped the active strategy.
    pub fn is_errored(&self) -> bool {
        self.active_strategy().is_errored()
    }

    /// Starts syncing: ensures bookkeeping rows exist for every synced
    /// shadow, starts the strategy and seeds a full sync.
    pub fn start(
        &self,
        store: Arc<dyn ShadowStore>,
        cloud: Arc<dyn CloudDataPlane>,
        parallelism: usize,
    ) -> SyncResult<()> {
        let context = Arc::new(
            SyncContext::new(store, cloud).with_direction(Arc::clone(&self.direction)),
        );
        *self.context.write() = Some(Arc::clone(&context));
        *self.parallelism.write() = parallelism;

        self.ensure_sync_rows(&context);
        if self.direction().allows_device_bound() {
            self.subscriptions.subscribe();
        }
        self.active_strategy().start(context, parallelism)?;
        self.seed_full_sync();
        info!(parallelism, "shadow sync started");
        Ok(())
    }

    /// Stops the active strategy. Queued requests are kept.
    pub fn stop(&self) {
        self.active_strategy().stop();
        info!("shadow sync stopped");
    }

    /// Stops everything, swaps the strategy and restarts with a seed.
    pub fn set_strategy(&self, config: StrategyConfig) -> SyncResult<()> {
        if *self.strategy_config.read() == config {
            return Ok(());
        }
        self.swap_strategy(config)?;
        if self.context.read().is_some() {
            self.seed_full_sync();
        }
        Ok(())
    }

    /// Records a new direction, adjusts cloud subscriptions at the
    /// transition edges and re-seeds.
    pub fn set_direction(&self, direction: Direction) {
        if self.apply_direction(direction) && self.context.read().is_some() {
            self.seed_full_sync();
        }
    }

    /// Applies a configuration snapshot: diffs the synced set, the
    /// strategy and the direction, applies each difference, then re-seeds.
    pub fn apply_configuration(&self, snapshot: &SyncConfiguration) -> SyncResult<()> {
        let new_keys: HashSet<ShadowKey> = snapshot.synced_shadows.iter().cloned().collect();
        let (added, removed) = {
            let mut synced = self.synced.write();
            let added: Vec<_> = new_keys.difference(&synced).cloned().collect();
            let removed: Vec<_> = synced.difference(&new_keys).cloned().collect();
            *synced = new_keys;
            (added, removed)
        };
        *self.parallelism.write() = snapshot.parallelism;

        let context = self.context.read().clone();
        if let Some(context) = &context {
            for key in &added {
                if let Err(err) = context
                    .store()
                    .upsert_sync_info_if_absent(SyncInformation::initial(key.clone()))
                {
                    warn!(key = %key, error = %err, "failed to create sync information row");
                }
            }
            for key in &removed {
                if let Err(err) = context.store().delete_sync_info(key) {
                    warn!(key = %key, error = %err, "failed to delete sync information row");
                }
            }
        }

        let strategy_changed = *self.strategy_config.read() != snapshot.strategy;
        if strategy_changed {
            self.swap_strategy(snapshot.strategy)?;
        }
        let direction_changed = self.apply_direction(snapshot.direction);

        if context.is_some()
            && (strategy_changed || direction_changed || !added.is_empty() || !removed.is_empty())
        {
            self.seed_full_sync();
        }
        debug!(
            added = added.len(),
            removed = removed.len(),
            strategy_changed,
            direction_changed,
            "configuration snapshot applied"
        );
        Ok(())
    }

    /// Connectivity dropped: stop cloud subscriptions and the strategy.
    ///
    /// Requests keep queueing (and merging) while offline.
    pub fn on_connection_interrupted(&self) {
        self.subscriptions.unsubscribe();
        self.active_strategy().stop();
        info!("connection interrupted, shadow sync suspended");
    }

    /// Connectivity restored: restart the strategy and seed a full sync.
    pub fn on_connection_resumed(&self) {
        let Some(context) = self.context.read().clone() else {
            return;
        };
        if self.direction().allows_device_bound() {
            self.subscriptions.subscribe();
        }
        let parallelism = *self.parallelism.read();
        if let Err(err) = self.active_strategy().start(context, parallelism) {
            warn!(error = %err, "failed to restart sync strategy on reconnect");
            return;
        }
        self.seed_full_sync();
        info!("connection resumed, shadow sync restarted");
    }

    /// Queues a cloud update after a local shadow write.
    pub fn push_cloud_update(&self, key: ShadowKey, document: Value) {
        if !self.is_shadow_synced(&key) {
            debug!(key = %key, "ignoring update for unsynced shadow");
            return;
        }
        if !self.direction().allows_cloud_bound() {
            debug!(key = %key, "direction forbids device-to-cloud updates");
            return;
        }
        self.put(SyncRequest::CloudUpdate { key, document });
    }

    /// Queues a local update after a cloud shadow event.
    pub fn push_local_update(&self, key: ShadowKey, document: Vec<u8>) {
        if !self.is_shadow_synced(&key) {
            debug!(key = %key, "ignoring update for unsynced shadow");
            return;
        }
        if !self.direction().allows_device_bound() {
            debug!(key = %key, "direction forbids cloud-to-device updates");
            return;
        }
        self.put(SyncRequest::LocalUpdate { key, document });
    }

    /// Queues a cloud delete after a local shadow delete.
    pub fn push_cloud_delete(&self, key: ShadowKey) {
        if !self.is_shadow_synced(&key) {
            debug!(key = %key, "ignoring delete for unsynced shadow");
            return;
        }
        if !self.direction().allows_cloud_bound() {
            debug!(key = %key, "direction forbids device-to-cloud deletes");
            return;
        }
        self.put(SyncRequest::CloudDelete { key });
    }

    /// Queues a local delete after a cloud shadow delete event.
    pub fn push_local_delete(&self, key: ShadowKey, payload: Vec<u8>) {
        if !self.is_shadow_synced(&key) {
            debug!(key = %key, "ignoring delete for unsynced shadow");
            return;
        }
        if !self.direction().allows_device_bound() {
            debug!(key = %key, "direction forbids cloud-to-device deletes");
            return;
        }
        self.put(SyncRequest::LocalDelete { key, payload });
    }

    /// Number of requests currently queued.
    pub fn queued_requests(&self) -> usize {
        self.queue.len()
    }

    fn active_strategy(&self) -> Arc<dyn SyncStrategy> {
        Arc::clone(&self.strategy.read())
    }

    fn put(&self, request: SyncRequest) {
        let strategy = self.active_strategy();
        if let Err(err) = strategy.put(request) {
            debug!(error = %err, "dropping sync request, queue unavailable");
        }
    }

    /// Creates missing bookkeeping rows for the synced set.
    fn ensure_sync_rows(&self, context: &Arc<SyncContext>) {
        for key in self.synced.read().iter() {
            if let Err(err) = context
                .store()
                .upsert_sync_info_if_absent(SyncInformation::initial(key.clone()))
            {
                warn!(key = %key, error = %err, "failed to create sync information row");
            }
        }
    }

    /// Stops the current strategy and installs a fresh one over the same
    /// queue, restarting it if the handler is running.
    fn swap_strategy(&self, config: StrategyConfig) -> SyncResult<()> {
        let replacement = build_strategy(&config, Arc::clone(&self.queue), &self.engine);
        let previous = {
            let mut strategy = self.strategy.write();
            std::mem::replace(&mut *strategy, Arc::clone(&replacement))
        };
        previous.stop();
        *self.strategy_config.write() = config;

        if let Some(context) = self.context.read().clone() {
            replacement.start(context, *self.parallelism.read())?;
        }
        info!(kind = ?config.kind, "sync strategy swapped");
        Ok(())
    }

    /// Records the direction; returns true if it changed. Crossing into or
    /// out of `DeviceToCloud` toggles the cloud event subscriptions.
    fn apply_direction(&self, direction: Direction) -> bool {
        let previous = {
            let mut current = self.direction.write();
            std::mem::replace(&mut *current, direction)
        };
        if previous == direction {
            return false;
        }
        if !previous.allows_device_bound() && direction.allows_device_bound() {
            self.subscriptions.subscribe();
        } else if previous.allows_device_bound() && !direction.allows_device_bound() {
            self.subscriptions.unsubscribe();
        }
        info!(?previous, current = ?direction, "sync direction changed");
        true
    }

    /// Clears the queue and enqueues one full-sync request per synced
    /// shadow, the variant picked by direction.
    fn seed_full_sync(&self) {
        let Some(context) = self.context.read().clone() else {
            return;
        };
        let strategy = self.active_strategy();
        strategy.clear();

        let shadows = match context.store().list_synced_shadows() {
            Ok(shadows) => shadows,
            Err(err) => {
                warn!(error = %err, "failed to list synced shadows for seeding");
                return;
            }
        };
        if shadows.is_empty() {
            debug!("no synced shadows, skipping full sync seed");
            return;
        }
        if shadows.len() > strategy.remaining_capacity() {
            warn!(
                shadows = shadows.len(),
                capacity = strategy.remaining_capacity(),
                "more shadows than space in the sync queue, seeding will block"
            );
        }

        let direction = self.direction();
        let count = shadows.len();
        for key in shadows {
            let request = match direction {
                Direction::BetweenDeviceAndCloud => SyncRequest::FullShadow { key },
                Direction::DeviceToCloud => SyncRequest::OverwriteCloud { key },
                Direction::CloudToDevice => SyncRequest::OverwriteLocal { key },
            };
            if strategy.put(request).is_err() {
                break;
            }
        }
        info!(count, ?direction, "seeded full sync for all shadows");
    }
}
