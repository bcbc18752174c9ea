//! The world manager: zone lifecycle, composite queries, global ticks.
//!
//! The manager orchestrates the layered world. It starts and stops the
//! full set of layer actors for a zone, answers composite spatial queries
//! by fanning out to every layer of a zone concurrently, and emits the
//! global world tick both to a broadcast channel (consumed by the
//! UI/command layer) and to every registered layer actor.
//!
//! # Zone creation is all-or-nothing *reporting*, not rollback
//!
//! `create_zone` starts one layer actor per required layer. If any layer
//! fails to start, the error identifies that layer and the layers already
//! started stay registered -- the caller decides whether to tear them
//! down with `destroy_zone`. Nothing is rolled back automatically.
//!
//! # Layer restarts
//!
//! Layer actors are reconstructible purely from the loader, so a crashed
//! layer actor is restarted unconditionally: a monitor task reloads its
//! seed, re-registers a fresh handle, and keeps watching.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use thicket_types::{LayerEntity, LayerEntityId, LayerName, TickData, WorldLayer};
use thicket_world::{LayerLoader, WorldError};

use crate::layer_actor::{self, LayerActorError, LayerHandle};
use crate::layer_registry::{LayerEvent, LayerRegistryError, LayerRegistryHandle};

/// Capacity of the broadcast channel for global tick events.
///
/// A subscriber that falls behind by more than this many ticks receives a
/// lag error and skips to the newest event.
const TICK_BROADCAST_CAPACITY: usize = 256;

/// Errors that can occur during world manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The zone already has registered layers.
    #[error("zone already exists: {0}")]
    ZoneExists(String),

    /// The zone has no registered layers.
    #[error("zone not found: {0}")]
    ZoneNotFound(String),

    /// A layer failed to start during zone creation. Layers started
    /// before it remain registered.
    #[error("layer {layer} of zone {zone} failed to start: {source}")]
    LayerStartFailed {
        /// The zone being created.
        zone: String,
        /// The first layer that failed.
        layer: LayerName,
        /// Why it failed to start.
        #[source]
        source: WorldError,
    },

    /// A freshly started layer could not be registered.
    #[error("layer {layer} of zone {zone} failed to register: {source}")]
    LayerRegisterFailed {
        /// The zone being created.
        zone: String,
        /// The layer that failed to register.
        layer: LayerName,
        /// The registration failure.
        #[source]
        source: LayerRegistryError,
    },

    /// A layer failed to stop during zone destruction. The remaining
    /// layers were still stopped; this reports the first failure.
    #[error("layer {layer} of zone {zone} failed to stop: {source}")]
    LayerStopFailed {
        /// The zone being destroyed.
        zone: String,
        /// The first layer that failed to stop.
        layer: LayerName,
        /// The stop failure.
        #[source]
        source: LayerActorError,
    },

    /// A layer registry operation failed.
    #[error(transparent)]
    Registry(#[from] LayerRegistryError),

    /// The addressed layer actor is gone.
    #[error(transparent)]
    Layer(#[from] LayerActorError),
}

/// Configuration for creating one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneConfig {
    /// World seed for the zone's deterministic tick randomness.
    pub seed: u64,
    /// The layers to start, in order.
    pub layers: Vec<LayerName>,
    /// Whether layer actors run their own local interval timers. When
    /// `false` every layer's `tick_interval_ms` is forced to zero and the
    /// global world tick is the only clock.
    pub local_timers: bool,
}

impl ZoneConfig {
    /// All six layers, local timers enabled, with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            layers: LayerName::ALL.to_vec(),
            local_timers: true,
        }
    }

    /// Restrict the zone to a subset of layers.
    #[must_use]
    pub fn with_layers(mut self, layers: Vec<LayerName>) -> Self {
        self.layers = layers;
        self
    }

    /// Disable the per-layer local timers, leaving the global tick as the
    /// single clock.
    #[must_use]
    pub const fn without_local_timers(mut self) -> Self {
        self.local_timers = false;
        self
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Top-level orchestrator for the layered world.
#[derive(Clone)]
pub struct WorldManager {
    /// Directory of live layer actors.
    registry: LayerRegistryHandle,
    /// Source of layer content.
    loader: Arc<dyn LayerLoader>,
    /// Broadcast channel for global tick events (UI consumption).
    events: broadcast::Sender<TickData>,
}

impl WorldManager {
    /// Create a manager over a layer registry and a loader.
    pub fn new(registry: LayerRegistryHandle, loader: Arc<dyn LayerLoader>) -> Self {
        let (events, _initial_rx) = broadcast::channel(TICK_BROADCAST_CAPACITY);
        Self {
            registry,
            loader,
            events,
        }
    }

    /// Subscribe to the global tick broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<TickData> {
        self.events.subscribe()
    }

    /// The layer registry this manager orchestrates.
    pub const fn registry(&self) -> &LayerRegistryHandle {
        &self.registry
    }

    // -------------------------------------------------------------------
    // Zone lifecycle
    // -------------------------------------------------------------------

    /// Create a zone: start one layer actor per required layer.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ZoneExists`] if the zone already has
    /// layers, or a [`ManagerError::LayerStartFailed`] /
    /// [`ManagerError::LayerRegisterFailed`] identifying the first layer
    /// that failed. Layers started before the failure remain registered;
    /// there is no automatic rollback.
    pub async fn create_zone(&self, zone: &str, config: &ZoneConfig) -> Result<(), ManagerError> {
        if self.registry.count_for_zone(zone).await? > 0 {
            return Err(ManagerError::ZoneExists(zone.to_owned()));
        }

        for layer in &config.layers {
            self.start_layer(*layer, zone, config).await?;
        }
        info!(zone, layers = config.layers.len(), "Zone created");
        Ok(())
    }

    /// Destroy a zone: stop and unregister every layer actor.
    ///
    /// All layers are stopped even if some fail; the first failure
    /// encountered is reported.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ZoneNotFound`] if the zone has no layers,
    /// or [`ManagerError::LayerStopFailed`] for the first layer whose
    /// stop failed.
    pub async fn destroy_zone(&self, zone: &str) -> Result<(), ManagerError> {
        let layers = self.registry.layers_for_zone(zone).await?;
        if layers.is_empty() {
            return Err(ManagerError::ZoneNotFound(zone.to_owned()));
        }

        let mut first_failure = None;
        for (layer, handle) in layers {
            if let Err(source) = handle.stop().await
                && first_failure.is_none()
            {
                first_failure = Some(ManagerError::LayerStopFailed {
                    zone: zone.to_owned(),
                    layer,
                    source,
                });
            }
            if let Err(err) = self.registry.unregister(layer, zone).await {
                warn!(%layer, zone, %err, "Layer unregistration failed during zone destruction");
            }
        }
        info!(zone, "Zone destroyed");
        first_failure.map_or(Ok(()), Err)
    }

    /// The layer descriptors registered for a zone.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ZoneNotFound`] if the zone has no layers.
    pub async fn get_zone_layers(&self, zone: &str) -> Result<Vec<WorldLayer>, ManagerError> {
        let descriptors = self.registry.descriptors_for_zone(zone).await?;
        if descriptors.is_empty() {
            return Err(ManagerError::ZoneNotFound(zone.to_owned()));
        }
        Ok(descriptors)
    }

    // -------------------------------------------------------------------
    // Composite spatial queries
    // -------------------------------------------------------------------

    /// The character every layer of a zone shows at `(x, y)`.
    ///
    /// Layers whose map does not cover the cell (or whose actor is gone)
    /// are omitted from the result.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ZoneNotFound`] if the zone has no layers.
    pub async fn get_position_view(
        &self,
        zone: &str,
        x: u32,
        y: u32,
    ) -> Result<BTreeMap<LayerName, char>, ManagerError> {
        let layers = self.zone_layers(zone).await?;
        let queries = layers.into_iter().map(|(layer, handle)| async move {
            (layer, handle.get_at(x, y).await)
        });

        let mut view = BTreeMap::new();
        for (layer, result) in join_all(queries).await {
            match result {
                Ok(Some(ch)) => {
                    view.insert(layer, ch);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(%layer, zone, %err, "Layer query failed during position view");
                }
            }
        }
        Ok(view)
    }

    /// The region every layer of a zone shows at `(x, y, w, h)`.
    ///
    /// Layers for which the region exceeds the map (or whose actor is
    /// gone) are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ZoneNotFound`] if the zone has no layers.
    pub async fn get_region_view(
        &self,
        zone: &str,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<BTreeMap<LayerName, Vec<String>>, ManagerError> {
        let layers = self.zone_layers(zone).await?;
        let queries = layers.into_iter().map(|(layer, handle)| async move {
            (layer, handle.get_region(x, y, w, h).await)
        });

        let mut view = BTreeMap::new();
        for (layer, result) in join_all(queries).await {
            match result {
                Ok(region) if !region.is_empty() => {
                    view.insert(layer, region);
                }
                Ok(_empty) => {}
                Err(err) => {
                    warn!(%layer, zone, %err, "Layer query failed during region view");
                }
            }
        }
        Ok(view)
    }

    // -------------------------------------------------------------------
    // Mutation commands (UI/command layer surface)
    // -------------------------------------------------------------------

    /// Replace the character one layer of a zone shows at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ZoneNotFound`] if the (layer, zone) pair is
    /// not registered.
    pub async fn set_tile(
        &self,
        layer: LayerName,
        zone: &str,
        x: u32,
        y: u32,
        ch: char,
    ) -> Result<(), ManagerError> {
        let handle = self.layer_handle(layer, zone).await?;
        Ok(handle.set_at(x, y, ch).await?)
    }

    /// Add a dynamic entity to one layer of a zone.
    pub async fn add_entity_to_layer(
        &self,
        layer: LayerName,
        zone: &str,
        entity: LayerEntity,
    ) -> Result<(), ManagerError> {
        let handle = self.layer_handle(layer, zone).await?;
        Ok(handle.add_entity(entity).await?)
    }

    /// Remove a dynamic entity from one layer of a zone.
    pub async fn remove_entity_from_layer(
        &self,
        layer: LayerName,
        zone: &str,
        id: &LayerEntityId,
    ) -> Result<LayerEntity, ManagerError> {
        let handle = self.layer_handle(layer, zone).await?;
        Ok(handle.remove_entity(id).await?)
    }

    // -------------------------------------------------------------------
    // Ticks
    // -------------------------------------------------------------------

    /// Fan a world tick out to every registered layer actor. Returns the
    /// number of actors reached. The N deliveries are independent -- some
    /// layers may finish the tick before others start it.
    pub async fn process_world_tick(&self, tick: TickData) -> Result<usize, ManagerError> {
        Ok(self.registry.broadcast(LayerEvent::Tick(tick)).await?)
    }

    /// Emit a global tick: publish it on the broadcast channel and fan it
    /// out to every layer actor. Returns the number of layer actors
    /// reached.
    pub async fn emit_tick(&self, tick: TickData) -> Result<usize, ManagerError> {
        // send() errs only when no subscriber is connected, which is fine.
        let _ = self.events.send(tick.clone());
        self.process_world_tick(tick).await
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    /// Load, spawn, register, and monitor one layer actor.
    async fn start_layer(
        &self,
        layer: LayerName,
        zone: &str,
        config: &ZoneConfig,
    ) -> Result<(), ManagerError> {
        let (handle, descriptor, join) = spawn_layer_actor(
            &*self.loader,
            layer,
            zone,
            config.seed,
            config.local_timers,
        )
        .map_err(|source| ManagerError::LayerStartFailed {
            zone: zone.to_owned(),
            layer,
            source,
        })?;

        spawn_layer_monitor(LayerMonitor {
            join,
            layer,
            zone: zone.to_owned(),
            loader: Arc::clone(&self.loader),
            registry: self.registry.clone(),
            seed: config.seed,
            local_timers: config.local_timers,
        });

        self.registry
            .register(layer, zone, handle, descriptor)
            .await
            .map_err(|source| ManagerError::LayerRegisterFailed {
                zone: zone.to_owned(),
                layer,
                source,
            })
    }

    /// The layers of a zone, failing if there are none.
    async fn zone_layers(&self, zone: &str) -> Result<Vec<(LayerName, LayerHandle)>, ManagerError> {
        let layers = self.registry.layers_for_zone(zone).await?;
        if layers.is_empty() {
            return Err(ManagerError::ZoneNotFound(zone.to_owned()));
        }
        Ok(layers)
    }

    /// The handle for one (layer, zone) pair, failing if unregistered.
    async fn layer_handle(&self, layer: LayerName, zone: &str) -> Result<LayerHandle, ManagerError> {
        self.registry
            .lookup(layer, zone)
            .await?
            .map(|registration| registration.handle)
            .ok_or_else(|| ManagerError::ZoneNotFound(zone.to_owned()))
    }
}

/// Load a layer's seed and spawn its actor task.
fn spawn_layer_actor(
    loader: &dyn LayerLoader,
    layer: LayerName,
    zone: &str,
    seed: u64,
    local_timers: bool,
) -> Result<(LayerHandle, WorldLayer, JoinHandle<()>), WorldError> {
    let layer_seed = loader.load_layer(layer, zone)?;
    let mut state = layer_seed.into_state()?;
    if !local_timers {
        state.descriptor.tick_interval_ms = 0;
    }
    let descriptor = state.descriptor.clone();
    let (handle, mailbox) = layer_actor::open_mailbox(layer, zone);
    let join = tokio::spawn(layer_actor::run_layer_actor(state, seed, mailbox));
    Ok((handle, descriptor, join))
}

/// Everything a layer monitor needs to restart its subject.
struct LayerMonitor {
    join: JoinHandle<()>,
    layer: LayerName,
    zone: String,
    loader: Arc<dyn LayerLoader>,
    registry: LayerRegistryHandle,
    seed: u64,
    local_timers: bool,
}

/// Watch a layer actor and restart it unconditionally on crash.
///
/// The restarted actor reloads its seed from the loader; in-memory edits
/// since the last external save are lost by design. A graceful stop (or
/// a failed reload) ends the monitor.
fn spawn_layer_monitor(mut monitor: LayerMonitor) {
    tokio::spawn(async move {
        loop {
            match (&mut monitor.join).await {
                Ok(()) => break,
                Err(err) if err.is_panic() => {
                    warn!(
                        layer = %monitor.layer,
                        zone = monitor.zone,
                        "Layer actor crashed; restarting from loader"
                    );
                    let _ = monitor
                        .registry
                        .unregister(monitor.layer, &monitor.zone)
                        .await;

                    match spawn_layer_actor(
                        &*monitor.loader,
                        monitor.layer,
                        &monitor.zone,
                        monitor.seed,
                        monitor.local_timers,
                    ) {
                        Ok((handle, descriptor, join)) => {
                            if let Err(register_err) = monitor
                                .registry
                                .register(monitor.layer, &monitor.zone, handle, descriptor)
                                .await
                            {
                                warn!(
                                    layer = %monitor.layer,
                                    zone = monitor.zone,
                                    %register_err,
                                    "Restarted layer could not re-register"
                                );
                                break;
                            }
                            info!(
                                layer = %monitor.layer,
                                zone = monitor.zone,
                                "Layer actor restarted"
                            );
                            monitor.join = join;
                        }
                        Err(reload_err) => {
                            warn!(
                                layer = %monitor.layer,
                                zone = monitor.zone,
                                %reload_err,
                                "Layer reload failed; giving up on restart"
                            );
                            break;
                        }
                    }
                }
                Err(_cancelled) => break,
            }
        }
    });
}
