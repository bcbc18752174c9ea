//! The world layer registry: directory of live layer actors.
//!
//! Keyed by the structured `(layer, zone)` tuple -- never by a
//! synthesized string name -- the registry holds three consistent views
//! of the same facts: the primary map, a by-zone view, and a by-layer
//! view. Every register/unregister/update touches all three before the
//! operation completes, so no caller ever observes them disagreeing.
//!
//! [`LayerDirectory`] is the pure state; [`WorldLayerRegistry::spawn`]
//! wraps it in a mailbox service task (single owner, strict
//! serialization) and [`LayerRegistryHandle`] is the cloneable client.
//! Zone- and layer-scoped broadcasts deliver fire-and-forget events to
//! the registered actors.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use thicket_types::{LayerName, TickData, WorldLayer};

use crate::layer_actor::LayerHandle;

/// Mailbox capacity for the registry service.
const MAILBOX_CAPACITY: usize = 256;

/// Errors that can occur during layer registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerRegistryError {
    /// The (layer, zone) pair is already registered.
    #[error("layer already registered: ({layer}, {zone})")]
    AlreadyRegistered {
        /// The conflicting layer.
        layer: LayerName,
        /// The conflicting zone.
        zone: String,
    },

    /// The (layer, zone) pair is not registered.
    #[error("layer not registered: ({layer}, {zone})")]
    NotRegistered {
        /// The missing layer.
        layer: LayerName,
        /// The missing zone.
        zone: String,
    },

    /// The registry service task is gone.
    #[error("world layer registry service is not available")]
    Unavailable,
}

/// A fire-and-forget event deliverable to layer actors via broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerEvent {
    /// A world tick to process.
    Tick(TickData),
}

/// One registered layer actor: its handle plus descriptor metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRegistration {
    /// Handle to the layer actor.
    pub handle: LayerHandle,
    /// The layer's descriptor.
    pub metadata: WorldLayer,
}

/// The pure directory state: primary map plus by-zone and by-layer views.
#[derive(Debug, Default)]
pub struct LayerDirectory {
    /// Primary map keyed by the structured (layer, zone) tuple.
    primary: BTreeMap<(LayerName, String), LayerRegistration>,
    /// Layers present per zone.
    by_zone: BTreeMap<String, BTreeSet<LayerName>>,
    /// Zones present per layer.
    by_layer: BTreeMap<LayerName, BTreeSet<String>>,
}

impl LayerDirectory {
    /// Create an empty directory.
    pub const fn new() -> Self {
        Self {
            primary: BTreeMap::new(),
            by_zone: BTreeMap::new(),
            by_layer: BTreeMap::new(),
        }
    }

    /// Register a layer actor.
    ///
    /// # Errors
    ///
    /// Returns [`LayerRegistryError::AlreadyRegistered`] if the pair is
    /// taken.
    pub fn register(
        &mut self,
        layer: LayerName,
        zone: &str,
        handle: LayerHandle,
        metadata: WorldLayer,
    ) -> Result<(), LayerRegistryError> {
        let key = (layer, zone.to_owned());
        if self.primary.contains_key(&key) {
            return Err(LayerRegistryError::AlreadyRegistered {
                layer,
                zone: zone.to_owned(),
            });
        }
        self.by_zone.entry(zone.to_owned()).or_default().insert(layer);
        self.by_layer.entry(layer).or_default().insert(zone.to_owned());
        self.primary.insert(key, LayerRegistration { handle, metadata });
        Ok(())
    }

    /// Unregister a layer actor, removing it from all three views.
    ///
    /// # Errors
    ///
    /// Returns [`LayerRegistryError::NotRegistered`] if the pair is
    /// absent.
    pub fn unregister(
        &mut self,
        layer: LayerName,
        zone: &str,
    ) -> Result<LayerRegistration, LayerRegistryError> {
        let key = (layer, zone.to_owned());
        let registration = self
            .primary
            .remove(&key)
            .ok_or_else(|| LayerRegistryError::NotRegistered {
                layer,
                zone: zone.to_owned(),
            })?;

        if let Some(layers) = self.by_zone.get_mut(zone) {
            layers.remove(&layer);
            if layers.is_empty() {
                self.by_zone.remove(zone);
            }
        }
        if let Some(zones) = self.by_layer.get_mut(&layer) {
            zones.remove(zone);
            if zones.is_empty() {
                self.by_layer.remove(&layer);
            }
        }
        Ok(registration)
    }

    /// Look up one registration.
    pub fn lookup(&self, layer: LayerName, zone: &str) -> Option<&LayerRegistration> {
        self.primary.get(&(layer, zone.to_owned()))
    }

    /// Replace the descriptor metadata for a registered pair.
    ///
    /// # Errors
    ///
    /// Returns [`LayerRegistryError::NotRegistered`] if the pair is
    /// absent.
    pub fn update_metadata(
        &mut self,
        layer: LayerName,
        zone: &str,
        metadata: WorldLayer,
    ) -> Result<(), LayerRegistryError> {
        let registration = self
            .primary
            .get_mut(&(layer, zone.to_owned()))
            .ok_or_else(|| LayerRegistryError::NotRegistered {
                layer,
                zone: zone.to_owned(),
            })?;
        registration.metadata = metadata;
        Ok(())
    }

    /// The layers registered for a zone, with their handles, in layer
    /// order.
    pub fn layers_for_zone(&self, zone: &str) -> Vec<(LayerName, LayerHandle)> {
        self.by_zone
            .get(zone)
            .into_iter()
            .flatten()
            .filter_map(|layer| {
                self.primary
                    .get(&(*layer, zone.to_owned()))
                    .map(|registration| (*layer, registration.handle.clone()))
            })
            .collect()
    }

    /// The descriptors registered for a zone, in layer order.
    pub fn descriptors_for_zone(&self, zone: &str) -> Vec<WorldLayer> {
        self.by_zone
            .get(zone)
            .into_iter()
            .flatten()
            .filter_map(|layer| {
                self.primary
                    .get(&(*layer, zone.to_owned()))
                    .map(|registration| registration.metadata.clone())
            })
            .collect()
    }

    /// The zones a layer is registered in.
    pub fn zones_for_layer(&self, layer: LayerName) -> Vec<String> {
        self.by_layer
            .get(&layer)
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Every registration whose actor is currently alive.
    pub fn active(&self) -> Vec<(LayerName, String, LayerHandle)> {
        self.primary
            .iter()
            .filter(|(_, registration)| registration.handle.is_alive())
            .map(|((layer, zone), registration)| {
                (*layer, zone.clone(), registration.handle.clone())
            })
            .collect()
    }

    /// Total number of registrations.
    pub fn count(&self) -> usize {
        self.primary.len()
    }

    /// Number of layers registered for a zone.
    pub fn count_for_zone(&self, zone: &str) -> usize {
        self.by_zone.get(zone).map_or(0, BTreeSet::len)
    }

    /// Number of zones a layer is registered in.
    pub fn count_for_layer(&self, layer: LayerName) -> usize {
        self.by_layer.get(&layer).map_or(0, BTreeSet::len)
    }

    /// Deliver an event to every registration matching the filters.
    /// Returns the number of actors the event was handed to.
    fn deliver(
        &self,
        event: &LayerEvent,
        layer_filter: Option<LayerName>,
        zone_filter: Option<&str>,
    ) -> usize {
        let mut delivered: usize = 0;
        for ((layer, zone), registration) in &self.primary {
            if layer_filter.is_some_and(|wanted| wanted != *layer) {
                continue;
            }
            if zone_filter.is_some_and(|wanted| wanted != zone.as_str()) {
                continue;
            }
            match event {
                LayerEvent::Tick(tick) => {
                    registration.handle.process_world_tick(tick.clone());
                }
            }
            delivered = delivered.saturating_add(1);
        }
        delivered
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Messages processed by the layer registry service.
enum LayerRegistryCommand {
    Register {
        layer: LayerName,
        zone: String,
        handle: LayerHandle,
        metadata: WorldLayer,
        reply: oneshot::Sender<Result<(), LayerRegistryError>>,
    },
    Unregister {
        layer: LayerName,
        zone: String,
        reply: oneshot::Sender<Result<(), LayerRegistryError>>,
    },
    Lookup {
        layer: LayerName,
        zone: String,
        reply: oneshot::Sender<Option<LayerRegistration>>,
    },
    UpdateMetadata {
        layer: LayerName,
        zone: String,
        metadata: WorldLayer,
        reply: oneshot::Sender<Result<(), LayerRegistryError>>,
    },
    LayersForZone {
        zone: String,
        reply: oneshot::Sender<Vec<(LayerName, LayerHandle)>>,
    },
    DescriptorsForZone {
        zone: String,
        reply: oneshot::Sender<Vec<WorldLayer>>,
    },
    ZonesForLayer {
        layer: LayerName,
        reply: oneshot::Sender<Vec<String>>,
    },
    Active {
        reply: oneshot::Sender<Vec<(LayerName, String, LayerHandle)>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    CountForZone {
        zone: String,
        reply: oneshot::Sender<usize>,
    },
    CountForLayer {
        layer: LayerName,
        reply: oneshot::Sender<usize>,
    },
    Broadcast {
        event: LayerEvent,
        layer_filter: Option<LayerName>,
        zone_filter: Option<String>,
        reply: oneshot::Sender<usize>,
    },
}

/// The world layer registry service.
pub struct WorldLayerRegistry;

impl WorldLayerRegistry {
    /// Start the registry service and return its client handle.
    pub fn spawn() -> LayerRegistryHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        tokio::spawn(run_layer_registry(LayerDirectory::new(), rx));
        info!("World layer registry service started");
        LayerRegistryHandle { tx }
    }
}

/// Cloneable client for the world layer registry service.
#[derive(Debug, Clone)]
pub struct LayerRegistryHandle {
    /// Mailbox sender.
    tx: mpsc::Sender<LayerRegistryCommand>,
}

impl LayerRegistryHandle {
    /// Register a layer actor.
    pub async fn register(
        &self,
        layer: LayerName,
        zone: &str,
        handle: LayerHandle,
        metadata: WorldLayer,
    ) -> Result<(), LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::Register {
            layer,
            zone: zone.to_owned(),
            handle,
            metadata,
            reply,
        })
        .await?
    }

    /// Unregister a layer actor.
    pub async fn unregister(&self, layer: LayerName, zone: &str) -> Result<(), LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::Unregister {
            layer,
            zone: zone.to_owned(),
            reply,
        })
        .await?
    }

    /// Look up one registration (0 or 1 results).
    pub async fn lookup(
        &self,
        layer: LayerName,
        zone: &str,
    ) -> Result<Option<LayerRegistration>, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::Lookup {
            layer,
            zone: zone.to_owned(),
            reply,
        })
        .await
    }

    /// Replace the descriptor metadata for a registered pair.
    pub async fn update_metadata(
        &self,
        layer: LayerName,
        zone: &str,
        metadata: WorldLayer,
    ) -> Result<(), LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::UpdateMetadata {
            layer,
            zone: zone.to_owned(),
            metadata,
            reply,
        })
        .await?
    }

    /// The layers registered for a zone, with their handles.
    pub async fn layers_for_zone(
        &self,
        zone: &str,
    ) -> Result<Vec<(LayerName, LayerHandle)>, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::LayersForZone {
            zone: zone.to_owned(),
            reply,
        })
        .await
    }

    /// The descriptors registered for a zone.
    pub async fn descriptors_for_zone(
        &self,
        zone: &str,
    ) -> Result<Vec<WorldLayer>, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::DescriptorsForZone {
            zone: zone.to_owned(),
            reply,
        })
        .await
    }

    /// The zones a layer is registered in.
    pub async fn zones_for_layer(&self, layer: LayerName) -> Result<Vec<String>, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::ZonesForLayer { layer, reply })
            .await
    }

    /// Every registration whose actor is currently alive.
    pub async fn active_layers(
        &self,
    ) -> Result<Vec<(LayerName, String, LayerHandle)>, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::Active { reply })
            .await
    }

    /// Total number of registrations.
    pub async fn count(&self) -> Result<usize, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::Count { reply })
            .await
    }

    /// Number of layers registered for a zone.
    pub async fn count_for_zone(&self, zone: &str) -> Result<usize, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::CountForZone {
            zone: zone.to_owned(),
            reply,
        })
        .await
    }

    /// Number of zones a layer is registered in.
    pub async fn count_for_layer(&self, layer: LayerName) -> Result<usize, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::CountForLayer { layer, reply })
            .await
    }

    /// Deliver an event to every registered layer actor. Returns the
    /// number of actors reached.
    pub async fn broadcast(&self, event: LayerEvent) -> Result<usize, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::Broadcast {
            event,
            layer_filter: None,
            zone_filter: None,
            reply,
        })
        .await
    }

    /// Deliver an event to every registered actor of one layer.
    pub async fn broadcast_to_layer(
        &self,
        layer: LayerName,
        event: LayerEvent,
    ) -> Result<usize, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::Broadcast {
            event,
            layer_filter: Some(layer),
            zone_filter: None,
            reply,
        })
        .await
    }

    /// Deliver an event to every registered actor of one zone.
    pub async fn broadcast_to_zone(
        &self,
        zone: &str,
        event: LayerEvent,
    ) -> Result<usize, LayerRegistryError> {
        self.request(|reply| LayerRegistryCommand::Broadcast {
            event,
            layer_filter: None,
            zone_filter: Some(zone.to_owned()),
            reply,
        })
        .await
    }

    /// Send a request and await its oneshot reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> LayerRegistryCommand,
    ) -> Result<T, LayerRegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_send_err| LayerRegistryError::Unavailable)?;
        reply_rx
            .await
            .map_err(|_recv_err| LayerRegistryError::Unavailable)
    }
}

/// The registry service loop.
async fn run_layer_registry(
    mut directory: LayerDirectory,
    mut rx: mpsc::Receiver<LayerRegistryCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            LayerRegistryCommand::Register {
                layer,
                zone,
                handle,
                metadata,
                reply,
            } => {
                let result = directory.register(layer, &zone, handle, metadata);
                if result.is_ok() {
                    debug!(%layer, zone, total = directory.count(), "Layer registered");
                }
                let _ = reply.send(result);
            }
            LayerRegistryCommand::Unregister { layer, zone, reply } => {
                let result = directory.unregister(layer, &zone).map(|_registration| ());
                if result.is_ok() {
                    debug!(%layer, zone, total = directory.count(), "Layer unregistered");
                }
                let _ = reply.send(result);
            }
            LayerRegistryCommand::Lookup { layer, zone, reply } => {
                let _ = reply.send(directory.lookup(layer, &zone).cloned());
            }
            LayerRegistryCommand::UpdateMetadata {
                layer,
                zone,
                metadata,
                reply,
            } => {
                let _ = reply.send(directory.update_metadata(layer, &zone, metadata));
            }
            LayerRegistryCommand::LayersForZone { zone, reply } => {
                let _ = reply.send(directory.layers_for_zone(&zone));
            }
            LayerRegistryCommand::DescriptorsForZone { zone, reply } => {
                let _ = reply.send(directory.descriptors_for_zone(&zone));
            }
            LayerRegistryCommand::ZonesForLayer { layer, reply } => {
                let _ = reply.send(directory.zones_for_layer(layer));
            }
            LayerRegistryCommand::Active { reply } => {
                let _ = reply.send(directory.active());
            }
            LayerRegistryCommand::Count { reply } => {
                let _ = reply.send(directory.count());
            }
            LayerRegistryCommand::CountForZone { zone, reply } => {
                let _ = reply.send(directory.count_for_zone(&zone));
            }
            LayerRegistryCommand::CountForLayer { layer, reply } => {
                let _ = reply.send(directory.count_for_layer(layer));
            }
            LayerRegistryCommand::Broadcast {
                event,
                layer_filter,
                zone_filter,
                reply,
            } => {
                let delivered = directory.deliver(&event, layer_filter, zone_filter.as_deref());
                let _ = reply.send(delivered);
            }
        }
    }
    debug!("World layer registry service stopped");
}
