//! The persistence collaborator seam: loading layer content.
//!
//! World layer actors do not own durable storage. At start (and again
//! after a supervised restart) they ask a [`LayerLoader`] for their
//! complete seed: map, entities, connections, and descriptor. In-memory
//! edits made since the last external save are lost on restart -- the
//! layer is reconstructible purely from the loader.
//!
//! [`StaticLoader`] is the in-memory implementation used by tests and the
//! engine binary; a database-backed loader would implement the same trait.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use thicket_types::{LayerConnection, LayerEntity, LayerName, WorldLayer};

use crate::error::WorldError;
use crate::layer_map::LayerMap;
use crate::layer_state::LayerState;

/// Everything needed to start one world layer actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSeed {
    /// The layer descriptor (name, order, tick interval, metadata).
    pub descriptor: WorldLayer,
    /// The character grid.
    pub map: LayerMap,
    /// Initial layer-local entities.
    pub entities: Vec<LayerEntity>,
    /// Initial between-layer connections.
    pub connections: Vec<LayerConnection>,
}

impl LayerSeed {
    /// Build the runtime [`LayerState`] from this seed.
    ///
    /// # Errors
    ///
    /// Returns the first [`WorldError`] raised while inserting seed
    /// entities or connections (duplicate IDs, out-of-bounds coordinates,
    /// connection conflicts). A seed that fails here is corrupt and the
    /// layer must not start.
    pub fn into_state(self) -> Result<LayerState, WorldError> {
        let mut state = LayerState::new(self.descriptor, self.map);
        for entity in self.entities {
            state.add_entity(entity)?;
        }
        for connection in self.connections {
            state.add_connection(connection)?;
        }
        Ok(state)
    }
}

/// Source of layer content for world layer actors.
///
/// Implementations must be cheap to call repeatedly: a layer reloads its
/// seed on every supervised restart.
pub trait LayerLoader: Send + Sync {
    /// Load the complete seed for one (layer, zone) pair.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::LayerDataMissing`] if the pair is unknown, or
    /// another [`WorldError`] if the stored content is invalid.
    fn load_layer(&self, layer: LayerName, zone: &str) -> Result<LayerSeed, WorldError>;

    /// The zones this loader has content for.
    fn zones(&self) -> Vec<String>;
}

/// In-memory [`LayerLoader`] holding pre-built seeds.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    /// Seeds keyed by the structured (layer, zone) tuple.
    seeds: BTreeMap<(LayerName, String), LayerSeed>,
}

impl StaticLoader {
    /// Create an empty loader.
    pub const fn new() -> Self {
        Self {
            seeds: BTreeMap::new(),
        }
    }

    /// Insert (or replace) the seed for a (layer, zone) pair.
    pub fn insert(&mut self, zone: impl Into<String>, seed: LayerSeed) {
        self.seeds.insert((seed.descriptor.name, zone.into()), seed);
    }

    /// Insert a seed, returning `self` for chained construction.
    #[must_use]
    pub fn with_seed(mut self, zone: impl Into<String>, seed: LayerSeed) -> Self {
        self.insert(zone, seed);
        self
    }

    /// Number of stored seeds.
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    /// Whether the loader has no seeds.
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

impl LayerLoader for StaticLoader {
    fn load_layer(&self, layer: LayerName, zone: &str) -> Result<LayerSeed, WorldError> {
        self.seeds
            .get(&(layer, zone.to_owned()))
            .cloned()
            .ok_or_else(|| WorldError::LayerDataMissing {
                layer,
                zone: zone.to_owned(),
            })
    }

    fn zones(&self) -> Vec<String> {
        let mut zones: Vec<String> = self.seeds.keys().map(|(_, zone)| zone.clone()).collect();
        zones.sort_unstable();
        zones.dedup();
        zones
    }
}
