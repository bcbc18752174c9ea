//! Core data records for the Thicket world simulation.
//!
//! These are the value types that flow between entity actors, world layer
//! actors, and the registries: component slots, positions, tick events,
//! layer descriptors, lightweight layer entities, between-layer
//! connections, and the denormalized registry snapshots served to the
//! UI/command layer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{
    ComponentKind, ConnectionType, EntityStatus, EntityType, LayerName, TickSource,
};
use crate::ids::LayerEntityId;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// A typed data slot attached to an entity (health, mana, stamina, ...).
///
/// Pure value type; its lifecycle is tied to the owning entity. The
/// invariant `0 <= current` always holds; `current` may exceed `max` only
/// transiently via explicit max-increase updates, never via regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Current value.
    pub current: u32,
    /// Maximum value regeneration is capped at.
    pub max: u32,
    /// Units regenerated per tick.
    pub regen_rate: u32,
    /// When regeneration last applied to this component.
    pub last_regen: DateTime<Utc>,
}

impl Component {
    /// Create a component at full value with the given cap and regen rate.
    pub fn full(max: u32, regen_rate: u32) -> Self {
        Self {
            current: max,
            max,
            regen_rate,
            last_regen: Utc::now(),
        }
    }

    /// Create a component with an explicit current value.
    pub fn with_current(current: u32, max: u32, regen_rate: u32) -> Self {
        Self {
            current,
            max,
            regen_rate,
            last_regen: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Where an entity is in the world: a zone, a room within it, and
/// optionally exact map coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The zone the entity is in.
    pub zone: String,
    /// The room within the zone.
    pub room: String,
    /// Exact map coordinates, when the entity is placed on a layer map.
    pub coords: Option<(u32, u32)>,
}

impl Position {
    /// Create a position without map coordinates.
    pub fn new(zone: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            room: room.into(),
            coords: None,
        }
    }

    /// Create a position with exact map coordinates.
    pub fn at(zone: impl Into<String>, room: impl Into<String>, x: u32, y: u32) -> Self {
        Self {
            zone: zone.into(),
            room: room.into(),
            coords: Some((x, y)),
        }
    }
}

// ---------------------------------------------------------------------------
// Ticks
// ---------------------------------------------------------------------------

/// One discrete simulation step, as delivered to entity and layer actors.
///
/// Tick numbers are locally monotonic per emitter; ticks from different
/// sources are independent streams and carry their [`TickSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickData {
    /// The emitter-local tick number.
    pub tick_number: u64,
    /// Wall-clock time the tick was emitted.
    pub timestamp: DateTime<Utc>,
    /// Which clock emitted the tick.
    pub source: TickSource,
}

impl TickData {
    /// Build a tick event stamped with the current wall-clock time.
    pub fn now(tick_number: u64, source: TickSource) -> Self {
        Self {
            tick_number,
            timestamp: Utc::now(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// World layers
// ---------------------------------------------------------------------------

/// Descriptor for one spatial layer of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldLayer {
    /// The layer this descriptor configures.
    pub name: LayerName,
    /// Global rendering/precedence order (unique across layers).
    pub layer_order: u32,
    /// Local tick interval in milliseconds; zero disables the local timer.
    pub tick_interval_ms: u64,
    /// Layer-specific configuration (e.g. a movement-cost table).
    pub metadata: BTreeMap<String, String>,
}

impl WorldLayer {
    /// Build the default descriptor for a layer: canonical order, default
    /// tick interval, empty metadata.
    pub fn defaults(name: LayerName) -> Self {
        Self {
            name,
            layer_order: name.order(),
            tick_interval_ms: name.default_tick_interval_ms(),
            metadata: BTreeMap::new(),
        }
    }
}

/// A lightweight, non-actor object living inside one world layer
/// (a tree, a door, a cloud).
///
/// Distinct from the actor-backed entity: layer entities are plain records
/// managed directly inside a world layer actor's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerEntity {
    /// Free-form type tag (`"tree"`, `"door"`, `"cloud"`, ...).
    pub entity_type: String,
    /// Identifier, unique within the owning layer.
    pub entity_id: LayerEntityId,
    /// Horizontal map coordinate.
    pub x: u32,
    /// Vertical map coordinate.
    pub y: u32,
    /// Free-form properties (growth stage, integrity, open/closed, ...).
    pub properties: BTreeMap<String, String>,
    /// Whether the entity currently participates in the simulation.
    pub is_active: bool,
}

impl LayerEntity {
    /// Create an active layer entity with no properties.
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<LayerEntityId>, x: u32, y: u32) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            x,
            y,
            properties: BTreeMap::new(),
            is_active: true,
        }
    }

    /// Set a property, returning `self` for chained construction.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Behavioral properties of a between-layer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Whether the connection can be traversed in both directions.
    pub bidirectional: bool,
    /// Movement cost of traversing the connection.
    pub cost: u32,
    /// Key item required to traverse, if any.
    pub required_key: Option<String>,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            bidirectional: true,
            cost: 1,
            required_key: None,
        }
    }
}

/// A directed (optionally bidirectional) link between a point on one layer
/// and a point on another, within a single zone.
///
/// At most one connection may originate from a given source anchor and at
/// most one may terminate at a given target anchor within a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConnection {
    /// The kind of passage this connection represents.
    pub connection_type: ConnectionType,
    /// Layer the connection originates on.
    pub source_layer: LayerName,
    /// Source anchor x coordinate.
    pub source_x: u32,
    /// Source anchor y coordinate.
    pub source_y: u32,
    /// Layer the connection terminates on.
    pub target_layer: LayerName,
    /// Target anchor x coordinate.
    pub target_x: u32,
    /// Target anchor y coordinate.
    pub target_y: u32,
    /// The zone both anchors belong to.
    pub zone_name: String,
    /// Traversal behavior.
    pub properties: ConnectionProperties,
}

impl LayerConnection {
    /// The source anchor as a `(layer, x, y)` tuple.
    pub const fn source_anchor(&self) -> (LayerName, u32, u32) {
        (self.source_layer, self.source_x, self.source_y)
    }

    /// The target anchor as a `(layer, x, y)` tuple.
    pub const fn target_anchor(&self) -> (LayerName, u32, u32) {
        (self.target_layer, self.target_x, self.target_y)
    }
}

// ---------------------------------------------------------------------------
// Registry snapshots
// ---------------------------------------------------------------------------

/// Denormalized per-entity snapshot held by the entity registry.
///
/// Exactly one record exists per live entity. The actor handle is stored
/// beside the record (handles are not serializable); everything the
/// UI/command layer queries by is here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// The entity's class.
    pub entity_type: EntityType,
    /// Zone the entity is in.
    pub zone: String,
    /// Room the entity is in.
    pub room: String,
    /// Kinds of components currently attached.
    pub components: BTreeSet<ComponentKind>,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// Last time the owning actor reported activity.
    pub last_seen: DateTime<Utc>,
}

/// Aggregate counts served by the entity registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Total number of registered entities.
    pub total: u64,
    /// Entity counts per class.
    pub by_type: BTreeMap<EntityType, u64>,
    /// Entity counts per zone.
    pub by_zone: BTreeMap<String, u64>,
    /// Entity counts per room.
    pub by_room: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_constructors() {
        let c = Component::full(100, 5);
        assert_eq!(c.current, 100);
        assert_eq!(c.max, 100);

        let c = Component::with_current(80, 100, 15);
        assert_eq!(c.current, 80);
        assert_eq!(c.regen_rate, 15);
    }

    #[test]
    fn default_layer_descriptor_uses_canonical_order() {
        let layer = WorldLayer::defaults(LayerName::Plants);
        assert_eq!(layer.layer_order, 3);
        assert_eq!(layer.tick_interval_ms, 8_000);
        assert!(layer.metadata.is_empty());
    }

    #[test]
    fn layer_entity_builder() {
        let tree = LayerEntity::new("tree", "oak-1", 4, 7).with_property("growth_stage", "2");
        assert!(tree.is_active);
        assert_eq!(tree.properties.get("growth_stage").map(String::as_str), Some("2"));
    }

    #[test]
    fn connection_anchors() {
        let conn = LayerConnection {
            connection_type: ConnectionType::Stairs,
            source_layer: LayerName::Ground,
            source_x: 2,
            source_y: 3,
            target_layer: LayerName::FloorPlans,
            target_x: 2,
            target_y: 3,
            zone_name: "greenfield".to_owned(),
            properties: ConnectionProperties::default(),
        };
        assert_eq!(conn.source_anchor(), (LayerName::Ground, 2, 3));
        assert_eq!(conn.target_anchor(), (LayerName::FloorPlans, 2, 3));
        assert!(conn.properties.bidirectional);
    }

    #[test]
    fn tick_data_records_source() {
        let tick = TickData::now(7, TickSource::Manual);
        assert_eq!(tick.tick_number, 7);
        assert_eq!(tick.source, TickSource::Manual);
    }
}
