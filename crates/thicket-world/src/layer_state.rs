//! Runtime state of one (layer, zone) pair.
//!
//! A [`LayerState`] bundles everything a world layer actor owns: the
//! character map, the layer-local dynamic entities, and the between-layer
//! connections. It is pure data mutated by a single owner; the actor
//! wrapper in `thicket-core` serializes access through its mailbox.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use thicket_types::{LayerConnection, LayerEntity, LayerEntityId, WorldLayer};

use crate::error::WorldError;
use crate::layer_map::LayerMap;

/// Everything one world layer actor owns for its (layer, zone) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerState {
    /// The layer descriptor (name, order, tick interval, metadata).
    pub descriptor: WorldLayer,
    /// The character grid.
    pub map: LayerMap,
    /// Layer-local dynamic entities keyed by their per-layer identifier.
    entities: BTreeMap<LayerEntityId, LayerEntity>,
    /// Between-layer connections anchored in this layer.
    connections: Vec<LayerConnection>,
}

impl LayerState {
    /// Create a layer state with no entities or connections.
    pub const fn new(descriptor: WorldLayer, map: LayerMap) -> Self {
        Self {
            descriptor,
            map,
            entities: BTreeMap::new(),
            connections: Vec::new(),
        }
    }

    // -------------------------------------------------------------------
    // Entity operations
    // -------------------------------------------------------------------

    /// Add a dynamic entity to the layer.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateLayerEntity`] if the identifier is
    /// already in use, or [`WorldError::OutOfBounds`] if the entity's
    /// coordinates fall outside the map.
    pub fn add_entity(&mut self, entity: LayerEntity) -> Result<(), WorldError> {
        if self.entities.contains_key(&entity.entity_id) {
            return Err(WorldError::DuplicateLayerEntity(entity.entity_id));
        }
        self.check_bounds(entity.x, entity.y)?;
        self.entities.insert(entity.entity_id.clone(), entity);
        Ok(())
    }

    /// Remove a dynamic entity and return it.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] if no entity has the given
    /// identifier.
    pub fn remove_entity(&mut self, id: &LayerEntityId) -> Result<LayerEntity, WorldError> {
        self.entities
            .remove(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))
    }

    /// Move a dynamic entity to new coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] if the entity is absent, or
    /// [`WorldError::OutOfBounds`] if the target cell is outside the map.
    pub fn move_entity(&mut self, id: &LayerEntityId, x: u32, y: u32) -> Result<(), WorldError> {
        self.check_bounds(x, y)?;
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))?;
        entity.x = x;
        entity.y = y;
        Ok(())
    }

    /// Look up an entity by identifier.
    pub fn get_entity(&self, id: &LayerEntityId) -> Option<&LayerEntity> {
        self.entities.get(id)
    }

    /// All entities located at `(x, y)`.
    pub fn entities_at(&self, x: u32, y: u32) -> Vec<LayerEntity> {
        self.entities
            .values()
            .filter(|e| e.x == x && e.y == y)
            .cloned()
            .collect()
    }

    /// Number of entities in the layer.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate over all entities immutably.
    pub fn entities(&self) -> impl Iterator<Item = &LayerEntity> {
        self.entities.values()
    }

    /// Iterate over all entities mutably.
    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut LayerEntity> {
        self.entities.values_mut()
    }

    // -------------------------------------------------------------------
    // Connection operations
    // -------------------------------------------------------------------

    /// Add a between-layer connection.
    ///
    /// Within a zone, at most one connection may originate from a given
    /// source anchor and at most one may terminate at a given target
    /// anchor.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ConnectionConflict`] naming the conflicting
    /// anchor.
    pub fn add_connection(&mut self, connection: LayerConnection) -> Result<(), WorldError> {
        let source = connection.source_anchor();
        let target = connection.target_anchor();

        for existing in &self.connections {
            if existing.zone_name != connection.zone_name {
                continue;
            }
            if existing.source_anchor() == source {
                return Err(WorldError::ConnectionConflict {
                    zone: connection.zone_name,
                    anchor: "source",
                    layer: source.0,
                    x: source.1,
                    y: source.2,
                });
            }
            if existing.target_anchor() == target {
                return Err(WorldError::ConnectionConflict {
                    zone: connection.zone_name,
                    anchor: "target",
                    layer: target.0,
                    x: target.1,
                    y: target.2,
                });
            }
        }

        self.connections.push(connection);
        Ok(())
    }

    /// All connections anchored in this layer.
    pub fn connections(&self) -> &[LayerConnection] {
        &self.connections
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    /// Validate that `(x, y)` is inside the map.
    fn check_bounds(&self, x: u32, y: u32) -> Result<(), WorldError> {
        if self.map.in_bounds(x, y) {
            Ok(())
        } else {
            Err(WorldError::OutOfBounds {
                x,
                y,
                width: self.map.width(),
                height: self.map.height(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thicket_types::{ConnectionProperties, ConnectionType, LayerName};

    use super::*;

    fn make_state() -> LayerState {
        let map = LayerMap::filled("greenfield", 10, 10, '.').unwrap();
        LayerState::new(WorldLayer::defaults(LayerName::Ground), map)
    }

    fn make_connection(sx: u32, sy: u32, tx: u32, ty: u32) -> LayerConnection {
        LayerConnection {
            connection_type: ConnectionType::Door,
            source_layer: LayerName::Ground,
            source_x: sx,
            source_y: sy,
            target_layer: LayerName::FloorPlans,
            target_x: tx,
            target_y: ty,
            zone_name: "greenfield".to_owned(),
            properties: ConnectionProperties::default(),
        }
    }

    #[test]
    fn add_and_query_entities() {
        let mut state = make_state();
        state.add_entity(LayerEntity::new("tree", "oak-1", 3, 4)).unwrap();
        state.add_entity(LayerEntity::new("tree", "oak-2", 3, 4)).unwrap();
        state.add_entity(LayerEntity::new("rock", "rock-1", 5, 5)).unwrap();

        let here = state.entities_at(3, 4);
        assert_eq!(here.len(), 2);
        assert!(state.entities_at(9, 9).is_empty());
        assert_eq!(state.entity_count(), 3);
    }

    #[test]
    fn duplicate_entity_id_rejected() {
        let mut state = make_state();
        state.add_entity(LayerEntity::new("tree", "oak-1", 1, 1)).unwrap();
        let result = state.add_entity(LayerEntity::new("rock", "oak-1", 2, 2));
        assert!(matches!(result, Err(WorldError::DuplicateLayerEntity(_))));
    }

    #[test]
    fn entity_outside_map_rejected() {
        let mut state = make_state();
        let result = state.add_entity(LayerEntity::new("tree", "oak-1", 10, 0));
        assert!(matches!(result, Err(WorldError::OutOfBounds { .. })));
    }

    #[test]
    fn move_entity_updates_coordinates() {
        let mut state = make_state();
        state.add_entity(LayerEntity::new("sheep", "sheep-1", 0, 0)).unwrap();
        state.move_entity(&LayerEntityId::from("sheep-1"), 7, 8).unwrap();

        let entity = state.get_entity(&LayerEntityId::from("sheep-1")).unwrap();
        assert_eq!((entity.x, entity.y), (7, 8));
    }

    #[test]
    fn move_missing_entity_fails() {
        let mut state = make_state();
        let result = state.move_entity(&LayerEntityId::from("ghost"), 1, 1);
        assert!(matches!(result, Err(WorldError::EntityNotFound(_))));
    }

    #[test]
    fn move_out_of_bounds_fails() {
        let mut state = make_state();
        state.add_entity(LayerEntity::new("sheep", "sheep-1", 0, 0)).unwrap();
        let result = state.move_entity(&LayerEntityId::from("sheep-1"), 0, 10);
        assert!(matches!(result, Err(WorldError::OutOfBounds { .. })));
    }

    #[test]
    fn remove_entity_then_absent() {
        let mut state = make_state();
        state.add_entity(LayerEntity::new("tree", "oak-1", 1, 1)).unwrap();
        let removed = state.remove_entity(&LayerEntityId::from("oak-1")).unwrap();
        assert_eq!(removed.entity_type, "tree");
        assert!(state.get_entity(&LayerEntityId::from("oak-1")).is_none());
        assert!(matches!(
            state.remove_entity(&LayerEntityId::from("oak-1")),
            Err(WorldError::EntityNotFound(_))
        ));
    }

    #[test]
    fn duplicate_source_anchor_conflicts() {
        let mut state = make_state();
        state.add_connection(make_connection(2, 2, 4, 4)).unwrap();
        let result = state.add_connection(make_connection(2, 2, 6, 6));
        assert!(matches!(
            result,
            Err(WorldError::ConnectionConflict { anchor: "source", .. })
        ));
    }

    #[test]
    fn duplicate_target_anchor_conflicts() {
        let mut state = make_state();
        state.add_connection(make_connection(2, 2, 4, 4)).unwrap();
        let result = state.add_connection(make_connection(3, 3, 4, 4));
        assert!(matches!(
            result,
            Err(WorldError::ConnectionConflict { anchor: "target", .. })
        ));
    }

    #[test]
    fn distinct_anchors_coexist() {
        let mut state = make_state();
        state.add_connection(make_connection(2, 2, 4, 4)).unwrap();
        state.add_connection(make_connection(3, 3, 5, 5)).unwrap();
        assert_eq!(state.connections().len(), 2);
    }
}
