//! Default starting zone: "greenfield".
//!
//! A 24x12 meadow crossed by a river, with a small hut, a copse of trees,
//! drifting clouds, a two-room floor plan, and a door linking the hut
//! interior to the ground layer. Used by the engine binary as the initial
//! world and by integration tests as a realistic fixture.

use std::collections::BTreeMap;

use thicket_types::{
    ConnectionProperties, ConnectionType, LayerConnection, LayerEntity, LayerName, WorldLayer,
};

use crate::error::WorldError;
use crate::layer_map::LayerMap;
use crate::layer_tick::{
    DOOR_CLOSE_AT_KEY, DOOR_OPEN_KEY, DOOR_TYPE, GROWTH_STAGE_KEY, INTEGRITY_KEY,
};
use crate::loader::{LayerSeed, StaticLoader};

/// Name of the default starting zone.
pub const STARTING_ZONE: &str = "greenfield";

/// Width of the starting zone maps.
pub const ZONE_WIDTH: u32 = 24;

/// Height of the starting zone maps.
pub const ZONE_HEIGHT: u32 = 12;

/// Build a [`StaticLoader`] seeded with all six layers of the starting
/// zone.
///
/// # Errors
///
/// Returns [`WorldError::MapDataInvalid`] if any built-in map is
/// malformed; the built-in content is fixed, so this only fires if the
/// content itself is edited incorrectly.
pub fn starting_zone() -> Result<StaticLoader, WorldError> {
    let loader = StaticLoader::new()
        .with_seed(STARTING_ZONE, ground_seed()?)
        .with_seed(STARTING_ZONE, atmosphere_seed()?)
        .with_seed(STARTING_ZONE, plants_seed()?)
        .with_seed(STARTING_ZONE, structures_seed()?)
        .with_seed(STARTING_ZONE, floor_plans_seed()?)
        .with_seed(STARTING_ZONE, doors_seed()?);
    Ok(loader)
}

/// Ground: meadow (`.`) crossed by a north-south river (`~`) with a ford.
fn ground_seed() -> Result<LayerSeed, WorldError> {
    let mut map = LayerMap::filled(STARTING_ZONE, ZONE_WIDTH, ZONE_HEIGHT, '.')?;
    for y in 0..ZONE_HEIGHT {
        map.set_at(14, y, '~');
        map.set_at(15, y, '~');
    }
    // A gravel ford crosses the river at y = 6.
    map.set_at(14, 6, ',');
    map.set_at(15, 6, ',');

    Ok(LayerSeed {
        descriptor: WorldLayer::defaults(LayerName::Ground),
        map,
        entities: vec![
            LayerEntity::new("boulder", "boulder-1", 4, 9),
            LayerEntity::new("boulder", "boulder-2", 20, 2),
        ],
        connections: Vec::new(),
    })
}

/// Atmosphere: clear sky with two drifting clouds.
fn atmosphere_seed() -> Result<LayerSeed, WorldError> {
    let map = LayerMap::filled(STARTING_ZONE, ZONE_WIDTH, ZONE_HEIGHT, ' ')?;
    Ok(LayerSeed {
        descriptor: WorldLayer::defaults(LayerName::Atmosphere),
        map,
        entities: vec![
            LayerEntity::new("cloud", "cloud-1", 3, 1),
            LayerEntity::new("cloud", "cloud-2", 17, 2),
        ],
        connections: Vec::new(),
    })
}

/// Plants: scattered grass tufts (`"`) on the map, plus a copse of tree
/// entities at various growth stages.
fn plants_seed() -> Result<LayerSeed, WorldError> {
    let mut map = LayerMap::filled(STARTING_ZONE, ZONE_WIDTH, ZONE_HEIGHT, ' ')?;
    for (x, y) in [(2, 3), (5, 8), (9, 2), (11, 10), (19, 7), (22, 4)] {
        map.set_at(x, y, '"');
    }

    let tree = |id: &str, x: u32, y: u32, stage: u32| {
        LayerEntity::new("tree", id, x, y).with_property(GROWTH_STAGE_KEY, stage.to_string())
    };

    Ok(LayerSeed {
        descriptor: WorldLayer::defaults(LayerName::Plants),
        map,
        entities: vec![
            tree("oak-1", 3, 4, 4),
            tree("oak-2", 4, 5, 2),
            tree("birch-1", 5, 4, 1),
            tree("sapling-1", 6, 6, 0),
        ],
        connections: Vec::new(),
    })
}

/// Structures: a hut west of the river, already weathered.
fn structures_seed() -> Result<LayerSeed, WorldError> {
    let mut map = LayerMap::filled(STARTING_ZONE, ZONE_WIDTH, ZONE_HEIGHT, ' ')?;
    for x in 8..=10 {
        map.set_at(x, 3, '#');
        map.set_at(x, 5, '#');
    }
    map.set_at(8, 4, '#');

    Ok(LayerSeed {
        descriptor: WorldLayer::defaults(LayerName::Structures),
        map,
        entities: vec![
            LayerEntity::new("hut", "hut-1", 9, 4)
                .with_property(INTEGRITY_KEY, "80")
                .with_property("material", "wood"),
            LayerEntity::new("fence", "fence-1", 18, 9)
                .with_property(INTEGRITY_KEY, "25"),
        ],
        connections: Vec::new(),
    })
}

/// Floor plans: the hut's two-room interior outline.
fn floor_plans_seed() -> Result<LayerSeed, WorldError> {
    let mut map = LayerMap::filled(STARTING_ZONE, ZONE_WIDTH, ZONE_HEIGHT, ' ')?;
    for x in 7..=11 {
        map.set_at(x, 2, '#');
        map.set_at(x, 6, '#');
    }
    for y in 2..=6 {
        map.set_at(7, y, '#');
        map.set_at(11, y, '#');
    }
    // Interior dividing wall between the two rooms.
    map.set_at(9, 3, '#');
    map.set_at(9, 5, '#');

    Ok(LayerSeed {
        descriptor: WorldLayer::defaults(LayerName::FloorPlans),
        map,
        entities: Vec::new(),
        connections: Vec::new(),
    })
}

/// Doors: the hut's front door, plus the connection wiring the door cell
/// on the doors layer to the hut interior on the floor-plans layer.
fn doors_seed() -> Result<LayerSeed, WorldError> {
    let mut map = LayerMap::filled(STARTING_ZONE, ZONE_WIDTH, ZONE_HEIGHT, ' ')?;
    map.set_at(10, 4, '+');

    let mut metadata = BTreeMap::new();
    metadata.insert("auto_close_ticks".to_owned(), "3".to_owned());

    let descriptor = WorldLayer {
        metadata,
        ..WorldLayer::defaults(LayerName::Doors)
    };

    Ok(LayerSeed {
        descriptor,
        map,
        entities: vec![
            LayerEntity::new(DOOR_TYPE, "hut-door", 10, 4)
                .with_property(DOOR_OPEN_KEY, "true")
                .with_property(DOOR_CLOSE_AT_KEY, "3"),
        ],
        connections: vec![LayerConnection {
            connection_type: ConnectionType::Door,
            source_layer: LayerName::Doors,
            source_x: 10,
            source_y: 4,
            target_layer: LayerName::FloorPlans,
            target_x: 10,
            target_y: 4,
            zone_name: STARTING_ZONE.to_owned(),
            properties: ConnectionProperties::default(),
        }],
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::loader::LayerLoader;

    use super::*;

    #[test]
    fn all_six_layers_present() {
        let loader = starting_zone().unwrap();
        assert_eq!(loader.len(), 6);
        for layer in LayerName::ALL {
            assert!(loader.load_layer(layer, STARTING_ZONE).is_ok());
        }
    }

    #[test]
    fn every_seed_builds_a_state() {
        let loader = starting_zone().unwrap();
        for layer in LayerName::ALL {
            let seed = loader.load_layer(layer, STARTING_ZONE).unwrap();
            let state = seed.into_state();
            assert!(state.is_ok(), "layer {layer} seed must build");
        }
    }

    #[test]
    fn river_flows_through_ground() {
        let loader = starting_zone().unwrap();
        let seed = loader.load_layer(LayerName::Ground, STARTING_ZONE).unwrap();
        assert_eq!(seed.map.get_at(14, 0), Some('~'));
        assert_eq!(seed.map.get_at(14, 6), Some(','));
        assert_eq!(seed.map.get_at(0, 0), Some('.'));
    }

    #[test]
    fn door_connection_targets_floor_plans() {
        let loader = starting_zone().unwrap();
        let seed = loader.load_layer(LayerName::Doors, STARTING_ZONE).unwrap();
        let conn = seed.connections.first().unwrap();
        assert_eq!(conn.source_layer, LayerName::Doors);
        assert_eq!(conn.target_layer, LayerName::FloorPlans);
        assert_eq!(seed.map.get_at(conn.source_x, conn.source_y), Some('+'));
    }
}
