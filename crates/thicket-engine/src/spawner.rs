//! Seed entity spawner.
//!
//! At engine start the spawner populates the starting zone with an
//! initial cast of supervised entities: players, NPCs, mobs, and items,
//! distributed across the zone's rooms at random coordinates. Each class
//! gets a characteristic component loadout; the per-class counts come
//! from the `spawn` section of `thicket.yaml`.

use rand::Rng;
use tracing::info;

use thicket_core::config::SpawnConfig;
use thicket_core::supervisor::{EntitySpec, SupervisorSet};
use thicket_types::{Component, ComponentKind, EntityId, EntityType, Position};

use crate::error::EngineError;

/// Rooms seed entities can start in.
const ROOMS: [&str; 4] = ["meadow", "riverbank", "ford", "hut"];

/// Summary of what the spawner created.
#[derive(Debug, Default)]
pub struct SpawnReport {
    /// IDs of all spawned entities, in spawn order.
    pub spawned: Vec<EntityId>,
}

/// Spawn the configured number of seed entities of every class.
///
/// # Errors
///
/// Returns the first [`EngineError::Spawner`] raised by the supervision
/// tree; entities spawned before the failure stay alive.
pub async fn spawn_seed_entities(
    config: &SpawnConfig,
    supervisors: &SupervisorSet,
    zone: &str,
    zone_width: u32,
    zone_height: u32,
) -> Result<SpawnReport, EngineError> {
    let mut report = SpawnReport::default();

    let classes = [
        (EntityType::Player, "player", config.players),
        (EntityType::Npc, "npc", config.npcs),
        (EntityType::Mob, "mob", config.mobs),
        (EntityType::Item, "item", config.items),
    ];

    let mut rng = rand::rng();
    for (entity_type, prefix, count) in classes {
        for index in 1..=count {
            let id = EntityId::from(format!("{prefix}-{index}").as_str());
            let room = ROOMS
                .get(rng.random_range(0..ROOMS.len()))
                .copied()
                .unwrap_or("meadow");
            let x = rng.random_range(0..zone_width);
            let y = rng.random_range(0..zone_height);

            let spec = build_spec(id.clone(), entity_type, Position::at(zone, room, x, y));
            supervisors.spawn_entity(spec).await?;
            report.spawned.push(id);
        }
    }

    info!(spawned = report.spawned.len(), zone, "Seed entities spawned");
    Ok(report)
}

/// The component loadout for one entity class.
fn build_spec(id: EntityId, entity_type: EntityType, position: Position) -> EntitySpec {
    let spec = EntitySpec::new(id, entity_type, position);
    match entity_type {
        EntityType::Player => spec
            .with_component(ComponentKind::Health, Component::with_current(80, 100, 15))
            .with_component(ComponentKind::Mana, Component::with_current(30, 50, 10))
            .with_component(ComponentKind::Stamina, Component::full(100, 20)),
        EntityType::Npc => spec
            .with_component(ComponentKind::Health, Component::full(60, 5))
            .with_component(ComponentKind::Mana, Component::full(40, 5)),
        EntityType::Mob => spec
            .with_component(ComponentKind::Health, Component::with_current(25, 30, 2))
            .with_component(ComponentKind::Stamina, Component::full(50, 10)),
        // Items carry no vitals; durability is a custom kind that ticks
        // leave untouched.
        EntityType::Item => spec.with_component(
            ComponentKind::Custom(String::from("durability")),
            Component::with_current(50, 50, 0),
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thicket_core::entity_registry::EntityRegistry;
    use thicket_core::supervisor::RestartPolicies;

    use super::*;

    #[tokio::test]
    async fn spawns_configured_counts() {
        let registry = EntityRegistry::spawn();
        let supervisors = SupervisorSet::spawn(RestartPolicies::default(), &registry);
        let config = SpawnConfig {
            players: 1,
            npcs: 2,
            mobs: 3,
            items: 1,
        };

        let report = spawn_seed_entities(&config, &supervisors, "greenfield", 24, 12)
            .await
            .unwrap();
        assert_eq!(report.spawned.len(), 7);

        let stats = registry.stats().await.unwrap();
        assert_eq!(stats.total, 7);
        assert_eq!(stats.by_type.get(&EntityType::Mob).copied(), Some(3));
        assert_eq!(stats.by_zone.get("greenfield").copied(), Some(7));
    }

    #[tokio::test]
    async fn items_hold_only_custom_components() {
        let registry = EntityRegistry::spawn();
        let supervisors = SupervisorSet::spawn(RestartPolicies::default(), &registry);
        let config = SpawnConfig {
            players: 0,
            npcs: 0,
            mobs: 0,
            items: 1,
        };

        spawn_seed_entities(&config, &supervisors, "greenfield", 24, 12)
            .await
            .unwrap();

        let with_durability = registry
            .entities_with_component(ComponentKind::Custom(String::from("durability")))
            .await
            .unwrap();
        assert_eq!(with_durability.len(), 1);
        assert!(
            registry
                .entities_with_component(ComponentKind::Health)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
