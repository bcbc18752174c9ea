//! End-to-end tests of the simulation core: zone lifecycle, supervised
//! entities, global ticks, registry queries, and composite spatial views
//! working together.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use thicket_core::config::SimulationBoundsConfig;
use thicket_core::entity_registry::EntityRegistry;
use thicket_core::layer_registry::WorldLayerRegistry;
use thicket_core::manager::{WorldManager, ZoneConfig};
use thicket_core::runner::{self, SimulationEndReason};
use thicket_core::supervisor::{EntitySpec, RestartPolicies, SupervisorSet};
use thicket_core::{RegistryHandle, WorldClock};
use thicket_types::{
    Component, ComponentKind, EntityId, EntityType, LayerName, Position, TickData, TickSource,
};
use thicket_world::{STARTING_ZONE, starting_zone};

/// A fully wired simulation core over the starting zone.
struct Harness {
    entity_registry: RegistryHandle,
    supervisors: SupervisorSet,
    manager: WorldManager,
}

async fn make_harness() -> Harness {
    let entity_registry = EntityRegistry::spawn();
    let supervisors = SupervisorSet::spawn(RestartPolicies::default(), &entity_registry);
    let layer_registry = WorldLayerRegistry::spawn();
    let manager = WorldManager::new(layer_registry, Arc::new(starting_zone().unwrap()));
    manager
        .create_zone(STARTING_ZONE, &ZoneConfig::new(42).without_local_timers())
        .await
        .unwrap();
    Harness {
        entity_registry,
        supervisors,
        manager,
    }
}

fn player_spec(id: &str, room: &str) -> EntitySpec {
    EntitySpec::new(
        EntityId::from(id),
        EntityType::Player,
        Position::new(STARTING_ZONE, room),
    )
    .with_component(ComponentKind::Health, Component::with_current(80, 100, 15))
    .with_component(ComponentKind::Mana, Component::with_current(20, 50, 10))
}

fn mob_spec(id: &str, room: &str) -> EntitySpec {
    EntitySpec::new(
        EntityId::from(id),
        EntityType::Mob,
        Position::new(STARTING_ZONE, room),
    )
    .with_component(ComponentKind::Health, Component::full(30, 2))
}

/// Poll until `check` passes or ~2 seconds elapse.
async fn wait_for<F>(mut check: F)
where
    F: AsyncFnMut() -> bool,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(check().await, "condition not reached in time");
}

#[tokio::test]
async fn global_ticks_regenerate_supervised_entities() {
    let harness = make_harness().await;
    let player = harness
        .supervisors
        .spawn_entity(player_spec("p1", "meadow"))
        .await
        .unwrap();

    // Two global ticks: health 80 -> 95 -> 100 (capped), mana 20 -> 40.
    let mut clock = WorldClock::new();
    for _ in 0..2 {
        clock.advance().unwrap();
        let tick = clock.tick_data();
        harness.manager.emit_tick(tick.clone()).await.unwrap();
        harness.supervisors.broadcast_tick(&tick);
    }

    wait_for(async || {
        player
            .state()
            .await
            .is_ok_and(|state| state.last_tick == 2)
    })
    .await;

    let health = player.get_component(ComponentKind::Health).await.unwrap();
    assert_eq!(health.map(|c| c.current), Some(100));
    let mana = player.get_component(ComponentKind::Mana).await.unwrap();
    assert_eq!(mana.map(|c| c.current), Some(40));
}

#[tokio::test]
async fn registry_queries_follow_entity_movement() {
    let harness = make_harness().await;
    let player = harness
        .supervisors
        .spawn_entity(player_spec("p1", "meadow"))
        .await
        .unwrap();
    harness
        .supervisors
        .spawn_entity(mob_spec("m1", "riverbank"))
        .await
        .unwrap();

    let in_zone = harness
        .entity_registry
        .entities_in_zone(STARTING_ZONE)
        .await
        .unwrap();
    assert_eq!(in_zone.len(), 2);

    let meadow: Vec<EntityId> = harness
        .entity_registry
        .entities_in_room("meadow")
        .await
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(meadow, vec![EntityId::from("p1")]);

    // Move the player into the hut; the room index follows.
    player
        .set_position(Position::at(STARTING_ZONE, "hut", 9, 4))
        .await
        .unwrap();
    assert!(
        harness
            .entity_registry
            .entities_in_room("meadow")
            .await
            .unwrap()
            .is_empty()
    );
    let hut: Vec<EntityId> = harness
        .entity_registry
        .entities_in_room("hut")
        .await
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(hut, vec![EntityId::from("p1")]);

    // Component index: only the player holds mana.
    let with_mana = harness
        .entity_registry
        .entities_with_component(ComponentKind::Mana)
        .await
        .unwrap();
    assert_eq!(with_mana.len(), 1);

    let stats = harness.entity_registry.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_type.get(&EntityType::Player).copied(), Some(1));
    assert_eq!(stats.by_type.get(&EntityType::Mob).copied(), Some(1));
}

#[tokio::test]
async fn crashed_entity_is_swept_and_id_reusable() {
    let harness = make_harness().await;
    let mob = harness
        .supervisors
        .spawn_entity(mob_spec("m1", "riverbank"))
        .await
        .unwrap();

    mob.inject_failure("integration crash").await.unwrap();

    // The mob's supervisor cleans the stale record up (on-demand policy:
    // no automatic restart), after which the ID can be reused.
    wait_for(async || {
        harness
            .entity_registry
            .get_handle(&EntityId::from("m1"))
            .await
            .unwrap()
            .is_none()
    })
    .await;

    // A reconcile sweep finds nothing left to evict.
    assert!(harness.entity_registry.reconcile().await.unwrap().is_empty());

    harness
        .supervisors
        .spawn_entity(mob_spec("m1", "riverbank"))
        .await
        .unwrap();
    assert_eq!(harness.entity_registry.count().await.unwrap(), 1);
}

#[tokio::test]
async fn world_views_reflect_tick_driven_change() {
    let harness = make_harness().await;

    // The hut door starts open and closes at tick 3.
    let doors = harness
        .manager
        .registry()
        .lookup(LayerName::Doors, STARTING_ZONE)
        .await
        .unwrap()
        .unwrap()
        .handle;
    let before = doors.get_entities_at(10, 4).await.unwrap();
    assert_eq!(
        before[0].properties.get("open").map(String::as_str),
        Some("true")
    );

    for n in 1..=3 {
        harness
            .manager
            .emit_tick(TickData::now(n, TickSource::WorldManager))
            .await
            .unwrap();
    }

    wait_for(async || {
        doors
            .get_entities_at(10, 4)
            .await
            .is_ok_and(|entities| {
                entities
                    .first()
                    .and_then(|e| e.properties.get("open"))
                    .is_some_and(|open| open == "false")
            })
    })
    .await;

    // Composite views still line up across layers after the ticks.
    let view = harness
        .manager
        .get_position_view(STARTING_ZONE, 10, 4)
        .await
        .unwrap();
    assert_eq!(view.get(&LayerName::Doors).copied(), Some('+'));
    assert_eq!(view.get(&LayerName::Ground).copied(), Some('.'));

    let region = harness
        .manager
        .get_region_view(STARTING_ZONE, 7, 2, 5, 5)
        .await
        .unwrap();
    let floor_plan = region.get(&LayerName::FloorPlans).unwrap();
    assert_eq!(floor_plan[0], "#####");
}

#[tokio::test]
async fn bounded_run_drives_the_whole_core() {
    let harness = make_harness().await;
    let player = harness
        .supervisors
        .spawn_entity(player_spec("p1", "meadow"))
        .await
        .unwrap();

    let mut events = harness.manager.subscribe();

    let bounds = SimulationBoundsConfig {
        max_ticks: 8,
        max_real_time_seconds: 0,
        reconcile_every_ticks: 4,
    };
    let result = runner::run_simulation(
        &harness.manager,
        &harness.supervisors,
        &harness.entity_registry,
        &bounds,
        0,
    )
    .await
    .unwrap();

    assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
    assert_eq!(result.total_ticks, 8);

    // The UI-facing broadcast saw the ticks in order.
    let first = events.recv().await.unwrap();
    assert_eq!(first.tick_number, 1);
    assert_eq!(first.source, TickSource::WorldManager);

    // Entity regeneration ran to the cap.
    wait_for(async || {
        player
            .state()
            .await
            .is_ok_and(|state| state.last_tick == 8)
    })
    .await;
    let health = player.get_component(ComponentKind::Health).await.unwrap();
    assert_eq!(health.map(|c| c.current), Some(100));

    // The world still answers queries after the run.
    let view = harness
        .manager
        .get_position_view(STARTING_ZONE, 0, 0)
        .await
        .unwrap();
    assert_eq!(view.get(&LayerName::Ground).copied(), Some('.'));
}

#[tokio::test]
async fn destroy_zone_invalidates_spatial_queries() {
    let harness = make_harness().await;
    harness.manager.destroy_zone(STARTING_ZONE).await.unwrap();

    assert!(
        harness
            .manager
            .get_position_view(STARTING_ZONE, 0, 0)
            .await
            .is_err()
    );
    assert_eq!(harness.manager.registry().count().await.unwrap(), 0);
}

#[tokio::test]
async fn stale_tick_replay_does_not_double_regenerate() {
    let harness = make_harness().await;
    let player = harness
        .supervisors
        .spawn_entity(player_spec("p1", "meadow"))
        .await
        .unwrap();

    let tick = TickData::now(1, TickSource::WorldManager);
    harness.supervisors.broadcast_tick(&tick);
    harness.supervisors.broadcast_tick(&tick);
    harness.supervisors.broadcast_tick(&tick);

    wait_for(async || {
        player
            .state()
            .await
            .is_ok_and(|state| state.last_tick == 1)
    })
    .await;

    // One application: 80 + 15, not more.
    let health = player.get_component(ComponentKind::Health).await.unwrap();
    assert_eq!(health.map(|c| c.current), Some(95));
}
