//! World engine binary for the Thicket simulation.
//!
//! This is the main entry point that wires together the registries, the
//! supervision tree, the world manager, the starting zone, and the
//! global tick loop. It loads configuration, initializes all subsystems,
//! and runs the simulation until a termination condition is met.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `thicket.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Start the entity registry and the per-class supervisors
//! 4. Start the world layer registry and the world manager
//! 5. Create the starting zone (all six layers)
//! 6. Spawn seed entities across the zone
//! 7. Run the bounded simulation loop
//! 8. Log the result

mod error;
mod spawner;

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use thicket_core::config::SimulationConfig;
use thicket_core::entity_registry::EntityRegistry;
use thicket_core::layer_registry::WorldLayerRegistry;
use thicket_core::manager::{WorldManager, ZoneConfig};
use thicket_core::runner;
use thicket_core::supervisor::{RestartPolicies, SupervisorSet};
use thicket_world::starting_zone;

use crate::error::EngineError;

/// Default configuration file path, relative to the working directory.
const CONFIG_PATH: &str = "thicket.yaml";

/// Application entry point for the world engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration (defaults when the file is absent).
    let config_path = Path::new(CONFIG_PATH);
    let config = if config_path.exists() {
        SimulationConfig::from_file(config_path).map_err(EngineError::from)?
    } else {
        SimulationConfig::default()
    };

    // 2. Initialize structured logging. RUST_LOG overrides the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone())),
        )
        .with_target(true)
        .init();

    info!("thicket-engine starting");
    info!(
        zone = config.world.starting_zone,
        seed = config.world.seed,
        tick_interval_ms = config.world.tick_interval_ms,
        layer_timers = config.world.layer_timers,
        max_ticks = config.simulation.max_ticks,
        "Configuration loaded"
    );

    // 3. Entity registry and supervision tree.
    let entity_registry = EntityRegistry::spawn();
    let supervisors = SupervisorSet::spawn(RestartPolicies::default(), &entity_registry);

    // 4. World layer registry and manager over the starting zone content.
    let loader = Arc::new(starting_zone().map_err(EngineError::from)?);
    let layer_registry = WorldLayerRegistry::spawn();
    let manager = WorldManager::new(layer_registry, loader);

    // 5. Create the starting zone.
    let mut zone_config = ZoneConfig::new(config.world.seed);
    if !config.world.layer_timers {
        zone_config = zone_config.without_local_timers();
    }
    manager
        .create_zone(&config.world.starting_zone, &zone_config)
        .await
        .map_err(EngineError::from)?;
    info!(zone = config.world.starting_zone, "Starting zone created");

    // 6. Spawn seed entities.
    let report = spawner::spawn_seed_entities(
        &config.spawn,
        &supervisors,
        &config.world.starting_zone,
        thicket_world::starting_zone::ZONE_WIDTH,
        thicket_world::starting_zone::ZONE_HEIGHT,
    )
    .await?;
    info!(entities = report.spawned.len(), "World populated");

    // 7. Run the simulation loop.
    let result = runner::run_simulation(
        &manager,
        &supervisors,
        &entity_registry,
        &config.simulation,
        config.world.tick_interval_ms,
    )
    .await
    .map_err(EngineError::from)?;

    // 8. Log the result.
    let stats = entity_registry.stats().await;
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        entities = stats.as_ref().map(|s| s.total).unwrap_or_default(),
        "Simulation ended"
    );

    Ok(())
}
