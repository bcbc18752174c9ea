//! The bounded simulation loop.
//!
//! [`run_simulation`] drives the global tick: each iteration advances the
//! world clock, emits the tick through the world manager (broadcast +
//! layer fan-out), fans it to every supervised entity, and periodically
//! runs the entity registry reconciliation sweep. The loop stops when the
//! configured tick or wall-clock bound is reached.
//!
//! Per-layer local timers (when enabled) keep running independently of
//! this loop inside their own actors; the runner owns only the global
//! clock.

use std::time::Instant;

use tracing::{info, warn};

use crate::clock::{ClockError, WorldClock};
use crate::config::SimulationBoundsConfig;
use crate::entity_registry::RegistryHandle;
use crate::manager::WorldManager;
use crate::supervisor::SupervisorSet;

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Reason why the simulation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// Reached the configured `max_real_time_seconds` limit.
    MaxRealTimeReached,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// Total number of global ticks emitted.
    pub total_ticks: u64,
}

/// Run the global tick loop until a termination condition is met.
///
/// # Arguments
///
/// * `manager` - World manager (tick broadcast + layer fan-out)
/// * `supervisors` - Supervision tree (entity tick fan-out)
/// * `registry` - Entity registry (periodic reconciliation sweep)
/// * `bounds` - Tick/time limits and reconcile cadence
/// * `tick_interval_ms` - Real-time milliseconds between global ticks
///
/// # Errors
///
/// Returns [`RunnerError`] if the clock fails unrecoverably.
pub async fn run_simulation(
    manager: &WorldManager,
    supervisors: &SupervisorSet,
    registry: &RegistryHandle,
    bounds: &SimulationBoundsConfig,
    tick_interval_ms: u64,
) -> Result<SimulationResult, RunnerError> {
    let started = Instant::now();
    let mut clock = WorldClock::new();

    info!(
        max_ticks = bounds.max_ticks,
        max_real_time_seconds = bounds.max_real_time_seconds,
        tick_interval_ms,
        "Simulation starting"
    );

    loop {
        // --- Check time limit (before tick) ---
        if bounds.max_real_time_seconds > 0
            && started.elapsed().as_secs() >= bounds.max_real_time_seconds
        {
            info!(
                elapsed_seconds = started.elapsed().as_secs(),
                "Real-time limit reached"
            );
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::MaxRealTimeReached,
                total_ticks: clock.tick(),
            });
        }

        // --- Emit tick ---
        let tick_number = clock.advance()?;
        let tick = clock.tick_data();
        match manager.emit_tick(tick.clone()).await {
            Ok(layers_reached) => {
                if tick_number.is_multiple_of(10) {
                    info!(tick = tick_number, layers_reached, "Tick emitted");
                }
            }
            Err(err) => warn!(tick = tick_number, %err, "Tick fan-out failed"),
        }
        supervisors.broadcast_tick(&tick);

        // --- Periodic reconciliation sweep ---
        if bounds.reconcile_every_ticks > 0
            && tick_number.is_multiple_of(bounds.reconcile_every_ticks)
        {
            match registry.reconcile().await {
                Ok(evicted) if !evicted.is_empty() => {
                    warn!(
                        tick = tick_number,
                        evicted = evicted.len(),
                        "Reconciliation evicted stale entity records"
                    );
                }
                Ok(_none) => {}
                Err(err) => warn!(tick = tick_number, %err, "Reconciliation sweep failed"),
            }
        }

        // --- Check tick limit (after tick) ---
        if bounds.max_ticks > 0 && tick_number >= bounds.max_ticks {
            info!(tick = tick_number, "Tick limit reached");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::MaxTicksReached,
                total_ticks: tick_number,
            });
        }

        // --- Sleep for tick interval ---
        if tick_interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(tick_interval_ms)).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use thicket_world::{STARTING_ZONE, starting_zone};

    use super::*;
    use crate::entity_registry::EntityRegistry;
    use crate::layer_registry::WorldLayerRegistry;
    use crate::manager::ZoneConfig;
    use crate::supervisor::RestartPolicies;

    #[tokio::test]
    async fn run_stops_at_tick_limit() {
        let entity_registry = EntityRegistry::spawn();
        let supervisors = SupervisorSet::spawn(RestartPolicies::default(), &entity_registry);
        let layer_registry = WorldLayerRegistry::spawn();
        let manager = WorldManager::new(layer_registry, Arc::new(starting_zone().unwrap()));
        manager
            .create_zone(STARTING_ZONE, &ZoneConfig::new(42).without_local_timers())
            .await
            .unwrap();

        let bounds = SimulationBoundsConfig {
            max_ticks: 5,
            max_real_time_seconds: 0,
            reconcile_every_ticks: 2,
        };
        let result = run_simulation(&manager, &supervisors, &entity_registry, &bounds, 0)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
    }
}
