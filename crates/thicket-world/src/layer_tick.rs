//! Per-layer tick behaviors: growth, decay, drift, and door timers.
//!
//! Each world layer has its own time-based behavior, dispatched on the
//! layer name by [`apply`]:
//!
//! - **plants** -- vegetation advances its growth stage with a
//!   probabilistic roll each tick
//! - **structures** -- built objects lose integrity each tick and collapse
//!   at zero
//! - **atmosphere** -- cloud entities drift east, wrapping at the map edge
//! - **doors** -- open doors close again once their timer expires
//! - **ground**, **floor_plans** -- structural layers with no time-based
//!   behavior
//!
//! # Determinism
//!
//! Probabilistic rolls use a seeded `xorshift64` over
//! `(world_seed, tick, entity)`. The same inputs always produce the same
//! outcome, enabling reproducible simulation runs and replayable tests.

use tracing::debug;

use thicket_types::{LayerName, TickData};

use crate::layer_state::LayerState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Property key holding a plant's growth stage.
pub const GROWTH_STAGE_KEY: &str = "growth_stage";

/// Highest growth stage a plant can reach.
pub const MAX_GROWTH_STAGE: u32 = 4;

/// Percent chance per tick that a plant advances one growth stage.
pub const GROWTH_CHANCE_PCT: u64 = 35;

/// Property key holding a structure's remaining integrity.
pub const INTEGRITY_KEY: &str = "integrity";

/// Property key overriding the default per-tick integrity loss.
pub const DECAY_RATE_KEY: &str = "decay_rate";

/// Default integrity lost per tick when no `decay_rate` property is set.
pub const DEFAULT_STRUCTURE_DECAY: u32 = 1;

/// Property key marking a door as open (`"true"`) or closed.
pub const DOOR_OPEN_KEY: &str = "open";

/// Property key holding the tick number at which an open door closes.
pub const DOOR_CLOSE_AT_KEY: &str = "close_at_tick";

/// Entity type tag for drifting atmosphere entities.
pub const CLOUD_TYPE: &str = "cloud";

/// Entity type tag for door entities.
pub const DOOR_TYPE: &str = "door";

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Summary of what one layer tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Number of entities whose state changed this tick.
    pub entities_changed: u32,
    /// Number of entities deactivated this tick (e.g. collapsed structures).
    pub entities_deactivated: u32,
}

impl TickOutcome {
    /// Whether the tick changed anything.
    pub const fn is_noop(&self) -> bool {
        self.entities_changed == 0 && self.entities_deactivated == 0
    }

    fn count_change(&mut self) {
        self.entities_changed = self.entities_changed.saturating_add(1);
    }

    fn count_deactivation(&mut self) {
        self.entities_deactivated = self.entities_deactivated.saturating_add(1);
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Apply one tick of layer-specific behavior to the given state.
///
/// The handler is selected by the layer name in the state's descriptor;
/// structural layers (ground, floor plans) are no-ops.
pub fn apply(state: &mut LayerState, tick: &TickData, world_seed: u64) -> TickOutcome {
    let layer = state.descriptor.name;
    let outcome = match layer {
        LayerName::Plants => tick_plants(state, tick, world_seed),
        LayerName::Structures => tick_structures(state),
        LayerName::Atmosphere => tick_atmosphere(state),
        LayerName::Doors => tick_doors(state, tick),
        LayerName::Ground | LayerName::FloorPlans => TickOutcome::default(),
    };
    if !outcome.is_noop() {
        debug!(
            %layer,
            tick = tick.tick_number,
            changed = outcome.entities_changed,
            deactivated = outcome.entities_deactivated,
            "Layer tick applied"
        );
    }
    outcome
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Plants: each active entity with a growth stage below the maximum rolls
/// for advancement.
fn tick_plants(state: &mut LayerState, tick: &TickData, world_seed: u64) -> TickOutcome {
    let mut outcome = TickOutcome::default();
    for entity in state.entities_mut() {
        if !entity.is_active {
            continue;
        }
        let Some(stage) = entity
            .properties
            .get(GROWTH_STAGE_KEY)
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        if stage >= MAX_GROWTH_STAGE {
            continue;
        }
        let salt = entity_salt(entity.entity_id.as_str());
        let roll = deterministic_random(world_seed, tick.tick_number, salt)
            .checked_rem(100)
            .unwrap_or(0);
        if roll < GROWTH_CHANCE_PCT {
            let next = stage.saturating_add(1);
            entity
                .properties
                .insert(GROWTH_STAGE_KEY.to_owned(), next.to_string());
            outcome.count_change();
        }
    }
    outcome
}

/// Structures: integrity drops by the entity's decay rate; at zero the
/// structure collapses (is deactivated).
fn tick_structures(state: &mut LayerState) -> TickOutcome {
    let mut outcome = TickOutcome::default();
    for entity in state.entities_mut() {
        if !entity.is_active {
            continue;
        }
        let Some(integrity) = entity
            .properties
            .get(INTEGRITY_KEY)
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        let decay = entity
            .properties
            .get(DECAY_RATE_KEY)
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_STRUCTURE_DECAY);
        let remaining = integrity.saturating_sub(decay);
        entity
            .properties
            .insert(INTEGRITY_KEY.to_owned(), remaining.to_string());
        outcome.count_change();
        if remaining == 0 {
            entity.is_active = false;
            outcome.count_deactivation();
        }
    }
    outcome
}

/// Atmosphere: cloud entities drift one cell east, wrapping at the map
/// edge.
fn tick_atmosphere(state: &mut LayerState) -> TickOutcome {
    let width = state.map.width();
    let mut outcome = TickOutcome::default();
    for entity in state.entities_mut() {
        if !entity.is_active || entity.entity_type != CLOUD_TYPE {
            continue;
        }
        entity.x = entity
            .x
            .saturating_add(1)
            .checked_rem(width)
            .unwrap_or(0);
        outcome.count_change();
    }
    outcome
}

/// Doors: open doors whose close timer has expired snap shut.
fn tick_doors(state: &mut LayerState, tick: &TickData) -> TickOutcome {
    let mut outcome = TickOutcome::default();
    for entity in state.entities_mut() {
        if !entity.is_active || entity.entity_type != DOOR_TYPE {
            continue;
        }
        let is_open = entity
            .properties
            .get(DOOR_OPEN_KEY)
            .is_some_and(|v| v == "true");
        if !is_open {
            continue;
        }
        let close_due = entity
            .properties
            .get(DOOR_CLOSE_AT_KEY)
            .and_then(|s| s.parse::<u64>().ok())
            .is_some_and(|at| at <= tick.tick_number);
        if close_due {
            entity
                .properties
                .insert(DOOR_OPEN_KEY.to_owned(), "false".to_owned());
            entity.properties.remove(DOOR_CLOSE_AT_KEY);
            outcome.count_change();
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// Deterministic randomness
// ---------------------------------------------------------------------------

/// Fold an entity identifier into a salt for per-entity randomness.
fn entity_salt(id: &str) -> u64 {
    id.bytes()
        .fold(0_u64, |hash, byte| {
            hash.wrapping_mul(31).wrapping_add(u64::from(byte))
        })
}

/// Deterministic pseudo-random number generator using `xorshift64`.
///
/// Combines the world seed, tick number, and per-entity salt with a mixing
/// step so each `(seed, tick, entity)` triple yields an independent value.
/// The same inputs always produce the same output.
const fn deterministic_random(world_seed: u64, tick: u64, salt: u64) -> u64 {
    // The constant 0x517cc1b727220a95 is a well-known mixing constant.
    let mut state = world_seed
        .wrapping_add(tick.wrapping_mul(0x517c_c1b7_2722_0a95))
        .wrapping_add(salt.rotate_left(17));

    // xorshift requires non-zero input.
    if state == 0 {
        state = 0xdead_beef_cafe_babe;
    }

    // xorshift64 algorithm
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;

    state
}
