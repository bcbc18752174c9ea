//! The full per-entity record an actor owns exclusively.
//!
//! [`EntityState`] bundles identity, components, position, and lifecycle
//! status. It is mutated only by the owning actor's mailbox loop; nothing
//! here is shared. The registry sees a denormalized projection of this
//! state (see [`EntityState::record`]), refreshed on every mutation the
//! registry cares about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use thicket_types::{EntityId, EntityRecord, EntityStatus, EntityType, Position, TickData};

use crate::components::ComponentBag;

/// The canonical state of one simulated entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    /// Globally unique identity.
    pub id: EntityId,
    /// The entity's class (selects supervision and restart policy).
    pub entity_type: EntityType,
    /// Attached components.
    pub components: ComponentBag,
    /// Current position.
    pub position: Position,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// When the entity was created.
    pub created_at: DateTime<Utc>,
    /// Highest global tick number processed so far.
    pub last_tick: u64,
}

impl EntityState {
    /// Create a freshly spawning entity.
    pub fn new(id: EntityId, entity_type: EntityType, position: Position) -> Self {
        Self {
            id,
            entity_type,
            components: ComponentBag::new(),
            position,
            status: EntityStatus::Spawning,
            created_at: Utc::now(),
            last_tick: 0,
        }
    }

    /// Create an entity with an initial component bag.
    pub fn with_components(
        id: EntityId,
        entity_type: EntityType,
        position: Position,
        components: ComponentBag,
    ) -> Self {
        Self {
            components,
            ..Self::new(id, entity_type, position)
        }
    }

    /// Move the entity.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Change the lifecycle status.
    pub const fn set_status(&mut self, status: EntityStatus) {
        self.status = status;
    }

    /// Process one tick: apply component regeneration and advance
    /// `last_tick`.
    ///
    /// Global ticks already seen (tick number not greater than `last_tick`)
    /// are skipped, so a late or duplicated delivery cannot double-apply
    /// regeneration. Returns `true` if the tick was applied.
    pub fn process_tick(&mut self, tick: &TickData) -> bool {
        if tick.tick_number <= self.last_tick {
            debug!(
                entity = %self.id,
                tick = tick.tick_number,
                last_tick = self.last_tick,
                "Skipping stale tick"
            );
            return false;
        }
        let _ = self.components.apply_tick(tick.timestamp);
        self.last_tick = tick.tick_number;
        true
    }

    /// Build the denormalized registry snapshot for this state.
    pub fn record(&self) -> EntityRecord {
        EntityRecord {
            entity_type: self.entity_type,
            zone: self.position.zone.clone(),
            room: self.position.room.clone(),
            components: self.components.kinds(),
            status: self.status,
            last_seen: Utc::now(),
        }
    }
}
