//! Enumeration types for the Thicket world simulation.
//!
//! Entity classification, component kinds, world layers, connection types,
//! and tick provenance. All enumerations serialize with `serde` so they can
//! appear in configuration files, logs, and test fixtures.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Entity classification
// ---------------------------------------------------------------------------

/// The class of an actor-backed entity.
///
/// The class selects the supervision group and restart policy: players
/// restart unconditionally after a crash, while NPCs, mobs, and items
/// restart only on explicit operator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A player-controlled character.
    Player,
    /// A scripted non-player character.
    Npc,
    /// A hostile or wandering creature.
    Mob,
    /// A world item (weapon, key, consumable).
    Item,
}

impl EntityType {
    /// All entity classes, in supervision-group order.
    pub const ALL: [Self; 4] = [Self::Player, Self::Npc, Self::Mob, Self::Item];
}

/// Lifecycle status of an actor-backed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// The actor is starting up and not yet processing ticks.
    Spawning,
    /// The entity participates in the simulation.
    Active,
    /// The entity is temporarily suspended (e.g. player logged out).
    Inactive,
    /// The actor is shutting down gracefully.
    Despawning,
    /// The entity has been destroyed.
    Dead,
}

// ---------------------------------------------------------------------------
// Component kinds
// ---------------------------------------------------------------------------

/// The kind of a data component attached to an entity.
///
/// The three named kinds are *vital* kinds: per-tick regeneration applies
/// to them. Any other kind is carried as [`ComponentKind::Custom`] and is
/// left untouched by tick processing.
///
/// Serializes as a plain string (`"health"`, `"mana"`, `"stamina"`, or the
/// custom name verbatim) so the kind can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    /// Hit points.
    Health,
    /// Spellcasting reserve.
    Mana,
    /// Physical exertion reserve.
    Stamina,
    /// Any other component kind, carried verbatim.
    Custom(String),
}

impl ComponentKind {
    /// Parse a kind from its string form. Unknown names become
    /// [`ComponentKind::Custom`]; parsing never fails.
    pub fn parse(name: &str) -> Self {
        match name {
            "health" => Self::Health,
            "mana" => Self::Mana,
            "stamina" => Self::Stamina,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// The canonical string form of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Health => "health",
            Self::Mana => "mana",
            Self::Stamina => "stamina",
            Self::Custom(name) => name,
        }
    }

    /// Whether per-tick regeneration applies to this kind.
    pub const fn is_vital(&self) -> bool {
        matches!(self, Self::Health | Self::Mana | Self::Stamina)
    }
}

impl core::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ComponentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ComponentKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}

/// A typed field selector for component updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentField {
    /// The current value. Clamped so it never drops below zero.
    Current,
    /// The maximum value. Raising it can leave `current` above the old cap.
    Max,
    /// Units regenerated per tick.
    RegenRate,
}

// ---------------------------------------------------------------------------
// World layers
// ---------------------------------------------------------------------------

/// One named spatial layer of a zone.
///
/// Layers are rendered and tick-processed independently but are spatially
/// aligned: the cell `(x, y)` means the same world position on every layer
/// of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerName {
    /// Terrain: grass, water, sand, rock.
    Ground,
    /// Weather and sky effects drifting above the terrain.
    Atmosphere,
    /// Vegetation that grows over time.
    Plants,
    /// Built structures that decay over time.
    Structures,
    /// Interior room outlines and walls.
    FloorPlans,
    /// Doors and other between-layer passages.
    Doors,
}

impl LayerName {
    /// All layers of a zone, in rendering/precedence order.
    pub const ALL: [Self; 6] = [
        Self::Ground,
        Self::Atmosphere,
        Self::Plants,
        Self::Structures,
        Self::FloorPlans,
        Self::Doors,
    ];

    /// The global rendering/precedence order of this layer (1-based,
    /// unique across layers).
    pub const fn order(self) -> u32 {
        match self {
            Self::Ground => 1,
            Self::Atmosphere => 2,
            Self::Plants => 3,
            Self::Structures => 4,
            Self::FloorPlans => 5,
            Self::Doors => 6,
        }
    }

    /// Default local tick interval in milliseconds.
    ///
    /// Zero means the layer has no time-based behavior of its own and
    /// relies solely on the global world tick.
    pub const fn default_tick_interval_ms(self) -> u64 {
        match self {
            Self::Ground => 0,
            Self::Atmosphere => 4_000,
            Self::Plants => 8_000,
            Self::Structures => 12_000,
            Self::FloorPlans => 0,
            Self::Doors => 2_000,
        }
    }

    /// The canonical string form of this layer name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Atmosphere => "atmosphere",
            Self::Plants => "plants",
            Self::Structures => "structures",
            Self::FloorPlans => "floor_plans",
            Self::Doors => "doors",
        }
    }

    /// Parse a layer name from its string form. Returns `None` for
    /// unrecognized names.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ground" => Some(Self::Ground),
            "atmosphere" => Some(Self::Atmosphere),
            "plants" => Some(Self::Plants),
            "structures" => Some(Self::Structures),
            "floor_plans" => Some(Self::FloorPlans),
            "doors" => Some(Self::Doors),
            _ => None,
        }
    }
}

impl core::fmt::Display for LayerName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// The kind of a between-layer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// A door between an exterior and an interior.
    Door,
    /// Stairs between vertical layers.
    Stairs,
    /// A magical portal.
    Portal,
    /// A climbable ladder.
    Ladder,
    /// An underground tunnel.
    Tunnel,
}

// ---------------------------------------------------------------------------
// Tick provenance
// ---------------------------------------------------------------------------

/// Which clock emitted a tick event.
///
/// The world manager runs a global tick clock, and each world layer actor
/// additionally runs its own local interval timer. The two are not
/// synchronized; consumers use the source to tell the streams apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickSource {
    /// The world manager's global tick clock.
    WorldManager,
    /// A world layer actor's local interval timer.
    LayerTimer,
    /// A test or operator-injected tick.
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_orders_are_unique() {
        let mut orders: Vec<u32> = LayerName::ALL.iter().map(|l| l.order()).collect();
        orders.sort_unstable();
        orders.dedup();
        assert_eq!(orders.len(), LayerName::ALL.len());
    }

    #[test]
    fn layer_name_parse_roundtrip() {
        for layer in LayerName::ALL {
            assert_eq!(LayerName::parse(layer.as_str()), Some(layer));
        }
        assert_eq!(LayerName::parse("underdark"), None);
    }

    #[test]
    fn component_kind_parse_roundtrip() {
        assert_eq!(ComponentKind::parse("health"), ComponentKind::Health);
        assert_eq!(
            ComponentKind::parse("hunger"),
            ComponentKind::Custom("hunger".to_owned())
        );
        assert!(ComponentKind::Health.is_vital());
        assert!(!ComponentKind::parse("hunger").is_vital());
    }

    #[test]
    fn component_kind_keys_json_maps() {
        use std::collections::BTreeMap;

        let mut map = BTreeMap::new();
        map.insert(ComponentKind::Health, 10_u32);
        map.insert(ComponentKind::Custom("hunger".to_owned()), 5_u32);
        let json = serde_json::to_string(&map).ok();
        assert_eq!(json.as_deref(), Some(r#"{"health":10,"hunger":5}"#));
    }
}
