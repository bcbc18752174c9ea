//! Shared type definitions for the Thicket world simulation.
//!
//! This crate is the single source of truth for all types used across the
//! Thicket workspace: identifiers, enumerations, and the core data records
//! exchanged between entity actors, world layer actors, and the registries.
//!
//! # Modules
//!
//! - [`ids`] -- String-backed typed identifier wrappers
//! - [`enums`] -- Enumeration types (entity classes, layers, connections)
//! - [`structs`] -- Core data records (components, positions, tick data,
//!   layer entities, layer connections, registry snapshots)

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    ComponentField, ComponentKind, ConnectionType, EntityStatus, EntityType, LayerName, TickSource,
};
pub use ids::{EntityId, LayerEntityId};
pub use structs::{
    Component, ConnectionProperties, EntityRecord, LayerConnection, LayerEntity, Position,
    RegistryStats, TickData, WorldLayer,
};
