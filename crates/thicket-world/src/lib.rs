//! Layered zone maps, layer entities, and tick behaviors for the Thicket
//! world simulation.
//!
//! This crate models the spatial world as pure data: each zone is a stack
//! of six aligned character-grid layers (ground, atmosphere, plants,
//! structures, floor plans, doors), each with its own lightweight dynamic
//! entities, between-layer connections, and time-based behavior. The
//! concurrency wrapper -- one actor per (layer, zone) pair -- lives in
//! `thicket-core`.
//!
//! # Modules
//!
//! - [`error`] -- Error types for map and layer-state operations.
//! - [`layer_map`] -- [`LayerMap`]: the bounds-checked character grid with
//!   region extraction.
//! - [`layer_state`] -- [`LayerState`]: map + entities + connections, the
//!   full state one layer actor owns.
//! - [`layer_tick`] -- Per-layer tick handlers (plant growth, structure
//!   decay, cloud drift, door timers) with deterministic randomness.
//! - [`loader`] -- The persistence collaborator seam: [`LayerLoader`] and
//!   the in-memory [`StaticLoader`].
//! - [`starting_zone`] -- The default "greenfield" zone content.

pub mod error;
pub mod layer_map;
pub mod layer_state;
pub mod layer_tick;
pub mod loader;
pub mod starting_zone;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use layer_map::LayerMap;
pub use layer_state::LayerState;
pub use layer_tick::TickOutcome;
pub use loader::{LayerLoader, LayerSeed, StaticLoader};
pub use starting_zone::{STARTING_ZONE, starting_zone};
