//! Entity components and state for the Thicket world simulation.
//!
//! This crate holds the pure, synchronous entity domain: the component bag
//! with per-tick regeneration, and the entity state record with its
//! position and status transitions. The concurrency wrapper (one actor per
//! entity, mailbox, supervision) lives in `thicket-core`; everything here
//! is plain data that a single owner mutates.
//!
//! # Modules
//!
//! - [`components`] -- [`ComponentBag`]: typed component slots and the
//!   regeneration algorithm applied each tick.
//! - [`error`] -- Error types for entity operations.
//! - [`state`] -- [`EntityState`]: the full per-entity record an actor
//!   owns exclusively.

pub mod components;
pub mod error;
pub mod state;

pub use components::ComponentBag;
pub use error::EntityError;
pub use state::EntityState;
