//! Entity actors, registries, supervision, and world orchestration for
//! the Thicket simulation.
//!
//! This crate is the concurrency layer. Every game entity and every
//! (layer, zone) pair runs as an independent tokio task owning its state
//! exclusively, reachable only through a private mailbox; the two
//! registries are single-owner mailbox services, so no index is ever
//! observed mid-update and no external locks exist anywhere.
//!
//! # Modules
//!
//! - [`clock`] -- The monotonic global tick counter.
//! - [`config`] -- YAML configuration loading.
//! - [`entity_actor`] -- One actor per entity; [`EntityHandle`] client.
//! - [`entity_registry`] -- Canonical entity metadata with four secondary
//!   indexes, plus the reconciliation sweep.
//! - [`supervisor`] -- Per-class supervision with restart policies.
//! - [`layer_actor`] -- One actor per (layer, zone) pair with its own
//!   local tick timer; [`LayerHandle`] client.
//! - [`layer_registry`] -- Directory of live layer actors with zone- and
//!   layer-scoped broadcast.
//! - [`manager`] -- Zone lifecycle, composite spatial queries, global
//!   tick emission.
//! - [`runner`] -- The bounded simulation loop.

pub mod clock;
pub mod config;
pub mod entity_actor;
pub mod entity_registry;
pub mod layer_actor;
pub mod layer_registry;
pub mod manager;
pub mod runner;
pub mod supervisor;

// Re-export primary types at crate root.
pub use clock::WorldClock;
pub use config::SimulationConfig;
pub use entity_actor::{ActorError, EntityHandle};
pub use entity_registry::{EntityRegistry, MetadataUpdate, RegistryError, RegistryHandle};
pub use layer_actor::{LayerActorError, LayerHandle};
pub use layer_registry::{
    LayerEvent, LayerRegistryError, LayerRegistryHandle, WorldLayerRegistry,
};
pub use manager::{ManagerError, WorldManager, ZoneConfig};
pub use runner::{SimulationEndReason, SimulationResult, run_simulation};
pub use supervisor::{
    EntitySpec, EntitySupervisor, RestartPolicies, RestartPolicy, SupervisorError, SupervisorSet,
};
