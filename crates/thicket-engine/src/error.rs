//! Error types for the world engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and simulation execution.

/// Top-level error for the world engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: thicket_core::config::ConfigError,
    },

    /// Starting zone content construction failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: thicket_world::WorldError,
    },

    /// Zone creation or a world query failed.
    #[error("manager error: {source}")]
    Manager {
        /// The underlying manager error.
        #[from]
        source: thicket_core::ManagerError,
    },

    /// Seed entity spawning failed.
    #[error("spawner error: {source}")]
    Spawner {
        /// The underlying supervision error.
        #[from]
        source: thicket_core::SupervisorError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: thicket_core::runner::RunnerError,
    },
}
