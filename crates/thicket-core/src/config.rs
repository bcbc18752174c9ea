//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `thicket.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure and provides a loader that reads and parses the file. Every
//! field is defaulted, so a missing file or an empty document yields a
//! fully usable configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `thicket.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (zone, seed, timing).
    #[serde(default)]
    pub world: WorldConfig,

    /// Seed entity counts.
    #[serde(default)]
    pub spawn: SpawnConfig,

    /// Simulation boundary parameters.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Name of the zone created at startup.
    #[serde(default = "default_starting_zone")]
    pub starting_zone: String,

    /// World seed for deterministic tick randomness.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real-time milliseconds per global tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Whether layer actors run their own local interval timers in
    /// addition to the global tick.
    #[serde(default = "default_layer_timers")]
    pub layer_timers: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            starting_zone: default_starting_zone(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            layer_timers: default_layer_timers(),
        }
    }
}

fn default_starting_zone() -> String {
    String::from("greenfield")
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    1_000
}

const fn default_layer_timers() -> bool {
    true
}

/// Seed entity counts spawned at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpawnConfig {
    /// Number of seed players.
    #[serde(default = "default_players")]
    pub players: u32,

    /// Number of seed NPCs.
    #[serde(default = "default_npcs")]
    pub npcs: u32,

    /// Number of seed mobs.
    #[serde(default = "default_mobs")]
    pub mobs: u32,

    /// Number of seed items.
    #[serde(default = "default_items")]
    pub items: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            players: default_players(),
            npcs: default_npcs(),
            mobs: default_mobs(),
            items: default_items(),
        }
    }
}

const fn default_players() -> u32 {
    1
}

const fn default_npcs() -> u32 {
    2
}

const fn default_mobs() -> u32 {
    3
}

const fn default_items() -> u32 {
    2
}

/// Simulation boundary parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many global ticks (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Stop after this many wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,

    /// Run the registry reconciliation sweep every N global ticks
    /// (0 disables the sweep).
    #[serde(default = "default_reconcile_every_ticks")]
    pub reconcile_every_ticks: u64,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            max_real_time_seconds: 0,
            reconcile_every_ticks: default_reconcile_every_ticks(),
        }
    }
}

const fn default_max_ticks() -> u64 {
    120
}

const fn default_reconcile_every_ticks() -> u64 {
    25
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter (overridden by `RUST_LOG`).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SimulationConfig::parse("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.world.starting_zone, "greenfield");
        assert_eq!(config.world.tick_interval_ms, 1_000);
        assert!(config.world.layer_timers);
        assert_eq!(config.simulation.max_ticks, 120);
    }

    #[test]
    fn partial_document_overrides_some_fields() {
        let yaml = r"
world:
  seed: 7
  layer_timers: false
simulation:
  max_ticks: 10
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.seed, 7);
        assert!(!config.world.layer_timers);
        assert_eq!(config.world.starting_zone, "greenfield");
        assert_eq!(config.simulation.max_ticks, 10);
        assert_eq!(config.spawn.mobs, 3);
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let result = SimulationConfig::parse("world: [not: a: mapping");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
