//! Error types for the `thicket-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use thicket_types::{LayerEntityId, LayerName};

/// Errors that can occur during layer map and layer state operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// Map data failed the line-count/line-length validation.
    #[error("invalid map data for zone {zone}: {reason}")]
    MapDataInvalid {
        /// The zone whose map was rejected.
        zone: String,
        /// What was wrong with the data.
        reason: String,
    },

    /// A coordinate falls outside the map bounds.
    #[error("coordinate ({x}, {y}) is outside the {width}x{height} map")]
    OutOfBounds {
        /// The rejected x coordinate.
        x: u32,
        /// The rejected y coordinate.
        y: u32,
        /// Map width.
        width: u32,
        /// Map height.
        height: u32,
    },

    /// A layer entity was not found in the layer.
    #[error("layer entity not found: {0}")]
    EntityNotFound(LayerEntityId),

    /// A layer entity with the same identifier already exists in the layer.
    #[error("duplicate layer entity id: {0}")]
    DuplicateLayerEntity(LayerEntityId),

    /// A connection anchor is already in use within the zone.
    #[error(
        "connection conflict in zone {zone}: {anchor} anchor ({layer}, {x}, {y}) already in use"
    )]
    ConnectionConflict {
        /// The zone the conflict occurred in.
        zone: String,
        /// Which end conflicted: `"source"` or `"target"`.
        anchor: &'static str,
        /// Layer of the conflicting anchor.
        layer: LayerName,
        /// Anchor x coordinate.
        x: u32,
        /// Anchor y coordinate.
        y: u32,
    },

    /// No seed data is available for the requested (layer, zone) pair.
    #[error("no layer data for ({layer}, {zone})")]
    LayerDataMissing {
        /// The requested layer.
        layer: LayerName,
        /// The requested zone.
        zone: String,
    },
}
