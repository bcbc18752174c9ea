//! Error types for the `thicket-entity` crate.

use thicket_types::ComponentKind;

/// Errors that can occur during entity state operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    /// The referenced component is not attached to the entity.
    #[error("component not found: {0}")]
    ComponentNotFound(ComponentKind),

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in entity calculation")]
    ArithmeticOverflow,
}
