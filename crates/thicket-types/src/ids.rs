//! String-backed typed identifier wrappers.
//!
//! Every simulated object is addressed by a globally unique string
//! identifier. The wrappers here exist to prevent accidental mixing of
//! identifier namespaces at compile time: an actor-backed entity ID and a
//! lightweight in-layer entity ID are different types even though both are
//! strings underneath.
//!
//! Fresh identifiers are generated as UUID v7 strings (time-ordered), but
//! any caller-supplied string is accepted -- game content commonly uses
//! readable identifiers such as `player-ada` or `oak-3`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh, globally unique identifier (UUID v7,
            /// time-ordered).
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

define_string_id! {
    /// Unique identifier for an actor-backed entity (player, NPC, mob, item).
    EntityId
}

define_string_id! {
    /// Identifier for a lightweight in-layer entity (tree, door, cloud).
    ///
    /// Unique within its owning world layer, not globally.
    LayerEntityId
}
