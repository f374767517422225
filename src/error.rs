//! Error taxonomy for shape construction and property access.
//!
//! None of these errors are retried or degraded: they indicate caller bugs
//! (descriptor reuse, wrong typed accessor, access through an unrelated
//! shape, duplicate builder registration) and are propagated immediately.
//! Builder errors prevent any shape from being created; access errors never
//! corrupt values already stored in other properties.

use crate::kind::Kind;
use crate::shape::ShapeId;

// =============================================================================
// ShapeError
// =============================================================================

/// Errors raised by the shape engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// `init_offset`/`init_shape` called a second time on one descriptor.
    ///
    /// Almost always means the descriptor was added to more than one builder,
    /// or more than once to the same builder.
    Reinitialization {
        /// Property identifier.
        id: String,
        /// Declared kind of the property.
        kind: Kind,
        /// Which binding was repeated: `"offset"` or `"shape"`.
        what: &'static str,
    },

    /// A typed accessor was used on a property of a different kind.
    KindMismatch {
        /// Property identifier.
        id: String,
        /// The property's declared kind.
        have: Kind,
        /// The kind the accessor expected.
        want: Kind,
    },

    /// Guarded storage access with a shape outside the object's lineage.
    IncompatibleShape {
        /// Property identifier that attempted the access.
        id: String,
        /// Shape of the accessed object.
        object_shape: ShapeId,
        /// Shape owning the property.
        property_shape: ShapeId,
    },

    /// Duplicate property id registered to a single builder.
    BuilderConflict {
        /// The conflicting property identifier.
        id: String,
    },

    /// Accessor used on a descriptor that was never bound by a `build()`.
    Unbound {
        /// Property identifier.
        id: String,
    },
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reinitialization { id, kind, what } => {
                write!(
                    f,
                    "attempt to reinitialize the {} of static property '{}' of type '{}'; \
                     was it added to more than one builder or multiple times to the same builder?",
                    what, id, kind
                )
            }
            Self::KindMismatch { id, have, want } => {
                write!(
                    f,
                    "static property '{}' of type '{}' cannot be accessed as '{}'",
                    id, have, want
                )
            }
            Self::IncompatibleShape {
                id,
                object_shape,
                property_shape,
            } => {
                write!(
                    f,
                    "object of shape {:?} is not compatible with property '{}' owned by shape {:?}",
                    object_shape, id, property_shape
                )
            }
            Self::BuilderConflict { id } => {
                write!(f, "duplicate property id '{}' registered to one builder", id)
            }
            Self::Unbound { id } => {
                write!(
                    f,
                    "static property '{}' was not assigned a storage location; \
                     was its builder's build() ever called?",
                    id
                )
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// Result type for shape engine operations.
pub type ShapeResult<T> = Result<T, ShapeError>;

// =============================================================================
// Tests
// =============================================================================
