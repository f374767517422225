//! Shapes, shape lineage, and the shape builder.
//!
//! A [`Shape`] describes the storage layout shared by every object created
//! from it. Shapes form a lineage: a derived shape extends its parent's
//! layout and inherits access to every parent property. Shapes are immutable
//! after construction and shared via `Arc`.
//!
//! # Architecture
//!
//! - [`ShapeBuilder`] accumulates property descriptors and, on `build`,
//!   computes the layout, obtains a storage generator, constructs the shape,
//!   and binds each descriptor's offset and owning shape exactly once.
//! - [`Shape::storage_of`] is the access guard: a property bound to shape S
//!   may touch an object only if S appears in the object's shape lineage.
//!   The check compares shape ids at S's lineage depth, so it is O(1)
//!   regardless of how deep the lineage grows.

use std::any::TypeId;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::{ShapeError, ShapeResult};
use crate::kind::Kind;
use crate::layout::Layout;
use crate::object::{ObjectFactory, StaticObject};
use crate::property::StaticProperty;
use crate::registry::ShapeRegistry;
use crate::storage::Storage;
use crate::synth::{StorageGenerator, StorageSynthesizer};

// =============================================================================
// ShapeId
// =============================================================================

/// Process-unique identifier of one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(u32);

impl ShapeId {
    #[inline]
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

// =============================================================================
// Shape
// =============================================================================

/// An immutable storage description shared by all objects created from it.
pub struct Shape {
    id: ShapeId,
    layout: Layout,
    generator: Arc<dyn StorageGenerator>,
    parent: Option<Arc<Shape>>,
    /// Ids of every ancestor from the root down, ending with `self.id`.
    lineage: Box<[ShapeId]>,
    verify_access: bool,
}

impl Shape {
    /// Identifier of this shape.
    #[inline]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Storage layout of objects with this shape.
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Parent shape, if this shape was derived.
    #[inline]
    pub fn parent(&self) -> Option<&Arc<Shape>> {
        self.parent.as_ref()
    }

    /// The root of this shape's lineage (`self` for a root shape).
    pub fn root(&self) -> &Shape {
        let mut shape = self;
        while let Some(parent) = &shape.parent {
            shape = parent;
        }
        shape
    }

    /// Number of ancestors above this shape; 0 for a root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.lineage.len() - 1
    }

    /// Ids of the full lineage, root first, ending with this shape's id.
    #[inline]
    pub fn lineage(&self) -> &[ShapeId] {
        &self.lineage
    }

    #[inline]
    pub(crate) fn generator(&self) -> &Arc<dyn StorageGenerator> {
        &self.generator
    }

    /// Check whether an object of this shape may be accessed through
    /// properties owned by `owner`.
    #[inline]
    fn grants(&self, owner: &Shape) -> bool {
        self.id == owner.id
            || (self.lineage.len() > owner.depth() && self.lineage[owner.depth()] == owner.id)
    }

    /// Resolve the storage of `obj` for an access through a property owned
    /// by this shape.
    ///
    /// Grants access iff this shape appears in the object's lineage. When
    /// access verification is disabled in the engine configuration, the
    /// lineage check is skipped entirely.
    #[inline]
    pub(crate) fn storage_of<'o>(
        &self,
        property_id: &str,
        obj: &'o StaticObject,
    ) -> ShapeResult<&'o Storage> {
        if self.verify_access && !obj.shape().grants(self) {
            return Err(ShapeError::IncompatibleShape {
                id: property_id.to_string(),
                object_shape: obj.shape().id(),
                property_shape: self.id,
            });
        }
        Ok(obj.storage())
    }

    /// Create a factory that allocates objects of this shape.
    pub fn factory(self: &Arc<Self>) -> ObjectFactory {
        ObjectFactory::new(Arc::clone(self))
    }
}

impl std::fmt::Debug for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shape")
            .field("id", &self.id)
            .field("depth", &self.depth())
            .field("layout", &self.layout)
            .finish()
    }
}

// =============================================================================
// ShapeBuilder
// =============================================================================

/// Accumulates property descriptors and builds a [`Shape`].
///
/// Obtained from [`ShapeRegistry::builder`] (root shapes) or
/// [`ShapeRegistry::builder_derived`] (extending an existing shape). Consumed
/// by [`ShapeBuilder::build`].
pub struct ShapeBuilder<'r> {
    registry: &'r ShapeRegistry,
    synthesizer: Arc<dyn StorageSynthesizer>,
    synthesizer_type: TypeId,
    parent: Option<Arc<Shape>>,
    pending: Vec<Arc<StaticProperty>>,
}

impl<'r> ShapeBuilder<'r> {
    pub(crate) fn new(
        registry: &'r ShapeRegistry,
        synthesizer: Arc<dyn StorageSynthesizer>,
        synthesizer_type: TypeId,
        parent: Option<Arc<Shape>>,
    ) -> Self {
        Self {
            registry,
            synthesizer,
            synthesizer_type,
            parent,
            pending: Vec::new(),
        }
    }

    /// Register a property descriptor with this builder.
    ///
    /// Duplicate ids are rejected by [`build`](Self::build), and a
    /// descriptor registered to more than one builder fails its second
    /// `build` with [`ShapeError::Reinitialization`].
    pub fn property(&mut self, property: &Arc<StaticProperty>) -> &mut Self {
        self.pending.push(Arc::clone(property));
        self
    }

    /// Number of descriptors registered so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Compute the layout, construct the shape, and bind every registered
    /// descriptor to it.
    ///
    /// Validation happens before any descriptor is bound: a duplicate id
    /// fails with [`ShapeError::BuilderConflict`] and leaves every
    /// descriptor untouched.
    pub fn build(self) -> ShapeResult<Arc<Shape>> {
        let mut seen = FxHashSet::default();
        for property in &self.pending {
            if !seen.insert(property.id()) {
                return Err(ShapeError::BuilderConflict {
                    id: property.id().to_string(),
                });
            }
        }

        let kinds: Vec<Kind> = self.pending.iter().map(|p| p.kind()).collect();
        let (layout, offsets) = match &self.parent {
            Some(parent) => parent.layout().extend(&kinds),
            None => Layout::root(self.synthesizer.base_offset(), &kinds),
        };

        let generator = match &self.parent {
            Some(parent) => Arc::clone(parent.generator()),
            None => self
                .registry
                .generator_for(self.synthesizer_type, &self.synthesizer),
        };

        let id = self.registry.allocate_id();
        let lineage = match &self.parent {
            Some(parent) => {
                let mut ids = parent.lineage().to_vec();
                ids.push(id);
                ids.into_boxed_slice()
            }
            None => Box::new([id]) as Box<[ShapeId]>,
        };

        let shape = Arc::new(Shape {
            id,
            layout,
            generator,
            parent: self.parent,
            lineage,
            verify_access: self.registry.config().verify_shape_access,
        });

        for (property, offset) in self.pending.iter().zip(offsets) {
            property.init_offset(offset)?;
            property.init_shape(Arc::clone(&shape))?;
        }
        Ok(shape)
    }
}

// =============================================================================
// Tests
// =============================================================================
