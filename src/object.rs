//! Object instances, factories, and reference handles.
//!
//! A [`StaticObject`] pairs one shape with one freshly allocated storage.
//! Its fields are reachable only through the [`StaticProperty`] descriptors
//! bound to a shape in its lineage; the object itself exposes nothing but
//! its shape.

use std::sync::Arc;

use crate::shape::Shape;
use crate::storage::Storage;

// =============================================================================
// ObjectRef
// =============================================================================

/// Opaque pointer-sized handle stored in reference slots.
///
/// The engine never dereferences these; tracing and lifetime management
/// belong to the caller's collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(usize);

impl ObjectRef {
    /// The zero handle; reference slots start out holding it.
    pub const NULL: ObjectRef = ObjectRef(0);

    /// Wrap a raw handle value.
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// StaticObject
// =============================================================================

/// An allocated instance of one shape.
pub struct StaticObject {
    shape: Arc<Shape>,
    storage: Storage,
}

impl StaticObject {
    /// The shape this object was created from.
    #[inline]
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    #[inline]
    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl std::fmt::Debug for StaticObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticObject")
            .field("shape", &self.shape.id())
            .finish()
    }
}

// =============================================================================
// ObjectFactory
// =============================================================================

/// Allocates objects of one shape.
///
/// Cheap to clone and safe to share across threads; every `create` call
/// produces an object with independent zeroed storage.
#[derive(Clone)]
pub struct ObjectFactory {
    shape: Arc<Shape>,
}

impl ObjectFactory {
    pub(crate) fn new(shape: Arc<Shape>) -> Self {
        Self { shape }
    }

    /// The shape of objects this factory creates.
    #[inline]
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    /// Allocate a new object with zeroed storage.
    pub fn create(&self) -> StaticObject {
        let storage = self.shape.generator().allocate(self.shape.layout());
        StaticObject {
            shape: Arc::clone(&self.shape),
            storage,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind;
    use crate::property::StaticProperty;
    use crate::registry::{EngineConfig, ShapeRegistry};

    #[test]
    fn test_object_ref_null() {
        assert!(ObjectRef::NULL.is_null());
        assert_eq!(ObjectRef::NULL.raw(), 0);
        assert!(!ObjectRef::from_raw(1).is_null());
    }

    #[test]
    fn test_created_objects_start_zeroed() {
        let registry = ShapeRegistry::new(EngineConfig::default());
        let value = StaticProperty::new("value", Kind::Int64, false);
        let link = StaticProperty::new("link", Kind::Reference, false);
        let mut builder = registry.builder();
        builder.property(&value).property(&link);
        let shape = builder.build().unwrap();

        let obj = shape.factory().create();
        assert_eq!(value.get_i64(&obj).unwrap(), 0);
        assert_eq!(link.get_reference(&obj).unwrap(), ObjectRef::NULL);
    }

    #[test]
    fn test_factory_is_reusable() {
        let registry = ShapeRegistry::new(EngineConfig::default());
        let value = StaticProperty::new("value", Kind::Int32, false);
        let mut builder = registry.builder();
        builder.property(&value);
        let shape = builder.build().unwrap();

        let factory = shape.factory();
        let a = factory.create();
        let b = factory.create();
        value.set_i32(&a, 1).unwrap();
        value.set_i32(&b, 2).unwrap();
        assert_eq!(value.get_i32(&a).unwrap(), 1);
        assert_eq!(value.get_i32(&b).unwrap(), 2);
        assert_eq!(a.shape().id(), b.shape().id());
    }
}
