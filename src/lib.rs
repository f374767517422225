//! Inline object-shape layout engine.
//!
//! This crate provides:
//! - Typed property descriptors (`StaticProperty`) with write-once binding
//! - Greedy widest-first byte packing with hole reuse across a shape lineage
//! - Shape-guarded object access verified against the lineage in O(1)
//! - Plain, volatile, and compare-and-* accessors for every property kind
//! - Sub-word compare-and-exchange emulated on the containing 4-byte word
//! - Pluggable storage synthesis with a memoized generator cache
//!
//! # Architecture
//!
//! A [`ShapeRegistry`] hands out builders. A builder collects
//! [`StaticProperty`] descriptors and produces an immutable [`Shape`] whose
//! [`Layout`] assigns each primitive property a byte offset and each
//! reference property a slot index. Objects are allocated through
//! [`Shape::factory`]; all reads and writes go through the descriptors,
//! which check the declared kind and the object's lineage before touching
//! storage. Everything after `build` is immutable and lock-free.
//!
//! ```
//! use staticshape::{EngineConfig, Kind, ShapeRegistry, StaticProperty};
//!
//! let registry = ShapeRegistry::new(EngineConfig::default());
//! let counter = StaticProperty::new("counter", Kind::Int64, false);
//! let mut builder = registry.builder();
//! builder.property(&counter);
//! let shape = builder.build()?;
//!
//! let obj = shape.factory().create();
//! counter.set_i64(&obj, 41)?;
//! assert_eq!(counter.get_and_add_i64(&obj, 1)?, 41);
//! assert_eq!(counter.get_i64(&obj)?, 42);
//! # Ok::<(), staticshape::ShapeError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod kind;
pub mod layout;
pub mod object;
pub mod property;
pub mod registry;
pub mod shape;
pub mod storage;
pub mod synth;

// Re-export the primary API surface
pub use error::{ShapeError, ShapeResult};
pub use kind::Kind;
pub use layout::{Hole, Layout, SlotOffset};
pub use object::{ObjectFactory, ObjectRef, StaticObject};
pub use property::{PropertyFlags, StaticProperty};
pub use registry::{EngineConfig, ShapeRegistry};
pub use shape::{Shape, ShapeBuilder, ShapeId};
pub use storage::Storage;
pub use synth::{ArrayGenerator, ArraySynthesizer, StorageGenerator, StorageSynthesizer};
