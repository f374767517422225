//! Storage representation synthesis.
//!
//! Building a root shape requires a storage representation for its objects.
//! Synthesizing one may be expensive for exotic substrates, so the registry
//! memoizes generators per synthesizer type and base offset; the
//! [`StorageSynthesizer`] trait is the collaborator that performs the
//! synthesis, and the [`StorageGenerator`] it produces is the cheap,
//! shareable allocator attached to every shape of a lineage.
//!
//! The provided [`ArraySynthesizer`] covers the common case: a plain
//! zero-initialized byte region plus a reference-slot array, with an
//! optional header reserved at the front of the region.

use std::sync::Arc;

use crate::layout::Layout;
use crate::storage::Storage;

// =============================================================================
// Traits
// =============================================================================

/// Produces a [`StorageGenerator`] for root shapes.
///
/// Synthesizers of the same concrete type and base offset are assumed
/// interchangeable; the registry memoizes one generator per such pair.
pub trait StorageSynthesizer: Send + Sync {
    /// Bytes the storage representation reserves at the front of the
    /// primitive region, before any property.
    fn base_offset(&self) -> u32;

    /// Synthesize the generator. Called at most a handful of times per
    /// registry; racing first-time builds may each call it, with one result
    /// memoized.
    fn synthesize(&self) -> Arc<dyn StorageGenerator>;
}

/// Allocates object storage honoring a shape's layout.
pub trait StorageGenerator: Send + Sync {
    /// Allocate zeroed storage with the layout's primitive size and
    /// reference count.
    fn allocate(&self, layout: &Layout) -> Storage;
}

// =============================================================================
// Array-Backed Implementation
// =============================================================================

/// Default synthesizer: array-backed storage with no exotic representation.
#[derive(Debug, Default)]
pub struct ArraySynthesizer {
    base_offset: u32,
}

impl ArraySynthesizer {
    /// Synthesizer reserving `base_offset` header bytes in every object.
    pub fn with_base_offset(base_offset: u32) -> Self {
        Self { base_offset }
    }
}

impl StorageSynthesizer for ArraySynthesizer {
    fn base_offset(&self) -> u32 {
        self.base_offset
    }

    fn synthesize(&self) -> Arc<dyn StorageGenerator> {
        Arc::new(ArrayGenerator)
    }
}

/// Generator produced by [`ArraySynthesizer`].
#[derive(Debug)]
pub struct ArrayGenerator;

impl StorageGenerator for ArrayGenerator {
    fn allocate(&self, layout: &Layout) -> Storage {
        Storage::zeroed(layout.primitive_size(), layout.reference_count())
    }
}

// =============================================================================
// Tests
// =============================================================================
