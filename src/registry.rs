//! Engine configuration, shape-id allocation, and the generator cache.
//!
//! A [`ShapeRegistry`] is the root object of one engine instance. It hands
//! out builders, allocates process-unique shape ids from an atomic counter,
//! and memoizes storage generators so that structurally equivalent root
//! shapes share one generator. All of it is lock-free; the cache relies on
//! `DashMap`'s atomic insert-if-absent.

use std::any::TypeId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::shape::{Shape, ShapeBuilder, ShapeId};
use crate::synth::{ArraySynthesizer, StorageGenerator, StorageSynthesizer};

// =============================================================================
// EngineConfig
// =============================================================================

/// Engine-wide configuration, fixed at registry creation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Verify on every property access that the object's shape lineage
    /// contains the property's owning shape. On by default; disabling it
    /// removes the per-access check for callers that guard shapes
    /// themselves.
    pub verify_shape_access: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_shape_access: true,
        }
    }
}

// =============================================================================
// ShapeRegistry
// =============================================================================

/// Cache key: synthesizer type identity plus the base offset it reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GeneratorKey {
    synthesizer: TypeId,
    base_offset: u32,
}

/// Root object of one engine instance.
pub struct ShapeRegistry {
    config: EngineConfig,
    next_id: AtomicU32,
    generators: DashMap<GeneratorKey, Arc<dyn StorageGenerator>>,
}

impl ShapeRegistry {
    /// Create a registry with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            next_id: AtomicU32::new(0),
            generators: DashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builder for a root shape with the default array-backed storage.
    pub fn builder(&self) -> ShapeBuilder<'_> {
        self.builder_with(Arc::new(ArraySynthesizer::default()))
    }

    /// Builder for a root shape with a caller-provided synthesizer.
    pub fn builder_with<S>(&self, synthesizer: Arc<S>) -> ShapeBuilder<'_>
    where
        S: StorageSynthesizer + 'static,
    {
        ShapeBuilder::new(self, synthesizer, TypeId::of::<S>(), None)
    }

    /// Builder for a shape derived from `parent`.
    ///
    /// Derived shapes reuse the parent's generator; the synthesizer is only
    /// consulted for root builds.
    pub fn builder_derived(&self, parent: &Arc<Shape>) -> ShapeBuilder<'_> {
        ShapeBuilder::new(
            self,
            Arc::new(ArraySynthesizer::default()),
            TypeId::of::<ArraySynthesizer>(),
            Some(Arc::clone(parent)),
        )
    }

    /// Allocate the next shape id.
    pub(crate) fn allocate_id(&self) -> ShapeId {
        ShapeId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of shapes built through this registry.
    pub fn shape_count(&self) -> u32 {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Number of distinct memoized generators.
    pub fn generator_count(&self) -> usize {
        self.generators.len()
    }

    /// Memoized generator lookup for a root build.
    ///
    /// Racing first-time builds may both synthesize; the entry call decides
    /// the winner and losers adopt its generator.
    pub(crate) fn generator_for(
        &self,
        type_key: TypeId,
        synthesizer: &Arc<dyn StorageSynthesizer>,
    ) -> Arc<dyn StorageGenerator> {
        let key = GeneratorKey {
            synthesizer: type_key,
            base_offset: synthesizer.base_offset(),
        };
        if let Some(existing) = self.generators.get(&key) {
            return Arc::clone(existing.value());
        }
        let fresh = synthesizer.synthesize();
        Arc::clone(self.generators.entry(key).or_insert(fresh).value())
    }
}

impl std::fmt::Debug for ShapeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeRegistry")
            .field("config", &self.config)
            .field("shape_count", &self.shape_count())
            .field("generator_count", &self.generator_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
