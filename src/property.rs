//! Property descriptors and their typed accessor surface.
//!
//! A [`StaticProperty`] names one field of a shape: an identifier, a
//! [`Kind`], and a final marker. The descriptor is created unbound; building
//! a shape binds its storage offset and owning shape exactly once. After
//! binding, the descriptor is the sole entry point for reading and writing
//! that field on any object whose shape descends from the owner.
//!
//! # Accessor surface
//!
//! Each kind exposes plain (`get_*`/`set_*`) and volatile
//! (`get_*_volatile`/`set_*_volatile`) access. Word-sized kinds additionally
//! expose `compare_and_swap_*`, `compare_and_exchange_*`, `get_and_set_*`,
//! and (integers only) `get_and_add_*`; sub-word kinds expose the
//! compare-and-* pair, emulated on the containing 4-byte word. Floats
//! compare bit patterns, so a NaN expected value matches a stored NaN with
//! identical bits. Every accessor checks the declared kind first and the
//! object's shape lineage second.

use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::error::{ShapeError, ShapeResult};
use crate::kind::Kind;
use crate::object::{ObjectRef, StaticObject};
use crate::shape::Shape;
use crate::storage::Storage;

// =============================================================================
// PropertyFlags
// =============================================================================

bitflags! {
    /// Packed descriptor flags: the kind in the low nibble plus markers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyFlags: u8 {
        /// The property is written once during construction and treated as
        /// read-only afterwards; synthesizers may emit final storage for it.
        const STORE_AS_FINAL = 0b0001_0000;
        /// Low nibble holding the kind discriminant.
        const KIND_MASK = 0b0000_1111;
    }
}

impl PropertyFlags {
    fn pack(kind: Kind, store_as_final: bool) -> Self {
        let mut bits = kind as u8;
        if store_as_final {
            bits |= Self::STORE_AS_FINAL.bits();
        }
        Self::from_bits_retain(bits)
    }

    fn kind(self) -> Kind {
        match self.bits() & Self::KIND_MASK.bits() {
            0 => Kind::Int64,
            1 => Kind::Float64,
            2 => Kind::Int32,
            3 => Kind::Float32,
            4 => Kind::Int16,
            5 => Kind::Char16,
            6 => Kind::Int8,
            7 => Kind::Bool,
            _ => Kind::Reference,
        }
    }

    fn is_final(self) -> bool {
        self.contains(Self::STORE_AS_FINAL)
    }
}

// =============================================================================
// StaticProperty
// =============================================================================

/// A named, typed field descriptor bound to exactly one shape.
pub struct StaticProperty {
    id: String,
    flags: PropertyFlags,
    /// Byte offset for primitives, slot index for references. Write-once.
    offset: OnceLock<u32>,
    /// The shape that owns this property. Write-once.
    shape: OnceLock<Arc<Shape>>,
}

impl StaticProperty {
    /// Create an unbound descriptor.
    pub fn new(id: impl Into<String>, kind: Kind, store_as_final: bool) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            flags: PropertyFlags::pack(kind, store_as_final),
            offset: OnceLock::new(),
            shape: OnceLock::new(),
        })
    }

    /// Property identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declared kind.
    #[inline]
    pub fn kind(&self) -> Kind {
        self.flags.kind()
    }

    /// Whether the property was declared write-once.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags.is_final()
    }

    /// Bound storage location, if a `build()` has assigned one.
    ///
    /// A byte offset for primitive kinds, a slot index for references.
    #[inline]
    pub fn offset(&self) -> Option<u32> {
        self.offset.get().copied()
    }

    /// The owning shape, if a `build()` has bound one.
    #[inline]
    pub fn shape(&self) -> Option<&Arc<Shape>> {
        self.shape.get()
    }

    fn reinitialization(&self, what: &'static str) -> ShapeError {
        ShapeError::Reinitialization {
            id: self.id.clone(),
            kind: self.kind(),
            what,
        }
    }

    /// Assign the storage location. Fails on a second call.
    pub(crate) fn init_offset(&self, offset: u32) -> ShapeResult<()> {
        self.offset
            .set(offset)
            .map_err(|_| self.reinitialization("offset"))
    }

    /// Assign the owning shape. Fails on a second call.
    pub(crate) fn init_shape(&self, shape: Arc<Shape>) -> ShapeResult<()> {
        self.shape
            .set(shape)
            .map_err(|_| self.reinitialization("shape"))
    }

    /// Kind check, binding check, shape guard. Every accessor funnels
    /// through here.
    #[inline]
    fn storage<'o>(
        &self,
        want: Kind,
        obj: &'o StaticObject,
    ) -> ShapeResult<(&'o Storage, usize)> {
        let have = self.kind();
        if have != want {
            return Err(ShapeError::KindMismatch {
                id: self.id.clone(),
                have,
                want,
            });
        }
        let offset = match self.offset.get() {
            Some(offset) => *offset as usize,
            None => {
                return Err(ShapeError::Unbound {
                    id: self.id.clone(),
                })
            }
        };
        let shape = match self.shape.get() {
            Some(shape) => shape,
            None => {
                return Err(ShapeError::Unbound {
                    id: self.id.clone(),
                })
            }
        };
        let storage = shape.storage_of(&self.id, obj)?;
        Ok((storage, offset))
    }

    // =========================================================================
    // Int64
    // =========================================================================

    pub fn get_i64(&self, obj: &StaticObject) -> ShapeResult<i64> {
        let (s, off) = self.storage(Kind::Int64, obj)?;
        Ok(s.load_u64(off, Ordering::Relaxed) as i64)
    }

    pub fn set_i64(&self, obj: &StaticObject, value: i64) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Int64, obj)?;
        s.store_u64(off, value as u64, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_i64_volatile(&self, obj: &StaticObject) -> ShapeResult<i64> {
        let (s, off) = self.storage(Kind::Int64, obj)?;
        Ok(s.load_u64(off, Ordering::Acquire) as i64)
    }

    pub fn set_i64_volatile(&self, obj: &StaticObject, value: i64) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Int64, obj)?;
        s.store_u64(off, value as u64, Ordering::Release);
        Ok(())
    }

    /// Atomically replace the value if it equals `expected`; returns the
    /// witness value actually found.
    pub fn compare_and_exchange_i64(
        &self,
        obj: &StaticObject,
        expected: i64,
        new: i64,
    ) -> ShapeResult<i64> {
        let (s, off) = self.storage(Kind::Int64, obj)?;
        Ok(s.compare_exchange_u64(off, expected as u64, new as u64) as i64)
    }

    /// Atomically replace the value if it equals `expected`; returns whether
    /// the replacement happened.
    pub fn compare_and_swap_i64(
        &self,
        obj: &StaticObject,
        expected: i64,
        new: i64,
    ) -> ShapeResult<bool> {
        Ok(self.compare_and_exchange_i64(obj, expected, new)? == expected)
    }

    pub fn get_and_set_i64(&self, obj: &StaticObject, value: i64) -> ShapeResult<i64> {
        let (s, off) = self.storage(Kind::Int64, obj)?;
        Ok(s.swap_u64(off, value as u64) as i64)
    }

    /// Atomically add `delta` (wrapping); returns the previous value.
    pub fn get_and_add_i64(&self, obj: &StaticObject, delta: i64) -> ShapeResult<i64> {
        let (s, off) = self.storage(Kind::Int64, obj)?;
        Ok(s.fetch_add_u64(off, delta as u64) as i64)
    }

    // =========================================================================
    // Float64
    // =========================================================================

    pub fn get_f64(&self, obj: &StaticObject) -> ShapeResult<f64> {
        let (s, off) = self.storage(Kind::Float64, obj)?;
        Ok(f64::from_bits(s.load_u64(off, Ordering::Relaxed)))
    }

    pub fn set_f64(&self, obj: &StaticObject, value: f64) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Float64, obj)?;
        s.store_u64(off, value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get_f64_volatile(&self, obj: &StaticObject) -> ShapeResult<f64> {
        let (s, off) = self.storage(Kind::Float64, obj)?;
        Ok(f64::from_bits(s.load_u64(off, Ordering::Acquire)))
    }

    pub fn set_f64_volatile(&self, obj: &StaticObject, value: f64) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Float64, obj)?;
        s.store_u64(off, value.to_bits(), Ordering::Release);
        Ok(())
    }

    /// Bit-pattern compare-and-exchange; returns the witness value.
    pub fn compare_and_exchange_f64(
        &self,
        obj: &StaticObject,
        expected: f64,
        new: f64,
    ) -> ShapeResult<f64> {
        let (s, off) = self.storage(Kind::Float64, obj)?;
        Ok(f64::from_bits(s.compare_exchange_u64(
            off,
            expected.to_bits(),
            new.to_bits(),
        )))
    }

    /// Bit-pattern compare-and-swap; returns whether the replacement
    /// happened. Matches NaN against a bit-identical stored NaN.
    pub fn compare_and_swap_f64(
        &self,
        obj: &StaticObject,
        expected: f64,
        new: f64,
    ) -> ShapeResult<bool> {
        let (s, off) = self.storage(Kind::Float64, obj)?;
        let witness = s.compare_exchange_u64(off, expected.to_bits(), new.to_bits());
        Ok(witness == expected.to_bits())
    }

    pub fn get_and_set_f64(&self, obj: &StaticObject, value: f64) -> ShapeResult<f64> {
        let (s, off) = self.storage(Kind::Float64, obj)?;
        Ok(f64::from_bits(s.swap_u64(off, value.to_bits())))
    }

    // =========================================================================
    // Int32
    // =========================================================================

    pub fn get_i32(&self, obj: &StaticObject) -> ShapeResult<i32> {
        let (s, off) = self.storage(Kind::Int32, obj)?;
        Ok(s.load_u32(off, Ordering::Relaxed) as i32)
    }

    pub fn set_i32(&self, obj: &StaticObject, value: i32) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Int32, obj)?;
        s.store_u32(off, value as u32, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_i32_volatile(&self, obj: &StaticObject) -> ShapeResult<i32> {
        let (s, off) = self.storage(Kind::Int32, obj)?;
        Ok(s.load_u32(off, Ordering::Acquire) as i32)
    }

    pub fn set_i32_volatile(&self, obj: &StaticObject, value: i32) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Int32, obj)?;
        s.store_u32(off, value as u32, Ordering::Release);
        Ok(())
    }

    pub fn compare_and_exchange_i32(
        &self,
        obj: &StaticObject,
        expected: i32,
        new: i32,
    ) -> ShapeResult<i32> {
        let (s, off) = self.storage(Kind::Int32, obj)?;
        Ok(s.compare_exchange_u32(off, expected as u32, new as u32) as i32)
    }

    pub fn compare_and_swap_i32(
        &self,
        obj: &StaticObject,
        expected: i32,
        new: i32,
    ) -> ShapeResult<bool> {
        Ok(self.compare_and_exchange_i32(obj, expected, new)? == expected)
    }

    pub fn get_and_set_i32(&self, obj: &StaticObject, value: i32) -> ShapeResult<i32> {
        let (s, off) = self.storage(Kind::Int32, obj)?;
        Ok(s.swap_u32(off, value as u32) as i32)
    }

    /// Atomically add `delta` (wrapping); returns the previous value.
    pub fn get_and_add_i32(&self, obj: &StaticObject, delta: i32) -> ShapeResult<i32> {
        let (s, off) = self.storage(Kind::Int32, obj)?;
        Ok(s.fetch_add_u32(off, delta as u32) as i32)
    }

    // =========================================================================
    // Float32
    // =========================================================================

    pub fn get_f32(&self, obj: &StaticObject) -> ShapeResult<f32> {
        let (s, off) = self.storage(Kind::Float32, obj)?;
        Ok(f32::from_bits(s.load_u32(off, Ordering::Relaxed)))
    }

    pub fn set_f32(&self, obj: &StaticObject, value: f32) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Float32, obj)?;
        s.store_u32(off, value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get_f32_volatile(&self, obj: &StaticObject) -> ShapeResult<f32> {
        let (s, off) = self.storage(Kind::Float32, obj)?;
        Ok(f32::from_bits(s.load_u32(off, Ordering::Acquire)))
    }

    pub fn set_f32_volatile(&self, obj: &StaticObject, value: f32) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Float32, obj)?;
        s.store_u32(off, value.to_bits(), Ordering::Release);
        Ok(())
    }

    /// Bit-pattern compare-and-exchange; returns the witness value.
    pub fn compare_and_exchange_f32(
        &self,
        obj: &StaticObject,
        expected: f32,
        new: f32,
    ) -> ShapeResult<f32> {
        let (s, off) = self.storage(Kind::Float32, obj)?;
        Ok(f32::from_bits(s.compare_exchange_u32(
            off,
            expected.to_bits(),
            new.to_bits(),
        )))
    }

    pub fn compare_and_swap_f32(
        &self,
        obj: &StaticObject,
        expected: f32,
        new: f32,
    ) -> ShapeResult<bool> {
        let (s, off) = self.storage(Kind::Float32, obj)?;
        let witness = s.compare_exchange_u32(off, expected.to_bits(), new.to_bits());
        Ok(witness == expected.to_bits())
    }

    pub fn get_and_set_f32(&self, obj: &StaticObject, value: f32) -> ShapeResult<f32> {
        let (s, off) = self.storage(Kind::Float32, obj)?;
        Ok(f32::from_bits(s.swap_u32(off, value.to_bits())))
    }

    // =========================================================================
    // Int16
    // =========================================================================

    pub fn get_i16(&self, obj: &StaticObject) -> ShapeResult<i16> {
        let (s, off) = self.storage(Kind::Int16, obj)?;
        Ok(s.load_u16(off, Ordering::Relaxed) as i16)
    }

    pub fn set_i16(&self, obj: &StaticObject, value: i16) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Int16, obj)?;
        s.store_u16(off, value as u16, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_i16_volatile(&self, obj: &StaticObject) -> ShapeResult<i16> {
        let (s, off) = self.storage(Kind::Int16, obj)?;
        Ok(s.load_u16(off, Ordering::Acquire) as i16)
    }

    pub fn set_i16_volatile(&self, obj: &StaticObject, value: i16) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Int16, obj)?;
        s.store_u16(off, value as u16, Ordering::Release);
        Ok(())
    }

    /// Compare-and-exchange emulated on the containing word; returns the
    /// witness value.
    pub fn compare_and_exchange_i16(
        &self,
        obj: &StaticObject,
        expected: i16,
        new: i16,
    ) -> ShapeResult<i16> {
        let (s, off) = self.storage(Kind::Int16, obj)?;
        Ok(s.compare_exchange_u16_word(off, expected as u16, new as u16) as i16)
    }

    pub fn compare_and_swap_i16(
        &self,
        obj: &StaticObject,
        expected: i16,
        new: i16,
    ) -> ShapeResult<bool> {
        Ok(self.compare_and_exchange_i16(obj, expected, new)? == expected)
    }

    // =========================================================================
    // Char16
    // =========================================================================

    pub fn get_u16(&self, obj: &StaticObject) -> ShapeResult<u16> {
        let (s, off) = self.storage(Kind::Char16, obj)?;
        Ok(s.load_u16(off, Ordering::Relaxed))
    }

    pub fn set_u16(&self, obj: &StaticObject, value: u16) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Char16, obj)?;
        s.store_u16(off, value, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_u16_volatile(&self, obj: &StaticObject) -> ShapeResult<u16> {
        let (s, off) = self.storage(Kind::Char16, obj)?;
        Ok(s.load_u16(off, Ordering::Acquire))
    }

    pub fn set_u16_volatile(&self, obj: &StaticObject, value: u16) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Char16, obj)?;
        s.store_u16(off, value, Ordering::Release);
        Ok(())
    }

    pub fn compare_and_exchange_u16(
        &self,
        obj: &StaticObject,
        expected: u16,
        new: u16,
    ) -> ShapeResult<u16> {
        let (s, off) = self.storage(Kind::Char16, obj)?;
        Ok(s.compare_exchange_u16_word(off, expected, new))
    }

    pub fn compare_and_swap_u16(
        &self,
        obj: &StaticObject,
        expected: u16,
        new: u16,
    ) -> ShapeResult<bool> {
        Ok(self.compare_and_exchange_u16(obj, expected, new)? == expected)
    }

    // =========================================================================
    // Int8
    // =========================================================================

    pub fn get_i8(&self, obj: &StaticObject) -> ShapeResult<i8> {
        let (s, off) = self.storage(Kind::Int8, obj)?;
        Ok(s.load_u8(off, Ordering::Relaxed) as i8)
    }

    pub fn set_i8(&self, obj: &StaticObject, value: i8) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Int8, obj)?;
        s.store_u8(off, value as u8, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_i8_volatile(&self, obj: &StaticObject) -> ShapeResult<i8> {
        let (s, off) = self.storage(Kind::Int8, obj)?;
        Ok(s.load_u8(off, Ordering::Acquire) as i8)
    }

    pub fn set_i8_volatile(&self, obj: &StaticObject, value: i8) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Int8, obj)?;
        s.store_u8(off, value as u8, Ordering::Release);
        Ok(())
    }

    /// Compare-and-exchange emulated on the containing word; returns the
    /// witness value.
    pub fn compare_and_exchange_i8(
        &self,
        obj: &StaticObject,
        expected: i8,
        new: i8,
    ) -> ShapeResult<i8> {
        let (s, off) = self.storage(Kind::Int8, obj)?;
        Ok(s.compare_exchange_u8_word(off, expected as u8, new as u8) as i8)
    }

    pub fn compare_and_swap_i8(
        &self,
        obj: &StaticObject,
        expected: i8,
        new: i8,
    ) -> ShapeResult<bool> {
        Ok(self.compare_and_exchange_i8(obj, expected, new)? == expected)
    }

    // =========================================================================
    // Bool
    // =========================================================================

    pub fn get_bool(&self, obj: &StaticObject) -> ShapeResult<bool> {
        let (s, off) = self.storage(Kind::Bool, obj)?;
        Ok(s.load_u8(off, Ordering::Relaxed) != 0)
    }

    pub fn set_bool(&self, obj: &StaticObject, value: bool) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Bool, obj)?;
        s.store_u8(off, value as u8, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_bool_volatile(&self, obj: &StaticObject) -> ShapeResult<bool> {
        let (s, off) = self.storage(Kind::Bool, obj)?;
        Ok(s.load_u8(off, Ordering::Acquire) != 0)
    }

    pub fn set_bool_volatile(&self, obj: &StaticObject, value: bool) -> ShapeResult<()> {
        let (s, off) = self.storage(Kind::Bool, obj)?;
        s.store_u8(off, value as u8, Ordering::Release);
        Ok(())
    }

    /// Compare-and-exchange emulated on the containing word; values are
    /// normalized through bytes 0/1 and the witness byte is reported as
    /// nonzero-is-true.
    pub fn compare_and_exchange_bool(
        &self,
        obj: &StaticObject,
        expected: bool,
        new: bool,
    ) -> ShapeResult<bool> {
        let (s, off) = self.storage(Kind::Bool, obj)?;
        Ok(s.compare_exchange_u8_word(off, expected as u8, new as u8) != 0)
    }

    pub fn compare_and_swap_bool(
        &self,
        obj: &StaticObject,
        expected: bool,
        new: bool,
    ) -> ShapeResult<bool> {
        let (s, off) = self.storage(Kind::Bool, obj)?;
        let witness = s.compare_exchange_u8_word(off, expected as u8, new as u8);
        Ok(witness == expected as u8)
    }

    // =========================================================================
    // Reference
    // =========================================================================

    pub fn get_reference(&self, obj: &StaticObject) -> ShapeResult<ObjectRef> {
        let (s, slot) = self.storage(Kind::Reference, obj)?;
        Ok(ObjectRef::from_raw(s.load_reference(slot, Ordering::Relaxed)))
    }

    pub fn set_reference(&self, obj: &StaticObject, value: ObjectRef) -> ShapeResult<()> {
        let (s, slot) = self.storage(Kind::Reference, obj)?;
        s.store_reference(slot, value.raw(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get_reference_volatile(&self, obj: &StaticObject) -> ShapeResult<ObjectRef> {
        let (s, slot) = self.storage(Kind::Reference, obj)?;
        Ok(ObjectRef::from_raw(s.load_reference(slot, Ordering::Acquire)))
    }

    pub fn set_reference_volatile(&self, obj: &StaticObject, value: ObjectRef) -> ShapeResult<()> {
        let (s, slot) = self.storage(Kind::Reference, obj)?;
        s.store_reference(slot, value.raw(), Ordering::Release);
        Ok(())
    }

    pub fn compare_and_exchange_reference(
        &self,
        obj: &StaticObject,
        expected: ObjectRef,
        new: ObjectRef,
    ) -> ShapeResult<ObjectRef> {
        let (s, slot) = self.storage(Kind::Reference, obj)?;
        Ok(ObjectRef::from_raw(s.compare_exchange_reference(
            slot,
            expected.raw(),
            new.raw(),
        )))
    }

    pub fn compare_and_swap_reference(
        &self,
        obj: &StaticObject,
        expected: ObjectRef,
        new: ObjectRef,
    ) -> ShapeResult<bool> {
        Ok(self.compare_and_exchange_reference(obj, expected, new)? == expected)
    }

    pub fn get_and_set_reference(
        &self,
        obj: &StaticObject,
        value: ObjectRef,
    ) -> ShapeResult<ObjectRef> {
        let (s, slot) = self.storage(Kind::Reference, obj)?;
        Ok(ObjectRef::from_raw(s.swap_reference(slot, value.raw())))
    }
}

impl std::fmt::Debug for StaticProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticProperty")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("final", &self.is_final())
            .field("offset", &self.offset())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
