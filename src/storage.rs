//! Raw storage substrate for shape-laid-out property values.
//!
//! A [`Storage`] owns two regions:
//! - a zero-initialized, 8-aligned primitive byte region addressed by the
//!   byte offsets a [`Layout`](crate::layout::Layout) assigns, and
//! - an array of pointer-sized reference slots.
//!
//! Every access goes through std atomics: "plain" operations use `Relaxed`
//! ordering, "volatile" operations use `Acquire`/`Release`, and
//! read-modify-write operations use `AcqRel`. All operations are lock-free.
//!
//! Sub-word (1/2-byte) compare-and-exchange is emulated on the containing
//! 4-byte-aligned word: load the word, bail out with the witness if the
//! masked bits differ from the expected value, otherwise CAS the full word
//! with the sub-word bits replaced, retrying under contention. The primitive
//! region is padded to a 4-byte multiple so the containing word is always in
//! bounds.

use std::alloc::{alloc_zeroed, dealloc, Layout as AllocLayout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::layout::align_up;

/// Alignment of the primitive byte region.
const REGION_ALIGN: usize = 8;

// =============================================================================
// Raw Region
// =============================================================================

/// Heap-allocated, zeroed, 8-aligned byte region.
struct RawRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl RawRegion {
    /// Allocate a zeroed region of `len` bytes, padded to a 4-byte multiple
    /// so word-based sub-word CAS never reads past the end.
    fn zeroed(len: usize) -> Self {
        let padded = align_up(len as u32, 4) as usize;
        let alloc_len = padded.max(REGION_ALIGN);
        let alloc_layout = AllocLayout::from_size_align(alloc_len, REGION_ALIGN)
            .expect("storage region layout");
        // SAFETY: alloc_len is nonzero and the layout is valid.
        let raw = unsafe { alloc_zeroed(alloc_layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(alloc_layout));
        Self { ptr, len: alloc_len }
    }

    /// View the bytes at `offset` as an atomic of width `W`.
    ///
    /// Panics on an out-of-bounds or misaligned offset; offsets assigned by
    /// the layout algorithm are always naturally aligned and in bounds, so a
    /// panic here indicates access through the wrong shape with verification
    /// disabled.
    #[inline]
    fn atom<A>(&self, offset: usize) -> &A {
        let width = std::mem::size_of::<A>();
        assert!(
            offset + width <= self.len && offset % width == 0,
            "storage access out of bounds: offset {} width {} len {}",
            offset,
            width,
            self.len
        );
        // SAFETY: the range is in bounds, naturally aligned, and the region
        // outlives the returned reference; all mutation goes through atomics.
        unsafe { &*(self.ptr.as_ptr().add(offset) as *const A) }
    }
}

impl Drop for RawRegion {
    fn drop(&mut self) {
        let alloc_layout = AllocLayout::from_size_align(self.len, REGION_ALIGN)
            .expect("storage region layout");
        // SAFETY: allocated in `zeroed` with the same layout.
        unsafe { dealloc(self.ptr.as_ptr(), alloc_layout) };
    }
}

// The region is only ever read/written through atomic operations.
unsafe impl Send for RawRegion {}
unsafe impl Sync for RawRegion {}

// =============================================================================
// Storage
// =============================================================================

/// Raw value storage for one object instance.
///
/// Obtained from a shape's guarded accessor; typed access is provided by
/// [`StaticProperty`](crate::property::StaticProperty).
pub struct Storage {
    region: RawRegion,
    references: Box<[AtomicUsize]>,
}

impl Storage {
    /// Allocate zeroed storage with the given primitive byte size and
    /// reference slot count.
    pub fn zeroed(primitive_size: u32, reference_count: u32) -> Self {
        let references = (0..reference_count)
            .map(|_| AtomicUsize::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            region: RawRegion::zeroed(primitive_size as usize),
            references,
        }
    }

    /// Allocated primitive region length in bytes (including padding).
    #[inline]
    pub fn primitive_len(&self) -> usize {
        self.region.len
    }

    /// Number of reference slots.
    #[inline]
    pub fn reference_len(&self) -> usize {
        self.references.len()
    }

    #[inline]
    fn reference_slot(&self, slot: usize) -> &AtomicUsize {
        &self.references[slot]
    }

    // =========================================================================
    // Loads / Stores
    // =========================================================================

    #[inline]
    pub(crate) fn load_u8(&self, offset: usize, order: Ordering) -> u8 {
        self.region.atom::<AtomicU8>(offset).load(order)
    }

    #[inline]
    pub(crate) fn store_u8(&self, offset: usize, value: u8, order: Ordering) {
        self.region.atom::<AtomicU8>(offset).store(value, order)
    }

    #[inline]
    pub(crate) fn load_u16(&self, offset: usize, order: Ordering) -> u16 {
        self.region.atom::<AtomicU16>(offset).load(order)
    }

    #[inline]
    pub(crate) fn store_u16(&self, offset: usize, value: u16, order: Ordering) {
        self.region.atom::<AtomicU16>(offset).store(value, order)
    }

    #[inline]
    pub(crate) fn load_u32(&self, offset: usize, order: Ordering) -> u32 {
        self.region.atom::<AtomicU32>(offset).load(order)
    }

    #[inline]
    pub(crate) fn store_u32(&self, offset: usize, value: u32, order: Ordering) {
        self.region.atom::<AtomicU32>(offset).store(value, order)
    }

    #[inline]
    pub(crate) fn load_u64(&self, offset: usize, order: Ordering) -> u64 {
        self.region.atom::<AtomicU64>(offset).load(order)
    }

    #[inline]
    pub(crate) fn store_u64(&self, offset: usize, value: u64, order: Ordering) {
        self.region.atom::<AtomicU64>(offset).store(value, order)
    }

    #[inline]
    pub(crate) fn load_reference(&self, slot: usize, order: Ordering) -> usize {
        self.reference_slot(slot).load(order)
    }

    #[inline]
    pub(crate) fn store_reference(&self, slot: usize, value: usize, order: Ordering) {
        self.reference_slot(slot).store(value, order)
    }

    // =========================================================================
    // Native-Width Atomics
    // =========================================================================

    /// Compare-and-exchange a 4-byte value; returns the witness.
    #[inline]
    pub(crate) fn compare_exchange_u32(&self, offset: usize, expected: u32, new: u32) -> u32 {
        match self.region.atom::<AtomicU32>(offset).compare_exchange(
            expected,
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(witness) | Err(witness) => witness,
        }
    }

    /// Compare-and-exchange an 8-byte value; returns the witness.
    #[inline]
    pub(crate) fn compare_exchange_u64(&self, offset: usize, expected: u64, new: u64) -> u64 {
        match self.region.atom::<AtomicU64>(offset).compare_exchange(
            expected,
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(witness) | Err(witness) => witness,
        }
    }

    /// Compare-and-exchange a reference slot; returns the witness.
    #[inline]
    pub(crate) fn compare_exchange_reference(
        &self,
        slot: usize,
        expected: usize,
        new: usize,
    ) -> usize {
        match self.reference_slot(slot).compare_exchange(
            expected,
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(witness) | Err(witness) => witness,
        }
    }

    #[inline]
    pub(crate) fn swap_u32(&self, offset: usize, value: u32) -> u32 {
        self.region
            .atom::<AtomicU32>(offset)
            .swap(value, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn swap_u64(&self, offset: usize, value: u64) -> u64 {
        self.region
            .atom::<AtomicU64>(offset)
            .swap(value, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn swap_reference(&self, slot: usize, value: usize) -> usize {
        self.reference_slot(slot).swap(value, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn fetch_add_u32(&self, offset: usize, delta: u32) -> u32 {
        self.region
            .atom::<AtomicU32>(offset)
            .fetch_add(delta, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn fetch_add_u64(&self, offset: usize, delta: u64) -> u64 {
        self.region
            .atom::<AtomicU64>(offset)
            .fetch_add(delta, Ordering::AcqRel)
    }

    // =========================================================================
    // Sub-Word Compare-And-Exchange
    // =========================================================================

    /// Emulated 1-byte compare-and-exchange; returns the witness.
    pub(crate) fn compare_exchange_u8_word(&self, offset: usize, expected: u8, new: u8) -> u8 {
        let word_offset = offset & !3;
        let mut shift = ((offset & 3) << 3) as u32;
        if cfg!(target_endian = "big") {
            shift = 24 - shift;
        }
        let mask = 0xFFu32 << shift;
        let masked_expected = (expected as u32) << shift;
        let masked_new = (new as u32) << shift;
        let word = self.region.atom::<AtomicU32>(word_offset);
        loop {
            let full = word.load(Ordering::Acquire);
            if full & mask != masked_expected {
                return ((full & mask) >> shift) as u8;
            }
            if word
                .compare_exchange_weak(
                    full,
                    (full & !mask) | masked_new,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return expected;
            }
        }
    }

    /// Emulated 2-byte compare-and-exchange; returns the witness.
    ///
    /// Layout-assigned 2-byte offsets are always even, so the field never
    /// spans the containing word.
    pub(crate) fn compare_exchange_u16_word(&self, offset: usize, expected: u16, new: u16) -> u16 {
        debug_assert!(offset & 3 != 3, "2-byte field spans the containing word");
        let word_offset = offset & !3;
        let mut shift = ((offset & 3) << 3) as u32;
        if cfg!(target_endian = "big") {
            shift = 16 - shift;
        }
        let mask = 0xFFFFu32 << shift;
        let masked_expected = (expected as u32) << shift;
        let masked_new = (new as u32) << shift;
        let word = self.region.atom::<AtomicU32>(word_offset);
        loop {
            let full = word.load(Ordering::Acquire);
            if full & mask != masked_expected {
                return ((full & mask) >> shift) as u16;
            }
            if word
                .compare_exchange_weak(
                    full,
                    (full & !mask) | masked_new,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return expected;
            }
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("primitive_len", &self.region.len)
            .field("reference_len", &self.references.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
