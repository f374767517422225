//! Byte layout computation for shape property storage.
//!
//! Implements greedy widest-first bin packing with hole reuse across the
//! shape lineage. A layout is computed once per shape and never mutated;
//! deriving a child shape recomputes a fresh layout that starts from the
//! parent's leftover holes.
//!
//! # Algorithm
//!
//! 1. Count new primitive properties per kind.
//! 2. Pick a start offset at or after the parent's end, aligned to the
//!    widest new kind. A root records skipped front bytes as a hole; a
//!    derived layout treats them as plain slack.
//! 3. Tentatively assign offsets widest-first, packed contiguously.
//! 4. Fill inherited holes in declaration order, from the high end inward,
//!    trying kinds largest-first and falling back to narrower kinds when a
//!    placement would be misaligned. Unfillable remainders become leftover
//!    holes for the next derived shape.
//! 5. Unabsorbed properties keep their tentative offsets.
//! 6. Reference properties append to a separate, strictly growing slot
//!    array; no hole logic applies to them.
//!
//! The heuristic is deliberately not best-fit: holes are processed in
//! declaration order and filled high-to-low so that structurally identical
//! shapes always produce identical layouts.

use crate::kind::Kind;
use smallvec::SmallVec;

// =============================================================================
// Hole
// =============================================================================

/// A byte range left unused by alignment, reusable by a descendant layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    /// First byte of the hole.
    pub start: u32,
    /// One past the last byte of the hole.
    pub end: u32,
}

impl Hole {
    /// Size of the hole in bytes.
    #[inline]
    pub const fn len(self) -> u32 {
        self.end - self.start
    }

    /// Check whether the hole is exhausted.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub(crate) const fn align_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

// =============================================================================
// Layout
// =============================================================================

/// The computed storage layout of one shape.
///
/// Owned by exactly one [`Shape`](crate::shape::Shape) and immutable after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Total primitive region size in bytes, including the base offset.
    primitive_size: u32,
    /// Number of reference slots.
    reference_count: u32,
    /// Unfilled byte ranges available to derived layouts.
    holes: SmallVec<[Hole; 4]>,
    /// Start offset of the farthest-placed primitive, or the base if none.
    last_offset: u32,
    /// Bytes reserved at the front of the region by the storage substrate.
    base_offset: u32,
}

/// Storage location assigned to one new property.
///
/// A byte offset for primitives, a slot index for references.
pub type SlotOffset = u32;

impl Layout {
    /// Compute a root layout for the given property kinds.
    ///
    /// `base_offset` is the number of bytes the storage substrate reserves
    /// at the front of the primitive region. Returns the layout and the
    /// per-property storage locations, in declaration order.
    pub fn root(base_offset: u32, kinds: &[Kind]) -> (Layout, Vec<SlotOffset>) {
        Self::compute(None, base_offset, kinds)
    }

    /// Compute a derived layout extending `self` with new property kinds.
    pub fn extend(&self, kinds: &[Kind]) -> (Layout, Vec<SlotOffset>) {
        Self::compute(Some(self), self.base_offset, kinds)
    }

    /// Total primitive region size in bytes.
    #[inline]
    pub fn primitive_size(&self) -> u32 {
        self.primitive_size
    }

    /// Number of reference slots.
    #[inline]
    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    /// Leftover holes available to derived layouts.
    #[inline]
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    /// Start offset of the farthest-placed primitive.
    #[inline]
    pub fn last_offset(&self) -> u32 {
        self.last_offset
    }

    /// Bytes reserved at the front of the region by the substrate.
    #[inline]
    pub fn base_offset(&self) -> u32 {
        self.base_offset
    }

    fn compute(
        parent: Option<&Layout>,
        base_offset: u32,
        kinds: &[Kind],
    ) -> (Layout, Vec<SlotOffset>) {
        let is_root = parent.is_none();
        let base = parent.map_or(base_offset, |p| p.primitive_size);
        let parent_refs = parent.map_or(0, |p| p.reference_count);
        let mut holes: SmallVec<[Hole; 4]> =
            parent.map_or_else(SmallVec::new, |p| p.holes.clone());

        let mut offsets = vec![0u32; kinds.len()];

        // References append to their own strictly growing array.
        let mut next_ref = parent_refs;
        for (i, kind) in kinds.iter().enumerate() {
            if kind.is_reference() {
                offsets[i] = next_ref;
                next_ref += 1;
            }
        }

        // Group primitives by kind, preserving declaration order per kind.
        let mut runs: [Vec<usize>; 8] = Default::default();
        let mut largest = 0u32;
        for (i, kind) in kinds.iter().enumerate() {
            if kind.is_primitive() {
                runs[kind.packing_index()].push(i);
                largest = largest.max(kind.byte_width());
            }
        }

        if largest == 0 {
            // No primitives: the byte region is untouched.
            let last_offset = parent.map_or(base, |p| p.last_offset);
            return (
                Layout {
                    primitive_size: base,
                    reference_count: next_ref,
                    holes,
                    last_offset,
                    base_offset,
                },
                offsets,
            );
        }

        let start = align_up(base, largest);
        let inherited = std::mem::take(&mut holes);
        if is_root && start > base {
            // Front alignment slack becomes a hole for descendants.
            holes.push(Hole { start: base, end: start });
        }

        // Tentative widest-first contiguous assignment.
        let mut cursor = start;
        for kind in Kind::PRIMITIVES_BY_WIDTH {
            let width = kind.byte_width();
            for &i in &runs[kind.packing_index()] {
                offsets[i] = cursor;
                cursor += width;
            }
        }

        // Fill inherited holes from the high end inward. Absorbed fields are
        // taken from the tail of each kind's tentative run so the occupied
        // frontier shrinks as far as possible.
        let mut remaining: [usize; 8] =
            std::array::from_fn(|k| runs[k].len());
        for mut hole in inherited {
            loop {
                let mut placed = false;
                for kind in Kind::PRIMITIVES_BY_WIDTH {
                    let k = kind.packing_index();
                    let width = kind.byte_width();
                    if remaining[k] == 0 || hole.len() < width {
                        continue;
                    }
                    let pos = hole.end - width;
                    if pos % width != 0 {
                        // Misaligned here; a narrower kind may realign.
                        continue;
                    }
                    remaining[k] -= 1;
                    offsets[runs[k][remaining[k]]] = pos;
                    hole.end = pos;
                    placed = true;
                    break;
                }
                if !placed || hole.is_empty() {
                    break;
                }
            }
            if !hole.is_empty() {
                holes.push(hole);
            }
        }

        // Final size: the farthest occupied byte, never less than the
        // parent's size. A derived shape whose additions were fully absorbed
        // by holes keeps the parent size exactly.
        let mut primitive_size = base;
        let mut last_offset = parent.map_or(base, |p| p.last_offset);
        for (i, kind) in kinds.iter().enumerate() {
            if kind.is_primitive() {
                primitive_size = primitive_size.max(offsets[i] + kind.byte_width());
                last_offset = last_offset.max(offsets[i]);
            }
        }

        (
            Layout {
                primitive_size,
                reference_count: next_ref,
                holes,
                last_offset,
                base_offset,
            },
            offsets,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind::*;

    // -------------------------------------------------------------------------
    // Basic Packing
    // -------------------------------------------------------------------------

    #[test]
    fn test_mixed_width_root_packing() {
        // {a: i64, b: bool, c: i32} on a root with zero initial slack:
        // a=0 (8 bytes), c=8 (4 bytes), b=12 (1 byte), size 13, no refs.
        let (layout, offsets) = Layout::root(0, &[Int64, Bool, Int32]);
        assert_eq!(offsets, vec![0, 12, 8]);
        assert_eq!(layout.primitive_size(), 13);
        assert_eq!(layout.reference_count(), 0);
    }

    #[test]
    fn test_widest_first_is_slack_free() {
        // One of every primitive width: 8+8+4+4+2+2+1+1 = 30 bytes, no gaps.
        let kinds = [Int64, Float64, Int32, Float32, Int16, Char16, Int8, Bool];
        let (layout, offsets) = Layout::root(0, &kinds);
        assert_eq!(layout.primitive_size(), 30);
        // Natural alignment for every field.
        for (i, kind) in kinds.iter().enumerate() {
            assert_eq!(offsets[i] % kind.byte_width(), 0, "field {} misaligned", i);
        }
    }

    #[test]
    fn test_declaration_order_within_kind() {
        let (_, offsets) = Layout::root(0, &[Int32, Int32, Int32]);
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[test]
    fn test_empty_root() {
        let (layout, offsets) = Layout::root(0, &[]);
        assert!(offsets.is_empty());
        assert_eq!(layout.primitive_size(), 0);
        assert_eq!(layout.reference_count(), 0);
        assert!(layout.holes().is_empty());
    }

    // -------------------------------------------------------------------------
    // Root Front Slack
    // -------------------------------------------------------------------------

    #[test]
    fn test_root_front_slack_becomes_hole() {
        // 12-byte substrate header, widest kind 8 => start at 16, hole 12..16.
        let (layout, offsets) = Layout::root(12, &[Int64]);
        assert_eq!(offsets, vec![16]);
        assert_eq!(layout.primitive_size(), 24);
        assert_eq!(layout.holes(), &[Hole { start: 12, end: 16 }]);
    }

    #[test]
    fn test_aligned_base_leaves_no_hole() {
        let (layout, offsets) = Layout::root(16, &[Int64]);
        assert_eq!(offsets, vec![16]);
        assert!(layout.holes().is_empty());
    }

    // -------------------------------------------------------------------------
    // Hole Reuse
    // -------------------------------------------------------------------------

    #[test]
    fn test_exact_hole_fill_does_not_grow() {
        let (parent, _) = Layout::root(12, &[Int64]);
        assert_eq!(parent.primitive_size(), 24);

        // The 4-byte hole at 12..16 absorbs the i32 entirely.
        let (child, offsets) = parent.extend(&[Int32]);
        assert_eq!(offsets, vec![12]);
        assert_eq!(child.primitive_size(), parent.primitive_size());
        assert!(child.holes().is_empty());
    }

    #[test]
    fn test_hole_fills_high_to_low() {
        let (parent, _) = Layout::root(12, &[Int64]);
        // Two i16 fields into the 12..16 hole: high end first.
        let (child, offsets) = parent.extend(&[Int16, Int16]);
        // Tail of the run is absorbed first: the later declaration lands high.
        assert_eq!(offsets, vec![12, 14]);
        assert_eq!(child.primitive_size(), parent.primitive_size());
    }

    #[test]
    fn test_partial_fill_records_leftover_hole() {
        let (parent, _) = Layout::root(12, &[Int64]);
        let (child, offsets) = parent.extend(&[Int16]);
        assert_eq!(offsets, vec![14]);
        assert_eq!(child.holes(), &[Hole { start: 12, end: 14 }]);
        assert_eq!(child.primitive_size(), parent.primitive_size());

        // A grandchild can consume the remainder.
        let (grandchild, offsets) = child.extend(&[Char16]);
        assert_eq!(offsets, vec![12]);
        assert!(grandchild.holes().is_empty());
        assert_eq!(grandchild.primitive_size(), parent.primitive_size());
    }

    #[test]
    fn test_misaligned_placement_tries_narrower_kind() {
        // Parent: header 13, one i64 at 16 => hole 13..16 (3 bytes).
        let (parent, offsets) = Layout::root(13, &[Int64]);
        assert_eq!(offsets, vec![16]);
        assert_eq!(parent.holes(), &[Hole { start: 13, end: 16 }]);

        // i16 at 16-2=14 is aligned; then i8 at 13 exhausts the hole.
        let (child, offsets) = parent.extend(&[Int16, Int8]);
        assert_eq!(offsets, vec![14, 13]);
        assert!(child.holes().is_empty());
        assert_eq!(child.primitive_size(), parent.primitive_size());
    }

    #[test]
    fn test_unfillable_remainder_survives() {
        // Hole 13..16; a lone i32 cannot go there (too big), so the whole
        // hole is carried forward and the i32 extends the region.
        let (parent, _) = Layout::root(13, &[Int64]);
        let (child, offsets) = parent.extend(&[Int32]);
        assert_eq!(offsets, vec![24]);
        assert_eq!(child.holes(), &[Hole { start: 13, end: 16 }]);
        assert_eq!(child.primitive_size(), 28);
    }

    // -------------------------------------------------------------------------
    // Derived Start Slack
    // -------------------------------------------------------------------------

    #[test]
    fn test_derived_alignment_gap_is_slack_not_hole() {
        // Parent size 13; a derived i32 starts at 16 and the 13..16 gap is
        // plain slack, not a recorded hole.
        let (parent, _) = Layout::root(0, &[Int64, Bool, Int32]);
        assert_eq!(parent.primitive_size(), 13);
        let (child, offsets) = parent.extend(&[Int32]);
        assert_eq!(offsets, vec![16]);
        assert!(child.holes().is_empty());
        assert_eq!(child.primitive_size(), 20);
    }

    // -------------------------------------------------------------------------
    // References
    // -------------------------------------------------------------------------

    #[test]
    fn test_reference_slots_append() {
        let (parent, offsets) = Layout::root(0, &[Reference, Int32, Reference]);
        assert_eq!(offsets, vec![0, 0, 1]);
        assert_eq!(parent.reference_count(), 2);
        assert_eq!(parent.primitive_size(), 4);

        let (child, offsets) = parent.extend(&[Reference]);
        assert_eq!(offsets, vec![2]);
        assert_eq!(child.reference_count(), 3);
        // References never touch the byte region.
        assert_eq!(child.primitive_size(), parent.primitive_size());
    }

    #[test]
    fn test_reference_only_root() {
        let (layout, offsets) = Layout::root(8, &[Reference, Reference]);
        assert_eq!(offsets, vec![0, 1]);
        assert_eq!(layout.primitive_size(), 8);
        assert!(layout.holes().is_empty());
    }

    // -------------------------------------------------------------------------
    // Determinism
    // -------------------------------------------------------------------------

    #[test]
    fn test_identical_inputs_identical_layouts() {
        let kinds = [Int64, Bool, Int32, Reference, Int16, Float32];
        let (a, offs_a) = Layout::root(4, &kinds);
        let (b, offs_b) = Layout::root(4, &kinds);
        assert_eq!(a, b);
        assert_eq!(offs_a, offs_b);

        let (a2, offs_a2) = a.extend(&[Int8, Char16]);
        let (b2, offs_b2) = b.extend(&[Int8, Char16]);
        assert_eq!(a2, b2);
        assert_eq!(offs_a2, offs_b2);
    }

    #[test]
    fn test_deep_lineage_never_shrinks() {
        let (mut layout, _) = Layout::root(0, &[Int64]);
        let mut prev = layout.primitive_size();
        for kind in [Bool, Int16, Int32, Int8, Float64, Char16, Float32] {
            let (next, offsets) = layout.extend(&[kind]);
            assert!(next.primitive_size() >= prev);
            assert_eq!(offsets[0] % kind.byte_width(), 0);
            prev = next.primitive_size();
            layout = next;
        }
    }
}
