//! Property kinds and their storage characteristics.
//!
//! Every property is declared with a [`Kind`] that fixes its byte width and
//! alignment in the primitive storage region. `Reference` is its own class:
//! reference slots live in a separate, strictly growing array because they
//! carry ownership/trace semantics for a collector and never participate in
//! byte packing.

// =============================================================================
// Kind
// =============================================================================

/// Primitive storage categories plus `Reference`.
///
/// Primitive kinds are naturally aligned: alignment equals byte width.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// 8-byte signed integer.
    Int64 = 0,
    /// 8-byte IEEE-754 float.
    Float64 = 1,
    /// 4-byte signed integer.
    Int32 = 2,
    /// 4-byte IEEE-754 float.
    Float32 = 3,
    /// 2-byte signed integer.
    Int16 = 4,
    /// 2-byte unsigned code unit.
    Char16 = 5,
    /// 1-byte signed integer.
    Int8 = 6,
    /// 1-byte boolean (stored as 0/1).
    Bool = 7,
    /// Pointer-sized slot in the reference array.
    Reference = 8,
}

impl Kind {
    /// Primitive kinds in descending width order.
    ///
    /// This is the canonical packing order: the layout algorithm assigns
    /// widest kinds first and fills holes largest-first in this order.
    pub const PRIMITIVES_BY_WIDTH: [Kind; 8] = [
        Kind::Int64,
        Kind::Float64,
        Kind::Int32,
        Kind::Float32,
        Kind::Int16,
        Kind::Char16,
        Kind::Int8,
        Kind::Bool,
    ];

    /// Byte width of a value of this kind.
    #[inline]
    pub const fn byte_width(self) -> u32 {
        match self {
            Kind::Int64 | Kind::Float64 => 8,
            Kind::Int32 | Kind::Float32 => 4,
            Kind::Int16 | Kind::Char16 => 2,
            Kind::Int8 | Kind::Bool => 1,
            Kind::Reference => std::mem::size_of::<usize>() as u32,
        }
    }

    /// Required alignment; natural (== width) for primitives.
    #[inline]
    pub const fn alignment(self) -> u32 {
        self.byte_width()
    }

    /// Check whether this kind packs into the primitive byte region.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        !self.is_reference()
    }

    /// Check whether this kind occupies a reference slot.
    #[inline]
    pub const fn is_reference(self) -> bool {
        matches!(self, Kind::Reference)
    }

    /// Human-readable kind name, used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Kind::Int64 => "i64",
            Kind::Float64 => "f64",
            Kind::Int32 => "i32",
            Kind::Float32 => "f32",
            Kind::Int16 => "i16",
            Kind::Char16 => "u16",
            Kind::Int8 => "i8",
            Kind::Bool => "bool",
            Kind::Reference => "reference",
        }
    }

    /// Index into [`Self::PRIMITIVES_BY_WIDTH`]; panics on `Reference`.
    #[inline]
    pub(crate) fn packing_index(self) -> usize {
        debug_assert!(self.is_primitive());
        self as usize
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(Kind::Int64.byte_width(), 8);
        assert_eq!(Kind::Float64.byte_width(), 8);
        assert_eq!(Kind::Int32.byte_width(), 4);
        assert_eq!(Kind::Float32.byte_width(), 4);
        assert_eq!(Kind::Int16.byte_width(), 2);
        assert_eq!(Kind::Char16.byte_width(), 2);
        assert_eq!(Kind::Int8.byte_width(), 1);
        assert_eq!(Kind::Bool.byte_width(), 1);
        assert_eq!(
            Kind::Reference.byte_width() as usize,
            std::mem::size_of::<usize>()
        );
        for kind in Kind::PRIMITIVES_BY_WIDTH {
            assert_eq!(kind.alignment(), kind.byte_width());
        }
    }

    #[test]
    fn test_packing_order_is_descending() {
        let widths: Vec<u32> = Kind::PRIMITIVES_BY_WIDTH
            .iter()
            .map(|k| k.byte_width())
            .collect();
        let mut sorted = widths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(widths, sorted);
    }

    #[test]
    fn test_packing_index_matches_order() {
        for (i, kind) in Kind::PRIMITIVES_BY_WIDTH.iter().enumerate() {
            assert_eq!(kind.packing_index(), i);
        }
    }

    #[test]
    fn test_reference_is_not_primitive() {
        assert!(Kind::Reference.is_reference());
        assert!(!Kind::Reference.is_primitive());
        for kind in Kind::PRIMITIVES_BY_WIDTH {
            assert!(kind.is_primitive());
        }
    }
}
