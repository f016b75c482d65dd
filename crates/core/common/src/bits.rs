//! Field widths and alignment arithmetic

/// Width of a header integer field in bytes
pub const SIZE_OF_INT: usize = std::mem::size_of::<i32>();

/// Width of a counter word in bytes
pub const SIZE_OF_LONG: usize = std::mem::size_of::<i64>();

/// Cache line length assumed for false-sharing avoidance
pub const CACHE_LINE_LENGTH: usize = 64;

/// Round `value` up to the next multiple of `alignment`
///
/// `alignment` must be a power of two.
#[must_use]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Check whether `value` is a multiple of `alignment`
#[must_use]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}
