//! Alignment arithmetic shared by the parser, builder, and resolver.

use super::error::{LayoutError, LayoutResult};

#[inline(always)]
pub fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

/// Rounds `offset` up to the next multiple of `alignment`. `alignment` must be a power of two.
#[inline(always)]
pub fn align_up(offset: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    (offset + alignment - 1) & !(alignment - 1)
}

/// Like [`align_up`], but `None` when the rounded offset does not fit in a `usize`.
#[inline(always)]
pub fn checked_align_up(offset: usize, alignment: usize) -> Option<usize> {
    debug_assert!(is_power_of_two(alignment));
    offset
        .checked_add(alignment - 1)
        .map(|bumped| bumped & !(alignment - 1))
}

pub(crate) fn check_alignment(name: &str, alignment: usize) -> LayoutResult<usize> {
    if is_power_of_two(alignment) {
        Ok(alignment)
    } else {
        Err(LayoutError::InvalidAlignment {
            name: name.to_owned(),
            alignment,
        })
    }
}

pub(crate) fn check_length(name: &str, length: usize) -> LayoutResult<usize> {
    if length >= 1 {
        Ok(length)
    } else {
        Err(LayoutError::InvalidLength {
            name: name.to_owned(),
            length,
        })
    }
}
