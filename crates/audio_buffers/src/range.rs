use std::ops::{Bound, Range, RangeBounds};

use crate::InvalidRange;

/// Resolve `range` against a view of `len` items, producing a concrete `start..end`.
///
/// An unbounded end means "to the end of the view".  Fails if the range is reversed or runs past `len`; the empty range
/// `len..len` is allowed.
pub fn resolve_range(range: impl RangeBounds<usize>, len: usize) -> Result<Range<usize>, InvalidRange> {
    // Saturating is fine: anything that saturates is out of bounds anyway.
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };

    if start > end || end > len {
        return Err(InvalidRange { start, end, len });
    }

    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_ranges() {
        assert_eq!(resolve_range(.., 10), Ok(0..10));
        assert_eq!(resolve_range(3.., 10), Ok(3..10));
        assert_eq!(resolve_range(..4, 10), Ok(0..4));
        assert_eq!(resolve_range(2..=4, 10), Ok(2..5));
        assert_eq!(resolve_range(10.., 10), Ok(10..10));
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(
            resolve_range(5..11, 10),
            Err(InvalidRange {
                start: 5,
                end: 11,
                len: 10
            })
        );
        assert!(resolve_range(11.., 10).is_err());
        assert!(resolve_range(0..=usize::MAX, 10).is_err());
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = resolve_range(6..5, 10);
        assert!(reversed.is_err());
    }
}
