//! Ordered float wrapper for use in `BinaryHeap`.
//!
//! The search maintains a min-heap of candidates and a bounded max-heap of
//! results; both need a total order over f32 distances. `f32::total_cmp`
//! gives IEEE 754 total ordering, so NaN cannot corrupt the heap property.

use std::cmp::Ordering;

/// Wrapper for f32 distances with a total order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrderedFloat(pub f32);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        // Bit comparison keeps Eq consistent with total_cmp.
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
