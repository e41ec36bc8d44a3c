//! Table subsets as fixed-width bitmasks.
//!
//! Every table reference in one enumeration is assigned a 0-based index;
//! `TableSet` represents a subset of those indices as bits of a `u64`. The
//! DP algorithm indexes its plan array by the raw mask value, so the table
//! universe is capped at [`MAX_TABLES`].

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Sub};

/// Upper bound on tables per enumeration, leaving headroom in the u64 mask.
pub const MAX_TABLES: usize = 62;

/// A subset of the table list, one bit per table index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TableSet(u64);

impl TableSet {
    pub const EMPTY: TableSet = TableSet(0);

    /// The singleton set {i}.
    pub fn of(index: usize) -> Self {
        debug_assert!(index < MAX_TABLES);
        TableSet(1u64 << index)
    }

    /// All bits strictly below position `index`.
    pub fn through(index: usize) -> Self {
        debug_assert!(index < MAX_TABLES);
        TableSet((1u64 << index) - 1)
    }

    /// The full set {0, .., n-1}.
    pub fn full(n: usize) -> Self {
        debug_assert!(n <= MAX_TABLES);
        if n == 0 {
            TableSet::EMPTY
        } else {
            TableSet(u64::MAX >> (64 - n))
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, index: usize) -> bool {
        index < 64 && self.0 & (1u64 << index) != 0
    }

    pub fn is_subset_of(self, other: TableSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn overlaps(self, other: TableSet) -> bool {
        self.0 & other.0 != 0
    }

    /// The singleton holding the minimum set bit, or the empty set.
    pub fn min_bit(self) -> TableSet {
        TableSet(self.0 & self.0.wrapping_neg())
    }

    /// Index of the minimum set bit.
    pub fn min_index(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// The next non-empty subset of `superset` after `self`, in increasing
    /// mask order.
    ///
    /// Starting from the empty set, repeated calls enumerate every non-empty
    /// subset of `superset` exactly once; callers loop until the returned
    /// subset equals `superset` itself. This is the two's-complement subset
    /// walk: `(self - superset) & superset`.
    pub fn next_subset(self, superset: TableSet) -> TableSet {
        debug_assert!(self.is_subset_of(superset));
        TableSet(self.0.wrapping_sub(superset.0) & superset.0)
    }

    /// Raw mask value, used to index the plan array.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Iterate the member indices in increasing order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut rest = self.0;
        std::iter::from_fn(move || {
            if rest == 0 {
                None
            } else {
                let index = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(index)
            }
        })
    }
}

impl BitOr for TableSet {
    type Output = TableSet;
    fn bitor(self, rhs: TableSet) -> TableSet {
        TableSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for TableSet {
    fn bitor_assign(&mut self, rhs: TableSet) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for TableSet {
    type Output = TableSet;
    fn bitand(self, rhs: TableSet) -> TableSet {
        TableSet(self.0 & rhs.0)
    }
}

impl BitAndAssign for TableSet {
    fn bitand_assign(&mut self, rhs: TableSet) {
        self.0 &= rhs.0;
    }
}

impl Sub for TableSet {
    type Output = TableSet;
    fn sub(self, rhs: TableSet) -> TableSet {
        TableSet(self.0 & !rhs.0)
    }
}

impl fmt::Debug for TableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
