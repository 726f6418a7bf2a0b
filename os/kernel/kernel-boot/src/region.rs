//! # Memory Regions

use core::fmt;
use kernel_vmem::{align_down, checked_align_up};

/// A half-open address range `[start, end)` with a cached length.
///
/// The all-zero region is the canonical *absent* region; every constructor
/// normalizes empty ranges to it so `heap2` or `initrd` can be compared
/// against [`Region::EMPTY`]. Regions never wrap the address space.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    start: u64,
    end: u64,
    len: u64,
}

impl Region {
    /// The absent region.
    pub const EMPTY: Self = Self {
        start: 0,
        end: 0,
        len: 0,
    };

    /// `[start, end)`, or `None` if `end < start`.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Option<Self> {
        if end < start {
            return None;
        }
        if end == start {
            return Some(Self::EMPTY);
        }
        Some(Self {
            start,
            end,
            len: end - start,
        })
    }

    /// `[start, start + len)`, or `None` if the range wraps.
    #[must_use]
    pub const fn from_start_len(start: u64, len: u64) -> Option<Self> {
        match start.checked_add(len) {
            Some(end) => Self::new(start, end),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether both regions are non-empty and share at least one byte.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside the region. The empty region is
    /// contained in every region.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.is_empty() || (self.start <= other.start && other.end <= self.end)
    }

    /// The largest sub-region whose bounds are multiples of `align`.
    #[must_use]
    pub const fn align_inward(&self, align: u64) -> Self {
        let Some(start) = checked_align_up(self.start, align) else {
            return Self::EMPTY;
        };
        let end = align_down(self.end, align);
        if end <= start {
            return Self::EMPTY;
        }
        Self {
            start,
            end,
            len: end - start,
        }
    }

    /// Cut `hole`, rounded outward to `align`, out of the region.
    ///
    /// Returns the leading and trailing remainders. The leading piece only
    /// exists if the hole starts above the region start; the trailing piece
    /// only exists if the hole ends below the region end. Missing or collapsed
    /// pieces are [`Region::EMPTY`].
    #[must_use]
    pub const fn split_around(&self, hole: &Self, align: u64) -> (Self, Self) {
        let leading = if hole.start > self.start {
            let end = align_down(hole.start, align);
            let end = if end < self.end { end } else { self.end };
            match Self::new(self.start, end) {
                Some(r) => r,
                None => Self::EMPTY,
            }
        } else {
            Self::EMPTY
        };

        let trailing = if hole.end < self.end {
            let start = match checked_align_up(hole.end, align) {
                Some(s) if s > self.start => s,
                Some(_) => self.start,
                None => self.end,
            };
            match Self::new(start, self.end) {
                Some(r) => r,
                None => Self::EMPTY,
            }
        } else {
            Self::EMPTY
        };

        (leading, trailing)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end)
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region{self} ({:#x} bytes)", self.len)
    }
}
