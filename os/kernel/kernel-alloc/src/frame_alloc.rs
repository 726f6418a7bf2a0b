//! # Region Frame Allocator
//!
//! Hands out 4 KiB physical frames from a bounded list of page-aligned
//! regions. Frames are carved front to back from each region; they are never
//! returned. This matches the needs of the paging bootstrap: page tables and
//! the backing memory of the heap and boot stack live for the whole lifetime
//! of the guest.

use kernel_info::memory::PAGE_SIZE;
use kernel_vmem::{FrameAlloc, PhysAddr, align_down, checked_align_up};
use log::trace;

/// Maximum number of disjoint regions the allocator tracks.
pub const MAX_REGIONS: usize = 32;

/// Reasons a region cannot be registered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("region [{start:#x}, {end:#x}) does not contain a whole frame")]
    TooSmall { start: u64, end: u64 },
    #[error("region at {start:#x} with length {len:#x} wraps around")]
    Wraps { start: u64, len: u64 },
    #[error("region [{start:#x}, {end:#x}) overlaps a registered region")]
    Overlap { start: u64, end: u64 },
    #[error("all {MAX_REGIONS} region slots are in use")]
    TooManyRegions,
}

#[derive(Debug, Copy, Clone, Default)]
struct FrameRange {
    start: u64,
    next: u64,
    end: u64,
}

/// Bump-style allocator over up to [`MAX_REGIONS`] physical regions.
#[derive(Debug)]
pub struct RegionFrameAlloc {
    ranges: [FrameRange; MAX_REGIONS],
    len: usize,
}

impl Default for RegionFrameAlloc {
    fn default() -> Self {
        Self::empty()
    }
}

impl RegionFrameAlloc {
    /// An allocator without any memory.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            ranges: [FrameRange {
                start: 0,
                next: 0,
                end: 0,
            }; MAX_REGIONS],
            len: 0,
        }
    }

    /// Create an allocator over `[start, start + len)`.
    ///
    /// # Errors
    /// See [`add_memory`](Self::add_memory).
    pub fn new(start: u64, len: u64) -> Result<Self, FrameAllocError> {
        let mut alloc = Self::empty();
        alloc.add_memory(start, len)?;
        Ok(alloc)
    }

    /// Register `[start, start + len)`, shrunk inward to page boundaries.
    ///
    /// # Errors
    /// - [`FrameAllocError::Wraps`] if the range wraps the address space.
    /// - [`FrameAllocError::TooSmall`] if no whole frame remains after alignment.
    /// - [`FrameAllocError::Overlap`] if it intersects a registered region.
    /// - [`FrameAllocError::TooManyRegions`] if every slot is taken.
    pub fn add_memory(&mut self, start: u64, len: u64) -> Result<(), FrameAllocError> {
        let end = start
            .checked_add(len)
            .ok_or(FrameAllocError::Wraps { start, len })?;
        let aligned_start = checked_align_up(start, PAGE_SIZE).unwrap_or(end);
        let aligned_end = align_down(end, PAGE_SIZE);
        if aligned_end <= aligned_start {
            return Err(FrameAllocError::TooSmall { start, end });
        }

        if self.ranges[..self.len]
            .iter()
            .any(|r| aligned_start < r.end && r.start < aligned_end)
        {
            return Err(FrameAllocError::Overlap {
                start: aligned_start,
                end: aligned_end,
            });
        }

        let slot = self
            .ranges
            .get_mut(self.len)
            .ok_or(FrameAllocError::TooManyRegions)?;
        *slot = FrameRange {
            start: aligned_start,
            next: aligned_start,
            end: aligned_end,
        };
        self.len += 1;

        trace!("frame pool += [{aligned_start:#x}, {aligned_end:#x})");
        Ok(())
    }

    /// Bytes still available for allocation.
    #[must_use]
    pub fn free_memory(&self) -> u64 {
        self.ranges[..self.len].iter().map(|r| r.end - r.next).sum()
    }

    /// The registered regions as `(start, end)` pairs, in registration order.
    pub fn regions(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.ranges[..self.len].iter().map(|r| (r.start, r.end))
    }
}

impl FrameAlloc for RegionFrameAlloc {
    fn alloc_4k(&mut self) -> Option<PhysAddr> {
        let range = self.ranges[..self.len].iter_mut().find(|r| r.next < r.end)?;
        let frame = range.next;
        range.next += PAGE_SIZE;
        Some(PhysAddr::new(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_aligns_inward_and_counts_free_bytes() {
        let alloc = RegionFrameAlloc::new(0x10_0800, 0x3000).unwrap();
        assert_eq!(alloc.regions().collect::<Vec<_>>(), [(0x10_1000, 0x10_3000)]);
        assert_eq!(alloc.free_memory(), 0x2000);
    }

    #[test]
    fn regions_smaller_than_a_frame_are_rejected() {
        let mut alloc = RegionFrameAlloc::new(0x20_0000, 0x1000).unwrap();
        assert_eq!(
            alloc.add_memory(0x30_0800, 0x1000),
            Err(FrameAllocError::TooSmall {
                start: 0x30_0800,
                end: 0x30_1800
            })
        );
        assert_eq!(
            alloc.add_memory(0x40_0000, 0),
            Err(FrameAllocError::TooSmall {
                start: 0x40_0000,
                end: 0x40_0000
            })
        );
        assert_eq!(
            alloc.add_memory(u64::MAX - 0xfff, 0x2000),
            Err(FrameAllocError::Wraps {
                start: u64::MAX - 0xfff,
                len: 0x2000
            })
        );
    }

    #[test]
    fn overlapping_regions_are_rejected() {
        let mut alloc = RegionFrameAlloc::new(0x20_0000, 0x10_0000).unwrap();
        assert!(matches!(
            alloc.add_memory(0x2F_F000, 0x2000),
            Err(FrameAllocError::Overlap { .. })
        ));
        assert!(alloc.add_memory(0x30_0000, 0x1000).is_ok());
    }

    #[test]
    fn allocation_walks_regions_in_order_and_never_reuses() {
        let mut alloc = RegionFrameAlloc::new(0x10_0000, 0x2000).unwrap();
        alloc.add_memory(0x80_0000, 0x1000).unwrap();

        assert_eq!(alloc.alloc_4k(), Some(PhysAddr::new(0x10_0000)));
        assert_eq!(alloc.alloc_4k(), Some(PhysAddr::new(0x10_1000)));
        assert_eq!(alloc.alloc_4k(), Some(PhysAddr::new(0x80_0000)));
        assert_eq!(alloc.free_memory(), 0);
        assert_eq!(alloc.alloc_4k(), None);
    }

    #[test]
    fn slots_are_bounded() {
        let mut alloc = RegionFrameAlloc::empty();
        for i in 0..MAX_REGIONS as u64 {
            alloc.add_memory(i * 0x10_0000, 0x1000).unwrap();
        }
        assert_eq!(
            alloc.add_memory(0x1_0000_0000, 0x1000),
            Err(FrameAllocError::TooManyRegions)
        );
    }
}
