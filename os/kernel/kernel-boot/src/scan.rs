//! # Memory Map Scanner
//!
//! Finds the RAM the kernel was loaded into and splits what lies behind the
//! kernel image into the initial heap and the boot stack:
//!
//! ```text
//! PLATFORM_MEM_START                                          max_addr
//! |  kernel image  | pad |            heap             |   boot stack   |
//!                  ^kernel_end                          ^max_addr - STACK_SIZE
//! ```

use crate::error::FatalError;
use crate::region::Region;
use crate::source::MemoryMapEntry;
use kernel_info::memory::{PAGE_SIZE, PLATFORM_MEM_START, STACK_SIZE};
use kernel_vmem::checked_align_up;
use log::debug;

/// What the scanner derived from the memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    /// The RAM region starting at [`PLATFORM_MEM_START`], after clamping.
    pub ram: Region,
    pub heap: Region,
    pub bstack: Region,
}

/// Scan the memory map for the RAM region at [`PLATFORM_MEM_START`].
///
/// `ceiling` caps the discovered RAM; it is used when only the statically
/// mapped low memory is reachable.
///
/// # Errors
/// Any of the memory related [`FatalError`]s if the RAM region is missing
/// or cannot hold the kernel image and the boot stack.
pub fn scan_memory<I>(
    map: I,
    kernel_end: u64,
    ceiling: Option<u64>,
) -> Result<ScanResult, FatalError>
where
    I: IntoIterator<Item = MemoryMapEntry>,
{
    let mut found = None;
    for entry in map {
        debug!(
            "memory map: {:#018x}-{:#018x} {:?}",
            entry.addr,
            entry.addr.wrapping_add(entry.size),
            entry.kind
        );
        if found.is_none() && entry.is_available() && entry.addr == PLATFORM_MEM_START {
            found = Some(entry);
        }
    }

    let entry = found.ok_or(FatalError::NoUsableRegion {
        start: PLATFORM_MEM_START,
    })?;
    let mut max_addr = entry
        .addr
        .checked_add(entry.size)
        .ok_or(FatalError::RegionWraps {
            addr: entry.addr,
            size: entry.size,
        })?;
    if let Some(ceiling) = ceiling {
        max_addr = max_addr.min(ceiling);
    }

    if kernel_end > max_addr {
        return Err(FatalError::KernelExceedsRam { kernel_end, max_addr });
    }
    let available = max_addr.saturating_sub(entry.addr);
    if available < STACK_SIZE {
        return Err(FatalError::NoRoomForStack { available });
    }

    let stack_start = max_addr - STACK_SIZE;
    let heap_start = checked_align_up(kernel_end, PAGE_SIZE).unwrap_or(u64::MAX);
    let heap = Region::new(heap_start, stack_start).ok_or(FatalError::StackOverlapsKernel {
        stack_start,
        kernel_end,
    })?;

    Ok(ScanResult {
        ram: Region::new(entry.addr, max_addr).unwrap_or(Region::EMPTY),
        heap,
        bstack: Region::from_start_len(stack_start, STACK_SIZE).unwrap_or(Region::EMPTY),
    })
}
