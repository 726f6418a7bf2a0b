//! # Region Overlap Arbiter
//!
//! The hypervisor may load the initial ramdisk anywhere, including right into
//! the RAM the scanner just handed to the heap. The arbiter cuts the initrd
//! out of the heap, keeping up to two page-aligned pieces.

use crate::error::FatalError;
use crate::region::Region;
use kernel_info::memory::PAGE_SIZE;
use log::debug;

/// Heap pieces left over after the initrd was cut out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arbitration {
    pub heap: Region,
    /// Second heap piece, [`Region::EMPTY`] unless the initrd split the heap.
    pub heap2: Region,
    /// The initrd, [`Region::EMPTY`] if there is none.
    pub initrd: Region,
}

/// Split `heap` around `initrd` and make sure nothing overlaps afterwards.
///
/// # Errors
/// [`FatalError::InitrdOverlap`] if a heap piece still overlaps the initrd,
/// or if the initrd reaches into the boot stack.
pub fn arbitrate(
    heap: Region,
    bstack: Region,
    initrd: Option<Region>,
) -> Result<Arbitration, FatalError> {
    let initrd = match initrd {
        Some(initrd) if !initrd.is_empty() => initrd,
        _ => {
            return Ok(Arbitration {
                heap,
                heap2: Region::EMPTY,
                initrd: Region::EMPTY,
            });
        }
    };

    let mut out = Arbitration {
        heap,
        heap2: Region::EMPTY,
        initrd,
    };

    if heap.overlaps(&initrd) {
        let (leading, trailing) = heap.split_around(&initrd, PAGE_SIZE);
        debug!("initrd {initrd} splits heap into {leading} and {trailing}");
        (out.heap, out.heap2) = match (leading.is_empty(), trailing.is_empty()) {
            (false, _) => (leading, trailing),
            (true, false) => (trailing, Region::EMPTY),
            (true, true) => (Region::EMPTY, Region::EMPTY),
        };
        debug_assert!(heap.contains(&out.heap) && heap.contains(&out.heap2));
    }

    if out.heap.overlaps(&initrd) || out.heap2.overlaps(&initrd) || initrd.overlaps(&bstack) {
        return Err(FatalError::InitrdOverlap { initrd });
    }
    Ok(out)
}
