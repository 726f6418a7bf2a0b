//! # Boot Layout
//!
//! The record the early boot stage hands to the rest of the kernel.

use crate::arbiter::arbitrate;
use crate::cmdline::CmdLine;
use crate::error::FatalError;
use crate::region::Region;
use crate::scan::scan_memory;
use crate::source::BootInfoSource;
use kernel_info::memory::PLATFORM_MAX_MEM_ADDR;
use log::{debug, info};

/// Command line and memory regions discovered during early boot.
///
/// Owned by the entry routine and filled in place by [`build_layout`] and,
/// with paging, [`bootstrap_paging`](crate::paging::bootstrap_paging).
#[derive(Clone, Debug, Default)]
pub struct BootLayout {
    pub cmdline: CmdLine,
    pub heap: Region,
    /// Second heap fragment; [`Region::EMPTY`] unless the initrd split the heap.
    pub heap2: Region,
    pub bstack: Region,
    /// [`Region::EMPTY`] if there is no initrd.
    pub initrd: Region,
}

impl BootLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cmdline: CmdLine::new(),
            heap: Region::EMPTY,
            heap2: Region::EMPTY,
            bstack: Region::EMPTY,
            initrd: Region::EMPTY,
        }
    }

    /// Address one past the top of the boot stack.
    #[must_use]
    pub const fn stack_top(&self) -> u64 {
        self.bstack.end()
    }

    /// Log the regions at `info` level.
    pub fn log_summary(&self) {
        if !self.initrd.is_empty() {
            info!("     initrd: {:#018x}-{:#018x}", self.initrd.start(), self.initrd.end());
        }
        info!("       heap: {:#018x}-{:#018x}", self.heap.start(), self.heap.end());
        if !self.heap2.is_empty() {
            info!("      heap2: {:#018x}-{:#018x}", self.heap2.start(), self.heap2.end());
        }
        info!("      stack: {:#018x}-{:#018x}", self.bstack.start(), self.bstack.end());
        info!("    cmdline: {}", self.cmdline);
    }
}

/// Highest physical address the scanner may hand out.
///
/// Without paging only the statically mapped low memory is usable. With
/// paging the whole RAM region is taken and mapped later.
#[must_use]
pub const fn ram_ceiling() -> Option<u64> {
    if cfg!(feature = "paging") {
        None
    } else {
        Some(PLATFORM_MAX_MEM_ADDR)
    }
}

/// Fill `layout` from the boot information in `source`.
///
/// Captures the command line, scans the memory map behind `kernel_end` and
/// cuts the initrd out of the heap. Degradations are logged and worked around.
///
/// # Errors
/// Any [`FatalError`] raised by the scanner, the initrd lookup or the arbiter.
/// `layout` may be partially written in that case.
pub fn build_layout<S: BootInfoSource>(
    source: &S,
    kernel_end: u64,
    layout: &mut BootLayout,
) -> Result<(), FatalError> {
    source.capture_cmdline(&mut layout.cmdline).warn();

    let scan = scan_memory(source.memory_map(), kernel_end, ram_ceiling())?;
    debug!("usable RAM {}", scan.ram);
    let initrd = source.initrd()?.warn();
    let arbitration = arbitrate(scan.heap, scan.bstack, initrd)?;

    layout.heap = arbitration.heap;
    layout.heap2 = arbitration.heap2;
    layout.initrd = arbitration.initrd;
    layout.bstack = scan.bstack;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Degradable;
    use crate::source::{MemoryKind, MemoryMapEntry};
    use core::iter::Fuse;
    use kernel_info::memory::PLATFORM_MEM_START;
    use std::vec::IntoIter;

    struct Fixed {
        ram: u64,
        initrd: Option<Region>,
    }

    impl BootInfoSource for Fixed {
        type MemoryMap<'a> = Fuse<IntoIter<MemoryMapEntry>>;

        fn cmdline(&self) -> Option<&[u8]> {
            Some(b"console=ttyS0")
        }

        fn memory_map(&self) -> Self::MemoryMap<'_> {
            vec![MemoryMapEntry {
                addr: PLATFORM_MEM_START,
                size: self.ram,
                kind: MemoryKind::Available,
            }]
            .into_iter()
            .fuse()
        }

        fn initrd(&self) -> Result<Degradable<Option<Region>>, FatalError> {
            Ok(Degradable::clean(self.initrd))
        }
    }

    fn r(start: u64, end: u64) -> Region {
        Region::new(start, end).unwrap()
    }

    #[test]
    fn layout_without_initrd() {
        let mut layout = BootLayout::new();
        build_layout(&Fixed { ram: 0x200_0000, initrd: None }, 0x18_0000, &mut layout).unwrap();
        assert_eq!(layout.cmdline.as_bytes(), b"console=ttyS0");
        assert_eq!(layout.heap, r(0x18_0000, 0x20F_0000));
        assert_eq!(layout.heap2, Region::EMPTY);
        assert_eq!(layout.bstack, r(0x20F_0000, 0x210_0000));
        assert_eq!(layout.stack_top(), 0x210_0000);
        assert!(layout.initrd.is_empty());
    }

    #[test]
    fn layout_with_initrd_inside_the_heap() {
        let mut layout = BootLayout::new();
        let source = Fixed {
            ram: 0x200_0000,
            initrd: Some(r(0x19_0000, 0x1A_0000)),
        };
        build_layout(&source, 0x18_0000, &mut layout).unwrap();
        assert_eq!(layout.heap, r(0x18_0000, 0x19_0000));
        assert_eq!(layout.heap2, r(0x1A_0000, 0x20F_0000));
        assert_eq!(layout.initrd, r(0x19_0000, 0x1A_0000));
    }

    #[test]
    fn rebuilding_drops_a_stale_initrd() {
        let mut layout = BootLayout::new();
        layout.initrd = r(0x19_0000, 0x1A_0000);
        layout.heap2 = r(0x1A_0000, 0x20F_0000);
        build_layout(&Fixed { ram: 0x200_0000, initrd: None }, 0x18_0000, &mut layout).unwrap();
        assert!(layout.initrd.is_empty());
        assert!(layout.heap2.is_empty());
    }

    #[test]
    fn initrd_in_the_stack_is_fatal() {
        let mut layout = BootLayout::new();
        let initrd = r(0x200_0000, 0x20F_8000);
        let source = Fixed {
            ram: 0x200_0000,
            initrd: Some(initrd),
        };
        assert_eq!(
            build_layout(&source, 0x18_0000, &mut layout),
            Err(FatalError::InitrdOverlap { initrd })
        );
    }
}
