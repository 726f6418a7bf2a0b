//! # Paging Bootstrap
//!
//! Replaces the static boot page table with one the kernel owns:
//!
//! 1. A [`RegionFrameAlloc`] is seeded with the larger heap piece, then the
//!    smaller one, then every other RAM region above the platform RAM start.
//! 2. A fresh PML4 inherits all top-level entries of the boot table (this
//!    keeps the kernel image and the direct map reachable) and is activated.
//! 3. The boot identity mapping above the kernel is removed. Its frames are
//!    already owned by the frame allocator.
//! 4. The heap and the boot stack are re-created as anonymous mappings at
//!    [`PG_HEAP_MAP_START`], sized from what the allocator has left after
//!    reserving room for the page tables they need.

use crate::error::{Degradable, Degradation, FatalError};
use crate::layout::BootLayout;
use crate::region::Region;
use crate::source::BootInfoSource;
use kernel_alloc::frame_alloc::{FrameAllocError, RegionFrameAlloc};
use kernel_info::memory::{
    LARGE_PAGE_SIZE, PAGE_SIZE, PG_HEAP_MAP_START, PLATFORM_MAX_MEM_ADDR, PLATFORM_MEM_START,
    STACK_SIZE,
};
use kernel_vmem::{
    AddressSpace, MapError, PageEntryBits, PagingRoot, PhysMapper, VirtAddr, checked_align_up,
    page_table_frames,
};
use log::{debug, info};

/// Failures of the paging bootstrap. All of them are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PagingError {
    #[error("frame allocator: {0}")]
    FrameAlloc(#[from] FrameAllocError),
    #[error("page table: {0}")]
    Map(#[from] MapError),
    #[error("{free:#x} bytes of free memory cannot hold the boot stack and its page tables")]
    OutOfMemory { free: u64 },
}

impl From<FrameAllocError> for FatalError {
    fn from(e: FrameAllocError) -> Self {
        Self::Paging(e.into())
    }
}

impl From<MapError> for FatalError {
    fn from(e: MapError) -> Self {
        Self::Paging(e.into())
    }
}

/// The live paging structures, handed on to the memory manager.
pub struct PagingState<'m, M: PhysMapper> {
    /// Frame allocator holding all RAM not consumed by the bootstrap.
    pub frames: RegionFrameAlloc,
    /// The active address space.
    pub space: AddressSpace<'m, M>,
}

/// Build and activate the kernel page table, then move the heap and boot
/// stack of `layout` to their virtual homes.
///
/// On success `layout.heap` starts at [`PG_HEAP_MAP_START`], `layout.heap2`
/// is empty and `layout.bstack` directly follows the heap. A secondary heap
/// piece the allocator cannot use is reported as a [`Degradation`].
///
/// # Errors
/// [`FatalError::Paging`] if a frame region cannot be registered, the page
/// table cannot be edited, or too little memory is left.
///
/// # Safety
/// - `cr3` must describe the active boot page table, which must be reachable
///   through `mapper` and map the kernel image and the current stack below
///   the first 2 MiB boundary above `layout.heap`.
/// - `layout` must describe RAM that nothing else uses.
pub unsafe fn bootstrap_paging<'m, M, R, S>(
    layout: &mut BootLayout,
    source: &S,
    mapper: &'m M,
    cr3: &R,
) -> Result<Degradable<PagingState<'m, M>>, FatalError>
where
    M: PhysMapper,
    R: PagingRoot,
    S: BootInfoSource,
{
    let (primary, secondary) = if layout.heap2.len() > layout.heap.len() {
        (layout.heap2, layout.heap)
    } else {
        (layout.heap, layout.heap2)
    };
    let primary = primary.align_inward(PAGE_SIZE);
    let secondary = secondary.align_inward(PAGE_SIZE);

    let mut frames = RegionFrameAlloc::new(primary.start(), primary.len())?;
    let space = AddressSpace::new_inheriting(mapper, &mut frames, cr3.active_root())?;

    let mut degradation = None;
    if !secondary.is_empty()
        && let Err(reason) = frames.add_memory(secondary.start(), secondary.len())
    {
        degradation = Some(Degradation::SecondaryHeapRejected {
            region: secondary,
            reason,
        });
    }

    for entry in source.memory_map() {
        if entry.is_available() && entry.addr > PLATFORM_MEM_START {
            frames.add_memory(entry.addr, entry.size)?;
        }
    }

    // SAFETY: The new PML4 shares every lower-level table with the boot
    // table; the caller guarantees that table maps what runs next.
    unsafe { space.activate(cr3) };

    if let Some(start) = checked_align_up(primary.start(), LARGE_PAGE_SIZE)
        && start < PLATFORM_MAX_MEM_ADDR
    {
        let removed = space.unmap_range(VirtAddr::new(start), PLATFORM_MAX_MEM_ADDR - start)?;
        debug!("removed {removed:#x} bytes of identity mapping above {start:#x}");
        // SAFETY: Reloading the active root only flushes the TLB.
        unsafe { space.activate(cr3) };
    }

    let free = frames.free_memory();
    let reserved = STACK_SIZE + page_table_frames(free / PAGE_SIZE) * PAGE_SIZE;
    let heap_len = free
        .checked_sub(reserved)
        .ok_or(PagingError::OutOfMemory { free })?;
    let heap = Region::from_start_len(PG_HEAP_MAP_START, heap_len).ok_or(MapError::RangeWraps)?;
    let bstack = Region::from_start_len(heap.end(), STACK_SIZE).ok_or(MapError::RangeWraps)?;

    let flags = PageEntryBits::new_kernel_rw_nx();
    space.map_anon(&mut frames, VirtAddr::new(heap.start()), heap.len(), flags)?;
    space.map_anon(&mut frames, VirtAddr::new(bstack.start()), bstack.len(), flags)?;
    info!("paging enabled, {:#x} bytes left in the frame pool", frames.free_memory());

    layout.heap = heap;
    layout.heap2 = Region::EMPTY;
    layout.bstack = bstack;

    let state = PagingState { frames, space };
    Ok(match degradation {
        None => Degradable::clean(state),
        Some(d) => Degradable::degraded(state, d),
    })
}
