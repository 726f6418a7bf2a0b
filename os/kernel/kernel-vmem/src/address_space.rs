//! # Address Space (x86-64, PML4-rooted)
//!
//! Helpers to build and manipulate a **single** virtual address space (tree
//! rooted at a PML4).
//!
//! ## Highlights
//!
//! - [`AddressSpace::new_inheriting`] to create a fresh PML4 that shares every
//!   top-level entry of another space (typically the boot page table).
//! - [`AddressSpace::map_one`] to install one mapping (4 KiB / 2 MiB / 1 GiB).
//! - [`AddressSpace::map_anon`] to back a virtual range with fresh frames.
//! - [`AddressSpace::unmap_range`] to drop mappings while keeping their frames.
//! - [`AddressSpace::query`] to translate a VA to PA (handles huge pages).
//! - [`AddressSpace::activate`] to load CR3 with this space's root.
//!
//! ## Design
//!
//! - Intermediate tables are created with [`PageEntryBits::new_table_link`];
//!   leaf flags come from the mapping call.
//! - Keeps `unsafe` confined to mapping a physical frame to a table through
//!   the [`PhysMapper`].
//!
//! ## Safety
//!
//! - Mutating active mappings requires TLB maintenance. Reloading the root
//!   through [`AddressSpace::activate`] flushes all non-global entries.
//! - The provided `PhysMapper` must yield **writable** references to table frames.

use crate::{
    FrameAlloc, MapError, PageEntryBits, PageSize, PageTable, PagingRoot, PhysAddr, PhysMapper,
    VirtAddr, get_table,
};
use log::trace;

/// Bytes covered by one entry of a PML4, PDPT, PD and PT respectively.
const L4_SPAN: u64 = 1 << 39;
const L3_SPAN: u64 = 1 << 30;
const L2_SPAN: u64 = 1 << 21;
const L1_SPAN: u64 = 1 << 12;

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysAddr, // PML4 frame
    mapper: &'m M,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// View an existing address space rooted at `root`.
    #[inline]
    pub const fn from_root(mapper: &'m M, root: PhysAddr) -> Self {
        Self { root, mapper }
    }

    /// Allocate a zeroed PML4 and copy every top-level entry of `template`
    /// into it.
    ///
    /// Lower-level tables are shared with `template`, so later changes below
    /// the PML4 are visible through both roots.
    ///
    /// # Errors
    /// [`MapError::OutOfFrames`] if no frame is left for the PML4.
    pub fn new_inheriting<A: FrameAlloc>(
        mapper: &'m M,
        alloc: &mut A,
        template: PhysAddr,
    ) -> Result<Self, MapError> {
        let root = alloc.alloc_4k().ok_or(MapError::OutOfFrames)?;
        let space = Self::from_root(mapper, root);

        let pml4 = space.table(root);
        pml4.zero();
        let src = space.table(template);
        for (i, e) in src.iter().enumerate() {
            pml4.set(i, e);
        }

        trace!("new PML4 at {root} inherits top-level entries of {template}");
        Ok(space)
    }

    /// Physical address of the PML4.
    #[inline]
    pub const fn root(&self) -> PhysAddr {
        self.root
    }

    /// Load CR3 with this address space's root.
    ///
    /// # Safety
    /// See [`PagingRoot::load_root`].
    #[inline]
    pub unsafe fn activate<R: PagingRoot>(&self, cr3: &R) {
        unsafe { cr3.load_root(self.root) }
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    fn table(&self, pa: PhysAddr) -> &'m mut PageTable {
        // SAFETY: Only frames reached through this space's walk (or freshly
        // allocated for it) are ever passed in.
        unsafe { get_table(self.mapper, pa) }
    }

    /// Return the table referenced by `table[index]`, allocating and linking
    /// a zeroed one if the slot is empty.
    fn ensure_next<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        table: &mut PageTable,
        index: usize,
        va: VirtAddr,
    ) -> Result<PhysAddr, MapError> {
        let e = table.entry(index);
        if e.is_table_link() {
            return Ok(e.physical_address());
        }
        if e.present() {
            return Err(MapError::LargePageInTheWay(va));
        }

        let next = alloc.alloc_4k().ok_or(MapError::OutOfFrames)?;
        self.table(next).zero();
        table.set(index, PageEntryBits::new_table_link().with_physical_address(next));
        Ok(next)
    }

    /// Map **one** page at `va → pa` with size `size` and `leaf_flags`.
    ///
    /// Missing intermediate tables are allocated from `alloc`.
    ///
    /// # Errors
    /// - [`MapError::Misaligned`] if `va` or `pa` is not aligned to `size`.
    /// - [`MapError::AlreadyMapped`] if a leaf already covers `va`.
    /// - [`MapError::LargePageInTheWay`] if a larger leaf sits on the walk.
    /// - [`MapError::OutOfFrames`] if a table could not be allocated.
    pub fn map_one<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtAddr,
        pa: PhysAddr,
        size: PageSize,
        leaf_flags: PageEntryBits,
    ) -> Result<(), MapError> {
        let align = size.bytes();
        if !va.is_aligned(align) {
            return Err(MapError::Misaligned(va.as_u64()));
        }
        if !pa.is_aligned(align) {
            return Err(MapError::Misaligned(pa.as_u64()));
        }

        let pml4 = self.table(self.root);
        let pdpt_pa = self.ensure_next(alloc, pml4, va.pml4_index(), va)?;
        let pdpt = self.table(pdpt_pa);

        let (table, index, large) = match size {
            PageSize::Size1G => (pdpt, va.pdpt_index(), true),
            PageSize::Size2M => {
                let pd_pa = self.ensure_next(alloc, pdpt, va.pdpt_index(), va)?;
                (self.table(pd_pa), va.pd_index(), true)
            }
            PageSize::Size4K => {
                let pd_pa = self.ensure_next(alloc, pdpt, va.pdpt_index(), va)?;
                let pd = self.table(pd_pa);
                let pt_pa = self.ensure_next(alloc, pd, va.pd_index(), va)?;
                (self.table(pt_pa), va.pt_index(), false)
            }
        };

        if table.entry(index).present() {
            return Err(MapError::AlreadyMapped(va));
        }
        let leaf = leaf_flags
            .with_present(true)
            .with_large_page(large)
            .with_physical_address(pa);
        table.set(index, leaf);
        Ok(())
    }

    /// Back `[va, va + len)` with freshly allocated 4 KiB frames.
    ///
    /// The frames are not cleared.
    ///
    /// # Errors
    /// - [`MapError::Misaligned`] if `va` or `len` is not page aligned.
    /// - [`MapError::RangeWraps`] if the range wraps the address space.
    /// - Any error of [`map_one`](Self::map_one).
    pub fn map_anon<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtAddr,
        len: u64,
        leaf_flags: PageEntryBits,
    ) -> Result<(), MapError> {
        let end = checked_range(va, len)?;

        let mut page = va.as_u64();
        while page < end {
            let frame = alloc.alloc_4k().ok_or(MapError::OutOfFrames)?;
            self.map_one(alloc, VirtAddr::new(page), frame, PageSize::Size4K, leaf_flags)?;
            page += L1_SPAN;
        }
        Ok(())
    }

    /// Remove every mapping in `[va, va + len)`.
    ///
    /// The physical frames behind the mappings are kept: nothing is returned
    /// to any allocator. Large leaves fully covered by the range are cleared
    /// in one step. Holes are skipped. Intermediate tables stay linked.
    ///
    /// Returns the number of bytes of mappings removed.
    ///
    /// # Errors
    /// - [`MapError::Misaligned`] if `va` or `len` is not page aligned.
    /// - [`MapError::RangeWraps`] if the range wraps the address space.
    /// - [`MapError::PartialLargePage`] if a large leaf is only partially
    ///   covered by the range. Mappings before it have already been removed.
    pub fn unmap_range(&self, va: VirtAddr, len: u64) -> Result<u64, MapError> {
        let start = va.as_u64();
        let end = checked_range(va, len)?;

        let mut removed = 0;
        let mut cursor = start;
        while cursor < end {
            let (step, cleared) = self.unmap_step(VirtAddr::new(cursor), start, end)?;
            removed += cleared;
            cursor = match cursor.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }

        trace!("unmapped {removed:#x} bytes in [{start:#x}, {end:#x})");
        Ok(removed)
    }

    /// Handle the mapping at `va` and return `(bytes to advance, bytes cleared)`.
    fn unmap_step(&self, va: VirtAddr, start: u64, end: u64) -> Result<(u64, u64), MapError> {
        let pml4 = self.table(self.root);
        let e4 = pml4.entry(va.pml4_index());
        if !e4.present() {
            return Ok((to_boundary(va, L4_SPAN), 0));
        }

        let mut table = self.table(e4.physical_address());
        for (index, span) in [(va.pdpt_index(), L3_SPAN), (va.pd_index(), L2_SPAN)] {
            let e = table.entry(index);
            if !e.present() {
                return Ok((to_boundary(va, span), 0));
            }
            if e.is_large_leaf() {
                let base = va.as_u64() & !(span - 1);
                if base < start || base.checked_add(span).is_none_or(|leaf_end| leaf_end > end) {
                    return Err(MapError::PartialLargePage(VirtAddr::new(base)));
                }
                table.set(index, PageEntryBits::new());
                return Ok((span, span));
            }
            table = self.table(e.physical_address());
        }

        let index = va.pt_index();
        if table.entry(index).present() {
            table.set(index, PageEntryBits::new());
            return Ok((L1_SPAN, L1_SPAN));
        }
        Ok((L1_SPAN, 0))
    }

    /// Translate a `VirtAddr` to `PhysAddr` if mapped.
    ///
    /// Handles 1 GiB and 2 MiB leaves by adding the appropriate **in-page offset**.
    #[must_use]
    pub fn query(&self, va: VirtAddr) -> Option<PhysAddr> {
        let pml4 = self.table(self.root);
        let e4 = pml4.entry(va.pml4_index());
        if !e4.present() {
            return None;
        }

        let mut table = self.table(e4.physical_address());
        for (index, span) in [(va.pdpt_index(), L3_SPAN), (va.pd_index(), L2_SPAN)] {
            let e = table.entry(index);
            if !e.present() {
                return None;
            }
            if e.is_large_leaf() {
                let offset = va.as_u64() & (span - 1);
                return Some(PhysAddr::new(e.physical_address().as_u64() + offset));
            }
            table = self.table(e.physical_address());
        }

        let e1 = table.entry(va.pt_index());
        if !e1.present() {
            return None;
        }
        let offset = va.as_u64() & (L1_SPAN - 1);
        Some(PhysAddr::new(e1.physical_address().as_u64() + offset))
    }
}

/// Validate a page-granular range and return its exclusive end.
fn checked_range(va: VirtAddr, len: u64) -> Result<u64, MapError> {
    if !va.is_aligned(L1_SPAN) {
        return Err(MapError::Misaligned(va.as_u64()));
    }
    if len & (L1_SPAN - 1) != 0 {
        return Err(MapError::Misaligned(len));
    }
    va.as_u64().checked_add(len).ok_or(MapError::RangeWraps)
}

/// Distance from `va` to the next multiple of `span`.
const fn to_boundary(va: VirtAddr, span: u64) -> u64 {
    span - (va.as_u64() & (span - 1))
}
