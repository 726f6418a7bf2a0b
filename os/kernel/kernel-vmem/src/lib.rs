//! # Virtual Memory Support
//!
//! Minimal x86-64 paging helpers for the KVM platform bootstrap.
//!
//! ## What you get
//! - An [`address space`](address_space) describing a `PML4` root page table.
//! - Tiny [`PhysAddr`]/[`VirtAddr`] newtypes (u64) to avoid mixing address kinds.
//! - A [`PageSize`] enum for 4 KiB / 2 MiB / 1 GiB mappings.
//! - The x86-64 page-table entry as a bitfield ([`PageEntryBits`]).
//! - A 4 KiB-aligned [`PageTable`] and index helpers.
//! - A tiny allocator/mapper interface ([`FrameAlloc`], [`PhysMapper`]) and
//!   an abstraction over CR3 ([`PagingRoot`]).
//!
//! ## x86-64 Virtual Address → Physical Address Walk
//!
//! Each 48-bit virtual address is divided into five fields:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! The CPU uses these fields as **indices** into four levels of page tables,
//! each level containing 512 (2⁹) entries of 8 bytes (64 bits) each.
//!
//! ```text
//!  PML4  →  PDPT  →  PD  →  PT  →  Physical Page
//!   │        │        │        │
//!   │        │        │        └───► PTE   (Page Table Entry)  → maps 4 KiB page
//!   │        │        └────────────► PDE   (Page Directory Entry) → PS=1 → 2 MiB page
//!   │        └─────────────────────► PDPTE (Page Directory Pointer Table Entry) → PS=1 → 1 GiB page
//!   └──────────────────────────────► PML4E (Page Map Level 4 Entry)
//! ```
//!
//! ## The boot page table
//!
//! The platform boot code enters Rust with a static page table that
//! identity-maps the first GiB with 2 MiB leaves and maps all of physical
//! memory a second time at [`info::DIRECT_MAP_BASE`]. A new address space
//! created with [`AddressSpace::new_inheriting`] shares those lower-level
//! tables, so removing the identity map through the new space also removes it
//! from the boot table.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod addresses;
mod cr3;
mod page_entry_bits;
mod page_table;

pub use crate::address_space::AddressSpace;
pub use crate::addresses::{PhysAddr, VirtAddr};
pub use crate::cr3::{Cr3, Cr3Register, PagingRoot};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{ENTRIES, PageTable};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Supported x86-64 page sizes.
///
/// These correspond to the PS (Page Size) bit usage in PDE/PDPTE.
/// 4 KiB pages are mapped through the PT level; 2 MiB and 1 GiB are
/// "huge pages" that terminate early at PD or PDPT.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PageSize {
    /// 4 KiB page mapped by a PTE (PT leaf).
    Size4K,
    /// 2 MiB page mapped by a PDE with `PS=1` (PD leaf).
    Size2M,
    /// 1 GiB page mapped by a PDPTE with `PS=1` (PDPT leaf).
    Size1G,
}

impl PageSize {
    /// Size of the page in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Size4K => 1 << 12,
            Self::Size2M => 1 << 21,
            Self::Size1G => 1 << 30,
        }
    }
}

/// Failures while editing an [`AddressSpace`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("out of physical frames")]
    OutOfFrames,
    #[error("address or length {0:#x} is not aligned to the page size")]
    Misaligned(u64),
    #[error("address range wraps around the address space")]
    RangeWraps,
    #[error("{0:?} is already mapped")]
    AlreadyMapped(VirtAddr),
    #[error("a large page blocks the table walk for {0:?}")]
    LargePageInTheWay(VirtAddr),
    #[error("the large page at {0:?} is only partially covered")]
    PartialLargePage(VirtAddr),
}

/// Minimal frame allocator used to obtain **physical** 4 KiB frames
/// for page tables and anonymous mappings.
///
/// Returned frames **must** be 4 KiB aligned. Returns `None` on out-of-memory.
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame. Must return page-aligned frames.
    fn alloc_4k(&mut self) -> Option<PhysAddr>;
}

/// Converts physical addresses to *temporarily* usable pointers in the current
/// virtual address space (e.g., via identity map or a direct map).
///
/// # Safety
/// - You must ensure `pa` is mapped as writable in the current page tables
///   for `&mut T`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`.
/// - Type `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference in the
    /// current address space.
    ///
    /// # Safety
    /// See the trait documentation.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysAddr) -> &'a mut T;
}

/// Map a physical page table frame into the current virtual address space and
/// return a mutable reference to it.
///
/// # Safety
/// - `phys` must point to a valid 4 KiB page containing a page table.
/// - The mapping must be writable for mut access.
#[inline]
unsafe fn get_table<'a, M: PhysMapper>(m: &M, phys: PhysAddr) -> &'a mut PageTable {
    unsafe { m.phys_to_mut::<PageTable>(phys) }
}

/// Upper bound on the page-table frames needed to map `pages` 4 KiB pages
/// into a single contiguous virtual range: one PT per 512 pages, one PD per
/// 512² pages and one PDPT per 512³ pages, each rounded up.
///
/// ```rust
/// # use kernel_vmem::page_table_frames;
/// assert_eq!(page_table_frames(0), 0);
/// assert_eq!(page_table_frames(1), 3);
/// assert_eq!(page_table_frames(512), 3);
/// assert_eq!(page_table_frames(513), 4);
/// ```
#[must_use]
pub const fn page_table_frames(pages: u64) -> u64 {
    const N: u64 = ENTRIES as u64;
    pages.div_ceil(N) + pages.div_ceil(N * N) + pages.div_ceil(N * N * N)
}

/// Align `x` down to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use kernel_vmem::align_down;
/// assert_eq!(align_down(0,      4096), 0);
/// assert_eq!(align_down(4095,   4096), 0);
/// assert_eq!(align_down(8191,   4096), 4096);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
/// - `x + (a - 1)` must **not overflow** `u64`; use [`checked_align_up`]
///   for untrusted input.
///
/// ### Examples
/// ```rust
/// # use kernel_vmem::align_up;
/// assert_eq!(align_up(0,       4096), 0);
/// assert_eq!(align_up(1,       4096), 4096);
/// assert_eq!(align_up(4096,    4096), 4096);
/// assert_eq!(align_up(0x12345,   16), 0x12350);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}

/// Like [`align_up`], but `None` if the result does not fit in `u64`.
#[inline(always)]
#[must_use]
pub const fn checked_align_up(x: u64, a: u64) -> Option<u64> {
    match x.checked_add(a - 1) {
        Some(v) => Some(v & !(a - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// A trivial **bump** allocator: always hands out the next 4 KiB frame.
    struct BumpAlloc {
        /// Next free physical byte address (must remain 4 KiB aligned)
        next: u64,
        /// Exclusive end (bounds check)
        end: u64,
    }

    impl BumpAlloc {
        fn new(start: u64, end: u64) -> Self {
            Self { next: start, end }
        }
    }

    impl FrameAlloc for BumpAlloc {
        fn alloc_4k(&mut self) -> Option<PhysAddr> {
            if self.next + 4096 > self.end {
                return None;
            }
            let p = self.next;
            self.next += 4096;
            Some(PhysAddr::new(p))
        }
    }

    /// A 4 KiB-aligned raw frame. We use this as our "physical RAM" backing store in tests.
    #[repr(align(4096))]
    struct Aligned4K(#[allow(dead_code)] [u8; 4096]);

    /// A tiny in-memory "RAM" where physical addresses are byte offsets into a
    /// vector of 4 KiB frames.
    struct TestPhys {
        frames: Vec<Aligned4K>,
    }

    impl TestPhys {
        fn with_frames(n: usize) -> Self {
            Self {
                frames: (0..n).map(|_| Aligned4K([0; 4096])).collect(),
            }
        }
    }

    impl PhysMapper for TestPhys {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysAddr) -> &'a mut T {
            let idx = (pa.as_u64() >> 12) as usize;
            assert_eq!(pa.as_u64() & 0xfff, 0);
            let ptr = (&raw const self.frames[idx]).cast::<T>().cast_mut();
            // SAFETY: The caller promises `T` matches the bytes in the frame.
            unsafe { &mut *ptr }
        }
    }

    /// Records the root loaded into it.
    struct FakeCr3(Cell<PhysAddr>);

    impl PagingRoot for FakeCr3 {
        fn active_root(&self) -> PhysAddr {
            self.0.get()
        }

        unsafe fn load_root(&self, root: PhysAddr) {
            self.0.set(root);
        }
    }

    fn fresh_space<'a>(phys: &'a TestPhys, alloc: &mut BumpAlloc) -> AddressSpace<'a, TestPhys> {
        let root = alloc.alloc_4k().unwrap();
        unsafe { get_table(phys, root).zero() };
        AddressSpace::from_root(phys, root)
    }

    /// A boot-style table: PML4 → PDPT → PD with 512 identity 2 MiB leaves.
    fn identity_gib(phys: &TestPhys, alloc: &mut BumpAlloc) -> PhysAddr {
        let space = fresh_space(phys, alloc);
        for i in 0..512u64 {
            let a = i << 21;
            space
                .map_one(
                    alloc,
                    VirtAddr::new(a),
                    PhysAddr::new(a),
                    PageSize::Size2M,
                    PageEntryBits::new_table_link(),
                )
                .unwrap();
        }
        space.root()
    }

    #[test]
    fn map_one_4k_creates_tables_and_leaf() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let space = fresh_space(&phys, &mut alloc);

        let va = VirtAddr::new(0xffff_8000_0000_0000);
        let pa = PhysAddr::new(0x30_0000);
        space
            .map_one(&mut alloc, va, pa, PageSize::Size4K, PageEntryBits::new_kernel_rw_nx())
            .expect("map_one");

        unsafe {
            let pml4 = get_table(&phys, space.root());
            let e4 = pml4.entry(va.pml4_index());
            assert!(e4.is_table_link());

            let pdpt = get_table(&phys, e4.physical_address());
            let e3 = pdpt.entry(va.pdpt_index());
            assert!(e3.is_table_link());

            let pd = get_table(&phys, e3.physical_address());
            let e2 = pd.entry(va.pd_index());
            assert!(e2.is_table_link());

            let pt = get_table(&phys, e2.physical_address());
            let e1 = pt.entry(va.pt_index());
            assert!(e1.present());
            assert!(e1.writable());
            assert!(e1.no_execute());
            assert!(!e1.large_page());
            assert_eq!(e1.physical_address(), pa);
        }
        assert_eq!(space.query(VirtAddr::new(va.as_u64() + 0x123)), Some(PhysAddr::new(0x30_0123)));
    }

    #[test]
    fn map_one_rejects_misaligned_and_double_mappings() {
        let phys = TestPhys::with_frames(16);
        let mut alloc = BumpAlloc::new(0, 16 << 12);
        let space = fresh_space(&phys, &mut alloc);
        let flags = PageEntryBits::new_kernel_rw_nx();
        let mut map = |va: u64, size: PageSize| {
            space.map_one(&mut alloc, VirtAddr::new(va), PhysAddr::new(0), size, flags)
        };

        assert_eq!(map(0x1000, PageSize::Size2M), Err(MapError::Misaligned(0x1000)));
        map(0x20_0000, PageSize::Size2M).unwrap();
        assert_eq!(
            map(0x20_0000, PageSize::Size2M),
            Err(MapError::AlreadyMapped(VirtAddr::new(0x20_0000)))
        );
        assert_eq!(
            map(0x20_1000, PageSize::Size4K),
            Err(MapError::LargePageInTheWay(VirtAddr::new(0x20_1000)))
        );
    }

    #[test]
    fn query_resolves_large_leaves() {
        let phys = TestPhys::with_frames(16);
        let mut alloc = BumpAlloc::new(0, 16 << 12);
        let space = fresh_space(&phys, &mut alloc);
        space
            .map_one(
                &mut alloc,
                VirtAddr::new(0x0000_4000_0000_0000),
                PhysAddr::new(0x4000_0000),
                PageSize::Size1G,
                PageEntryBits::new_kernel_rw_nx(),
            )
            .unwrap();

        assert_eq!(
            space.query(VirtAddr::new(0x0000_4000_0ABC_D123)),
            Some(PhysAddr::new(0x4ABC_D123))
        );
        assert_eq!(space.query(VirtAddr::new(0x0000_4000_4000_0000)), None);
    }

    #[test]
    fn new_inheriting_shares_top_level_entries() {
        let phys = TestPhys::with_frames(16);
        let mut alloc = BumpAlloc::new(0, 16 << 12);
        let boot = identity_gib(&phys, &mut alloc);

        let space = AddressSpace::new_inheriting(&phys, &mut alloc, boot).unwrap();
        assert_ne!(space.root(), boot);
        assert_eq!(space.query(VirtAddr::new(0x12_3456)), Some(PhysAddr::new(0x12_3456)));

        let cr3 = FakeCr3(Cell::new(boot));
        unsafe { space.activate(&cr3) };
        assert_eq!(cr3.active_root(), space.root());
    }

    #[test]
    fn unmap_range_clears_covered_large_leaves_and_keeps_the_rest() {
        let phys = TestPhys::with_frames(16);
        let mut alloc = BumpAlloc::new(0, 16 << 12);
        let boot = identity_gib(&phys, &mut alloc);
        let space = AddressSpace::from_root(&phys, boot);

        let removed = space
            .unmap_range(VirtAddr::new(0x20_0000), 0x4000_0000 - 0x20_0000)
            .unwrap();
        assert_eq!(removed, 0x4000_0000 - 0x20_0000);
        assert_eq!(space.query(VirtAddr::new(0x10_0000)), Some(PhysAddr::new(0x10_0000)));
        assert_eq!(space.query(VirtAddr::new(0x20_0000)), None);
        assert_eq!(space.query(VirtAddr::new(0x3FFF_F000)), None);

        // Nothing left to remove: holes are skipped.
        assert_eq!(space.unmap_range(VirtAddr::new(0x20_0000), 0x20_0000), Ok(0));
    }

    #[test]
    fn unmap_range_rejects_partially_covered_large_leaves() {
        let phys = TestPhys::with_frames(16);
        let mut alloc = BumpAlloc::new(0, 16 << 12);
        let boot = identity_gib(&phys, &mut alloc);
        let space = AddressSpace::from_root(&phys, boot);

        assert_eq!(
            space.unmap_range(VirtAddr::new(0x18_0000), 0x8_0000),
            Err(MapError::PartialLargePage(VirtAddr::new(0)))
        );
        assert_eq!(
            space.unmap_range(VirtAddr::new(0x18_0001), 0x1000),
            Err(MapError::Misaligned(0x18_0001))
        );
    }

    #[test]
    fn map_anon_backs_every_page_with_a_distinct_frame() {
        let phys = TestPhys::with_frames(32);
        let mut alloc = BumpAlloc::new(0, 32 << 12);
        let space = fresh_space(&phys, &mut alloc);
        let base = VirtAddr::new(1 << 34);

        space
            .map_anon(&mut alloc, base, 4 * 4096, PageEntryBits::new_kernel_rw_nx())
            .unwrap();

        let frames: Vec<_> = (0..4)
            .map(|i| space.query(VirtAddr::new(base.as_u64() + i * 4096)).unwrap())
            .collect();
        for (i, a) in frames.iter().enumerate() {
            assert!(a.is_aligned(4096));
            assert!(!frames[i + 1..].contains(a));
        }
        assert_eq!(space.query(VirtAddr::new(base.as_u64() + 4 * 4096)), None);
    }

    #[test]
    fn map_anon_reports_exhaustion() {
        let phys = TestPhys::with_frames(5);
        let mut alloc = BumpAlloc::new(0, 5 << 12);
        let space = fresh_space(&phys, &mut alloc);
        // PML4 + PDPT + PD + PT leave a single frame for data.
        assert_eq!(
            space.map_anon(
                &mut alloc,
                VirtAddr::new(0),
                2 * 4096,
                PageEntryBits::new_kernel_rw_nx()
            ),
            Err(MapError::OutOfFrames)
        );
    }

    #[test]
    fn page_table_frames_rounds_each_level_up() {
        assert_eq!(page_table_frames(512 * 512), 512 + 1 + 1);
        assert_eq!(page_table_frames(512 * 512 + 1), 513 + 2 + 1);
    }

    #[test]
    fn checked_align_up_detects_overflow() {
        assert_eq!(checked_align_up(u64::MAX, 4096), None);
        assert_eq!(checked_align_up(0x1001, 4096), Some(0x2000));
    }
}
