//! # Direct-Map `PhysMapper`
//!
//! Page-table frames handed out by the frame allocator can lie anywhere in
//! guest RAM, including above the first GiB that the boot page table
//! identity-maps, and the identity map itself is removed during the paging
//! bootstrap. The boot tables therefore also map all of physical memory at
//! [`DIRECT_MAP_BASE`], and page tables are always edited through that window.
//!
//! ## Example
//! ```rust,no_run
//! use kernel_vmem::{PhysAddr, PageTable, PhysMapper};
//! use kernel_alloc::phys_mapper::DirectMapPhysMapper;
//! let mapper = DirectMapPhysMapper;
//! unsafe {
//!     let table: &mut PageTable = mapper.phys_to_mut(PhysAddr::new(0x1234_0000));
//!     table.zero();
//! }
//! ```

use kernel_info::memory::DIRECT_MAP_BASE;
use kernel_vmem::{PhysAddr, PhysMapper};

/// [`PhysMapper`] that reaches physical memory at `DIRECT_MAP_BASE + pa`.
///
/// # Safety
/// - The direct map must be present and cover the referenced physical range.
#[derive(Debug, Default, Copy, Clone)]
pub struct DirectMapPhysMapper;

impl DirectMapPhysMapper {
    /// Virtual address at which `pa` is visible.
    #[inline]
    #[must_use]
    pub const fn virt(pa: PhysAddr) -> u64 {
        DIRECT_MAP_BASE + pa.as_u64()
    }
}

impl PhysMapper for DirectMapPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysAddr) -> &'a mut T {
        let va = Self::virt(pa) as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped via the direct map.
        unsafe { &mut *va }
    }
}
