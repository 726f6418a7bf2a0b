//! # Page-Map Root Register (CR3)

use crate::PhysAddr;
use bitfield_struct::bitfield;

/// CR3, Page-Map Level-4 Base Register (IA-32e, PCID disabled).
///
/// Holds the physical base address of the PML4 table and cache-control flags
/// for PML4 walks.
#[bitfield(u64)]
pub struct Cr3 {
    #[bits(3)]
    __reserved0: u8,

    /// Bit 3, PWT: Page-level Write-Through for the PML4.
    pub pwt: bool,

    /// Bit 4, PCD: Page-level Cache Disable for the PML4.
    pub pcd: bool,

    #[bits(7)]
    __reserved1: u8,

    /// Bits 12–51, PML4 physical base >> 12.
    #[bits(40)]
    pml4_base_4k: u64,

    #[bits(12)]
    __reserved2: u16,
}

impl Cr3 {
    /// A `Cr3` value with write-back caching for the given PML4 frame.
    ///
    /// `pml4` must be 4 KiB-aligned.
    #[must_use]
    pub const fn from_pml4(pml4: PhysAddr) -> Self {
        Self::new().with_pml4_base_4k(pml4.as_u64() >> 12)
    }

    /// Full physical address of the PML4 base.
    #[must_use]
    pub const fn pml4(&self) -> PhysAddr {
        PhysAddr::new(self.pml4_base_4k() << 12)
    }
}

/// Access to the register that selects the active address space.
///
/// The kernel uses [`Cr3Register`]; tests substitute a recording fake so the
/// address-space switch can be exercised on the host.
pub trait PagingRoot {
    /// Physical address of the currently active PML4.
    fn active_root(&self) -> PhysAddr;

    /// Switch to the PML4 at `root`. Reloading the current root flushes all
    /// non-global TLB entries.
    ///
    /// # Safety
    /// The new tables must map the currently executing code, the current stack
    /// and every structure the caller touches afterwards.
    unsafe fn load_root(&self, root: PhysAddr);
}

/// The hardware CR3 register.
#[derive(Debug, Default, Copy, Clone)]
pub struct Cr3Register;

#[cfg(target_arch = "x86_64")]
impl PagingRoot for Cr3Register {
    fn active_root(&self) -> PhysAddr {
        let cr3: u64;
        // SAFETY: Reading CR3 has no side effects; the platform runs at CPL0.
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Cr3::from_bits(cr3).pml4()
    }

    unsafe fn load_root(&self, root: PhysAddr) {
        let cr3 = Cr3::from_pml4(root).into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}
