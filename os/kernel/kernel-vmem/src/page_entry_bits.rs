use crate::addresses::PhysAddr;
use bitfield_struct::bitfield;

/// A single 64-bit x86-64 page table entry in its raw bitfield form.
///
/// This structure models the **common superset** of fields found in all
/// four paging levels (PML4E, PDPTE, PDE, PTE).
///
/// ### Bit layout
///
/// | Bits      | Name / Mnemonic   | Meaning |
/// |-----------|-------------------|----------|
/// | 0         | `P` (present)     | Valid entry if set |
/// | 1         | `RW`              | Writable if set |
/// | 2         | `US`              | User-mode accessible if set |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Disable caching |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (leaf only) |
/// | 7         | `PS`              | Large page flag |
/// | 8         | `G`               | Global (leaf only) |
/// | 9–11      | OS avail low      | Reserved for OS use |
/// | 12–51     | `addr`            | Physical frame bits [51:12] |
/// | 52–62     | OS avail high     | Reserved for OS use |
/// | 63        | `NX`              | Execute disable |
///
/// ### Notes
/// - `PS` must be 0 in L4 entries; in L3 (1 GiB) and L2 (2 MiB) it marks a leaf.
///   In a 4 KiB PTE the bit is PAT, which the platform never sets.
/// - For large leaves the low address bits below the page size must be zero.
///
/// ### Example
/// ```rust
/// # use kernel_vmem::{PageEntryBits, PhysAddr};
/// let mut e = PageEntryBits::new();
/// e.set_present(true);
/// e.set_writable(true);
/// e.set_physical_address(PhysAddr::new(0x20_0000));
/// assert!(e.present());
/// assert_eq!(e.physical_address(), PhysAddr::new(0x20_0000));
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2). Never set by the platform.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6), **leaf only**. Set by the CPU.
    pub dirty: bool,

    /// Large Page (PS, bit 7).
    ///
    /// For L3 (PDPTE) and L2 (PDE): when **set**, the entry is a **leaf**
    /// mapping a 1 GiB (L3) or 2 MiB (L2) page. When **clear**, the entry
    /// points to the next-level table.
    pub large_page: bool,

    /// Global (G, bit 8), **leaf only**.
    pub global_translation: bool,

    #[bits(3)]
    pub os_available_low: u8,

    /// Physical address bits [51:12] (bits 12..=51).
    #[bits(40)]
    phys_addr_bits_51_12: u64,

    #[bits(11)]
    pub os_available_high: u16,

    /// No-Execute (NX, bit 63).
    ///
    /// Requires `EFER.NXE`; the boot code enables it before entering Rust.
    pub no_execute: bool,
}

impl PageEntryBits {
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysAddr) {
        self.set_phys_addr_bits_51_12(phys.as_u64() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, phys: PhysAddr) -> Self {
        self.with_phys_addr_bits_51_12(phys.as_u64() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysAddr {
        PhysAddr::new(self.phys_addr_bits_51_12() << 12)
    }

    /// Flags for intermediate (non-leaf) entries: present and writable.
    ///
    /// Effective permissions are the intersection over the walk, so the leaf
    /// decides about writes and execution.
    #[inline]
    #[must_use]
    pub const fn new_table_link() -> Self {
        Self::new().with_present(true).with_writable(true)
    }

    /// Supervisor read-write data mapping, not executable.
    #[inline]
    #[must_use]
    pub const fn new_kernel_rw_nx() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(false)
            .with_no_execute(true)
    }

    /// Whether this entry points to a lower-level table, given that it is not
    /// a 4 KiB PTE.
    #[inline]
    #[must_use]
    pub const fn is_table_link(&self) -> bool {
        self.present() && !self.large_page()
    }

    /// Whether this entry maps a large page at L3 or L2.
    #[inline]
    #[must_use]
    pub const fn is_large_leaf(&self) -> bool {
        self.present() && self.large_page()
    }
}
