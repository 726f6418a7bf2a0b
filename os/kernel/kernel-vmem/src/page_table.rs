use crate::PageEntryBits;

/// Number of entries in one table of any level.
pub const ENTRIES: usize = 512;

/// One 4 KiB page table of any level (PML4, PDPT, PD or PT).
///
/// The hardware layout is simply 512 consecutive 64-bit entries; the level is
/// implied by the walk that reached the table.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; ENTRIES],
}

const _: () = {
    assert!(size_of::<PageTable>() == 4096);
    assert!(align_of::<PageTable>() == 4096);
};

impl PageTable {
    /// Clear every entry in place.
    pub fn zero(&mut self) {
        self.entries.fill(PageEntryBits::new());
    }

    /// Read the entry at `index`.
    ///
    /// # Panics
    /// If `index >= 512`; indices are always derived from a 9-bit field.
    #[inline]
    #[must_use]
    pub const fn entry(&self, index: usize) -> PageEntryBits {
        self.entries[index]
    }

    /// Overwrite the entry at `index`.
    #[inline]
    pub const fn set(&mut self, index: usize, entry: PageEntryBits) {
        self.entries[index] = entry;
    }

    /// Iterate all entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = PageEntryBits> + '_ {
        self.entries.iter().copied()
    }
}
