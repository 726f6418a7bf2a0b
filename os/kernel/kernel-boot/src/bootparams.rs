//! # Linux Boot Parameters Driver
//!
//! Reads the "zero page" that Firecracker places at
//! [`BOOT_PARAM_BASE`](kernel_info::bootparams::BOOT_PARAM_BASE).

use crate::error::{Degradable, FatalError};
use crate::region::Region;
use crate::source::{BootInfoSource, MemoryMapEntry};
use crate::view::PhysView;
use core::iter::FusedIterator;
use kernel_info::bootparams::{self as bp, e820};
use log::debug;

/// Boot information in Linux `boot_params` format.
pub struct BootParams<'v, V: PhysView> {
    view: &'v V,
    base: u64,
}

impl<'v, V: PhysView> BootParams<'v, V> {
    /// Boot parameters at physical address `base`.
    pub const fn new(view: &'v V, base: u64) -> Self {
        Self { view, base }
    }

    /// Boot parameters at the address fixed by the hypervisor.
    pub const fn at_default_base(view: &'v V) -> Self {
        Self::new(view, bp::BOOT_PARAM_BASE)
    }

    /// A `u32` field of the zero page. Fields outside the view read as zero.
    fn field(&self, offset: usize) -> u32 {
        self.view.read_u32(self.base + offset as u64).unwrap_or(0)
    }

    /// Physical address of the command line.
    ///
    /// The high half is taken from `ext_ramdisk_size`, not from
    /// `ext_cmd_line_ptr`. Firecracker leaves both zero, and the platform has
    /// always read it this way.
    #[must_use]
    pub fn cmdline_addr(&self) -> u64 {
        u64::from(self.field(bp::CMD_LINE_PTR))
            | (u64::from(self.field(bp::EXT_RAMDISK_SIZE)) << 32)
    }

    /// Number of valid e820 entries, clamped to the table capacity.
    #[must_use]
    pub fn e820_entries(&self) -> usize {
        let count = self.view.read_u8(self.base + bp::E820_ENTRIES as u64).unwrap_or(0);
        usize::from(count).min(bp::E820_MAX_ENTRIES)
    }
}

impl<V: PhysView> BootInfoSource for BootParams<'_, V> {
    type MemoryMap<'a>
        = E820Entries<'a, V>
    where
        Self: 'a;

    /// The command line up to its first NUL. `cmdline_size` counts the
    /// terminator, so a zero size means there is none.
    fn cmdline(&self) -> Option<&[u8]> {
        let addr = self.cmdline_addr();
        let size = self.field(bp::CMDLINE_SIZE) as usize;
        debug!("command line at {addr:#x}, {size:#x} bytes");

        if addr == 0 || size == 0 {
            return None;
        }
        Some(self.view.c_str(addr, size))
    }

    fn memory_map(&self) -> Self::MemoryMap<'_> {
        E820Entries {
            view: self.view,
            table: self.base + bp::E820_TABLE as u64,
            index: 0,
            count: self.e820_entries(),
        }
    }

    fn initrd(&self) -> Result<Degradable<Option<Region>>, FatalError> {
        let image = u64::from(self.field(bp::RAMDISK_IMAGE))
            | (u64::from(self.field(bp::EXT_RAMDISK_IMAGE)) << 32);
        let size = u64::from(self.field(bp::RAMDISK_SIZE))
            | (u64::from(self.field(bp::EXT_RAMDISK_SIZE)) << 32);

        if size == 0 {
            debug!("no initrd present");
            return Ok(Degradable::clean(None));
        }

        let initrd = Region::from_start_len(image, size)
            .ok_or(FatalError::MalformedBootInfo("initrd wraps the address space"))?;
        Ok(Degradable::clean(Some(initrd)))
    }
}

/// Walk over the fixed-capacity e820 table.
pub struct E820Entries<'a, V: PhysView> {
    view: &'a V,
    table: u64,
    index: usize,
    count: usize,
}

impl<V: PhysView> E820Entries<'_, V> {
    fn read(&self, index: usize) -> Option<MemoryMapEntry> {
        let entry = self.table + (index * bp::E820_ENTRY_SIZE) as u64;
        Some(MemoryMapEntry {
            addr: self.view.read_u64(entry + e820::ADDR as u64)?,
            size: self.view.read_u64(entry + e820::SIZE as u64)?,
            kind: self.view.read_u32(entry + e820::TYPE as u64)?.into(),
        })
    }
}

impl<V: PhysView> Iterator for E820Entries<'_, V> {
    type Item = MemoryMapEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let Some(entry) = self.read(self.index) else {
            self.index = self.count;
            return None;
        };
        self.index += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count - self.index))
    }
}

impl<V: PhysView> FusedIterator for E820Entries<'_, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryKind;
    use crate::view::BufferView;

    const BASE: u64 = bp::BOOT_PARAM_BASE;

    fn zero_page() -> Vec<u8> {
        vec![0; bp::BOOT_PARAMS_SIZE]
    }

    fn put_u32(page: &mut [u8], offset: usize, value: u32) {
        page[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn put_e820(page: &mut [u8], index: usize, addr: u64, size: u64, kind: u32) {
        let at = bp::E820_TABLE + index * bp::E820_ENTRY_SIZE;
        page[at..at + 8].copy_from_slice(&addr.to_le_bytes());
        page[at + 8..at + 16].copy_from_slice(&size.to_le_bytes());
        page[at + 16..at + 20].copy_from_slice(&kind.to_le_bytes());
    }

    #[test]
    fn e820_table_is_walked_up_to_the_entry_count() {
        let mut page = zero_page();
        put_e820(&mut page, 0, 0, 0x9_fc00, 1);
        put_e820(&mut page, 1, 0x10_0000, 0x200_0000, 1);
        put_e820(&mut page, 2, 0xfeff_c000, 0x4000, 2);
        page[bp::E820_ENTRIES] = 2;

        let view = BufferView::new(BASE, &page);
        let params = BootParams::at_default_base(&view);
        let entries: Vec<_> = params.memory_map().collect();
        assert_eq!(
            entries,
            [
                MemoryMapEntry { addr: 0, size: 0x9_fc00, kind: MemoryKind::Available },
                MemoryMapEntry { addr: 0x10_0000, size: 0x200_0000, kind: MemoryKind::Available },
            ]
        );
    }

    #[test]
    fn entry_count_is_clamped_to_the_table() {
        let mut page = zero_page();
        page[bp::E820_ENTRIES] = 200;
        let view = BufferView::new(BASE, &page);
        let params = BootParams::at_default_base(&view);
        assert_eq!(params.e820_entries(), bp::E820_MAX_ENTRIES);
        assert_eq!(params.memory_map().count(), bp::E820_MAX_ENTRIES);
    }

    #[test]
    fn truncated_view_ends_the_walk() {
        let mut page = zero_page();
        page[bp::E820_ENTRIES] = 3;
        let cut = bp::E820_TABLE + bp::E820_ENTRY_SIZE + 10;
        let view = BufferView::new(BASE, &page[..cut]);
        let params = BootParams::at_default_base(&view);
        let mut entries = params.memory_map();
        assert!(entries.next().is_some());
        assert!(entries.next().is_none());
        assert!(entries.next().is_none());
    }

    #[test]
    fn cmdline_high_half_comes_from_ext_ramdisk_size() {
        let mut page = zero_page();
        put_u32(&mut page, bp::CMD_LINE_PTR, 0x2_0000);
        put_u32(&mut page, bp::EXT_RAMDISK_SIZE, 0x1);
        put_u32(&mut page, bp::EXT_CMD_LINE_PTR, 0x7);
        let view = BufferView::new(BASE, &page);
        assert_eq!(BootParams::at_default_base(&view).cmdline_addr(), 0x1_0002_0000);
    }

    #[test]
    fn null_cmdline_is_absent() {
        let page = zero_page();
        let view = BufferView::new(BASE, &page);
        assert_eq!(BootParams::at_default_base(&view).cmdline(), None);
    }

    #[test]
    fn zero_cmdline_size_is_absent() {
        let mut page = zero_page();
        put_u32(&mut page, bp::CMD_LINE_PTR, 0x2_0000);
        let view = BufferView::new(BASE, &page);
        assert_eq!(BootParams::at_default_base(&view).cmdline(), None);
    }

    #[test]
    fn cmdline_stops_at_the_terminator() {
        const CMDLINE: u64 = 0x8000;
        let mut mem = vec![0u8; 0x2000];
        put_u32(&mut mem, bp::CMD_LINE_PTR, CMDLINE as u32);
        put_u32(&mut mem, bp::CMDLINE_SIZE, 14);
        let at = (CMDLINE - BASE) as usize;
        mem[at..at + 16].copy_from_slice(b"console=ttyS0\0xy");

        let view = BufferView::new(BASE, &mem);
        assert_eq!(BootParams::at_default_base(&view).cmdline(), Some(&b"console=ttyS0"[..]));
    }

    #[test]
    fn ramdisk_is_read_from_the_setup_header() {
        let mut page = zero_page();
        put_u32(&mut page, bp::RAMDISK_IMAGE, 0x80_0000);
        put_u32(&mut page, bp::RAMDISK_SIZE, 0x1_0000);
        let view = BufferView::new(BASE, &page);
        let initrd = BootParams::at_default_base(&view).initrd().unwrap();
        assert_eq!(initrd.degradation(), None);
        assert_eq!(*initrd.value(), Region::new(0x80_0000, 0x81_0000));
    }

    #[test]
    fn zero_sized_ramdisk_is_absent() {
        let mut page = zero_page();
        put_u32(&mut page, bp::RAMDISK_IMAGE, 0x80_0000);
        let view = BufferView::new(BASE, &page);
        assert_eq!(*BootParams::at_default_base(&view).initrd().unwrap().value(), None);
    }
}
