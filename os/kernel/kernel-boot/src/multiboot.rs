//! # Multiboot Driver
//!
//! Reads the Multiboot information block whose physical address the boot
//! code passes to the entry routine. Unlike the zero page, the memory map is
//! a blob of variable-length records, and every optional part of the block is
//! guarded by a bit in the `flags` word.

use crate::error::{Degradable, Degradation, FatalError};
use crate::region::Region;
use crate::source::{BootInfoSource, MemoryMapEntry};
use crate::view::PhysView;
use core::iter::FusedIterator;
use kernel_info::memory::MAX_CMDLINE_SIZE;
use kernel_info::multiboot::{self as mb, flags, mmap, module};
use log::{debug, warn};

/// Boot information in Multiboot format.
pub struct Multiboot<'v, V: PhysView> {
    view: &'v V,
    info: u64,
}

impl<'v, V: PhysView> Multiboot<'v, V> {
    /// The information block at physical address `info`.
    pub const fn new(view: &'v V, info: u64) -> Self {
        Self { view, info }
    }

    fn field(&self, offset: usize) -> u32 {
        self.view.read_u32(self.info + offset as u64).unwrap_or(0)
    }

    #[must_use]
    pub fn flags(&self) -> u32 {
        self.field(mb::FLAGS)
    }

    fn has(&self, flag: u32) -> bool {
        self.flags() & flag != 0
    }
}

impl<V: PhysView> BootInfoSource for Multiboot<'_, V> {
    type MemoryMap<'a>
        = MmapRecords<'a, V>
    where
        Self: 'a;

    fn cmdline(&self) -> Option<&[u8]> {
        if !self.has(flags::CMDLINE) {
            return None;
        }
        let addr = u64::from(self.field(mb::CMDLINE));
        Some(self.view.c_str(addr, MAX_CMDLINE_SIZE))
    }

    fn memory_map(&self) -> Self::MemoryMap<'_> {
        let (addr, len) = if self.has(flags::MEM_MAP) {
            (u64::from(self.field(mb::MMAP_ADDR)), self.field(mb::MMAP_LENGTH) as usize)
        } else {
            warn!("boot information carries no memory map");
            (0, 0)
        };
        MmapRecords {
            view: self.view,
            addr,
            len,
            offset: 0,
        }
    }

    fn initrd(&self) -> Result<Degradable<Option<Region>>, FatalError> {
        let count = if self.has(flags::MODS) {
            self.field(mb::MODS_COUNT)
        } else {
            0
        };
        if count == 0 {
            debug!("no initrd present");
            return Ok(Degradable::clean(None));
        }

        // Only the first module is the initrd; further modules are ignored.
        let mods = u64::from(self.field(mb::MODS_ADDR));
        if mods == 0 {
            return Err(FatalError::MalformedBootInfo("module list at null address"));
        }
        let read = |offset: usize| self.view.read_u32(mods + offset as u64).map(u64::from);
        let (Some(start), Some(end)) = (read(module::MOD_START), read(module::MOD_END)) else {
            return Err(FatalError::MalformedBootInfo("module descriptor not readable"));
        };

        match Region::new(start, end) {
            None => Err(FatalError::MalformedBootInfo("initrd ends before it starts")),
            Some(r) if r.is_empty() => {
                Ok(Degradable::degraded(None, Degradation::EmptyInitrd { start }))
            }
            Some(r) => Ok(Degradable::clean(Some(r))),
        }
    }
}

/// Walk over the self-describing memory map records.
///
/// Each record starts with its size, not counting the size field itself.
/// Records too small to hold an entry, or running past the end of the map,
/// end the walk.
pub struct MmapRecords<'a, V: PhysView> {
    view: &'a V,
    addr: u64,
    len: usize,
    offset: usize,
}

impl<V: PhysView> MmapRecords<'_, V> {
    fn corrupt(&mut self, size: u32) -> Option<MemoryMapEntry> {
        warn!("{}", Degradation::CorruptMemoryMap { offset: self.offset, size });
        self.offset = self.len;
        None
    }
}

impl<V: PhysView> Iterator for MmapRecords<'_, V> {
    type Item = MemoryMapEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.len {
            return None;
        }

        let record = self.addr + self.offset as u64;
        let Some(size) = self.view.read_u32(record) else {
            return self.corrupt(0);
        };
        let stride = size as usize + mmap::SIZE_FIELD;
        if size < mmap::MIN_ENTRY_SIZE || stride > self.len - self.offset {
            return self.corrupt(size);
        }

        let entry = (|| {
            Some(MemoryMapEntry {
                addr: self.view.read_u64(record + mmap::ADDR as u64)?,
                size: self.view.read_u64(record + mmap::LEN as u64)?,
                kind: self.view.read_u32(record + mmap::TYPE as u64)?.into(),
            })
        })();
        let Some(entry) = entry else {
            return self.corrupt(size);
        };

        self.offset += stride;
        Some(entry)
    }
}

impl<V: PhysView> FusedIterator for MmapRecords<'_, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryKind;
    use crate::view::BufferView;

    const INFO: u64 = 0x9000;
    const MMAP: u64 = 0x9100;
    const MODS: u64 = 0x9400;
    const CMDLINE: u64 = 0x9800;

    /// Low memory from 0x9000 holding the info block, the map, one module
    /// descriptor and the command line.
    struct Fixture {
        mem: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            Self { mem: vec![0; 0x3000] }
        }

        fn put_u32(&mut self, pa: u64, value: u32) {
            let at = (pa - INFO) as usize;
            self.mem[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }

        fn put_u64(&mut self, pa: u64, value: u64) {
            let at = (pa - INFO) as usize;
            self.mem[at..at + 8].copy_from_slice(&value.to_le_bytes());
        }

        fn set_flags(&mut self, value: u32) {
            self.put_u32(INFO, value);
        }

        /// Append records `(size field, addr, len, type)` and return the map length.
        fn mmap(&mut self, records: &[(u32, u64, u64, u32)]) -> u32 {
            let mut at = MMAP;
            for &(size, addr, len, kind) in records {
                self.put_u32(at, size);
                self.put_u64(at + 4, addr);
                self.put_u64(at + 12, len);
                self.put_u32(at + 20, kind);
                at += u64::from(size.max(20)) + 4;
            }
            let length = (at - MMAP) as u32;
            self.put_u32(INFO + mb::MMAP_ADDR as u64, MMAP as u32);
            self.put_u32(INFO + mb::MMAP_LENGTH as u64, length);
            length
        }

        fn view(&self) -> BufferView<'_> {
            BufferView::new(INFO, &self.mem)
        }
    }

    #[test]
    fn records_are_walked_by_their_size_field() {
        let mut f = Fixture::new();
        f.set_flags(flags::MEM_MAP);
        // The second record carries 4 bytes of extension data.
        f.mmap(&[
            (20, 0, 0x9_fc00, 1),
            (24, 0x10_0000, 0x7f0_0000, 1),
            (20, 0xfffc_0000, 0x4_0000, 2),
        ]);

        let view = f.view();
        let entries: Vec<_> = Multiboot::new(&view, INFO).memory_map().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[1],
            MemoryMapEntry {
                addr: 0x10_0000,
                size: 0x7f0_0000,
                kind: MemoryKind::Available
            }
        );
        assert_eq!(entries[2].kind, MemoryKind::Reserved);
    }

    #[test]
    fn zero_sized_record_ends_the_walk() {
        let mut f = Fixture::new();
        f.set_flags(flags::MEM_MAP);
        f.mmap(&[
            (20, 0, 0x9_fc00, 1),
            (0, 0x10_0000, 0x7f0_0000, 1),
            (20, 0x1_0000_0000, 0x1000, 1),
        ]);

        let view = f.view();
        let info = Multiboot::new(&view, INFO);
        let mut walk = info.memory_map();
        assert_eq!(walk.next().map(|e| e.addr), Some(0));
        assert_eq!(walk.next(), None);
        assert_eq!(walk.next(), None);
    }

    #[test]
    fn record_overrunning_the_map_ends_the_walk() {
        let mut f = Fixture::new();
        f.set_flags(flags::MEM_MAP);
        let length = f.mmap(&[(20, 0, 0x9_fc00, 1), (20, 0x10_0000, 0x7f0_0000, 1)]);
        f.put_u32(INFO + mb::MMAP_LENGTH as u64, length - 1);

        let view = f.view();
        assert_eq!(Multiboot::new(&view, INFO).memory_map().count(), 1);
    }

    #[test]
    fn missing_map_flag_yields_an_empty_map() {
        let mut f = Fixture::new();
        f.mmap(&[(20, 0x10_0000, 0x7f0_0000, 1)]);
        let view = f.view();
        assert_eq!(Multiboot::new(&view, INFO).memory_map().count(), 0);
    }

    #[test]
    fn cmdline_requires_its_flag() {
        let mut f = Fixture::new();
        f.mem[(CMDLINE - INFO) as usize..][..12].copy_from_slice(b"vfs.fstab=x\0");
        f.put_u32(INFO + mb::CMDLINE as u64, CMDLINE as u32);

        let view = f.view();
        assert_eq!(Multiboot::new(&view, INFO).cmdline(), None);

        f.set_flags(flags::CMDLINE);
        let view = f.view();
        assert_eq!(Multiboot::new(&view, INFO).cmdline(), Some(&b"vfs.fstab=x"[..]));
    }

    #[test]
    fn first_module_is_the_initrd() {
        let mut f = Fixture::new();
        f.set_flags(flags::MODS);
        f.put_u32(INFO + mb::MODS_COUNT as u64, 2);
        f.put_u32(INFO + mb::MODS_ADDR as u64, MODS as u32);
        f.put_u32(MODS + module::MOD_START as u64, 0x19_0000);
        f.put_u32(MODS + module::MOD_END as u64, 0x1A_0000);
        f.put_u32(MODS + module::SIZE as u64, 0x50_0000);

        let view = f.view();
        let initrd = Multiboot::new(&view, INFO).initrd().unwrap();
        assert_eq!(initrd.into_parts(), (Region::new(0x19_0000, 0x1A_0000), None));
    }

    #[test]
    fn no_modules_means_no_initrd() {
        let mut f = Fixture::new();
        f.put_u32(INFO + mb::MODS_COUNT as u64, 1);
        let view = f.view();
        // Count is ignored without the flag.
        assert_eq!(*Multiboot::new(&view, INFO).initrd().unwrap().value(), None);
    }

    #[test]
    fn empty_module_is_ignored_with_a_degradation() {
        let mut f = Fixture::new();
        f.set_flags(flags::MODS);
        f.put_u32(INFO + mb::MODS_COUNT as u64, 1);
        f.put_u32(INFO + mb::MODS_ADDR as u64, MODS as u32);
        f.put_u32(MODS + module::MOD_START as u64, 0x19_0000);
        f.put_u32(MODS + module::MOD_END as u64, 0x19_0000);

        let view = f.view();
        let initrd = Multiboot::new(&view, INFO).initrd().unwrap();
        assert_eq!(
            initrd.into_parts(),
            (None, Some(Degradation::EmptyInitrd { start: 0x19_0000 }))
        );
    }

    #[test]
    fn malformed_modules_are_fatal() {
        let mut f = Fixture::new();
        f.set_flags(flags::MODS);
        f.put_u32(INFO + mb::MODS_COUNT as u64, 1);

        let view = f.view();
        assert!(matches!(
            Multiboot::new(&view, INFO).initrd(),
            Err(FatalError::MalformedBootInfo(_))
        ));

        f.put_u32(INFO + mb::MODS_ADDR as u64, MODS as u32);
        f.put_u32(MODS + module::MOD_START as u64, 0x1A_0000);
        f.put_u32(MODS + module::MOD_END as u64, 0x19_0000);
        let view = f.view();
        assert_eq!(
            Multiboot::new(&view, INFO).initrd(),
            Err(FatalError::MalformedBootInfo("initrd ends before it starts"))
        );
    }
}
