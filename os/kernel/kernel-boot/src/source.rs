//! # Boot Information Sources
//!
//! A [`BootInfoSource`] normalizes whatever the hypervisor handed over into
//! three things: the raw command line, a lazy walk over the memory map and
//! the bounds of the initial ramdisk. The scanner and the arbiter are written
//! once against this trait; the image is built with exactly one driver.

use crate::cmdline::CmdLine;
use crate::error::{Degradable, Degradation, FatalError};
use crate::region::Region;
use core::iter::FusedIterator;
use kernel_info::memory::IMAGE_NAME;

/// Memory types shared by the e820 table and the multiboot memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Usable RAM.
    Available,
    Reserved,
    AcpiReclaimable,
    AcpiNvs,
    /// Faulty RAM reported by the firmware.
    Defective,
    /// A type this platform does not know about.
    Other(u32),
}

impl From<u32> for MemoryKind {
    fn from(raw: u32) -> Self {
        match raw {
            1 => Self::Available,
            2 => Self::Reserved,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::Defective,
            other => Self::Other(other),
        }
    }
}

/// One range of the memory map, as reported (not validated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMapEntry {
    pub addr: u64,
    pub size: u64,
    pub kind: MemoryKind,
}

impl MemoryMapEntry {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.kind, MemoryKind::Available)
    }
}

/// Boot information as delivered by the hypervisor.
pub trait BootInfoSource {
    /// Iterator over the memory map.
    type MemoryMap<'a>: Iterator<Item = MemoryMapEntry> + FusedIterator
    where
        Self: 'a;

    /// The raw command line, or `None` if the hypervisor did not supply one.
    fn cmdline(&self) -> Option<&[u8]>;

    /// A fresh walk over the memory map.
    fn memory_map(&self) -> Self::MemoryMap<'_>;

    /// Bounds of the initial ramdisk, if any.
    ///
    /// # Errors
    /// [`FatalError::MalformedBootInfo`] if the description is inconsistent.
    fn initrd(&self) -> Result<Degradable<Option<Region>>, FatalError>;

    /// Copy the command line into `out`.
    ///
    /// Falls back to the image name when none was supplied, so the generic
    /// kernel always sees at least `argv[0]`.
    fn capture_cmdline(&self, out: &mut CmdLine) -> Degradable<()> {
        let Some(raw) = self.cmdline() else {
            // The image name always fits.
            let _ = out.set(IMAGE_NAME.as_bytes());
            return Degradable::degraded((), Degradation::CmdlineMissing);
        };

        match out.set(raw) {
            None => Degradable::clean(()),
            Some(truncated) => Degradable::degraded((), truncated),
        }
    }
}
