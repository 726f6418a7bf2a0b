//! # Fatal and Degraded Outcomes
//!
//! Boot either stops ([`FatalError`]) or carries on with a fallback
//! ([`Degradation`] inside a [`Degradable`]). Library code never halts the
//! CPU; the entry routine logs a `FatalError` and panics, and logs a
//! `Degradation` at `warn` level.

use crate::region::Region;
use log::warn;

/// Conditions under which the guest cannot continue to boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    #[error("could not find a usable memory region starting at {start:#x}")]
    NoUsableRegion { start: u64 },

    #[error("memory region at {addr:#x} with size {size:#x} wraps the address space")]
    RegionWraps { addr: u64, size: u64 },

    #[error("kernel image ends at {kernel_end:#x}, beyond the end of RAM at {max_addr:#x}")]
    KernelExceedsRam { kernel_end: u64, max_addr: u64 },

    #[error("not enough memory to allocate boot stack ({available:#x} bytes of RAM)")]
    NoRoomForStack { available: u64 },

    #[error("boot stack at {stack_start:#x} would overwrite the kernel image ending at {kernel_end:#x}")]
    StackOverlapsKernel { stack_start: u64, kernel_end: u64 },

    #[error("not enough memory for kernel, heap, initrd and boot stack (initrd {initrd})")]
    InitrdOverlap { initrd: Region },

    #[error("malformed boot information: {0}")]
    MalformedBootInfo(&'static str),

    #[cfg(feature = "paging")]
    #[error("failed to initialize paging: {0}")]
    Paging(#[from] crate::paging::PagingError),
}

/// Conditions that are reported but worked around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Degradation {
    #[error("command line too long ({len} bytes), truncated to {kept} bytes")]
    CmdlineTruncated { len: usize, kept: usize },

    #[error("no command line provided, using the image name")]
    CmdlineMissing,

    #[error("ignoring empty initrd at {start:#x}")]
    EmptyInitrd { start: u64 },

    #[error("memory map record at offset {offset:#x} has invalid size {size}, ignoring the rest of the map")]
    CorruptMemoryMap { offset: usize, size: u32 },

    #[cfg(feature = "paging")]
    #[error("secondary heap {region} not added to the frame allocator: {reason}")]
    SecondaryHeapRejected {
        region: Region,
        reason: kernel_alloc::frame_alloc::FrameAllocError,
    },
}

/// A value that may come with a [`Degradation`] explaining a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Degradable<T> {
    value: T,
    degradation: Option<Degradation>,
}

impl<T> Degradable<T> {
    /// A value obtained without any fallback.
    pub const fn clean(value: T) -> Self {
        Self {
            value,
            degradation: None,
        }
    }

    /// A fallback value together with the reason it was needed.
    pub const fn degraded(value: T, degradation: Degradation) -> Self {
        Self {
            value,
            degradation: Some(degradation),
        }
    }

    pub const fn value(&self) -> &T {
        &self.value
    }

    pub const fn degradation(&self) -> Option<&Degradation> {
        self.degradation.as_ref()
    }

    pub fn into_parts(self) -> (T, Option<Degradation>) {
        (self.value, self.degradation)
    }

    /// Log the degradation, if any, at `warn` level and return the value.
    pub fn warn(self) -> T {
        if let Some(d) = &self.degradation {
            warn!("{d}");
        }
        self.value
    }
}
