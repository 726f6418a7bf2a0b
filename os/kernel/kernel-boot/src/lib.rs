//! # Early Memory Bootstrap
//!
//! Turns the boot information the hypervisor hands to the guest into a
//! [`BootLayout`]: the guest command line plus the physical (or, with the
//! `paging` feature, virtual) heap, boot stack and initrd regions.
//!
//! ```text
//!  boot info ─► BootInfoSource ─► scan_memory ─► arbitrate ─► BootLayout
//!  (zero page     (bootparams /     (RAM at 1 MiB,  (cut initrd      │
//!   or multiboot)  multiboot)        heap + stack)   out of heap)    ▼
//!                                                           bootstrap_paging
//! ```
//!
//! ## Boot information formats
//!
//! - [`bootparams::BootParams`]: the Linux "zero page" as written by
//!   Firecracker.
//! - [`multiboot::Multiboot`]: a Multiboot (v1) information block as written
//!   by QEMU's `-kernel` loader.
//!
//! Both are read through a [`PhysView`], so they can be exercised on the host
//! with a [`BufferView`].
//!
//! ## Errors
//!
//! Nothing in this crate halts. Unrecoverable conditions are returned as
//! [`FatalError`]; conditions that were worked around travel as a
//! [`Degradation`] next to the fallback value.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod arbiter;
pub mod bootparams;
pub mod cmdline;
pub mod error;
pub mod layout;
pub mod multiboot;
#[cfg(feature = "paging")]
pub mod paging;
pub mod region;
pub mod scan;
pub mod source;
pub mod view;

pub use crate::arbiter::{Arbitration, arbitrate};
pub use crate::cmdline::CmdLine;
pub use crate::error::{Degradable, Degradation, FatalError};
pub use crate::layout::{BootLayout, build_layout};
pub use crate::region::Region;
pub use crate::scan::{ScanResult, scan_memory};
pub use crate::source::{BootInfoSource, MemoryKind, MemoryMapEntry};
pub use crate::view::{BufferView, IdentityView, PhysView};
