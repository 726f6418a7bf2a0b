//! # KVM Platform Early Boot
//!
//! Glue between the boot assembly and the generic kernel. The image is built
//! for exactly one boot information format:
//!
//! | Feature      | Hypervisor / loader | Boot information              |
//! |--------------|---------------------|-------------------------------|
//! | `bootparams` | Firecracker         | Linux zero page at `0x7000`   |
//! | `multiboot`  | QEMU `-kernel`      | Multiboot v1 block in `arg`   |
//!
//! With `paging` the heap and boot stack are moved into the kernel's own page
//! table before the generic kernel starts. With `qemu` log output goes to the
//! debug console port.
//!
//! The entry routine only exists on the bare-metal target; the pipeline it
//! runs lives in [`setup`] and is tested on the host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(all(feature = "bootparams", feature = "multiboot"))]
compile_error!("features `bootparams` and `multiboot` are mutually exclusive");

#[cfg(not(any(feature = "bootparams", feature = "multiboot")))]
compile_error!("enable exactly one boot information format: `bootparams` or `multiboot`");

#[cfg(target_os = "none")]
mod entry;
pub mod once;
pub mod setup;

#[cfg(target_os = "none")]
pub use entry::BOOT_LAYOUT;
#[cfg(all(target_os = "none", feature = "paging"))]
pub use entry::PAGING;

pub use kernel_boot::{BootLayout, Region};
