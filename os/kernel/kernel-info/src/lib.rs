//! # Platform Configuration and Boot Interface
//!
//! This crate is the single source of truth for the constants and boot
//! information layouts shared by the KVM platform bootstrap. It contains no
//! logic: everything here is either a compile-time constant or a description
//! of a hypervisor-provided data structure.
//!
//! ## Overview
//!
//! The guest starts in long mode with a static boot page table identity-mapping
//! the first GiB of physical memory. Before anything else can run, the platform
//! code has to find out how much RAM the hypervisor handed out and where the
//! kernel image, the initial ramdisk and the boot stack live. The structures it
//! reads to do so come in one of two formats, chosen when the image is built:
//!
//! ### Boot parameters ([`bootparams`])
//! The Linux "zero page" as written by Firecracker at a fixed physical address:
//! * **Setup header**: command line pointer/size and the ramdisk pointer/size
//! * **E820 table**: a fixed-capacity table of memory ranges with an entry count
//!
//! ### Multiboot ([`multiboot`])
//! The Multiboot information block handed over by QEMU's `-kernel` loader:
//! * **Flags**: a bit mask announcing which fields are valid
//! * **Memory map**: a byte blob of self-describing, variable-length records
//! * **Modules**: a list of boot modules, the first one being the initrd
//!
//! ### Memory Layout ([`memory`])
//! Platform constants the bootstrap relies on:
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//!             │  (boot params, boot tables)     │
//! MEM_START   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS) .. __END    │
//!             ├─────────────────────────────────┤ align_up(__END)
//!             │    Heap (initrd may sit here)   │
//!             ├─────────────────────────────────┤ max_addr - STACK_SIZE
//!             │    Boot Stack                   │
//!             └─────────────────────────────────┘ max_addr
//! ```
//!
//! With paging enabled the heap is moved to [`memory::PG_HEAP_MAP_START`] and
//! the boot stack follows directly after it.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod bootparams;
pub mod memory;
pub mod multiboot;
