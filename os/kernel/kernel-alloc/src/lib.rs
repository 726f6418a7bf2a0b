//! # Physical Frame Allocation for the Paging Bootstrap
//!
//! This crate provides the two pieces the paging bootstrap needs besides the
//! page-table code itself:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Physical Mapper                        │
//! │    • Physical-to-virtual address translation        │
//! │    • Direct map of all guest RAM                    │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Physical Frame Allocator                  │
//! │    • 4 KiB page frames from discovered RAM          │
//! │    • Bounded list of regions, no heap               │
//! │    • Frames are never returned                      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ### Physical Frame Allocator ([`frame_alloc`])
//!
//! Seeded with the larger of the two heap regions, extended with the smaller
//! one and with every additional RAM range of the memory map. It implements
//! [`kernel_vmem::FrameAlloc`], so the address space pulls its page-table
//! frames and the backing memory for anonymous mappings from it.
//!
//! ### Physical Mapper ([`phys_mapper`])
//!
//! Converts physical addresses of page-table frames into references through
//! the direct map set up by the boot page tables.
//!
//! ## Usage
//! ```rust
//! use kernel_alloc::frame_alloc::RegionFrameAlloc;
//! use kernel_vmem::FrameAlloc;
//!
//! let mut frames = RegionFrameAlloc::new(0x20_0000, 0x10_0000).unwrap();
//! let frame = frames.alloc_4k().unwrap();
//! assert_eq!(frame.as_u64(), 0x20_0000);
//! assert_eq!(frames.free_memory(), 0xFF000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame_alloc;
pub mod phys_mapper;
