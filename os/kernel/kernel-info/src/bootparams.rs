//! # Linux Boot Parameters ("zero page")
//!
//! Byte offsets into `struct boot_params` as written by Firecracker. Only the
//! fields the platform bootstrap consumes are listed. The structure is packed
//! and little-endian; it is read field by field instead of being overlaid with
//! a Rust struct.
//!
//! ```text
//! 0x000 ┌───────────────────────────────┐
//!       │ screen_info, apm, ist, ...    │
//! 0x0C0 │ ext_ramdisk_image   (u32)     │
//! 0x0C4 │ ext_ramdisk_size    (u32)     │
//! 0x0C8 │ ext_cmd_line_ptr    (u32)     │
//!       │ ...                           │
//! 0x1E8 │ e820_entries        (u8)      │
//! 0x1F1 │ setup_header (hdr)            │
//! 0x218 │   ramdisk_image     (u32)     │
//! 0x21C │   ramdisk_size      (u32)     │
//! 0x228 │   cmd_line_ptr      (u32)     │
//! 0x238 │   cmdline_size      (u32)     │
//! 0x2D0 │ e820_table[128]  (20 B each)  │
//! 0xCD0 │ ...                           │
//! 0x1000└───────────────────────────────┘
//! ```

/// Physical address of the boot parameters. Fixed by the hypervisor.
pub const BOOT_PARAM_BASE: u64 = 0x7000;

/// Size of `struct boot_params`.
pub const BOOT_PARAMS_SIZE: usize = 0x1000;

/// High 32 bits of the ramdisk address.
pub const EXT_RAMDISK_IMAGE: usize = 0x0C0;
/// High 32 bits of the ramdisk size.
pub const EXT_RAMDISK_SIZE: usize = 0x0C4;
/// High 32 bits of the command line address.
pub const EXT_CMD_LINE_PTR: usize = 0x0C8;
/// Number of valid entries in [`E820_TABLE`].
pub const E820_ENTRIES: usize = 0x1E8;
/// Low 32 bits of the ramdisk address.
pub const RAMDISK_IMAGE: usize = 0x218;
/// Low 32 bits of the ramdisk size.
pub const RAMDISK_SIZE: usize = 0x21C;
/// Low 32 bits of the command line address.
pub const CMD_LINE_PTR: usize = 0x228;
/// Length of the command line in bytes.
pub const CMDLINE_SIZE: usize = 0x238;
/// Start of the E820 memory map table.
pub const E820_TABLE: usize = 0x2D0;

/// Capacity of the E820 table in the zero page.
pub const E820_MAX_ENTRIES: usize = 128;

/// Size of one packed E820 entry: `{ addr: u64, size: u64, type: u32 }`.
pub const E820_ENTRY_SIZE: usize = 20;

/// Offsets within one E820 entry.
pub mod e820 {
    pub const ADDR: usize = 0;
    pub const SIZE: usize = 8;
    pub const TYPE: usize = 16;
}

const _: () = {
    assert!(E820_TABLE + E820_MAX_ENTRIES * E820_ENTRY_SIZE <= BOOT_PARAMS_SIZE);
    assert!(CMDLINE_SIZE + 4 <= E820_TABLE);
};
