//! # Multiboot Information
//!
//! Layout of the Multiboot (version 1) information block. All pointers in the
//! block are 32-bit physical addresses.

/// `u32` feature flags, see [`flags`].
pub const FLAGS: usize = 0;
/// `u32` physical address of the NUL-terminated command line.
pub const CMDLINE: usize = 16;
/// `u32` number of boot modules.
pub const MODS_COUNT: usize = 20;
/// `u32` physical address of the first module descriptor.
pub const MODS_ADDR: usize = 24;
/// `u32` length of the memory map blob in bytes.
pub const MMAP_LENGTH: usize = 44;
/// `u32` physical address of the memory map blob.
pub const MMAP_ADDR: usize = 48;

/// Bits of the [`FLAGS`] field.
pub mod flags {
    /// [`CMDLINE`](super::CMDLINE) is valid.
    pub const CMDLINE: u32 = 1 << 2;
    /// [`MODS_COUNT`](super::MODS_COUNT) and [`MODS_ADDR`](super::MODS_ADDR) are valid.
    pub const MODS: u32 = 1 << 3;
    /// [`MMAP_LENGTH`](super::MMAP_LENGTH) and [`MMAP_ADDR`](super::MMAP_ADDR) are valid.
    pub const MEM_MAP: u32 = 1 << 6;
}

/// One boot module descriptor: `{ mod_start, mod_end, cmdline, pad }`.
pub mod module {
    pub const SIZE: usize = 16;
    pub const MOD_START: usize = 0;
    pub const MOD_END: usize = 4;
}

/// One memory map record.
///
/// ```text
///        +-------------------+
/// u32    | size              |  size of the record, *excluding* this field
/// u64    | addr              |
/// u64    | len               |
/// u32    | type              |
///        +-------------------+
/// ```
pub mod mmap {
    /// Width of the leading size field.
    pub const SIZE_FIELD: usize = 4;
    /// Offsets relative to the start of the record (including the size field).
    pub const ADDR: usize = 4;
    pub const LEN: usize = 12;
    pub const TYPE: usize = 20;
    /// Smallest valid value of the size field.
    pub const MIN_ENTRY_SIZE: u32 = 20;
}
