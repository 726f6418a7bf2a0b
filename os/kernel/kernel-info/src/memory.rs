//! # Memory Layout

/// Size of a normal page, in bytes.
pub const PAGE_SIZE: u64 = 0x1000;

/// Size of a large page as used by the boot page table, in bytes.
pub const LARGE_PAGE_SIZE: u64 = 0x20_0000; // 2 MiB

/// Physical address at which usable guest RAM (and the kernel image) begins.
///
/// The memory map entry describing the RAM the kernel runs in must start
/// exactly here.
pub const PLATFORM_MEM_START: u64 = 0x0010_0000; // 1 MiB

/// Highest physical address covered by the static boot page table.
///
/// Without paging support the discovered RAM is capped here, because nothing
/// above it would be mapped.
pub const PLATFORM_MAX_MEM_ADDR: u64 = 0x4000_0000; // 1 GiB

/// Size of the boot stack reserved at the end of discovered RAM.
pub const STACK_SIZE: u64 = 16 * PAGE_SIZE;

/// Capacity of the command line buffer, including the NUL terminator.
pub const MAX_CMDLINE_SIZE: usize = 8192;

/// Virtual base address of the heap once paging is bootstrapped.
pub const PG_HEAP_MAP_START: u64 = 1 << 34; // 16 GiB

/// Virtual base of the direct map of physical memory provided by the boot page
/// tables (the last PML4 slot). Page-table frames are reached through it.
pub const DIRECT_MAP_BASE: u64 = 0xffff_ff80_0000_0000;

/// Name of the image, used as the command line when none was supplied so that
/// `argv[0]` is always populated.
///
/// # Build
/// Overridable with the `KVMPLAT_NAME` environment variable at build time.
pub const IMAGE_NAME: &str = match option_env!("KVMPLAT_NAME") {
    Some(name) => name,
    None => "kvmplat",
};

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(LARGE_PAGE_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(STACK_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(PLATFORM_MEM_START.is_multiple_of(PAGE_SIZE));
    assert!(PLATFORM_MAX_MEM_ADDR > PLATFORM_MEM_START);
    assert!(PG_HEAP_MAP_START.is_multiple_of(LARGE_PAGE_SIZE));
    assert!(PG_HEAP_MAP_START > PLATFORM_MAX_MEM_ADDR);
    assert!(IMAGE_NAME.len() < MAX_CMDLINE_SIZE);
};
