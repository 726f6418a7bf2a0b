//! # Platform Entry
//!
//! The boot assembly enters [`_kvmplat_entry`] in 64-bit mode on a small
//! static stack, with the static boot page table loaded. From here on the
//! sequence is:
//!
//! 1. install the logger,
//! 2. build the [`BootLayout`] from the boot information,
//! 3. with `paging`, bootstrap the kernel page table,
//! 4. publish the layout,
//! 5. switch to the boot stack and call `kvmplat_main`.

use crate::once::PublishOnce;
use crate::setup::early_setup;
use core::panic::PanicInfo;
use kernel_boot::{BootLayout, FatalError, IdentityView};
use kernel_qemu::QemuLogger;
use log::{LevelFilter, error};

#[cfg(feature = "paging")]
use {
    crate::once::Handoff, crate::setup::early_paging,
    kernel_alloc::phys_mapper::DirectMapPhysMapper, kernel_boot::paging::PagingState,
    kernel_vmem::Cr3Register,
};

unsafe extern "C" {
    /// End of the kernel image, provided by the linker script.
    static __END: u8;

    /// Entry point of the generic kernel. Receives the NUL-terminated command
    /// line and its length without the terminator.
    fn kvmplat_main(cmdline: *const u8, len: usize) -> !;
}

static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Info);

/// The published boot layout.
pub static BOOT_LAYOUT: PublishOnce<BootLayout> = PublishOnce::new();

#[cfg(feature = "paging")]
static MAPPER: DirectMapPhysMapper = DirectMapPhysMapper;

/// Frame allocator and address space, waiting for the memory manager.
#[cfg(feature = "paging")]
pub static PAGING: Handoff<PagingState<'static, DirectMapPhysMapper>> = Handoff::new();

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("{info}");
    halt()
}

fn halt() -> ! {
    loop {
        // SAFETY: Stops the CPU; nothing runs after a fatal error.
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}

fn fatal(e: &FatalError) -> ! {
    panic!("early boot failed: {e}");
}

/// Rust entry point of the platform.
///
/// # Safety
/// Must be called exactly once by the boot assembly, with the static boot
/// page table active and `arg` as described in
/// [`boot_source`](crate::setup::boot_source).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _kvmplat_entry(arg: u64) -> ! {
    kernel_qemu::qemu_trace!("kvmplat: entered with {arg:#x}\n");
    if LOGGER.install().is_err() {
        kernel_qemu::qemu_trace!("kvmplat: logger already installed\n");
    }

    // SAFETY: The boot page table identity-maps the first GiB.
    let view = unsafe { IdentityView::new() };
    let kernel_end = (&raw const __END) as u64;

    #[allow(unused_mut)]
    let mut layout = early_setup(&view, arg, kernel_end).unwrap_or_else(|e| fatal(&e));

    #[cfg(feature = "paging")]
    {
        // SAFETY: The boot page table is active and maps the kernel image and
        // the direct map; the layout was just derived from free RAM.
        let state = unsafe { early_paging(&view, arg, &mut layout, &MAPPER, &Cr3Register) }
            .unwrap_or_else(|e| fatal(&e));
        PAGING.put(state);
    }

    let layout = BOOT_LAYOUT.publish(layout);
    layout.log_summary();

    // SAFETY: The boot stack is mapped, unused and ends at `stack_top`.
    unsafe {
        _kvmplat_newstack(layout.stack_top(), enter_main, core::ptr::from_ref(layout));
    }
}

/// Runs on the boot stack.
extern "C" fn enter_main(layout: *const BootLayout) -> ! {
    // SAFETY: Points into `BOOT_LAYOUT`, which is never written again.
    let layout = unsafe { &*layout };
    // SAFETY: The command line is NUL-terminated and lives in a static.
    unsafe { kvmplat_main(layout.cmdline.as_ptr(), layout.cmdline.len()) }
}

/// Switch the stack pointer to `stack_top` and jump to `tramp(arg)`.
///
/// The frame is set up as if `tramp` had been called: `rsp` is 16-byte
/// aligned before a null return address is pushed, and `rbp` is cleared so
/// backtraces end here.
///
/// # Safety
/// `stack_top` must be the end of a mapped, unused stack. Nothing on the
/// current stack may be referenced afterwards.
#[unsafe(naked)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _kvmplat_newstack(
    stack_top: u64,
    tramp: extern "C" fn(*const BootLayout) -> !,
    arg: *const BootLayout,
) -> ! {
    core::arch::naked_asm!(
        "mov rsp, rdi",
        "and rsp, -16",
        "xor ebp, ebp",
        "mov rdi, rdx",
        "push 0",
        "jmp rsi",
    );
}
