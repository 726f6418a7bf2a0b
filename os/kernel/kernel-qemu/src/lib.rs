//! # Debug Console Logging
//!
//! Early-boot output for guests running under QEMU or another KVM monitor
//! that emulates the `debugcon` device. Nothing else is available this early:
//! there is no heap, no console driver and no interrupt handling yet, so every
//! byte goes straight to an I/O port.
//!
//! ## Output Mechanism
//! ```text
//! log::info!() / qemu_trace!()
//!     ↓
//! QemuSink (fmt::Write)
//!     ↓
//! dbg_putc() → I/O port 0x402
//!     ↓
//! -debugcon stdio | file:debug.log
//! ```
//!
//! ## Core Components
//!
//! ### Logger ([`QemuLogger`])
//! A `log::Log` implementation with a fixed maximum level, installed from a
//! `static` so no allocation is needed. Records are written as
//! `[LEVEL] target: message`.
//!
//! ### Trace Macro ([`qemu_trace!`])
//! Direct `format_args!` output bypassing the logging framework, for the few
//! places that run before the logger is installed.
//!
//! ## Feature System
//!
//! ### `enabled` Feature (default)
//! When disabled all output becomes a no-op and no port I/O is compiled in.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::{LevelFilter, info};
//!
//! static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Debug);
//!
//! LOGGER.install().expect("logger installed twice");
//! info!("memory map scanned");
//! ```
//!
//! ## Host-Side Configuration
//! ```bash
//! qemu-system-x86_64 -kernel image -debugcon stdio
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::QemuLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// The port number of the debug console.
    const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Write a single byte to the debug console.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        unsafe { outb(QEMU_DEBUG_PORT, c) }
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    unsafe fn outb(port: u16, val: u8) {
        unsafe {
            core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, nostack, preserves_flags)
            );
        }
    }

    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                dbg_putc(b);
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best-effort debug output.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, _: &str) -> fmt::Result {
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(_: fmt::Arguments) {}
}

/// Print `format!`-style arguments to the debug console.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
