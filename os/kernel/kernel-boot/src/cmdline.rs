//! # Command Line Buffer

use crate::error::Degradation;
use core::fmt;
use kernel_info::memory::MAX_CMDLINE_SIZE;

/// Fixed-capacity, always NUL-terminated copy of the guest command line.
///
/// The command line is copied out of the boot information before anything
/// can overwrite it; it is handed to the generic kernel entry point as a
/// C string.
#[derive(Clone)]
pub struct CmdLine {
    buf: [u8; MAX_CMDLINE_SIZE],
    len: usize,
}

impl Default for CmdLine {
    fn default() -> Self {
        Self::new()
    }
}

impl CmdLine {
    /// Capacity of the buffer, including the terminator.
    pub const CAPACITY: usize = MAX_CMDLINE_SIZE;

    /// An empty command line.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_CMDLINE_SIZE],
            len: 0,
        }
    }

    /// Replace the contents with `bytes`, keeping at most `CAPACITY - 1` of them.
    ///
    /// Returns the truncation, if one happened.
    pub fn set(&mut self, bytes: &[u8]) -> Option<Degradation> {
        let kept = bytes.len().min(Self::CAPACITY - 1);
        self.buf[..kept].copy_from_slice(&bytes[..kept]);
        self.buf[kept] = 0;
        self.len = kept;

        (kept < bytes.len()).then_some(Degradation::CmdlineTruncated {
            len: bytes.len(),
            kept,
        })
    }

    /// The command line without the terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The command line including the terminator.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.buf[..=self.len]
    }

    /// Pointer to the NUL-terminated string.
    #[must_use]
    pub const fn as_ptr(&self) -> *const u8 {
        self.buf.as_ptr()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for CmdLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.as_bytes().utf8_chunks() {
            f.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                f.write_str("\u{FFFD}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CmdLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CmdLine(\"{}\")", self.as_bytes().escape_ascii())
    }
}
