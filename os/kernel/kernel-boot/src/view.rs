//! # Physical Memory Views
//!
//! The boot information structures are reached through physical addresses
//! handed over by the hypervisor. Every read goes through a [`PhysView`], which
//! returns byte windows instead of typed references: the structures are
//! packed, little-endian and of untrusted size, so they are decoded field by
//! field. Reads outside the view yield short or empty windows, which the
//! drivers treat as absent data.

use kernel_info::memory::PLATFORM_MAX_MEM_ADDR;

/// Read-only access to guest physical memory.
pub trait PhysView {
    /// Up to `len` bytes starting at `pa`. Shorter (possibly empty) if the
    /// view ends before `pa + len`.
    fn window(&self, pa: u64, len: usize) -> &[u8];

    /// Exactly `N` bytes at `pa`, or `None` if they are not all visible.
    fn read_array<const N: usize>(&self, pa: u64) -> Option<[u8; N]> {
        self.window(pa, N).try_into().ok()
    }

    fn read_u8(&self, pa: u64) -> Option<u8> {
        self.window(pa, 1).first().copied()
    }

    fn read_u32(&self, pa: u64) -> Option<u32> {
        self.read_array(pa).map(u32::from_le_bytes)
    }

    fn read_u64(&self, pa: u64) -> Option<u64> {
        self.read_array(pa).map(u64::from_le_bytes)
    }

    /// The bytes of the NUL-terminated string at `pa`, without the
    /// terminator. At most `max` bytes are inspected; if no terminator is
    /// found the whole window is returned.
    fn c_str(&self, pa: u64, max: usize) -> &[u8] {
        let w = self.window(pa, max);
        let len = w.iter().position(|&b| b == 0).unwrap_or(w.len());
        &w[..len]
    }
}

/// View of the identity-mapped low memory set up by the boot page table.
///
/// Covers `[0, PLATFORM_MAX_MEM_ADDR)` except the null page.
#[derive(Debug)]
pub struct IdentityView {
    _private: (),
}

impl IdentityView {
    /// # Safety
    /// The first [`PLATFORM_MAX_MEM_ADDR`] bytes of physical memory must be
    /// identity-mapped and readable for as long as the view and any window
    /// borrowed from it exist.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PhysView for IdentityView {
    #[allow(clippy::cast_possible_truncation)]
    fn window(&self, pa: u64, len: usize) -> &[u8] {
        const NULL_PAGE: u64 = 0x1000;
        if !(NULL_PAGE..PLATFORM_MAX_MEM_ADDR).contains(&pa) {
            return &[];
        }
        let visible = (PLATFORM_MAX_MEM_ADDR - pa).min(len as u64) as usize;
        // SAFETY: Guaranteed by the contract of `IdentityView::new`; the range
        // was clipped to the identity-mapped window above.
        unsafe { core::slice::from_raw_parts(pa as *const u8, visible) }
    }
}

/// A view over a byte buffer that stands in for physical memory starting at
/// `base`. Used on the host, e.g. to replay captured boot information.
#[derive(Debug, Clone, Copy)]
pub struct BufferView<'a> {
    base: u64,
    bytes: &'a [u8],
}

impl<'a> BufferView<'a> {
    #[must_use]
    pub const fn new(base: u64, bytes: &'a [u8]) -> Self {
        Self { base, bytes }
    }
}

impl PhysView for BufferView<'_> {
    fn window(&self, pa: u64, len: usize) -> &[u8] {
        let Some(offset) = pa.checked_sub(self.base) else {
            return &[];
        };
        let Ok(offset) = usize::try_from(offset) else {
            return &[];
        };
        let Some(rest) = self.bytes.get(offset..) else {
            return &[];
        };
        &rest[..rest.len().min(len)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_view_clips_at_both_ends() {
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        let view = BufferView::new(0x1000, &bytes);
        assert_eq!(view.window(0x0fff, 4), &[] as &[u8]);
        assert_eq!(view.window(0x1007, 4), &[8, 9]);
        assert_eq!(view.window(0x1009, 4), &[] as &[u8]);
        assert_eq!(view.read_u32(0x1000), Some(0x0403_0201));
        assert_eq!(view.read_u64(0x1001), Some(0x0908_0706_0504_0302));
        assert_eq!(view.read_u64(0x1002), None);
        assert_eq!(view.read_u8(0x1008), Some(9));
    }

    #[test]
    fn c_str_stops_at_nul_or_limit() {
        let bytes = *b"console=ttyS0\0garbage";
        let view = BufferView::new(0, &bytes);
        assert_eq!(view.c_str(0, 64), b"console=ttyS0");
        assert_eq!(view.c_str(0, 7), b"console");
        assert_eq!(view.c_str(14, 64), b"garbage");
    }

    #[test]
    fn identity_view_refuses_null_page_and_high_memory() {
        let view = unsafe { IdentityView::new() };
        assert!(view.window(0, 16).is_empty());
        assert!(view.window(PLATFORM_MAX_MEM_ADDR, 16).is_empty());
    }
}
