//! # Early Setup
//!
//! The part of the entry sequence that does not touch CPU state: picking the
//! boot information driver this image was built for and running the layout
//! pipeline over it.

use kernel_boot::{BootLayout, FatalError, PhysView, build_layout};

#[cfg(feature = "bootparams")]
pub use kernel_boot::bootparams::BootParams as Source;
#[cfg(feature = "multiboot")]
pub use kernel_boot::multiboot::Multiboot as Source;

/// The boot information driver for this image.
///
/// `arg` is the value the boot code passed to the entry routine. Firecracker
/// places the zero page at a fixed address and the argument is ignored; a
/// Multiboot loader passes the address of its information block.
#[cfg(feature = "bootparams")]
pub const fn boot_source<V: PhysView>(view: &V, _arg: u64) -> Source<'_, V> {
    Source::at_default_base(view)
}

/// The boot information driver for this image.
///
/// `arg` is the physical address of the Multiboot information block.
#[cfg(feature = "multiboot")]
pub const fn boot_source<V: PhysView>(view: &V, arg: u64) -> Source<'_, V> {
    Source::new(view, arg)
}

/// Build the boot layout for a kernel image ending at `kernel_end`.
///
/// # Errors
/// Any [`FatalError`] of the layout pipeline.
pub fn early_setup<V: PhysView>(
    view: &V,
    arg: u64,
    kernel_end: u64,
) -> Result<BootLayout, FatalError> {
    let mut layout = BootLayout::new();
    build_layout(&boot_source(view, arg), kernel_end, &mut layout)?;
    Ok(layout)
}

#[cfg(feature = "paging")]
pub use self::paging::early_paging;

#[cfg(feature = "paging")]
mod paging {
    use super::boot_source;
    use kernel_boot::paging::{PagingState, bootstrap_paging};
    use kernel_boot::{BootLayout, FatalError, PhysView};
    use kernel_vmem::{PagingRoot, PhysMapper};

    /// Switch `layout` over to the kernel's own page table.
    ///
    /// # Errors
    /// [`FatalError::Paging`] if the bootstrap fails.
    ///
    /// # Safety
    /// See [`bootstrap_paging`].
    pub unsafe fn early_paging<'m, V, M, R>(
        view: &V,
        arg: u64,
        layout: &mut BootLayout,
        mapper: &'m M,
        cr3: &R,
    ) -> Result<PagingState<'m, M>, FatalError>
    where
        V: PhysView,
        M: PhysMapper,
        R: PagingRoot,
    {
        let source = boot_source(view, arg);
        // SAFETY: Forwarded to the caller.
        let state = unsafe { bootstrap_paging(layout, &source, mapper, cr3) }?;
        Ok(state.warn())
    }
}

#[cfg(all(test, feature = "bootparams"))]
mod tests {
    use super::*;
    use kernel_boot::{BufferView, Region};
    use kernel_info::bootparams as bp;

    #[test]
    fn firecracker_zero_page() {
        let mut page = vec![0u8; bp::BOOT_PARAMS_SIZE];
        let entry = bp::E820_TABLE;
        page[entry..entry + 8].copy_from_slice(&0x10_0000u64.to_le_bytes());
        page[entry + 8..entry + 16].copy_from_slice(&0x400_0000u64.to_le_bytes());
        page[entry + 16..entry + 20].copy_from_slice(&1u32.to_le_bytes());
        page[bp::E820_ENTRIES] = 1;

        let view = BufferView::new(bp::BOOT_PARAM_BASE, &page);
        let layout = early_setup(&view, 0xdead_beef, 0x20_0000).unwrap();
        assert_eq!(layout.heap, Region::new(0x20_0000, 0x40F_0000).unwrap());
        assert_eq!(layout.stack_top(), 0x410_0000);
    }
}
