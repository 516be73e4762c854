//! The loader's output: a kernel image resident in tagged physical pages

use core::ptr::NonNull;
use core::slice;

use crate::config::MemoryTypeTag;
use crate::firmware::{Firmware, FirmwareError, PAGE_SIZE};

/// Which placement request the firmware satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantedPlacement {
    /// The image starts at the configured physical load address
    Requested,
    /// The configured address was refused; the firmware chose the address
    Fallback,
}

/// Kernel image bytes now resident in memory.
///
/// The caller owns the backing pages. Dropping a `LoadedImage` does not free
/// them: they stay reserved under their memory type for the next boot stage.
#[must_use = "dropping a LoadedImage leaks the kernel's pages"]
#[derive(Debug)]
pub struct LoadedImage {
    base: NonNull<u8>,
    size: usize,
    pages: usize,
    placement: GrantedPlacement,
    memory_type: MemoryTypeTag,
    virtual_load_address: u64,
}

impl LoadedImage {
    /// # Safety
    ///
    /// `base` must point to `pages` live, exclusively owned pages whose first
    /// `size` bytes are initialized, with `0 < size <= pages * PAGE_SIZE`.
    pub(crate) unsafe fn from_raw_parts(
        base: NonNull<u8>,
        size: usize,
        pages: usize,
        placement: GrantedPlacement,
        memory_type: MemoryTypeTag,
        virtual_load_address: u64,
    ) -> Self {
        debug_assert!(size > 0 && size <= pages * PAGE_SIZE);
        Self {
            base,
            size,
            pages,
            placement,
            memory_type,
            virtual_load_address,
        }
    }

    /// First byte of the image
    pub fn base_pointer(&self) -> NonNull<u8> {
        self.base
    }

    /// Physical address of the first byte (identity-mapped at this stage)
    pub fn physical_address(&self) -> u64 {
        self.base.as_ptr() as u64
    }

    /// Exact byte count read from the kernel file
    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    /// Pages backing the image
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Size of the backing allocation, a whole number of pages
    pub fn allocation_size(&self) -> usize {
        self.pages * PAGE_SIZE
    }

    pub fn placement(&self) -> GrantedPlacement {
        self.placement
    }

    pub fn memory_type(&self) -> MemoryTypeTag {
        self.memory_type
    }

    /// Where the kernel expects to run once paging is enabled
    pub fn virtual_load_address(&self) -> u64 {
        self.virtual_load_address
    }

    /// The image bytes
    pub fn as_bytes(&self) -> &[u8] {
        // Safety: the region is owned by `self` and its first `size` bytes
        // were written by the loader.
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.size) }
    }

    /// Give up the typed wrapper, keeping the pages allocated
    pub fn into_raw_parts(self) -> (NonNull<u8>, usize) {
        (self.base, self.size)
    }

    /// Hand the pages back to the firmware, abandoning the image.
    ///
    /// # Safety
    ///
    /// `firmware` must be the firmware the image was loaded through, and no
    /// pointer derived from [`LoadedImage::base_pointer`] may be used
    /// afterwards.
    pub unsafe fn release<F: Firmware>(self, firmware: &F) -> Result<(), FirmwareError> {
        log::debug!(
            "Releasing {} pages of kernel image at {:#x}",
            self.pages,
            self.physical_address()
        );
        // Safety: the image exclusively owns this allocation.
        unsafe { firmware.free_pages(self.base, self.pages) }
    }
}
