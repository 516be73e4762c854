//! Kernel image allocation
//!
//! Allocates whole pages tagged with the configured memory type, preferably at
//! the configured physical load address. The allocation is scoped: unless it
//! is converted into a [`LoadedImage`], dropping it returns the pages to the
//! firmware, so a failure later in the same load leaves the memory map as it
//! was.

use core::mem::ManuallyDrop;
use core::ptr::{self, NonNull};
use core::slice;

use crate::config::{BootConfiguration, PlacementPolicy};
use crate::error::{LoadError, Result};
use crate::firmware::{Firmware, PAGE_SIZE, PageRequest, Placement, pages_for};
use crate::kernel_if::loaded_image::{GrantedPlacement, LoadedImage};

/// Pages held for a kernel image that is still being read
pub struct ImageAllocation<'fw, F: Firmware> {
    firmware: &'fw F,
    base: NonNull<u8>,
    pages: usize,
    placement: GrantedPlacement,
}

impl<'fw, F: Firmware> ImageAllocation<'fw, F> {
    /// Allocate enough zeroed pages for `bytes` bytes
    pub fn allocate(firmware: &'fw F, bytes: usize, config: &BootConfiguration) -> Result<Self> {
        if bytes == 0 {
            return Err(LoadError::EmptyKernelImage);
        }
        let pages = pages_for(bytes);
        let Some(allocation_size) = pages.checked_mul(PAGE_SIZE) else {
            log::error!("Kernel of {} bytes cannot be backed by pages", bytes);
            return Err(LoadError::AllocationFailed);
        };

        log::info!(
            "Requesting {} pages ({} bytes) of {:?} at {:#x}",
            pages,
            allocation_size,
            config.memory_type,
            config.physical_load_address
        );

        let mut request = PageRequest {
            placement: Placement::At(config.physical_load_address),
            memory_type: config.memory_type,
            pages,
        };

        let (base, placement) = match firmware.allocate_pages(request) {
            Ok(base) => (base, GrantedPlacement::Requested),
            Err(e) if config.placement == PlacementPolicy::BestEffort => {
                log::warn!(
                    "Load address {:#x} refused ({}), accepting any address",
                    config.physical_load_address,
                    e
                );
                // Firmware cannot ask for "at or above"; this may land below the base.
                request.placement = Placement::Anywhere;
                match firmware.allocate_pages(request) {
                    Ok(base) => (base, GrantedPlacement::Fallback),
                    Err(e) => {
                        log::error!("Kernel allocation of {} pages failed: {}", pages, e);
                        return Err(LoadError::AllocationFailed);
                    }
                }
            }
            Err(e) => {
                log::error!(
                    "Kernel allocation at {:#x} failed: {}",
                    config.physical_load_address,
                    e
                );
                return Err(LoadError::AllocationFailed);
            }
        };

        log::info!(
            "Kernel pages granted at {:#x} ({:?})",
            base.as_ptr() as u64,
            placement
        );

        // Safety: the firmware just handed out `allocation_size` writable
        // bytes at `base`.
        unsafe { ptr::write_bytes(base.as_ptr(), 0, allocation_size) };

        Ok(Self {
            firmware,
            base,
            pages,
            placement,
        })
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn placement(&self) -> GrantedPlacement {
        self.placement
    }

    /// The whole page-rounded region
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safety: the region is owned by `self` and was zeroed on allocation.
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.pages * PAGE_SIZE) }
    }

    /// Keep the pages and hand ownership to the caller
    pub(crate) fn into_loaded_image(self, size: usize, config: &BootConfiguration) -> LoadedImage {
        let this = ManuallyDrop::new(self);
        // Safety: `this` owns `pages` pages at `base` and is never dropped,
        // so ownership moves to the image. The loader only calls this after
        // reading `size` bytes into the region.
        unsafe {
            LoadedImage::from_raw_parts(
                this.base,
                size,
                this.pages,
                this.placement,
                config.memory_type,
                config.virtual_load_address,
            )
        }
    }
}

impl<F: Firmware> Drop for ImageAllocation<'_, F> {
    fn drop(&mut self) {
        log::warn!(
            "Releasing {} kernel pages at {:#x}",
            self.pages,
            self.base.as_ptr() as u64
        );
        // Safety: the allocation is live and owned by `self`.
        if let Err(e) = unsafe { self.firmware.free_pages(self.base, self.pages) } {
            log::error!("Failed to release kernel pages: {}", e);
        }
    }
}
