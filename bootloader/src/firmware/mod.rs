//! Firmware Interface - the narrow boot-services capability the loader consumes
//!
//! The loader core never calls firmware directly. It is generic over
//! [`Firmware`], which hands out a scoped [`Volume`] for the boot device, opens
//! [`KernelFile`]s within it, and allocates/frees typed pages. Volume and file
//! handles close themselves when dropped, so every early return releases them.

#[cfg(feature = "uefi_support")]
pub mod uefi_boot_services;

use core::fmt;
use core::ptr::NonNull;

use crate::config::MemoryTypeTag;

/// Allocation granularity of the page allocator
pub const PAGE_SIZE: usize = 4096;

/// Number of pages needed to hold `bytes`
pub const fn pages_for(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE)
}

/// Firmware call failure, reduced to the cases the loader distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareError {
    /// Named object (file, protocol instance) does not exist
    NotFound,
    /// Requested protocol or operation is not supported by the handle
    Unsupported,
    /// Memory of the requested type/placement is exhausted or taken
    OutOfResources,
    AccessDenied,
    DeviceError,
    /// Any other failure, with the raw firmware code for diagnostics
    Other(usize),
}

impl fmt::Display for FirmwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareError::NotFound => f.write_str("not found"),
            FirmwareError::Unsupported => f.write_str("unsupported"),
            FirmwareError::OutOfResources => f.write_str("out of resources"),
            FirmwareError::AccessDenied => f.write_str("access denied"),
            FirmwareError::DeviceError => f.write_str("device error"),
            FirmwareError::Other(code) => write!(f, "firmware status {:#x}", code),
        }
    }
}

/// Where the page allocator should put a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Starting exactly at this physical address
    At(u64),
    /// Wherever the firmware finds room
    Anywhere,
}

/// A typed page allocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub placement: Placement,
    pub memory_type: MemoryTypeTag,
    pub pages: usize,
}

/// An open file on the boot volume. Closed on drop.
pub trait KernelFile {
    /// File size in bytes, as recorded by the file system
    fn size(&mut self) -> Result<u64, FirmwareError>;

    /// Read from the current position into `buffer`.
    ///
    /// Returns the number of bytes transferred, which may be less than
    /// `buffer.len()`; zero means end of file.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, FirmwareError>;
}

/// Root directory of the boot volume's file namespace. Closed on drop.
pub trait Volume {
    type File: KernelFile;

    /// Open `name` read-only. Only regular files are returned.
    fn open_read_only(&mut self, name: &str) -> Result<Self::File, FirmwareError>;
}

/// Boot-services capability
pub trait Firmware {
    type Volume: Volume;

    /// Open the simple file system of the device this image was booted from
    fn open_boot_volume(&self) -> Result<Self::Volume, FirmwareError>;

    /// Allocate `request.pages` contiguous pages tagged `request.memory_type`
    fn allocate_pages(&self, request: PageRequest) -> Result<NonNull<u8>, FirmwareError>;

    /// Return pages to the firmware.
    ///
    /// # Safety
    ///
    /// `base` and `pages` must describe exactly one live allocation obtained
    /// from [`Firmware::allocate_pages`], and nothing may access the region
    /// afterwards.
    unsafe fn free_pages(&self, base: NonNull<u8>, pages: usize) -> Result<(), FirmwareError>;
}
