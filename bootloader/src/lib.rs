//! NOS Kernel Loader Library
//!
//! Kernel-loading stage of the UEFI bootloader: finds the kernel image on the
//! boot volume, places it in pages tagged with a reserved memory type, and
//! hands `(pointer, length)` to the next boot stage.
//!
//! The core is generic over the [`firmware::Firmware`] capability. With the
//! `uefi_support` feature, [`load_kernel`] runs it against the real boot
//! services using the build's [`config::BootConfiguration`].

#![cfg_attr(not(test), no_std)]

/// Build-time boot configuration
pub mod config;

/// Closed error taxonomy of a load attempt
pub mod error;

/// Firmware capability seam and its UEFI backend
pub mod firmware;

/// Volume resolution, file reading, image allocation, loader
pub mod kernel_if;

pub use config::{BootConfiguration, MemoryTypeTag, PlacementPolicy};
pub use error::{LoadError, Result};
pub use firmware::{Firmware, FirmwareError, KernelFile, PAGE_SIZE, Volume};
pub use kernel_if::kernel_loader::KernelLoader;
pub use kernel_if::loaded_image::{GrantedPlacement, LoadedImage};

/// Bind to the device this image was booted from.
///
/// Must run while boot services are active.
#[cfg(feature = "uefi_support")]
pub fn boot_firmware() -> Result<firmware::uefi_boot_services::UefiFirmware> {
    firmware::uefi_boot_services::UefiFirmware::boot_device().map_err(|e| {
        let error = kernel_if::volume_resolver::volume_error(e);
        log::error!("Cannot identify boot device ({}): {}", e, error.description());
        error
    })
}

/// Load the configured kernel through `firmware`.
///
/// The image's pages belong to `firmware`; pass the same value to
/// [`LoadedImage::release`] if the boot attempt is abandoned.
#[cfg(feature = "uefi_support")]
pub fn load_kernel(firmware: &firmware::uefi_boot_services::UefiFirmware) -> Result<LoadedImage> {
    KernelLoader::with_build_config(firmware).load()
}
