//! NOS Bootloader - UEFI application entry point
//!
//! Installs the firmware console logger, loads the kernel image configured
//! for this build, and reports the outcome. Paging setup and the jump into
//! the kernel belong to a later stage that is not built yet.

#![no_std]
#![no_main]

use kernel_loader::firmware::uefi_boot_services::UefiFirmware;
use kernel_loader::{BootConfiguration, LoadError, LoadedImage};
use uefi::prelude::*;

#[entry]
fn efi_main() -> Status {
    if uefi::helpers::init().is_err() {
        return Status::ABORTED;
    }

    log::info!("NOS Bootloader v{}", env!("CARGO_PKG_VERSION"));
    let config = BootConfiguration::BUILD;
    log::info!(
        "Kernel '{}' -> phys {:#x}, virt {:#x}, {:?}, {:?} placement",
        config.kernel_file_name,
        config.physical_load_address,
        config.virtual_load_address,
        config.memory_type,
        config.placement
    );

    let firmware = match kernel_loader::boot_firmware() {
        Ok(firmware) => firmware,
        Err(error) => return report_failure(error),
    };
    match kernel_loader::load_kernel(&firmware) {
        Ok(image) => hand_off(&firmware, image),
        Err(error) => report_failure(error),
    }
}

/// Pass the image to the next boot stage.
///
/// The next stage is not part of this application yet, so the pages are
/// handed back before returning to the firmware.
fn hand_off(firmware: &UefiFirmware, image: LoadedImage) -> Status {
    log::info!(
        "Kernel image ready: {} bytes at {:#x} ({:?})",
        image.size_in_bytes(),
        image.physical_address(),
        image.placement()
    );
    // Safety: the image came from `firmware` and nothing else points into it.
    if let Err(e) = unsafe { image.release(firmware) } {
        log::warn!("Kernel pages not returned to firmware: {}", e);
    }
    Status::SUCCESS
}

/// Halt this boot attempt and tell the operator why.
fn report_failure(error: LoadError) -> Status {
    log::error!("Kernel load failed: {}", error);
    error.status()
}
