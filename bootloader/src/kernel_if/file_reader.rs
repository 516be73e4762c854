//! Kernel file reading
//!
//! Opens the configured file read-only, reports its exact size, and streams
//! exactly that many bytes into a caller-supplied buffer. The size is always
//! known before any buffer is allocated; nothing here grows a buffer.

use crate::error::{LoadError, Result};
use crate::firmware::{FirmwareError, KernelFile, Volume};

/// Open `name` in the volume's root. No fallback names are tried.
pub fn open_kernel_file<V: Volume>(volume: &mut V, name: &str) -> Result<V::File> {
    match volume.open_read_only(name) {
        Ok(file) => {
            log::debug!("Opened kernel file '{}'", name);
            Ok(file)
        }
        Err(e) => {
            let error = open_error(e);
            log::error!("Cannot open '{}' ({}): {}", name, e, error.description());
            Err(error)
        }
    }
}

/// Exact size of the kernel file in bytes. Never zero.
pub fn kernel_file_size<K: KernelFile>(file: &mut K) -> Result<usize> {
    let size = file.size().map_err(|e| {
        log::error!("Cannot query kernel file size: {}", e);
        LoadError::VolumeOpenFailed
    })?;

    if size == 0 {
        log::error!("Kernel file is empty");
        return Err(LoadError::EmptyKernelImage);
    }

    // A file that does not fit the address space cannot be placed anywhere.
    let size = usize::try_from(size).map_err(|_| {
        log::error!("Kernel file of {} bytes exceeds the address space", size);
        LoadError::AllocationFailed
    })?;

    log::info!("Kernel file size: {} bytes", size);
    Ok(size)
}

/// Read exactly `size` bytes into the front of `dest`.
///
/// Firmware may return fewer bytes per call than asked for; reading continues
/// until `size` bytes arrived or the file reports end of file. Afterwards the
/// file must be exhausted, otherwise its size field disagrees with its
/// content.
pub fn read_exact<K: KernelFile>(file: &mut K, dest: &mut [u8], size: usize) -> Result<usize> {
    if dest.len() < size {
        log::error!(
            "Destination holds {} bytes, kernel needs {}",
            dest.len(),
            size
        );
        return Err(LoadError::AllocationFailed);
    }

    let mut filled = 0;
    while filled < size {
        let wanted = size - filled;
        let read = file.read(&mut dest[filled..size]).map_err(|e| {
            log::error!("Kernel read failed after {} of {} bytes: {}", filled, size, e);
            LoadError::TruncatedRead
        })?;
        if read == 0 {
            break;
        }
        if read > wanted {
            log::error!("Firmware reported {} bytes for a {} byte read", read, wanted);
            return Err(LoadError::TruncatedRead);
        }
        filled += read;
    }

    if filled != size {
        log::error!("Incomplete read: expected {} bytes, got {} bytes", size, filled);
        return Err(LoadError::TruncatedRead);
    }

    let mut probe = [0u8; 1];
    match file.read(&mut probe) {
        Ok(0) => {}
        Ok(_) => {
            log::error!("Kernel file holds more than its recorded {} bytes", size);
            return Err(LoadError::TruncatedRead);
        }
        Err(e) => {
            log::error!("Kernel read failed at end of file: {}", e);
            return Err(LoadError::TruncatedRead);
        }
    }

    log::debug!("Read {} bytes of kernel image", filled);
    Ok(filled)
}

/// Classify a failure to open the kernel file
pub fn open_error(error: FirmwareError) -> LoadError {
    match error {
        FirmwareError::NotFound | FirmwareError::Unsupported | FirmwareError::AccessDenied => {
            LoadError::KernelNotFound
        }
        FirmwareError::DeviceError | FirmwareError::OutOfResources | FirmwareError::Other(_) => {
            LoadError::VolumeOpenFailed
        }
    }
}
