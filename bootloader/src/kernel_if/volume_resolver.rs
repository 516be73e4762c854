//! Boot volume resolution
//!
//! Opens the simple file system of the boot device. The returned volume is a
//! scoped handle: dropping it closes the root directory and the protocol.

use crate::error::{LoadError, Result};
use crate::firmware::{Firmware, FirmwareError};

/// Open the boot device's root directory
pub fn open_boot_volume<F: Firmware>(firmware: &F) -> Result<F::Volume> {
    match firmware.open_boot_volume() {
        Ok(volume) => {
            log::debug!("Boot volume opened");
            Ok(volume)
        }
        Err(e) => {
            let error = volume_error(e);
            log::error!("Cannot open boot volume ({}): {}", e, error.description());
            Err(error)
        }
    }
}

/// Classify a failure to reach the boot device's file system
pub fn volume_error(error: FirmwareError) -> LoadError {
    match error {
        FirmwareError::Unsupported | FirmwareError::NotFound => LoadError::MediaUnsupported,
        FirmwareError::OutOfResources
        | FirmwareError::AccessDenied
        | FirmwareError::DeviceError
        | FirmwareError::Other(_) => LoadError::VolumeOpenFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_protocol_is_media_unsupported() {
        assert_eq!(
            volume_error(FirmwareError::Unsupported),
            LoadError::MediaUnsupported
        );
        assert_eq!(
            volume_error(FirmwareError::NotFound),
            LoadError::MediaUnsupported
        );
    }

    #[test]
    fn test_other_failures_are_open_failures() {
        for e in [
            FirmwareError::AccessDenied,
            FirmwareError::DeviceError,
            FirmwareError::OutOfResources,
            FirmwareError::Other(21),
        ] {
            assert_eq!(volume_error(e), LoadError::VolumeOpenFailed);
        }
    }
}
