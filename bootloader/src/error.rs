//! Kernel loader error handling
//!
//! This module defines the closed set of failures a load attempt can report.
//! Every firmware-call failure is translated into exactly one of these kinds
//! at the call site that observed it.

use core::fmt;

/// Kernel load error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadError {
    /// The boot device exposes no simple file-system protocol
    MediaUnsupported,
    /// The file-system protocol or its root directory could not be opened
    VolumeOpenFailed,

    /// No file with the configured name exists on the boot volume
    KernelNotFound,
    /// The kernel file exists but is zero bytes long
    EmptyKernelImage,
    /// Fewer bytes were read than the file's size
    TruncatedRead,

    /// No region of the requested type and placement could be allocated
    AllocationFailed,
}

impl LoadError {
    /// Every kind, in taxonomy order
    pub const ALL: [LoadError; 6] = [
        LoadError::MediaUnsupported,
        LoadError::VolumeOpenFailed,
        LoadError::KernelNotFound,
        LoadError::EmptyKernelImage,
        LoadError::TruncatedRead,
        LoadError::AllocationFailed,
    ];

    /// Convert to an error code suitable for passing to firmware/OS
    pub fn as_error_code(&self) -> u32 {
        match self {
            LoadError::MediaUnsupported => 0x7001,
            LoadError::VolumeOpenFailed => 0x7002,
            LoadError::KernelNotFound => 0x9000,
            LoadError::EmptyKernelImage => 0x9001,
            LoadError::TruncatedRead => 0x9002,
            LoadError::AllocationFailed => 0x2000,
        }
    }

    /// Get a human-readable description of the error
    pub fn description(&self) -> &'static str {
        match self {
            LoadError::MediaUnsupported => "Boot device has no file system",
            LoadError::VolumeOpenFailed => "Failed to open boot volume",
            LoadError::KernelNotFound => "Kernel not found",
            LoadError::EmptyKernelImage => "Kernel image is empty",
            LoadError::TruncatedRead => "Kernel image read was truncated",
            LoadError::AllocationFailed => "Failed to allocate kernel memory",
        }
    }

    /// Volume access failures, as opposed to file content or memory failures
    pub fn is_volume_error(&self) -> bool {
        matches!(
            self,
            LoadError::MediaUnsupported | LoadError::VolumeOpenFailed
        )
    }

    /// Status handed back to firmware when the EFI application gives up
    #[cfg(feature = "uefi_support")]
    pub fn status(&self) -> uefi::Status {
        match self {
            LoadError::MediaUnsupported => uefi::Status::UNSUPPORTED,
            LoadError::VolumeOpenFailed => uefi::Status::DEVICE_ERROR,
            LoadError::KernelNotFound => uefi::Status::NOT_FOUND,
            LoadError::EmptyKernelImage => uefi::Status::LOAD_ERROR,
            LoadError::TruncatedRead => uefi::Status::END_OF_FILE,
            LoadError::AllocationFailed => uefi::Status::OUT_OF_RESOURCES,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LoadError: {} (code: {:#x})",
            self.description(),
            self.as_error_code()
        )
    }
}

impl core::error::Error for LoadError {}

/// Result type used throughout the kernel loader
pub type Result<T = ()> = core::result::Result<T, LoadError>;
