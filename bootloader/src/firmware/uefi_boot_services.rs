//! UEFI Boot Services backend
//!
//! Implements the loader's firmware capability with the `uefi` crate. The boot
//! device is taken from the running image's `LoadedImage` protocol; the volume
//! is that device's `SimpleFileSystem` root directory. Protocol scopes and file
//! handles are closed by the `uefi` wrappers' `Drop` impls.

use core::ptr::NonNull;

use uefi::boot::{self, AllocateType, MemoryType, ScopedProtocol};
use uefi::proto::loaded_image::LoadedImage;
use uefi::proto::media::file::{Directory, File, FileAttribute, FileInfo, FileMode, RegularFile};
use uefi::proto::media::fs::SimpleFileSystem;
use uefi::{CStr16, Handle, Status};

use super::{Firmware, FirmwareError, KernelFile, PageRequest, Placement, Volume};
use crate::config::MAX_FILE_NAME_LEN;

/// Room for `EFI_FILE_INFO` plus a maximal file name
const FILE_INFO_BUFFER_SIZE: usize = 1024;

#[repr(C, align(8))]
struct FileInfoBuffer([u8; FILE_INFO_BUFFER_SIZE]);

/// Convert UEFI status to firmware error
impl From<Status> for FirmwareError {
    fn from(status: Status) -> Self {
        match status {
            Status::NOT_FOUND => FirmwareError::NotFound,
            Status::UNSUPPORTED => FirmwareError::Unsupported,
            Status::OUT_OF_RESOURCES => FirmwareError::OutOfResources,
            Status::ACCESS_DENIED => FirmwareError::AccessDenied,
            Status::DEVICE_ERROR | Status::VOLUME_CORRUPTED | Status::NO_MEDIA => {
                FirmwareError::DeviceError
            }
            other => FirmwareError::Other(other.0),
        }
    }
}

impl<Data: core::fmt::Debug> From<uefi::Error<Data>> for FirmwareError {
    fn from(error: uefi::Error<Data>) -> Self {
        error.status().into()
    }
}

/// Boot services of the running firmware, bound to one boot device
pub struct UefiFirmware {
    device: Handle,
}

impl UefiFirmware {
    /// Bind to an explicit device handle
    pub fn for_device(device: Handle) -> Self {
        Self { device }
    }

    /// Bind to the device the running image was loaded from
    pub fn boot_device() -> Result<Self, FirmwareError> {
        let loaded_image = boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle())?;
        // Images loaded from memory buffers have no device.
        let device = loaded_image.device().ok_or(FirmwareError::Unsupported)?;
        Ok(Self { device })
    }

    pub fn device(&self) -> Handle {
        self.device
    }
}

impl Firmware for UefiFirmware {
    type Volume = UefiVolume;

    fn open_boot_volume(&self) -> Result<UefiVolume, FirmwareError> {
        // Exclusive open disconnects other drivers on the device and closing
        // does not reconnect them; `boot::get_image_file_system` does the same.
        let mut fs = boot::open_protocol_exclusive::<SimpleFileSystem>(self.device)?;
        let root = fs.open_volume()?;
        Ok(UefiVolume { root, _fs: fs })
    }

    fn allocate_pages(&self, request: PageRequest) -> Result<NonNull<u8>, FirmwareError> {
        let allocation = match request.placement {
            Placement::At(address) => AllocateType::Address(address),
            Placement::Anywhere => AllocateType::AnyPages,
        };
        let memory_type = MemoryType(request.memory_type.raw());
        Ok(boot::allocate_pages(allocation, memory_type, request.pages)?)
    }

    unsafe fn free_pages(&self, base: NonNull<u8>, pages: usize) -> Result<(), FirmwareError> {
        // Safety: forwarded from the caller's contract.
        unsafe { boot::free_pages(base, pages) }?;
        Ok(())
    }
}

/// Root directory of the boot device's file system.
///
/// Fields drop in declaration order: the directory handle is closed before the
/// protocol scope is released.
pub struct UefiVolume {
    root: Directory,
    _fs: ScopedProtocol<SimpleFileSystem>,
}

impl Volume for UefiVolume {
    type File = UefiFile;

    fn open_read_only(&mut self, name: &str) -> Result<UefiFile, FirmwareError> {
        let mut buf = [0u16; MAX_FILE_NAME_LEN + 1];
        // A name the firmware cannot represent cannot exist on the volume.
        let path = CStr16::from_str_with_buf(name, &mut buf).map_err(|_| FirmwareError::NotFound)?;

        let handle = self
            .root
            .open(path, FileMode::Read, FileAttribute::empty())?;
        let file = handle.into_regular_file().ok_or(FirmwareError::NotFound)?;
        Ok(UefiFile { file })
    }
}

/// Regular file opened read-only
pub struct UefiFile {
    file: RegularFile,
}

impl KernelFile for UefiFile {
    fn size(&mut self) -> Result<u64, FirmwareError> {
        let mut buffer = FileInfoBuffer([0; FILE_INFO_BUFFER_SIZE]);
        let info = self
            .file
            .get_info::<FileInfo>(&mut buffer.0)
            .map_err(|e| FirmwareError::from(e.status()))?;
        Ok(info.file_size())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, FirmwareError> {
        self.file
            .read(buffer)
            .map_err(|e| FirmwareError::from(e.status()))
    }
}
