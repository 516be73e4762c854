//! Boot Configuration - Pure Value Object
//!
//! The loader's only tunable knobs, fixed per build. `build.rs` resolves them
//! from the environment (`KERNEL_PHYS_ADDRESS`, `KERNEL_VIRT_ADDRESS`,
//! `KERNEL_MEMTYPE`, `KERNEL_FILENAME`, `KERNEL_PLACEMENT`) and the values are
//! parsed into [`BootConfiguration::BUILD`] at compile time.
//!
//! # Examples
//!
//! ```
//! # use kernel_loader::config::BootConfiguration;
//! let config = BootConfiguration::BUILD;
//! assert!(config.validate().is_ok());
//! assert_eq!(config.physical_load_address % 4096, 0);
//! ```

use core::fmt;
use static_assertions::const_assert;

use crate::firmware::PAGE_SIZE;

/// Longest kernel file name accepted, in UCS-2 code units.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Memory-type tag stamped on the kernel's pages.
///
/// Values follow the firmware's memory-type numbering: `0..=14` are the
/// architected types, `0x7000_0000..=0x7FFF_FFFF` are reserved for OEMs and
/// `0x8000_0000..` for OS loaders.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryTypeTag(pub u32);

impl MemoryTypeTag {
    pub const LOADER_CODE: Self = Self(1);
    pub const LOADER_DATA: Self = Self(2);
    pub const CONVENTIONAL: Self = Self(7);

    const OEM_RANGE_START: u32 = 0x7000_0000;
    const OS_LOADER_RANGE_START: u32 = 0x8000_0000;

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Tag lives in the range reserved for OS loaders
    pub const fn is_os_loader_defined(self) -> bool {
        self.0 >= Self::OS_LOADER_RANGE_START
    }

    /// Tag can be passed to the page allocator and keeps the region out of
    /// the pool of free memory.
    ///
    /// Only the OEM and OS loader ranges qualify. Loader code/data become
    /// conventional memory once boot services exit.
    pub const fn is_reserving(self) -> bool {
        self.0 >= Self::OEM_RANGE_START
    }
}

impl fmt::Debug for MemoryTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::LOADER_CODE => write!(f, "LOADER_CODE"),
            Self::LOADER_DATA => write!(f, "LOADER_DATA"),
            Self::CONVENTIONAL => write!(f, "CONVENTIONAL"),
            other => write!(f, "MemoryTypeTag({:#x})", other.0),
        }
    }
}

/// Whether the image must land on `physical_load_address`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementPolicy {
    /// Ask for the configured address, accept any address if refused
    BestEffort,
    /// Fail the load if the configured address cannot be granted
    Exact,
}

/// Build-time boot configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootConfiguration {
    /// Physical base the image is requested at
    pub physical_load_address: u64,
    /// Address the kernel expects once paging is up; recorded, never used here
    pub virtual_load_address: u64,
    /// Tag for the allocated pages
    pub memory_type: MemoryTypeTag,
    /// Path relative to the boot volume's root directory
    pub kernel_file_name: &'static str,
    pub placement: PlacementPolicy,
}

/// Reasons a hand-built configuration is rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    UnalignedPhysicalAddress,
    EmptyFileName,
    FileNameTooLong,
    NonAsciiFileName,
    NonReservingMemoryType,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigError::UnalignedPhysicalAddress => "physical load address is not page aligned",
            ConfigError::EmptyFileName => "kernel file name is empty",
            ConfigError::FileNameTooLong => "kernel file name is too long",
            ConfigError::NonAsciiFileName => "kernel file name is not printable ASCII",
            ConfigError::NonReservingMemoryType => {
                "memory type would leave the kernel in reclaimable memory"
            }
        };
        f.write_str(msg)
    }
}

impl BootConfiguration {
    /// Configuration baked into this build
    pub const BUILD: Self = Self {
        physical_load_address: parse_u64(env!("KERNEL_LOADER_PHYS_ADDRESS")),
        virtual_load_address: parse_u64(env!("KERNEL_LOADER_VIRT_ADDRESS")),
        memory_type: MemoryTypeTag(parse_u64(env!("KERNEL_LOADER_MEMTYPE")) as u32),
        kernel_file_name: env!("KERNEL_LOADER_FILENAME"),
        placement: parse_placement(env!("KERNEL_LOADER_PLACEMENT")),
    };

    /// Check the invariants the loader relies on
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.physical_load_address % PAGE_SIZE as u64 != 0 {
            return Err(ConfigError::UnalignedPhysicalAddress);
        }
        let name = self.kernel_file_name.as_bytes();
        if name.is_empty() {
            return Err(ConfigError::EmptyFileName);
        }
        if name.len() > MAX_FILE_NAME_LEN {
            return Err(ConfigError::FileNameTooLong);
        }
        let mut i = 0;
        while i < name.len() {
            if !name[i].is_ascii() || name[i].is_ascii_control() {
                return Err(ConfigError::NonAsciiFileName);
            }
            i += 1;
        }
        if !self.memory_type.is_reserving() {
            return Err(ConfigError::NonReservingMemoryType);
        }
        Ok(())
    }
}

const_assert!(BootConfiguration::BUILD.validate().is_ok());

/// Decimal digits as emitted by `build.rs`.
const fn parse_u64(digits: &str) -> u64 {
    let bytes = digits.as_bytes();
    assert!(!bytes.is_empty());
    let mut value: u64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        assert!(b.is_ascii_digit());
        value = value * 10 + (b - b'0') as u64;
        i += 1;
    }
    value
}

const fn parse_placement(policy: &str) -> PlacementPolicy {
    match policy.as_bytes() {
        b"exact" => PlacementPolicy::Exact,
        _ => PlacementPolicy::BestEffort,
    }
}
