//! Kernel loader: boot volume -> kernel file -> typed pages -> LoadedImage
//!
//! Each step runs only if the previous one succeeded. Handles and pages are
//! held by scoped owners declared in acquisition order, so an early return
//! releases the pages first, then the file, then the volume.

use crate::config::BootConfiguration;
use crate::error::Result;
use crate::firmware::Firmware;
use crate::kernel_if::file_reader;
use crate::kernel_if::image_allocator::ImageAllocation;
use crate::kernel_if::loaded_image::LoadedImage;
use crate::kernel_if::volume_resolver;

pub struct KernelLoader<'fw, F: Firmware> {
    firmware: &'fw F,
    config: BootConfiguration,
}

impl<'fw, F: Firmware> KernelLoader<'fw, F> {
    pub fn new(firmware: &'fw F, config: BootConfiguration) -> Self {
        Self { firmware, config }
    }

    /// Loader using the configuration baked into this build
    pub fn with_build_config(firmware: &'fw F) -> Self {
        Self::new(firmware, BootConfiguration::BUILD)
    }

    pub fn config(&self) -> &BootConfiguration {
        &self.config
    }

    /// Load the configured kernel file into freshly allocated pages.
    ///
    /// On failure no pages stay allocated and no handles stay open.
    pub fn load(&self) -> Result<LoadedImage> {
        let name = self.config.kernel_file_name;
        log::info!("Loading kernel '{}'", name);

        let mut volume = volume_resolver::open_boot_volume(self.firmware)?;
        let mut file = file_reader::open_kernel_file(&mut volume, name)?;
        let size = file_reader::kernel_file_size(&mut file)?;

        let mut allocation = ImageAllocation::allocate(self.firmware, size, &self.config)?;
        let read = file_reader::read_exact(&mut file, allocation.as_mut_slice(), size)?;

        drop(file);
        drop(volume);

        let image = allocation.into_loaded_image(read, &self.config);
        log::info!(
            "Kernel loaded: {} bytes at {:#x} ({} pages, {:?}), virtual base {:#x}",
            image.size_in_bytes(),
            image.physical_address(),
            image.pages(),
            image.placement(),
            image.virtual_load_address()
        );
        Ok(image)
    }
}
