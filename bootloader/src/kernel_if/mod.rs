//! Kernel Interface - Volume resolution, file reading, image allocation and
//! the loader that composes them

pub mod file_reader;
pub mod image_allocator;
pub mod kernel_loader;
pub mod loaded_image;
pub mod volume_resolver;
