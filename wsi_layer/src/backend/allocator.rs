/// Allocator backend trait - backing storage for swapchain images

use ash::vk;
use crate::error::Result;

/// Description of the images a swapchain needs backing storage for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescription {
    /// Pixel format
    pub format: vk::Format,
    /// Image size in pixels
    pub extent: vk::Extent2D,
    /// Usage the application requested
    pub usage: vk::ImageUsageFlags,
    /// Number of array layers
    pub array_layers: u32,
}

/// Opaque backing storage for one presentable image
///
/// The handle is meaningful only to the allocator that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackingImage {
    /// Allocator-defined handle
    pub handle: u64,
    /// Format modifier negotiated by the allocator, if any
    pub modifier: Option<u64>,
    /// Total size in bytes
    pub size: u64,
    /// Bytes per row of the first plane
    pub row_pitch: u32,
}

/// Allocator backend
///
/// `allocate` is all-or-nothing: on failure nothing stays allocated. Return
/// `Error::Configuration(ConfigError::UnsupportedFormat)` when the format or
/// usage cannot be satisfied and `Error::OutOfDeviceMemory` when the backing
/// store is exhausted.
pub trait AllocatorBackend: Send + Sync {
    /// Allocate `count` images matching `description`
    fn allocate(&self, description: &ImageDescription, count: u32) -> Result<Vec<BackingImage>>;

    /// Free images previously returned by `allocate`
    fn free(&self, images: &[BackingImage]);
}
