/// Platform backend trait - surface queries and buffer hand-off

use ash::vk;
use crate::backend::BackingImage;
use crate::error::Result;
use crate::swapchain::{ImageReleaser, SwapchainConfig, SwapchainImage};

/// Surface limits reported by a platform backend
#[derive(Debug, Clone)]
pub struct SurfaceCapabilities {
    /// Minimum number of images a swapchain must have
    pub min_image_count: u32,
    /// Maximum number of images (0 = no limit)
    pub max_image_count: u32,
    /// Current surface size, if the surface has a fixed one
    pub current_extent: Option<vk::Extent2D>,
    /// Smallest supported image size
    pub min_image_extent: vk::Extent2D,
    /// Largest supported image size
    pub max_image_extent: vk::Extent2D,
    /// Maximum number of array layers
    pub max_image_array_layers: u32,
    /// Usage flags images may be created with
    pub supported_usage: vk::ImageUsageFlags,
    /// Present modes the surface supports
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Outcome of a successful present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// Displayed as configured
    Optimal,
    /// Displayed, but the swapchain no longer matches the surface exactly
    Suboptimal,
}

/// One buffer handed to the platform
#[derive(Debug, Clone, Copy)]
pub struct PlatformPresent<'a> {
    /// Swapchain image index
    pub image_index: u32,
    /// Backing storage of that image
    pub image: &'a BackingImage,
    /// Present id supplied by the application
    pub present_id: Option<u64>,
}

/// Platform backend for one surface
///
/// Held by the application-facing surface object. Swapchains keep only a weak
/// reference, so dropping the surface makes its swapchains report
/// `Error::SurfaceLost`.
pub trait PlatformBackend: Send + Sync {
    /// Query surface limits
    fn get_surface_capabilities(&self) -> Result<SurfaceCapabilities>;

    /// Query supported format/color space pairs
    fn get_supported_formats(&self) -> Result<Vec<vk::SurfaceFormatKHR>>;

    /// Create the per-swapchain platform objects
    ///
    /// `releaser` hands presented buffers back to the swapchain once the
    /// display system no longer reads them.
    fn create_platform_resources(
        &self,
        config: &SwapchainConfig,
        images: &[SwapchainImage],
        releaser: ImageReleaser,
    ) -> Result<Box<dyn PlatformResources>>;
}

/// Per-swapchain platform objects
///
/// Only ever used by one thread at a time: the presenting caller in the
/// synchronous strategy, the present worker in the threaded one.
pub trait PlatformResources: Send {
    /// Hand a buffer to the display system
    ///
    /// The image is in the `PresentedAwaitingRelease` state while this runs;
    /// the backend may release it through its `ImageReleaser` at any point,
    /// including before returning.
    fn present(&mut self, request: &PlatformPresent<'_>) -> Result<PresentStatus>;

    /// Tear down platform objects and release every buffer still held
    fn destroy_platform_resources(&mut self);
}
