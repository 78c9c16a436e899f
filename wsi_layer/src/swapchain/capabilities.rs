/// Capability negotiation - validating a swapchain request against a surface
///
/// Extension toggles are resolved once into [`SwapchainFeatures`] when the
/// device is created, and a request is resolved once into a
/// [`SwapchainConfig`] when the swapchain is created. Nothing on the hot path
/// inspects extension names again.

use std::time::Duration;
use ash::vk;
use bitflags::bitflags;
use crate::backend::{ImageDescription, PlatformBackend};
use crate::config::{LayerConfig, PresentStrategy};
use crate::error::{ConfigError, Result};

bitflags! {
    /// Optional swapchain behaviour enabled on a device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SwapchainFeatures: u32 {
        /// Present ids and timing samples
        const PRESENT_ID = 1 << 0;
        /// Waiting for a present id to complete
        const PRESENT_WAIT = 1 << 1;
        /// Resizable timing queue
        const PRESENT_TIMING = 1 << 2;
        /// Image release and per-present fences
        const MAINTENANCE1 = 1 << 3;
        /// Shared presentable image modes
        const SHARED_PRESENTABLE = 1 << 4;
    }
}

impl SwapchainFeatures {
    /// Resolve the features implied by a list of enabled device extensions
    pub fn from_extensions<S: AsRef<str>>(extensions: &[S]) -> Self {
        let mut features = SwapchainFeatures::empty();
        for name in extensions {
            features |= match name.as_ref() {
                "VK_KHR_present_id" | "VK_KHR_present_id2" => SwapchainFeatures::PRESENT_ID,
                "VK_KHR_present_wait" | "VK_KHR_present_wait2" => SwapchainFeatures::PRESENT_WAIT,
                "VK_EXT_present_timing" => SwapchainFeatures::PRESENT_TIMING,
                "VK_EXT_swapchain_maintenance1" | "VK_KHR_swapchain_maintenance1" => {
                    SwapchainFeatures::MAINTENANCE1
                }
                "VK_KHR_shared_presentable_image" => SwapchainFeatures::SHARED_PRESENTABLE,
                _ => SwapchainFeatures::empty(),
            };
        }
        features
    }
}

/// Shared presentable image modes keep a single image owned by the application
pub fn is_shared_present_mode(mode: vk::PresentModeKHR) -> bool {
    mode == vk::PresentModeKHR::SHARED_DEMAND_REFRESH
        || mode == vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH
}

/// Parameters requested by the application
#[derive(Debug, Clone, Copy)]
pub struct SwapchainCreateInfo {
    /// Minimum number of images
    pub min_image_count: u32,
    /// Format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Image size; 0x0 uses the surface's current extent
    pub extent: vk::Extent2D,
    /// Number of array layers
    pub array_layers: u32,
    /// Image usage
    pub usage: vk::ImageUsageFlags,
    /// Present mode
    pub present_mode: vk::PresentModeKHR,
    /// Overrides the device's default present strategy
    pub present_strategy: Option<PresentStrategy>,
}

impl Default for SwapchainCreateInfo {
    fn default() -> Self {
        Self {
            min_image_count: 3,
            surface_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            extent: vk::Extent2D { width: 0, height: 0 },
            array_layers: 1,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            present_mode: vk::PresentModeKHR::FIFO,
            present_strategy: None,
        }
    }
}

/// Fully resolved swapchain configuration
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    /// Number of images in the pool
    pub image_count: u32,
    /// Format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Image size
    pub extent: vk::Extent2D,
    /// Number of array layers
    pub array_layers: u32,
    /// Image usage
    pub usage: vk::ImageUsageFlags,
    /// Present mode
    pub present_mode: vk::PresentModeKHR,
    /// Present strategy
    pub strategy: PresentStrategy,
    /// Device features
    pub features: SwapchainFeatures,
    /// Timing ring buffer capacity
    pub timing_queue_size: usize,
    /// Signal wait bound
    pub signal_timeout: Duration,
}

impl SwapchainConfig {
    /// What the allocator is asked for
    pub fn image_description(&self) -> ImageDescription {
        ImageDescription {
            format: self.surface_format.format,
            extent: self.extent,
            usage: self.usage,
            array_layers: self.array_layers,
        }
    }

    /// Whether this swapchain uses a shared presentable image
    pub fn is_shared(&self) -> bool {
        is_shared_present_mode(self.present_mode)
    }
}

/// Validate `info` against what `platform` supports
///
/// Every rejection is a specific `ConfigError`; nothing is allocated here.
pub fn negotiate(
    platform: &dyn PlatformBackend,
    info: &SwapchainCreateInfo,
    features: SwapchainFeatures,
    layer_config: &LayerConfig,
) -> Result<SwapchainConfig> {
    let capabilities = platform.get_surface_capabilities()?;
    let formats = platform.get_supported_formats()?;

    let wanted = info.surface_format;
    let format_supported = formats
        .iter()
        .any(|f| f.format == wanted.format && f.color_space == wanted.color_space);
    if !format_supported {
        return Err(ConfigError::UnsupportedFormat(wanted.format).into());
    }

    if !capabilities.present_modes.contains(&info.present_mode) {
        return Err(ConfigError::UnsupportedPresentMode(info.present_mode).into());
    }

    let shared = is_shared_present_mode(info.present_mode);
    if shared && !features.contains(SwapchainFeatures::SHARED_PRESENTABLE) {
        return Err(ConfigError::FeatureNotEnabled("VK_KHR_shared_presentable_image").into());
    }

    let image_count = if shared {
        1
    } else {
        let requested = info.min_image_count;
        let min = capabilities.min_image_count.max(1);
        let max = capabilities.max_image_count;
        if requested < min || (max != 0 && requested > max) {
            return Err(ConfigError::ImageCountOutOfRange { requested, min, max }.into());
        }
        requested
    };

    if info.usage.is_empty() || !capabilities.supported_usage.contains(info.usage) {
        return Err(ConfigError::UnsupportedUsage(info.usage).into());
    }

    let extent = if info.extent.width == 0 && info.extent.height == 0 {
        capabilities
            .current_extent
            .ok_or(ConfigError::ExtentOutOfRange(info.extent))?
    } else {
        info.extent
    };
    let min_extent = capabilities.min_image_extent;
    let max_extent = capabilities.max_image_extent;
    if extent.width == 0
        || extent.height == 0
        || extent.width < min_extent.width
        || extent.height < min_extent.height
        || extent.width > max_extent.width
        || extent.height > max_extent.height
    {
        return Err(ConfigError::ExtentOutOfRange(extent).into());
    }

    if info.array_layers == 0 || info.array_layers > capabilities.max_image_array_layers {
        return Err(ConfigError::InvalidArrayLayers(info.array_layers).into());
    }

    if layer_config.timing_queue_size == 0 {
        return Err(ConfigError::InvalidParameter("timing queue size must be non-zero".to_string()).into());
    }

    // The shared image is presented again right away, so it must be back in
    // the application's hands when queue_present returns
    let strategy = if shared {
        PresentStrategy::Synchronous
    } else {
        info.present_strategy.unwrap_or(layer_config.present_strategy)
    };

    Ok(SwapchainConfig {
        image_count,
        surface_format: wanted,
        extent,
        array_layers: info.array_layers,
        usage: info.usage,
        present_mode: info.present_mode,
        strategy,
        features,
        timing_queue_size: layer_config.timing_queue_size,
        signal_timeout: layer_config.signal_timeout,
    })
}

#[cfg(test)]
#[path = "capabilities_tests.rs"]
mod tests;
