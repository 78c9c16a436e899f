/// HeadlessPlatform - a surface without a display
///
/// Presents are recorded instead of shown. FIFO modes can be paced to a fixed
/// refresh interval, and the surface can be resized or invalidated to drive
/// the suboptimal and out-of-date paths.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use ash::vk;
use wsi_layer::wsi::backend::{
    PlatformBackend, PlatformPresent, PlatformResources, PresentStatus, SurfaceCapabilities,
};
use wsi_layer::wsi::swapchain::{ImageReleaser, SwapchainConfig, SwapchainImage};
use wsi_layer::wsi::{Error, Result};
use wsi_layer::{layer_debug, layer_trace};

/// Configuration of a headless surface
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Format/color space pairs the surface reports
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Present modes the surface reports
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub min_image_count: u32,
    /// 0 = no limit
    pub max_image_count: u32,
    /// Initial surface size
    pub extent: vk::Extent2D,
    /// Largest swapchain extent accepted
    pub max_extent: vk::Extent2D,
    /// Simulated refresh period for FIFO modes (zero = no pacing)
    pub refresh_interval: Duration,
    /// Hold the displayed buffer until the next present replaces it
    pub retain_displayed: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        let srgb = vk::ColorSpaceKHR::SRGB_NONLINEAR;
        Self {
            formats: vec![
                vk::SurfaceFormatKHR { format: vk::Format::B8G8R8A8_UNORM, color_space: srgb },
                vk::SurfaceFormatKHR { format: vk::Format::B8G8R8A8_SRGB, color_space: srgb },
                vk::SurfaceFormatKHR { format: vk::Format::R8G8B8A8_UNORM, color_space: srgb },
                vk::SurfaceFormatKHR { format: vk::Format::R8G8B8A8_SRGB, color_space: srgb },
            ],
            present_modes: vec![
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::FIFO_RELAXED,
                vk::PresentModeKHR::MAILBOX,
                vk::PresentModeKHR::IMMEDIATE,
                vk::PresentModeKHR::SHARED_DEMAND_REFRESH,
                vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH,
            ],
            min_image_count: 1,
            max_image_count: 0,
            extent: vk::Extent2D { width: 1280, height: 720 },
            max_extent: vk::Extent2D { width: 16384, height: 16384 },
            refresh_interval: Duration::ZERO,
            retain_displayed: false,
        }
    }
}

/// A frame that reached the headless display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedFrame {
    /// Swapchain that presented it
    pub swapchain: u64,
    pub image_index: u32,
    /// Backing image handle
    pub handle: u64,
    pub present_id: Option<u64>,
    /// Order in which frames reached the display, across swapchains
    pub sequence: u64,
}

#[derive(Debug)]
struct SurfaceState {
    extent: vk::Extent2D,
    out_of_date: bool,
    frames: Vec<PresentedFrame>,
    live_resources: usize,
}

/// Headless surface
pub struct HeadlessPlatform {
    config: HeadlessConfig,
    state: Arc<Mutex<SurfaceState>>,
    next_swapchain: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HeadlessPlatform {
    pub fn new(config: HeadlessConfig) -> Self {
        let state = SurfaceState {
            extent: config.extent,
            out_of_date: false,
            frames: Vec::new(),
            live_resources: 0,
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
            next_swapchain: AtomicU64::new(1),
        }
    }

    /// Every frame displayed so far, oldest first
    pub fn frames(&self) -> Vec<PresentedFrame> {
        lock(&self.state).frames.clone()
    }

    /// Image indices displayed so far, oldest first
    pub fn presented_indices(&self) -> Vec<u32> {
        lock(&self.state).frames.iter().map(|f| f.image_index).collect()
    }

    /// Current surface size
    pub fn extent(&self) -> vk::Extent2D {
        lock(&self.state).extent
    }

    /// Change the surface size
    ///
    /// Swapchains whose extent no longer matches present as suboptimal.
    pub fn resize(&self, extent: vk::Extent2D) {
        layer_debug!("wsi::HeadlessPlatform", "Surface resized to {}x{}", extent.width, extent.height);
        lock(&self.state).extent = extent;
    }

    /// Make every later present fail with `OutOfDate`
    pub fn invalidate(&self) {
        lock(&self.state).out_of_date = true;
    }

    /// Number of swapchains with live platform resources
    pub fn live_resources(&self) -> usize {
        lock(&self.state).live_resources
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl PlatformBackend for HeadlessPlatform {
    fn get_surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        Ok(SurfaceCapabilities {
            min_image_count: self.config.min_image_count,
            max_image_count: self.config.max_image_count,
            current_extent: Some(self.extent()),
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: self.config.max_extent,
            max_image_array_layers: 1,
            supported_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::STORAGE,
            present_modes: self.config.present_modes.clone(),
        })
    }

    fn get_supported_formats(&self) -> Result<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.config.formats.clone())
    }

    fn create_platform_resources(
        &self,
        config: &SwapchainConfig,
        images: &[SwapchainImage],
        releaser: ImageReleaser,
    ) -> Result<Box<dyn PlatformResources>> {
        if lock(&self.state).out_of_date {
            return Err(Error::OutOfDate);
        }

        let paced = matches!(
            config.present_mode,
            vk::PresentModeKHR::FIFO | vk::PresentModeKHR::FIFO_RELAXED
        ) && !self.config.refresh_interval.is_zero();

        let swapchain = self.next_swapchain.fetch_add(1, Ordering::Relaxed);
        lock(&self.state).live_resources += 1;
        layer_debug!(
            "wsi::HeadlessPlatform",
            "Platform resources for swapchain {} ({} images, paced: {})",
            swapchain, images.len(), paced
        );

        Ok(Box::new(HeadlessResources {
            swapchain,
            state: self.state.clone(),
            releaser,
            extent: config.extent,
            shared: config.is_shared(),
            refresh_interval: paced.then_some(self.config.refresh_interval),
            retain_displayed: self.config.retain_displayed,
            displayed: None,
            next_refresh: None,
            destroyed: false,
        }))
    }
}

struct HeadlessResources {
    swapchain: u64,
    state: Arc<Mutex<SurfaceState>>,
    releaser: ImageReleaser,
    extent: vk::Extent2D,
    shared: bool,
    refresh_interval: Option<Duration>,
    retain_displayed: bool,
    displayed: Option<u32>,
    next_refresh: Option<Instant>,
    destroyed: bool,
}

impl HeadlessResources {
    fn wait_for_refresh(&mut self) {
        let Some(interval) = self.refresh_interval else {
            return;
        };
        let now = Instant::now();
        let refresh = match self.next_refresh {
            Some(at) if at > now => {
                thread::sleep(at - now);
                at
            }
            _ => now,
        };
        self.next_refresh = Some(refresh + interval);
    }

    fn release(&self, index: u32) {
        if let Err(error) = self.releaser.release(index) {
            layer_trace!("wsi::HeadlessPlatform", "Release of image {} skipped: {}", index, error);
        }
    }
}

impl PlatformResources for HeadlessResources {
    fn present(&mut self, request: &PlatformPresent<'_>) -> Result<PresentStatus> {
        let extent = {
            let state = lock(&self.state);
            if state.out_of_date {
                return Err(Error::OutOfDate);
            }
            state.extent
        };

        self.wait_for_refresh();

        {
            let mut state = lock(&self.state);
            let sequence = state.frames.len() as u64;
            state.frames.push(PresentedFrame {
                swapchain: self.swapchain,
                image_index: request.image_index,
                handle: request.image.handle,
                present_id: request.present_id,
                sequence,
            });
        }

        // A shared image goes back to the application, not to the pool
        if !self.shared {
            if self.retain_displayed {
                if let Some(previous) = self.displayed.replace(request.image_index) {
                    if previous != request.image_index {
                        self.release(previous);
                    }
                }
            } else {
                self.release(request.image_index);
            }
        }

        if extent.width != self.extent.width || extent.height != self.extent.height {
            return Ok(PresentStatus::Suboptimal);
        }
        Ok(PresentStatus::Optimal)
    }

    fn destroy_platform_resources(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Some(displayed) = self.displayed.take() {
            self.release(displayed);
        }
        lock(&self.state).live_resources -= 1;
        layer_debug!("wsi::HeadlessPlatform", "Platform resources for swapchain {} destroyed", self.swapchain);
    }
}
