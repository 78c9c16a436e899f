/// Mock allocator and platform backends for tests
///
/// Both mocks append to one shared event log, so a test can assert the exact
/// order in which the swapchain allocated, presented and freed.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ash::vk;
use rustc_hash::FxHashSet;
use crate::backend::{
    AllocatorBackend, BackingImage, ImageDescription, PlatformBackend, PlatformPresent,
    PlatformResources, PresentStatus, SurfaceCapabilities,
};
use crate::error::{ConfigError, Error, Result};
use crate::swapchain::{ImageReleaser, SwapchainConfig, SwapchainImage};
use crate::sync::lock;

/// Something a mock backend was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Allocate { count: u32 },
    Free { handles: Vec<u64> },
    CreateResources { image_count: usize },
    Present { index: u32, present_id: Option<u64> },
    DestroyResources,
}

/// Event log shared by the mocks of one test
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<MockEvent>>>);

impl EventLog {
    pub fn push(&self, event: MockEvent) {
        lock(&self.0).push(event);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.0).clone()
    }

    /// Image indices presented so far, in order
    pub fn presented(&self) -> Vec<u32> {
        lock(&self.0)
            .iter()
            .filter_map(|e| match e {
                MockEvent::Present { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, wanted: impl Fn(&MockEvent) -> bool) -> Option<usize> {
        lock(&self.0).iter().position(wanted)
    }

    pub fn count(&self, wanted: impl Fn(&MockEvent) -> bool) -> usize {
        lock(&self.0).iter().filter(|e| wanted(e)).count()
    }
}

// ============================================================================
// MockAllocator
// ============================================================================

/// Hands out fake handles and tracks which are live
pub struct MockAllocator {
    events: EventLog,
    next_handle: AtomicU64,
    live: Mutex<FxHashSet<u64>>,
    fail_with: Mutex<Option<Error>>,
    /// Return this many fewer images than requested
    short_by: AtomicU32,
    double_free: AtomicBool,
}

impl MockAllocator {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            next_handle: AtomicU64::new(0x1000),
            live: Mutex::new(FxHashSet::default()),
            fail_with: Mutex::new(None),
            short_by: AtomicU32::new(0),
            double_free: AtomicBool::new(false),
        }
    }

    pub fn fail_with(&self, error: Error) {
        *lock(&self.fail_with) = Some(error);
    }

    pub fn return_short(&self, by: u32) {
        self.short_by.store(by, Ordering::SeqCst);
    }

    pub fn live_count(&self) -> usize {
        lock(&self.live).len()
    }

    pub fn double_freed(&self) -> bool {
        self.double_free.load(Ordering::SeqCst)
    }
}

impl AllocatorBackend for MockAllocator {
    fn allocate(&self, description: &ImageDescription, count: u32) -> Result<Vec<BackingImage>> {
        if let Some(error) = lock(&self.fail_with).clone() {
            return Err(error);
        }
        if description.format == vk::Format::UNDEFINED {
            return Err(ConfigError::UnsupportedFormat(description.format).into());
        }
        self.events.push(MockEvent::Allocate { count });

        let produced = count.saturating_sub(self.short_by.load(Ordering::SeqCst));
        let row_pitch = description.extent.width * 4;
        let size = u64::from(row_pitch) * u64::from(description.extent.height);
        let mut live = lock(&self.live);
        Ok((0..produced)
            .map(|_| {
                let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
                live.insert(handle);
                BackingImage { handle, modifier: None, size, row_pitch }
            })
            .collect())
    }

    fn free(&self, images: &[BackingImage]) {
        let mut live = lock(&self.live);
        for image in images {
            if !live.remove(&image.handle) {
                self.double_free.store(true, Ordering::SeqCst);
            }
        }
        self.events.push(MockEvent::Free {
            handles: images.iter().map(|i| i.handle).collect(),
        });
    }
}

// ============================================================================
// MockPlatform
// ============================================================================

/// Knobs controlling how mock presents behave
#[derive(Debug, Clone, Default)]
pub struct PresentBehavior {
    /// Time each present takes
    pub delay: Duration,
    /// Error returned by the next present (consumed)
    pub fail_next: Option<Error>,
    /// Report every present as suboptimal
    pub suboptimal: bool,
    /// Hold the displayed image until the next present, like a real display
    pub retain: bool,
}

/// Surface whose capabilities and present behaviour a test controls
pub struct MockPlatform {
    events: EventLog,
    capabilities: Mutex<SurfaceCapabilities>,
    formats: Vec<vk::SurfaceFormatKHR>,
    behavior: Arc<Mutex<PresentBehavior>>,
    fail_create: Mutex<Option<Error>>,
}

pub fn default_capabilities() -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: 2,
        max_image_count: 4,
        current_extent: Some(vk::Extent2D { width: 800, height: 600 }),
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        max_image_array_layers: 1,
        supported_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
        present_modes: vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::SHARED_DEMAND_REFRESH,
        ],
    }
}

impl MockPlatform {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            capabilities: Mutex::new(default_capabilities()),
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            behavior: Arc::new(Mutex::new(PresentBehavior::default())),
            fail_create: Mutex::new(None),
        }
    }

    pub fn set_capabilities(&self, capabilities: SurfaceCapabilities) {
        *lock(&self.capabilities) = capabilities;
    }

    pub fn behavior(&self) -> std::sync::MutexGuard<'_, PresentBehavior> {
        lock(&self.behavior)
    }

    pub fn fail_create(&self, error: Error) {
        *lock(&self.fail_create) = Some(error);
    }
}

impl PlatformBackend for MockPlatform {
    fn get_surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        Ok(lock(&self.capabilities).clone())
    }

    fn get_supported_formats(&self) -> Result<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.formats.clone())
    }

    fn create_platform_resources(
        &self,
        _config: &SwapchainConfig,
        images: &[SwapchainImage],
        releaser: ImageReleaser,
    ) -> Result<Box<dyn PlatformResources>> {
        if let Some(error) = lock(&self.fail_create).take() {
            return Err(error);
        }
        self.events.push(MockEvent::CreateResources { image_count: images.len() });
        Ok(Box::new(MockResources {
            events: self.events.clone(),
            behavior: self.behavior.clone(),
            releaser,
            held: None,
        }))
    }
}

struct MockResources {
    events: EventLog,
    behavior: Arc<Mutex<PresentBehavior>>,
    releaser: ImageReleaser,
    held: Option<u32>,
}

impl PlatformResources for MockResources {
    fn present(&mut self, request: &PlatformPresent<'_>) -> Result<PresentStatus> {
        let (delay, failure, suboptimal, retain) = {
            let mut behavior = lock(&self.behavior);
            (behavior.delay, behavior.fail_next.take(), behavior.suboptimal, behavior.retain)
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if let Some(error) = failure {
            return Err(error);
        }

        self.events.push(MockEvent::Present {
            index: request.image_index,
            present_id: request.present_id,
        });
        if retain {
            if let Some(previous) = self.held.replace(request.image_index) {
                self.releaser.release(previous)?;
            }
        } else {
            self.releaser.release(request.image_index)?;
        }

        Ok(if suboptimal { PresentStatus::Suboptimal } else { PresentStatus::Optimal })
    }

    fn destroy_platform_resources(&mut self) {
        if let Some(held) = self.held.take() {
            let _ = self.releaser.release(held);
        }
        self.events.push(MockEvent::DestroyResources);
    }
}
