/// Device context - the handle-based swapchain API
///
/// A [`Device`] is what the layer keeps for one application device: the
/// allocator backend, the swapchain features resolved from the enabled
/// extensions, the layer configuration and every swapchain created on it.

use std::sync::Arc;
use std::time::Duration;
use crate::backend::{AllocatorBackend, PlatformBackend, PresentStatus};
use crate::config::LayerConfig;
use crate::error::{Error, Result};
use crate::registry::HandleMap;
use crate::swapchain::{PresentInfo, StateCounts, Swapchain, SwapchainCreateInfo, SwapchainFeatures, SwapchainImage};
use crate::sync::{PastPresentationTiming, Signal};
use crate::{layer_debug, layer_warn};

/// One entry of a multi-swapchain present
#[derive(Debug, Clone)]
pub struct SwapchainPresent {
    pub swapchain: u64,
    pub image_index: u32,
    pub info: PresentInfo,
}

/// Per-swapchain outcome of `Device::queue_present`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePresentResult {
    /// One result per entry, in submission order
    pub results: Vec<Result<PresentStatus>>,
}

impl QueuePresentResult {
    /// Single result summarizing the batch
    ///
    /// Device loss wins over every other error, then the first error in
    /// submission order; otherwise suboptimal if any entry was.
    pub fn overall(&self) -> Result<PresentStatus> {
        if self.results.iter().any(|r| *r == Err(Error::DeviceLost)) {
            return Err(Error::DeviceLost);
        }
        if let Some(Err(error)) = self.results.iter().find(|r| r.is_err()) {
            return Err(error.clone());
        }
        if self.results.iter().any(|r| *r == Ok(PresentStatus::Suboptimal)) {
            return Ok(PresentStatus::Suboptimal);
        }
        Ok(PresentStatus::Optimal)
    }
}

/// Layer state for one device
pub struct Device {
    allocator: Arc<dyn AllocatorBackend>,
    features: SwapchainFeatures,
    enabled_extensions: Vec<String>,
    config: LayerConfig,
    swapchains: HandleMap<Swapchain>,
}

impl Device {
    pub(crate) fn new(
        allocator: Arc<dyn AllocatorBackend>,
        enabled_extensions: Vec<String>,
        config: LayerConfig,
    ) -> Self {
        let features = SwapchainFeatures::from_extensions(&enabled_extensions);
        layer_debug!("wsi::Device", "Device created with features {:?}", features);
        Self {
            allocator,
            features,
            enabled_extensions,
            config,
            swapchains: HandleMap::new(),
        }
    }

    pub fn features(&self) -> SwapchainFeatures {
        self.features
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn is_extension_enabled(&self, name: &str) -> bool {
        self.enabled_extensions.iter().any(|e| e == name)
    }

    /// Number of live swapchains
    pub fn swapchain_count(&self) -> usize {
        self.swapchains.len()
    }

    /// Direct access to a swapchain object
    pub fn swapchain(&self, handle: u64) -> Result<Arc<Swapchain>> {
        self.swapchains.get(handle)
    }

    pub fn create_swapchain(&self, surface: &Arc<dyn PlatformBackend>, info: &SwapchainCreateInfo) -> Result<u64> {
        let swapchain = Swapchain::create(surface, self.allocator.clone(), info, self.features, &self.config)?;
        Ok(self.swapchains.insert(swapchain))
    }

    /// Destroy a swapchain; its handle is invalid afterwards
    pub fn destroy_swapchain(&self, handle: u64) -> Result<()> {
        self.swapchains.remove(handle)?.destroy()
    }

    pub fn get_swapchain_images(&self, handle: u64) -> Result<Vec<SwapchainImage>> {
        Ok(self.swapchains.get(handle)?.get_images())
    }

    pub fn get_swapchain_state_counts(&self, handle: u64) -> Result<StateCounts> {
        Ok(self.swapchains.get(handle)?.state_counts())
    }

    pub fn acquire_next_image(
        &self,
        handle: u64,
        timeout: Duration,
        signal: Option<&Arc<dyn Signal>>,
    ) -> Result<u32> {
        self.swapchains.get(handle)?.acquire_next_image(timeout, signal)
    }

    /// Present to several swapchains at once
    ///
    /// Entries are independent: a failure on one swapchain does not stop
    /// the others.
    pub fn queue_present(&self, presents: &[SwapchainPresent]) -> QueuePresentResult {
        let results = presents
            .iter()
            .map(|present| {
                self.swapchains
                    .get(present.swapchain)
                    .and_then(|swapchain| swapchain.queue_present(present.image_index, present.info.clone()))
            })
            .collect();
        QueuePresentResult { results }
    }

    pub fn get_swapchain_status(&self, handle: u64) -> Result<PresentStatus> {
        self.swapchains.get(handle)?.get_status()
    }

    pub fn release_swapchain_images(&self, handle: u64, indices: &[u32]) -> Result<()> {
        self.swapchains.get(handle)?.release_images(indices)
    }

    pub fn get_past_presentation_timing(&self, handle: u64) -> Result<Vec<PastPresentationTiming>> {
        Ok(self.swapchains.get(handle)?.get_past_presentation_timing())
    }

    pub fn set_present_timing_queue_size(&self, handle: u64, size: usize) -> Result<()> {
        self.swapchains.get(handle)?.set_present_timing_queue_size(size)
    }

    pub fn wait_for_present(&self, handle: u64, present_id: u64, timeout: Duration) -> Result<()> {
        self.swapchains.get(handle)?.wait_for_present(present_id, timeout)
    }

    /// Destroy every swapchain still alive
    pub fn destroy_all(&self) {
        let swapchains = self.swapchains.drain();
        if !swapchains.is_empty() {
            layer_warn!("wsi::Device", "Destroying {} swapchains left alive", swapchains.len());
        }
        for swapchain in swapchains {
            if let Err(error) = swapchain.destroy() {
                layer_warn!("wsi::Device", "Swapchain {} destroy failed: {}", swapchain.id(), error);
            }
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
