/// Swapchain - the façade applications drive
///
/// One [`Swapchain`] owns its image pool, its present queue and its present
/// engine. All mutable state sits behind a single mutex paired with a
/// condition variable; acquires, the present worker, platform releases and
/// destruction all wait on that one condition.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use crate::backend::{AllocatorBackend, PlatformBackend, PresentStatus};
use crate::config::{LayerConfig, PresentStrategy};
use crate::error::{ConfigError, Error, Result};
use crate::sync::bridge::SyncBridge;
use crate::sync::{deadline_after, lock, wait_until, PastPresentationTiming, PresentTimingQueue, Signal};
use crate::{layer_debug, layer_error, layer_info, layer_trace, layer_warn};
use super::capabilities::{negotiate, SwapchainConfig, SwapchainCreateInfo, SwapchainFeatures};
use super::image::{ImageState, StateCounts, SwapchainImage};
use super::image_pool::ImagePool;
use super::present_engine::{PresentEngine, SyncPresentEngine, ThreadedPresentEngine};

static NEXT_SWAPCHAIN_ID: AtomicU64 = AtomicU64::new(1);

/// How long destruction waits between "still waiting" warnings
const DESTROY_WARN_INTERVAL: Duration = Duration::from_secs(1);

/// Health of a swapchain; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SwapchainStatus {
    /// Presenting normally
    Active,
    /// The surface changed or the swapchain is being destroyed
    OutOfDate,
    /// The surface or the device is gone
    Lost,
}

/// Optional parts of a present
#[derive(Clone, Default)]
pub struct PresentInfo {
    /// Signals the image's rendering must complete before display
    pub wait_signals: Vec<Arc<dyn Signal>>,
    /// Application tag; strictly increasing, requires `PRESENT_ID`
    pub present_id: Option<u64>,
    /// Fired once the platform has taken the buffer, requires `MAINTENANCE1`
    pub present_fence: Option<Arc<dyn Signal>>,
}

impl std::fmt::Debug for PresentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentInfo")
            .field("wait_signals", &self.wait_signals.len())
            .field("present_id", &self.present_id)
            .field("present_fence", &self.present_fence.is_some())
            .finish()
    }
}

/// A present waiting for the engine
pub(crate) struct PresentRequest {
    pub(crate) image_index: u32,
    pub(crate) wait_signals: Vec<Arc<dyn Signal>>,
    pub(crate) present_id: Option<u64>,
    pub(crate) present_fence: Option<Arc<dyn Signal>>,
    pub(crate) queued_at: Instant,
}

/// Everything guarded by the swapchain mutex
pub(crate) struct SwapchainState {
    pub(crate) pool: ImagePool,
    pub(crate) queue: VecDeque<PresentRequest>,
    pub(crate) status: SwapchainStatus,
    pub(crate) device_lost: bool,
    pub(crate) suboptimal: bool,
    /// First error hit by the worker, reported by the next call that can
    pub(crate) deferred_error: Option<Error>,
    pub(crate) timing: PresentTimingQueue,
    pub(crate) last_queued_present_id: u64,
    pub(crate) completed_present_id: u64,
    pub(crate) shutdown: bool,
    pub(crate) destroyed: bool,
}

impl SwapchainState {
    pub(crate) fn degrade(&mut self, to: SwapchainStatus) {
        if to > self.status {
            self.status = to;
        }
    }

    /// Error every operation reports once the swapchain has degraded
    pub(crate) fn status_error(&self) -> Option<Error> {
        match self.status {
            SwapchainStatus::Active => None,
            SwapchainStatus::OutOfDate => Some(Error::OutOfDate),
            SwapchainStatus::Lost if self.device_lost => Some(Error::DeviceLost),
            SwapchainStatus::Lost => Some(Error::SurfaceLost),
        }
    }

    pub(crate) fn defer_error(&mut self, error: Error) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(error);
        }
    }

    /// Fold a platform or signal error into the swapchain status
    pub(crate) fn apply_error(&mut self, error: &Error) {
        match error {
            Error::OutOfDate => self.degrade(SwapchainStatus::OutOfDate),
            Error::SurfaceLost => self.degrade(SwapchainStatus::Lost),
            Error::DeviceLost => {
                self.device_lost = true;
                self.degrade(SwapchainStatus::Lost);
            }
            _ => {}
        }
    }
}

/// State shared between the façade, the present engine and the platform
pub(crate) struct SwapchainShared {
    pub(crate) id: u64,
    pub(crate) config: SwapchainConfig,
    pub(crate) surface: Weak<dyn PlatformBackend>,
    pub(crate) bridge: SyncBridge,
    pub(crate) state: Mutex<SwapchainState>,
    pub(crate) cond: Condvar,
}

impl SwapchainShared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SwapchainState> {
        lock(&self.state)
    }

    /// Where an image goes once the presentation path is done with it
    pub(crate) fn settled_state(&self) -> ImageState {
        if self.config.is_shared() {
            ImageState::Acquired
        } else {
            ImageState::Free
        }
    }
}

/// Hands presented buffers back to their swapchain
///
/// Given to the platform backend at creation. Releasing after the swapchain
/// is gone is a no-op.
#[derive(Debug, Clone)]
pub struct ImageReleaser {
    shared: Weak<SwapchainShared>,
}

impl ImageReleaser {
    /// The display system no longer reads image `index`
    pub fn release(&self, index: u32) -> Result<()> {
        let Some(shared) = self.shared.upgrade() else {
            return Ok(());
        };
        let mut state = shared.lock();
        state.pool.transition(index, &[ImageState::PresentedAwaitingRelease], shared.settled_state())?;
        drop(state);
        shared.cond.notify_all();
        layer_trace!("wsi::Swapchain", "Swapchain {}: image {} released", shared.id, index);
        Ok(())
    }
}

/// A swapchain bound to one surface
pub struct Swapchain {
    shared: Arc<SwapchainShared>,
    engine: Box<dyn PresentEngine>,
    allocator: Arc<dyn AllocatorBackend>,
}

impl Swapchain {
    /// Negotiate, allocate and start presenting
    ///
    /// Validation happens before any allocation; every later failure frees
    /// whatever was created before it.
    pub fn create(
        surface: &Arc<dyn PlatformBackend>,
        allocator: Arc<dyn AllocatorBackend>,
        info: &SwapchainCreateInfo,
        features: SwapchainFeatures,
        layer_config: &LayerConfig,
    ) -> Result<Self> {
        let config = negotiate(surface.as_ref(), info, features, layer_config).map_err(|e| {
            layer_error!("wsi::Swapchain", "Swapchain request rejected: {}", e);
            e
        })?;

        let pool = ImagePool::create(allocator.as_ref(), &config.image_description(), config.image_count)?;
        let images = pool.images();

        let id = NEXT_SWAPCHAIN_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(SwapchainShared {
            id,
            config,
            surface: Arc::downgrade(surface),
            bridge: SyncBridge::new(config.signal_timeout),
            state: Mutex::new(SwapchainState {
                pool,
                queue: VecDeque::new(),
                status: SwapchainStatus::Active,
                device_lost: false,
                suboptimal: false,
                deferred_error: None,
                timing: PresentTimingQueue::new(config.timing_queue_size),
                last_queued_present_id: 0,
                completed_present_id: 0,
                shutdown: false,
                destroyed: false,
            }),
            cond: Condvar::new(),
        });

        let release_storage = |shared: &SwapchainShared| {
            let backing = shared.lock().pool.take_backing();
            allocator.free(&backing);
        };

        let releaser = ImageReleaser { shared: Arc::downgrade(&shared) };
        let resources = match surface.create_platform_resources(&config, &images, releaser) {
            Ok(resources) => resources,
            Err(e) => {
                layer_error!("wsi::Swapchain", "Swapchain {}: platform resources failed: {}", id, e);
                release_storage(&shared);
                return Err(e);
            }
        };

        let engine: Box<dyn PresentEngine> = match config.strategy {
            PresentStrategy::Synchronous => Box::new(SyncPresentEngine::new(shared.clone(), resources)),
            PresentStrategy::Threaded => match ThreadedPresentEngine::spawn(shared.clone(), resources) {
                Ok(engine) => Box::new(engine),
                Err(e) => {
                    release_storage(&shared);
                    return Err(e);
                }
            },
        };

        layer_info!("wsi::Swapchain",
            "Swapchain {} created: {} images, {}x{}, {:?}, {:?}",
            id, config.image_count, config.extent.width, config.extent.height,
            config.present_mode, engine.strategy());

        Ok(Self { shared, engine, allocator })
    }

    /// Identifier used in log messages
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Resolved configuration
    pub fn config(&self) -> &SwapchainConfig {
        &self.shared.config
    }

    /// Strategy draining this swapchain's presents
    pub fn strategy(&self) -> PresentStrategy {
        self.engine.strategy()
    }

    /// Presentable images in index order
    pub fn get_images(&self) -> Vec<SwapchainImage> {
        self.shared.lock().pool.images()
    }

    /// Number of images in each state
    pub fn state_counts(&self) -> StateCounts {
        self.shared.lock().pool.counts()
    }

    /// State of one image
    pub fn image_state(&self, index: u32) -> Result<ImageState> {
        self.shared.lock().pool.state(index)
    }

    /// Current health, without consuming any deferred error
    pub fn status(&self) -> SwapchainStatus {
        self.shared.lock().status
    }

    /// Degrade the swapchain if its surface has been dropped
    fn check_surface(&self, state: &mut SwapchainState) -> Result<()> {
        if self.shared.surface.strong_count() == 0 {
            state.degrade(SwapchainStatus::Lost);
            return Err(Error::SurfaceLost);
        }
        Ok(())
    }

    /// Hand a FREE image to the application
    ///
    /// A zero `timeout` polls (`Error::NotReady`); `Duration::MAX` waits
    /// forever unless no image could ever come back, which reports
    /// `Error::Timeout` at once. `signal` fires once the image is usable.
    pub fn acquire_next_image(&self, timeout: Duration, signal: Option<&Arc<dyn Signal>>) -> Result<u32> {
        let shared = &self.shared;
        let index = {
            let mut state = shared.lock();
            if let Some(error) = state.status_error() {
                return Err(error);
            }
            self.check_surface(&mut state)?;

            if state.pool.find_free().is_none() {
                if timeout.is_zero() {
                    return Err(Error::NotReady);
                }
                let deadline = deadline_after(timeout);
                if deadline.is_none() && state.pool.counts().in_flight() == 0 {
                    layer_warn!("wsi::Swapchain",
                        "Swapchain {}: every image is acquired, an unbounded acquire would never return",
                        shared.id);
                    return Err(Error::Timeout);
                }

                let (guard, timed_out) = wait_until(&shared.cond, state, deadline, |s| {
                    s.status != SwapchainStatus::Active || s.pool.find_free().is_some()
                });
                state = guard;
                if let Some(error) = state.status_error() {
                    return Err(error);
                }
                if timed_out {
                    return Err(Error::Timeout);
                }
            }

            let index = state.pool.find_free().ok_or(Error::Timeout)?;
            state.pool.transition(index, &[ImageState::Free], ImageState::Acquired)?;
            index
        };

        shared.bridge.signal_acquired(signal)?;
        layer_trace!("wsi::Swapchain", "Swapchain {}: acquired image {}", shared.id, index);
        Ok(index)
    }

    /// Queue an ACQUIRED image for display
    ///
    /// Under the threaded strategy the result reflects the swapchain, not
    /// this present; failures of earlier presents come back here or from
    /// `get_status`.
    pub fn queue_present(&self, index: u32, info: PresentInfo) -> Result<PresentStatus> {
        let shared = &self.shared;
        let features = shared.config.features;
        if info.present_id.is_some() && !features.contains(SwapchainFeatures::PRESENT_ID) {
            return Err(ConfigError::FeatureNotEnabled("VK_KHR_present_id").into());
        }
        if info.present_fence.is_some() && !features.contains(SwapchainFeatures::MAINTENANCE1) {
            return Err(ConfigError::FeatureNotEnabled("VK_EXT_swapchain_maintenance1").into());
        }

        let request = {
            let mut state = shared.lock();
            let current = state.pool.state(index)?;
            if current != ImageState::Acquired {
                return Err(ConfigError::InvalidImageState { index, state: current.name() }.into());
            }
            if let Some(id) = info.present_id {
                let last = state.last_queued_present_id;
                if id == 0 || id <= last {
                    return Err(ConfigError::NonMonotonicPresentId { id, last }.into());
                }
            }

            if let Some(error) = state.status_error() {
                // Nothing will be shown; the layer takes the image back
                state.pool.transition(index, &[ImageState::Acquired], ImageState::Free)?;
                let error = state.deferred_error.take().unwrap_or(error);
                drop(state);
                shared.cond.notify_all();
                return Err(error);
            }

            state.pool.transition(index, &[ImageState::Acquired], ImageState::PendingPresent)?;
            state.pool.set_present_id(index, info.present_id)?;
            if let Some(id) = info.present_id {
                state.last_queued_present_id = id;
            }
            PresentRequest {
                image_index: index,
                wait_signals: info.wait_signals,
                present_id: info.present_id,
                present_fence: info.present_fence,
                queued_at: Instant::now(),
            }
        };

        layer_trace!("wsi::Swapchain", "Swapchain {}: queued image {}", shared.id, index);
        let status = self.engine.submit(request)?;
        // Earlier worker failures stay pending until a call can report them
        match shared.lock().deferred_error.take() {
            Some(error) => Err(error),
            None => Ok(status),
        }
    }

    /// Report the swapchain's health, consuming any deferred error
    pub fn get_status(&self) -> Result<PresentStatus> {
        let mut state = self.shared.lock();
        if let Some(error) = state.deferred_error.take() {
            return Err(error);
        }
        if let Some(error) = state.status_error() {
            return Err(error);
        }
        self.check_surface(&mut state)?;
        Ok(if state.suboptimal { PresentStatus::Suboptimal } else { PresentStatus::Optimal })
    }

    /// Hand images back to the layer without presenting them
    ///
    /// Accepts ACQUIRED images and images the platform has not released yet.
    /// The batch is validated as a whole; on error nothing changes.
    pub fn release_images(&self, indices: &[u32]) -> Result<()> {
        if !self.shared.config.features.contains(SwapchainFeatures::MAINTENANCE1) {
            return Err(ConfigError::FeatureNotEnabled("VK_EXT_swapchain_maintenance1").into());
        }

        let releasable = [ImageState::Acquired, ImageState::PresentedAwaitingRelease];
        let mut state = self.shared.lock();
        for (position, &index) in indices.iter().enumerate() {
            if indices[..position].contains(&index) {
                return Err(ConfigError::InvalidParameter(format!(
                    "image {} listed twice in release", index
                ))
                .into());
            }
            let current = state.pool.state(index)?;
            if !releasable.contains(&current) {
                return Err(ConfigError::InvalidImageState { index, state: current.name() }.into());
            }
        }
        for &index in indices {
            state.pool.transition(index, &releasable, ImageState::Free)?;
        }
        drop(state);
        self.shared.cond.notify_all();

        layer_debug!("wsi::Swapchain", "Swapchain {}: released images {:?}", self.shared.id, indices);
        Ok(())
    }

    /// Take every timing sample recorded so far, oldest first
    pub fn get_past_presentation_timing(&self) -> Vec<PastPresentationTiming> {
        self.shared.lock().timing.drain()
    }

    /// Samples evicted because the timing queue was full
    pub fn dropped_timing_samples(&self) -> u64 {
        self.shared.lock().timing.dropped()
    }

    /// Resize the timing ring buffer
    pub fn set_present_timing_queue_size(&self, size: usize) -> Result<()> {
        if !self.shared.config.features.contains(SwapchainFeatures::PRESENT_TIMING) {
            return Err(ConfigError::FeatureNotEnabled("VK_EXT_present_timing").into());
        }
        self.shared.lock().timing.set_capacity(size)
    }

    /// Block until the present tagged `present_id` has reached the platform
    pub fn wait_for_present(&self, present_id: u64, timeout: Duration) -> Result<()> {
        if !self.shared.config.features.contains(SwapchainFeatures::PRESENT_WAIT) {
            return Err(ConfigError::FeatureNotEnabled("VK_KHR_present_wait").into());
        }
        if present_id == 0 {
            return Err(ConfigError::InvalidParameter("present id 0 is never presented".to_string()).into());
        }

        let state = self.shared.lock();
        let (state, _) = wait_until(&self.shared.cond, state, deadline_after(timeout), |s| {
            s.completed_present_id >= present_id || s.status != SwapchainStatus::Active
        });
        if state.completed_present_id >= present_id {
            return Ok(());
        }
        if let Some(error) = state.status_error() {
            return Err(error);
        }
        Err(if timeout.is_zero() { Error::NotReady } else { Error::Timeout })
    }

    /// Stop presenting and free the images
    ///
    /// Every already-queued present still reaches the platform and every
    /// presented image is released before the storage is freed. Calling it
    /// again does nothing.
    pub fn destroy(&self) -> Result<()> {
        let shared = &self.shared;
        {
            let mut state = shared.lock();
            if state.destroyed {
                return Ok(());
            }
            state.degrade(SwapchainStatus::OutOfDate);
        }
        shared.cond.notify_all();

        let shutdown = self.engine.shutdown();
        if let Err(error) = &shutdown {
            layer_error!("wsi::Swapchain", "Swapchain {}: engine shutdown failed: {}", shared.id, error);
        }

        let backing = {
            let mut state = shared.lock();
            // Without a running engine nothing else will settle the images
            let give_up = shutdown.is_err();
            loop {
                let (guard, timed_out) = wait_until(
                    &shared.cond,
                    state,
                    deadline_after(DESTROY_WARN_INTERVAL),
                    |s| give_up || s.device_lost || s.pool.counts().in_flight() == 0,
                );
                state = guard;
                if !timed_out {
                    break;
                }
                layer_warn!("wsi::Swapchain",
                    "Swapchain {}: still waiting for {} images to be released",
                    shared.id, state.pool.counts().in_flight());
            }

            let abandoned = state.pool.abandon_in_flight();
            if abandoned > 0 {
                layer_warn!("wsi::Swapchain",
                    "Swapchain {}: {} images abandoned in flight", shared.id, abandoned);
            }
            state.queue.clear();
            state.destroyed = true;
            state.pool.take_backing()
        };
        if !backing.is_empty() {
            self.allocator.free(&backing);
        }

        layer_info!("wsi::Swapchain", "Swapchain {} destroyed", shared.id);
        shutdown
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            layer_error!("wsi::Swapchain", "Swapchain {}: destroy on drop failed: {}", self.shared.id, error);
        }
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
