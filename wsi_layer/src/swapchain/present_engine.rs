/// Presentation engines - draining queued presents
///
/// A [`PresentEngine`] is picked once when the swapchain is created:
///
/// - [`SyncPresentEngine`] runs every step on the presenting thread and
///   returns once the platform has taken the buffer.
/// - [`ThreadedPresentEngine`] owns a worker thread that drains the queue in
///   submission order, so `queue_present` returns as soon as the request is
///   queued.
///
/// Both run the same steps: wait on the application's signals, hand the
/// buffer to the platform, then fire the completion signals.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use crate::backend::{PlatformPresent, PlatformResources, PresentStatus};
use crate::config::PresentStrategy;
use crate::error::{Error, Result};
use crate::sync::lock;
use crate::{layer_debug, layer_err, layer_error, layer_trace, layer_warn};
use super::capabilities::SwapchainFeatures;
use super::image::ImageState;
use super::swapchain::{PresentRequest, SwapchainShared};

/// Strategy for draining queued presents
pub(crate) trait PresentEngine: Send + Sync {
    /// Which strategy this engine implements
    fn strategy(&self) -> PresentStrategy;

    /// Take a request whose image is already PENDING_PRESENT
    fn submit(&self, request: PresentRequest) -> Result<PresentStatus>;

    /// Drain every queued request, destroy the platform resources and stop
    fn shutdown(&self) -> Result<()>;
}

// ============================================================================
// Present steps (shared by both engines)
// ============================================================================

/// Give up on a request; its image goes back to the layer without being shown
fn abandon(shared: &SwapchainShared, request: &PresentRequest, error: Error) -> Error {
    let mut state = shared.lock();
    if state.pool.state(request.image_index).ok() == Some(ImageState::PendingPresent) {
        let _ = state.pool.transition(
            request.image_index,
            &[ImageState::PendingPresent],
            shared.settled_state(),
        );
    }
    drop(state);
    shared.cond.notify_all();
    error
}

/// WAIT_ON_SIGNAL: block until the application's rendering is done
pub(crate) fn wait_on_signal(shared: &SwapchainShared, request: &PresentRequest) -> Result<()> {
    if shared.lock().device_lost {
        return Err(abandon(shared, request, Error::DeviceLost));
    }

    if let Err(error) = shared.bridge.wait_for_signals(&request.wait_signals) {
        if error == Error::DeviceLost {
            shared.lock().apply_error(&error);
        }
        layer_warn!("wsi::PresentEngine",
            "Swapchain {}: wait for image {} failed: {}", shared.id, request.image_index, error);
        return Err(abandon(shared, request, error));
    }
    Ok(())
}

/// SUBMIT_TO_PLATFORM: hand the buffer to the display system
pub(crate) fn submit_to_platform(
    shared: &SwapchainShared,
    resources: &mut dyn PlatformResources,
    request: &PresentRequest,
) -> Result<PresentStatus> {
    let index = request.image_index;

    // Keeps the surface alive for the duration of the hand-off
    let Some(_surface) = shared.surface.upgrade() else {
        shared.lock().apply_error(&Error::SurfaceLost);
        return Err(abandon(shared, request, Error::SurfaceLost));
    };

    let backing = {
        let mut state = shared.lock();
        state.pool.transition(index, &[ImageState::PendingPresent], ImageState::PresentedAwaitingRelease)?;
        state.pool.backing(index)?
    };

    let result = resources.present(&PlatformPresent {
        image_index: index,
        image: &backing,
        present_id: request.present_id,
    });

    if let Err(error) = &result {
        let mut state = shared.lock();
        state.apply_error(error);
        // The platform may already have released it
        let _ = state.pool.transition(
            index,
            &[ImageState::PresentedAwaitingRelease],
            shared.settled_state(),
        );
        drop(state);
        shared.cond.notify_all();
        layer_error!("wsi::PresentEngine",
            "Swapchain {}: present of image {} failed: {}", shared.id, index, error);
    }
    result
}

/// SIGNAL_COMPLETE: record the outcome and fire the present fence
pub(crate) fn signal_complete(
    shared: &SwapchainShared,
    request: &PresentRequest,
    status: PresentStatus,
) -> Result<PresentStatus> {
    {
        let mut state = shared.lock();
        if shared.config.is_shared() {
            // The application keeps the shared image between presents
            let _ = state.pool.transition(
                request.image_index,
                &[ImageState::PresentedAwaitingRelease],
                ImageState::Acquired,
            );
        }
        if status == PresentStatus::Suboptimal {
            state.suboptimal = true;
        }
        if let Some(present_id) = request.present_id {
            state.completed_present_id = state.completed_present_id.max(present_id);
        }
        if shared.config.features.contains(SwapchainFeatures::PRESENT_ID) {
            shared.bridge.record_timing(
                &mut state.timing,
                request.present_id,
                request.image_index,
                request.queued_at,
                false,
            );
        }
    }
    shared.cond.notify_all();
    shared.bridge.signal_complete(request.present_fence.as_ref())?;
    Ok(status)
}

/// A mailbox request replaced by a newer one before reaching the platform
pub(crate) fn discard(shared: &SwapchainShared, request: &PresentRequest) -> Result<()> {
    wait_on_signal(shared, request)?;
    {
        let mut state = shared.lock();
        state.pool.transition(request.image_index, &[ImageState::PendingPresent], shared.settled_state())?;
        if shared.config.features.contains(SwapchainFeatures::PRESENT_ID) {
            shared.bridge.record_timing(
                &mut state.timing,
                request.present_id,
                request.image_index,
                request.queued_at,
                true,
            );
        }
    }
    shared.cond.notify_all();
    layer_trace!("wsi::PresentEngine",
        "Swapchain {}: image {} replaced in mailbox", shared.id, request.image_index);
    shared.bridge.signal_complete(request.present_fence.as_ref())
}

/// All three steps in order
pub(crate) fn present_request(
    shared: &SwapchainShared,
    resources: &mut dyn PlatformResources,
    request: &PresentRequest,
) -> Result<PresentStatus> {
    wait_on_signal(shared, request)?;
    let status = submit_to_platform(shared, resources, request)?;
    signal_complete(shared, request, status)
}

// ============================================================================
// Synchronous engine
// ============================================================================

/// Presents on the calling thread
pub(crate) struct SyncPresentEngine {
    shared: Arc<SwapchainShared>,
    resources: Mutex<Option<Box<dyn PlatformResources>>>,
}

impl SyncPresentEngine {
    pub(crate) fn new(shared: Arc<SwapchainShared>, resources: Box<dyn PlatformResources>) -> Self {
        Self {
            shared,
            resources: Mutex::new(Some(resources)),
        }
    }
}

impl PresentEngine for SyncPresentEngine {
    fn strategy(&self) -> PresentStrategy {
        PresentStrategy::Synchronous
    }

    fn submit(&self, request: PresentRequest) -> Result<PresentStatus> {
        let mut resources = lock(&self.resources);
        match resources.as_mut() {
            Some(resources) => present_request(&self.shared, resources.as_mut(), &request),
            None => Err(abandon(&self.shared, &request, Error::OutOfDate)),
        }
    }

    fn shutdown(&self) -> Result<()> {
        if let Some(mut resources) = lock(&self.resources).take() {
            resources.destroy_platform_resources();
        }
        self.shared.cond.notify_all();
        Ok(())
    }
}

// ============================================================================
// Threaded engine
// ============================================================================

/// Worker states, in the order one request moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerPhase {
    Waiting,
    Dequeue,
    WaitOnSignal,
    SubmitToPlatform,
    SignalComplete,
}

/// Loop run by the present worker thread
struct PresentWorker {
    shared: Arc<SwapchainShared>,
    resources: Box<dyn PlatformResources>,
    phase: WorkerPhase,
}

impl PresentWorker {
    fn enter(&mut self, phase: WorkerPhase) {
        layer_trace!("wsi::PresentWorker", "Swapchain {}: {:?} -> {:?}", self.shared.id, self.phase, phase);
        self.phase = phase;
    }

    fn run(mut self) {
        layer_debug!("wsi::PresentWorker", "Swapchain {}: present worker started", self.shared.id);

        loop {
            self.enter(WorkerPhase::Waiting);
            let (request, replaced) = {
                let state = self.shared.lock();
                let (mut state, _) = crate::sync::wait_until(&self.shared.cond, state, None, |s| {
                    !s.queue.is_empty() || s.shutdown
                });

                // Shutdown only ends the loop once the queue is drained
                let Some(mut request) = state.queue.pop_front() else {
                    break;
                };
                let mut replaced = Vec::new();
                if self.shared.config.present_mode == ash::vk::PresentModeKHR::MAILBOX {
                    while let Some(newer) = state.queue.pop_front() {
                        replaced.push(std::mem::replace(&mut request, newer));
                    }
                }
                (request, replaced)
            };
            self.enter(WorkerPhase::Dequeue);

            for old in &replaced {
                if let Err(error) = discard(&self.shared, old) {
                    self.shared.lock().defer_error(error);
                }
            }

            if let Err(error) = self.process(&request) {
                self.shared.lock().defer_error(error);
            }
            self.shared.cond.notify_all();
        }

        self.resources.destroy_platform_resources();
        self.shared.cond.notify_all();
        layer_debug!("wsi::PresentWorker", "Swapchain {}: present worker stopped", self.shared.id);
    }

    fn process(&mut self, request: &PresentRequest) -> Result<PresentStatus> {
        self.enter(WorkerPhase::WaitOnSignal);
        wait_on_signal(&self.shared, request)?;
        self.enter(WorkerPhase::SubmitToPlatform);
        let status = submit_to_platform(&self.shared, self.resources.as_mut(), request)?;
        self.enter(WorkerPhase::SignalComplete);
        signal_complete(&self.shared, request, status)
    }
}

/// Presents from a dedicated background thread
pub(crate) struct ThreadedPresentEngine {
    shared: Arc<SwapchainShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadedPresentEngine {
    /// Start the worker; it owns `resources` until shutdown
    pub(crate) fn spawn(shared: Arc<SwapchainShared>, resources: Box<dyn PlatformResources>) -> Result<Self> {
        let worker = PresentWorker {
            shared: shared.clone(),
            resources,
            phase: WorkerPhase::Waiting,
        };
        let handle = thread::Builder::new()
            .name(format!("wsi-present-{}", shared.id))
            .spawn(move || worker.run())
            .map_err(|e| {
                layer_error!("wsi::PresentWorker", "Failed to spawn present worker: {}", e);
                Error::OutOfHostMemory
            })?;

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }
}

impl PresentEngine for ThreadedPresentEngine {
    fn strategy(&self) -> PresentStrategy {
        PresentStrategy::Threaded
    }

    fn submit(&self, request: PresentRequest) -> Result<PresentStatus> {
        let mut state = self.shared.lock();
        if state.shutdown {
            drop(state);
            return Err(abandon(&self.shared, &request, Error::OutOfDate));
        }
        state.queue.push_back(request);
        let status = if state.suboptimal { PresentStatus::Suboptimal } else { PresentStatus::Optimal };
        drop(state);
        self.shared.cond.notify_all();
        Ok(status)
    }

    fn shutdown(&self) -> Result<()> {
        self.shared.lock().shutdown = true;
        self.shared.cond.notify_all();

        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| layer_err!("wsi::PresentWorker", "Swapchain {}: present worker panicked", self.shared.id))?;
        }
        Ok(())
    }
}
