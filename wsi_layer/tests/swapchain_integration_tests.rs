//! Integration tests for the swapchain lifecycle
//!
//! These tests drive the handle-based API on top of the headless backends.
//! No GPU or display required.
//!
//! Run with: cargo test --test swapchain_integration_tests

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wsi_layer::vk;
use wsi_layer::wsi::backend::{PlatformBackend, PresentStatus};
use wsi_layer::wsi::swapchain::{ImageState, PresentInfo, SwapchainCreateInfo};
use wsi_layer::wsi::sync::{HostSignal, Signal};
use wsi_layer::wsi::{ConfigError, Device, Error, Instance, LayerConfig, PresentStrategy, SwapchainPresent};
use wsi_layer_headless::{HeadlessConfig, HeadlessPlatform, HostAllocator};

// ============================================================================
// HELPERS
// ============================================================================

const STRATEGIES: [PresentStrategy; 2] = [PresentStrategy::Synchronous, PresentStrategy::Threaded];
const NO_EXTENSIONS: [&str; 0] = [];
const SURFACE: u64 = 0x5f;
const DEVICE: u64 = 0xde;

struct Context {
    instance: Instance,
    device: Arc<Device>,
    platform: Arc<HeadlessPlatform>,
    allocator: Arc<HostAllocator>,
}

impl Context {
    fn new(strategy: PresentStrategy, device_extensions: &[&str]) -> Self {
        let config = LayerConfig { present_strategy: strategy, ..Default::default() };
        let instance = Instance::new(&["VK_KHR_surface", "VK_EXT_headless_surface"], config).unwrap();

        let platform = Arc::new(HeadlessPlatform::new(HeadlessConfig::default()));
        instance.register_surface(SURFACE, platform.clone()).unwrap();

        let allocator = Arc::new(HostAllocator::new());
        let device = instance
            .create_device(DEVICE, allocator.clone(), device_extensions, &NO_EXTENSIONS)
            .unwrap();
        Self { instance, device, platform, allocator }
    }

    fn surface(&self) -> Arc<dyn PlatformBackend> {
        self.instance.surface(SURFACE).unwrap()
    }

    fn create_swapchain(&self, info: SwapchainCreateInfo) -> u64 {
        self.device.create_swapchain(&self.surface(), &info).unwrap()
    }

    fn present(&self, swapchain: u64, image_index: u32, info: PresentInfo) -> Result<PresentStatus, Error> {
        self.device
            .queue_present(&[SwapchainPresent { swapchain, image_index, info }])
            .overall()
    }
}

fn tagged(id: u64) -> PresentInfo {
    PresentInfo { present_id: Some(id), ..Default::default() }
}

fn gated(gate: &Arc<HostSignal>) -> PresentInfo {
    PresentInfo { wait_signals: vec![gate.clone() as Arc<dyn Signal>], ..Default::default() }
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_fifo_order_and_present_wait() {
    for strategy in STRATEGIES {
        let ctx = Context::new(strategy, &["VK_KHR_swapchain", "VK_KHR_present_id", "VK_KHR_present_wait"]);
        let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());

        let mut order = Vec::new();
        for id in 1..=8 {
            let index = ctx.device.acquire_next_image(swapchain, Duration::from_secs(2), None).unwrap();
            ctx.present(swapchain, index, tagged(id)).unwrap();
            order.push(index);
        }
        ctx.device.wait_for_present(swapchain, 8, Duration::from_secs(2)).unwrap();

        let ids: Vec<Option<u64>> = ctx.platform.frames().iter().map(|f| f.present_id).collect();
        assert_eq!(ids, (1..=8).map(Some).collect::<Vec<_>>(), "{:?}", strategy);
        assert_eq!(ctx.platform.presented_indices(), order);

        ctx.device.destroy_swapchain(swapchain).unwrap();
        assert_eq!(ctx.allocator.live_allocations(), 0);
    }
}

#[test]
fn test_non_monotonic_present_id_is_rejected() {
    let ctx = Context::new(PresentStrategy::Synchronous, &["VK_KHR_swapchain", "VK_KHR_present_id"]);
    let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());

    let index = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    ctx.present(swapchain, index, tagged(5)).unwrap();
    let index = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    assert_eq!(
        ctx.present(swapchain, index, tagged(5)),
        Err(Error::Configuration(ConfigError::NonMonotonicPresentId { id: 5, last: 5 }))
    );
    let state = ctx.device.swapchain(swapchain).unwrap().image_state(index).unwrap();
    assert_eq!(state, ImageState::Acquired);
}

#[test]
fn test_mailbox_shows_newest_frame() {
    let ctx = Context::new(PresentStrategy::Threaded, &["VK_KHR_swapchain", "VK_KHR_present_id"]);
    let swapchain = ctx.create_swapchain(SwapchainCreateInfo {
        present_mode: vk::PresentModeKHR::MAILBOX,
        ..Default::default()
    });
    let gate = Arc::new(HostSignal::new());

    let first = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    let info = PresentInfo { present_id: Some(1), ..gated(&gate) };
    ctx.present(swapchain, first, info).unwrap();
    for id in [2, 3] {
        let index = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
        ctx.present(swapchain, index, tagged(id)).unwrap();
    }
    gate.signal().unwrap();
    ctx.device.destroy_swapchain(swapchain).unwrap();

    // Whether 1 was dequeued before 2 arrived is up to the worker; 2 never is
    let shown: Vec<u64> = ctx.platform.frames().iter().filter_map(|f| f.present_id).collect();
    assert_eq!(shown.last(), Some(&3));
    assert!(!shown.contains(&2));
    assert_eq!(ctx.allocator.live_allocations(), 0);
}

// ============================================================================
// ACQUIRE LIMITS
// ============================================================================

#[test]
fn test_acquire_beyond_pool_size() {
    for strategy in STRATEGIES {
        let ctx = Context::new(strategy, &["VK_KHR_swapchain"]);
        let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());

        for _ in 0..3 {
            ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
        }
        assert_eq!(ctx.device.acquire_next_image(swapchain, Duration::ZERO, None), Err(Error::NotReady));
        assert_eq!(
            ctx.device.acquire_next_image(swapchain, Duration::from_millis(10), None),
            Err(Error::Timeout)
        );
        // Nothing is in flight, so an unbounded wait could never finish
        assert_eq!(ctx.device.acquire_next_image(swapchain, Duration::MAX, None), Err(Error::Timeout));
    }
}

#[test]
fn test_acquire_signal_fires() {
    let ctx = Context::new(PresentStrategy::Threaded, &["VK_KHR_swapchain"]);
    let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());
    let acquired: Arc<dyn Signal> = Arc::new(HostSignal::new());

    ctx.device.acquire_next_image(swapchain, Duration::ZERO, Some(&acquired)).unwrap();
    acquired.wait(Duration::from_secs(1)).unwrap();
}

#[test]
fn test_blocked_acquire_wakes_on_release() {
    let ctx = Context::new(PresentStrategy::Threaded, &["VK_KHR_swapchain"]);
    let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());
    let gate = Arc::new(HostSignal::new());

    let first = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    ctx.present(swapchain, first, gated(&gate)).unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            gate.signal().unwrap();
        });
        let index = ctx.device.acquire_next_image(swapchain, Duration::from_secs(5), None).unwrap();
        assert_eq!(index, first);
    });
}

// ============================================================================
// RELEASE WITHOUT PRESENT
// ============================================================================

#[test]
fn test_release_images_then_double_release() {
    let ctx = Context::new(
        PresentStrategy::Synchronous,
        &["VK_KHR_swapchain", "VK_EXT_swapchain_maintenance1"],
    );
    let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());

    let a = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    let b = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    ctx.device.release_swapchain_images(swapchain, &[a, b]).unwrap();
    assert_eq!(ctx.device.get_swapchain_state_counts(swapchain).unwrap().free, 3);

    assert!(matches!(
        ctx.device.release_swapchain_images(swapchain, &[a]),
        Err(Error::Configuration(ConfigError::InvalidImageState { .. }))
    ));

    ctx.device.destroy_swapchain(swapchain).unwrap();
    assert_eq!(ctx.allocator.live_allocations(), 0);
    assert!(ctx.platform.frames().is_empty());
}

// ============================================================================
// TEARDOWN
// ============================================================================

#[test]
fn test_destroy_drains_pending_presents() {
    for strategy in STRATEGIES {
        let ctx = Context::new(strategy, &["VK_KHR_swapchain"]);
        let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());
        let gate = Arc::new(HostSignal::new());

        let mut queued = Vec::new();
        thread::scope(|scope| {
            if strategy == PresentStrategy::Synchronous {
                gate.signal().unwrap();
            } else {
                scope.spawn(|| {
                    thread::sleep(Duration::from_millis(30));
                    gate.signal().unwrap();
                });
            }
            for _ in 0..3 {
                let index = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
                ctx.present(swapchain, index, gated(&gate)).unwrap();
                queued.push(index);
            }
            ctx.device.destroy_swapchain(swapchain).unwrap();
        });

        assert_eq!(ctx.platform.presented_indices(), queued, "{:?}", strategy);
        assert_eq!(ctx.allocator.live_allocations(), 0);
        assert_eq!(ctx.platform.live_resources(), 0);
    }
}

#[test]
fn test_destroy_device_frees_swapchains() {
    let ctx = Context::new(PresentStrategy::Threaded, &["VK_KHR_swapchain"]);
    ctx.create_swapchain(SwapchainCreateInfo::default());
    ctx.create_swapchain(SwapchainCreateInfo::default());
    assert_eq!(ctx.allocator.live_allocations(), 6);

    ctx.instance.destroy_device(DEVICE).unwrap();
    assert_eq!(ctx.device.swapchain_count(), 0);
    assert_eq!(ctx.allocator.live_allocations(), 0);
    assert_eq!(ctx.platform.live_resources(), 0);
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn test_unsupported_format_allocates_nothing() {
    let ctx = Context::new(PresentStrategy::Synchronous, &["VK_KHR_swapchain"]);
    let info = SwapchainCreateInfo {
        surface_format: vk::SurfaceFormatKHR {
            format: vk::Format::R5G6B5_UNORM_PACK16,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        ..Default::default()
    };
    assert_eq!(
        ctx.device.create_swapchain(&ctx.surface(), &info),
        Err(Error::Configuration(ConfigError::UnsupportedFormat(vk::Format::R5G6B5_UNORM_PACK16)))
    );
    assert_eq!(ctx.allocator.live_allocations(), 0);
    assert_eq!(ctx.device.swapchain_count(), 0);
}

#[test]
fn test_device_loss_abandons_presents() {
    let ctx = Context::new(PresentStrategy::Synchronous, &["VK_KHR_swapchain"]);
    let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());
    let gate = Arc::new(HostSignal::new());
    gate.mark_lost();

    let index = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();
    assert_eq!(ctx.present(swapchain, index, gated(&gate)), Err(Error::DeviceLost));
    assert_eq!(ctx.device.acquire_next_image(swapchain, Duration::ZERO, None), Err(Error::DeviceLost));
    assert_eq!(ctx.device.get_swapchain_status(swapchain), Err(Error::DeviceLost));
    assert!(ctx.platform.frames().is_empty());

    ctx.device.destroy_swapchain(swapchain).unwrap();
    assert_eq!(ctx.allocator.live_allocations(), 0);
}

#[test]
fn test_destroyed_surface_reports_surface_lost() {
    let ctx = Context::new(PresentStrategy::Synchronous, &["VK_KHR_swapchain"]);
    let swapchain = ctx.create_swapchain(SwapchainCreateInfo::default());
    let index = ctx.device.acquire_next_image(swapchain, Duration::ZERO, None).unwrap();

    let Context { instance, device, platform, allocator } = ctx;
    drop(platform);
    instance.destroy_surface(SURFACE).unwrap();

    let result = device.queue_present(&[SwapchainPresent {
        swapchain,
        image_index: index,
        info: PresentInfo::default(),
    }]);
    assert_eq!(result.overall(), Err(Error::SurfaceLost));
    assert_eq!(device.acquire_next_image(swapchain, Duration::ZERO, None), Err(Error::SurfaceLost));

    device.destroy_swapchain(swapchain).unwrap();
    assert_eq!(allocator.live_allocations(), 0);
}
