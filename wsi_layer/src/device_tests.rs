//! Unit tests for device.rs

use super::*;
use crate::backend::mock_backend::{EventLog, MockAllocator, MockEvent, MockPlatform};
use crate::config::PresentStrategy;
use crate::error::ConfigError;

fn device_with(extensions: &[&str]) -> (Device, Arc<dyn PlatformBackend>, Arc<MockAllocator>, EventLog) {
    let events = EventLog::default();
    let allocator = Arc::new(MockAllocator::new(events.clone()));
    let surface: Arc<dyn PlatformBackend> = Arc::new(MockPlatform::new(events.clone()));
    let enabled = extensions.iter().map(|e| e.to_string()).collect();
    let config = LayerConfig { present_strategy: PresentStrategy::Synchronous, ..Default::default() };
    (Device::new(allocator.clone(), enabled, config), surface, allocator, events)
}

#[test]
fn test_features_resolved_from_extensions() {
    let (device, _, _, _) = device_with(&["VK_KHR_swapchain", "VK_KHR_present_id", "VK_KHR_present_wait"]);
    assert_eq!(device.features(), SwapchainFeatures::PRESENT_ID | SwapchainFeatures::PRESENT_WAIT);
    assert!(device.is_extension_enabled("VK_KHR_present_id"));
    assert!(!device.is_extension_enabled("VK_EXT_swapchain_maintenance1"));
}

#[test]
fn test_swapchain_handle_lifecycle() {
    let (device, surface, allocator, _) = device_with(&["VK_KHR_swapchain"]);
    let handle = device.create_swapchain(&surface, &SwapchainCreateInfo::default()).unwrap();
    assert_eq!(device.swapchain_count(), 1);
    assert_eq!(device.get_swapchain_images(handle).unwrap().len(), 3);
    assert_eq!(device.swapchain(handle).unwrap().strategy(), PresentStrategy::Synchronous);

    let index = device.acquire_next_image(handle, Duration::ZERO, None).unwrap();
    assert_eq!(device.get_swapchain_state_counts(handle).unwrap().acquired, 1);
    let result = device.queue_present(&[SwapchainPresent {
        swapchain: handle,
        image_index: index,
        info: PresentInfo::default(),
    }]);
    assert_eq!(result.overall(), Ok(PresentStatus::Optimal));
    assert_eq!(device.get_swapchain_status(handle), Ok(PresentStatus::Optimal));

    device.destroy_swapchain(handle).unwrap();
    assert_eq!(allocator.live_count(), 0);
    assert_eq!(device.get_swapchain_images(handle).err(), Some(Error::InvalidHandle(handle)));
    assert_eq!(device.destroy_swapchain(handle), Err(Error::InvalidHandle(handle)));
}

#[test]
fn test_failed_creation_issues_no_handle() {
    let (device, surface, _, events) = device_with(&["VK_KHR_swapchain"]);
    let info = SwapchainCreateInfo { min_image_count: 1, ..Default::default() };
    assert!(matches!(
        device.create_swapchain(&surface, &info),
        Err(Error::Configuration(ConfigError::ImageCountOutOfRange { .. }))
    ));
    assert_eq!(device.swapchain_count(), 0);
    assert!(events.events().is_empty());
}

#[test]
fn test_queue_present_across_swapchains() {
    let (device, surface, _, events) = device_with(&["VK_KHR_swapchain"]);
    let first = device.create_swapchain(&surface, &SwapchainCreateInfo::default()).unwrap();
    let second = device.create_swapchain(&surface, &SwapchainCreateInfo::default()).unwrap();
    let a = device.acquire_next_image(first, Duration::ZERO, None).unwrap();
    let b = device.acquire_next_image(second, Duration::ZERO, None).unwrap();

    let result = device.queue_present(&[
        SwapchainPresent { swapchain: first, image_index: a, info: PresentInfo::default() },
        SwapchainPresent { swapchain: 0xdead, image_index: 0, info: PresentInfo::default() },
        SwapchainPresent { swapchain: second, image_index: b, info: PresentInfo::default() },
    ]);
    assert_eq!(result.results[0], Ok(PresentStatus::Optimal));
    assert_eq!(result.results[1], Err(Error::InvalidHandle(0xdead)));
    assert_eq!(result.results[2], Ok(PresentStatus::Optimal));
    assert_eq!(result.overall(), Err(Error::InvalidHandle(0xdead)));
    assert_eq!(events.count(|e| matches!(e, MockEvent::Present { .. })), 2);
}

#[test]
fn test_overall_result_priorities() {
    let result = QueuePresentResult {
        results: vec![Err(Error::OutOfDate), Err(Error::DeviceLost), Ok(PresentStatus::Optimal)],
    };
    assert_eq!(result.overall(), Err(Error::DeviceLost));

    let result = QueuePresentResult {
        results: vec![Ok(PresentStatus::Optimal), Ok(PresentStatus::Suboptimal)],
    };
    assert_eq!(result.overall(), Ok(PresentStatus::Suboptimal));
}

#[test]
fn test_feature_gated_calls() {
    let (device, surface, _, _) = device_with(&["VK_KHR_swapchain"]);
    let handle = device.create_swapchain(&surface, &SwapchainCreateInfo::default()).unwrap();
    assert!(device.wait_for_present(handle, 1, Duration::ZERO).is_err());
    assert!(device.set_present_timing_queue_size(handle, 4).is_err());
    assert!(device.release_swapchain_images(handle, &[0]).is_err());
    assert!(device.get_past_presentation_timing(handle).unwrap().is_empty());
}

#[test]
fn test_timing_through_device() {
    let (device, surface, _, _) = device_with(&["VK_KHR_present_id", "VK_EXT_present_timing"]);
    let handle = device.create_swapchain(&surface, &SwapchainCreateInfo::default()).unwrap();
    device.set_present_timing_queue_size(handle, 4).unwrap();

    let index = device.acquire_next_image(handle, Duration::ZERO, None).unwrap();
    let info = PresentInfo { present_id: Some(9), ..Default::default() };
    let result = device.queue_present(&[SwapchainPresent { swapchain: handle, image_index: index, info }]);
    result.overall().unwrap();

    let timing = device.get_past_presentation_timing(handle).unwrap();
    assert_eq!(timing.len(), 1);
    assert_eq!(timing[0].present_id, 9);
}

#[test]
fn test_destroy_all_frees_every_swapchain() {
    let (device, surface, allocator, events) = device_with(&["VK_KHR_swapchain"]);
    device.create_swapchain(&surface, &SwapchainCreateInfo::default()).unwrap();
    device.create_swapchain(&surface, &SwapchainCreateInfo::default()).unwrap();
    assert_eq!(allocator.live_count(), 6);

    drop(device);
    assert_eq!(allocator.live_count(), 0);
    assert_eq!(events.count(|e| *e == MockEvent::DestroyResources), 2);
}
