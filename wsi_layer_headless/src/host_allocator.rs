/// HostAllocator - swapchain image storage in host memory

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use rustc_hash::FxHashMap;
use ash::vk;
use wsi_layer::wsi::backend::{AllocatorBackend, BackingImage, ImageDescription};
use wsi_layer::wsi::{ConfigError, Error, Result};
use wsi_layer::{layer_debug, layer_warn};

/// Row pitch alignment in bytes
const ROW_ALIGNMENT: u32 = 64;

/// Allocator backend keeping every image as a zeroed byte buffer
///
/// Handles are never reused while the allocator lives.
pub struct HostAllocator {
    buffers: Mutex<FxHashMap<u64, Vec<u8>>>,
    next_handle: AtomicU64,
    budget: Option<u64>,
}

impl HostAllocator {
    /// Allocator without a memory budget
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(FxHashMap::default()),
            next_handle: AtomicU64::new(1),
            budget: None,
        }
    }

    /// Allocator failing with `OutOfDeviceMemory` past `bytes` in use
    pub fn with_budget(bytes: u64) -> Self {
        Self { budget: Some(bytes), ..Self::new() }
    }

    /// Size of one texel, for the formats this allocator can store
    pub fn bytes_per_pixel(format: vk::Format) -> Option<u32> {
        match format {
            vk::Format::R5G6B5_UNORM_PACK16 | vk::Format::B5G6R5_UNORM_PACK16 => Some(2),
            vk::Format::R8G8B8A8_UNORM
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::B8G8R8A8_UNORM
            | vk::Format::B8G8R8A8_SRGB
            | vk::Format::A2R10G10B10_UNORM_PACK32
            | vk::Format::A2B10G10R10_UNORM_PACK32 => Some(4),
            vk::Format::R16G16B16A16_SFLOAT => Some(8),
            _ => None,
        }
    }

    /// Number of images currently allocated
    pub fn live_allocations(&self) -> usize {
        self.buffers().len()
    }

    /// Bytes currently allocated
    pub fn bytes_in_use(&self) -> u64 {
        self.buffers().values().map(|b| b.len() as u64).sum()
    }

    /// Run `f` on the pixels of a live image
    pub fn with_pixels<R>(&self, handle: u64, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        self.buffers().get_mut(&handle).map(|pixels| f(pixels))
    }

    fn buffers(&self) -> MutexGuard<'_, FxHashMap<u64, Vec<u8>>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HostAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn zeroed(size: usize) -> Result<Vec<u8>> {
    let mut pixels = Vec::new();
    pixels.try_reserve_exact(size).map_err(|_| Error::OutOfHostMemory)?;
    pixels.resize(size, 0);
    Ok(pixels)
}

impl AllocatorBackend for HostAllocator {
    fn allocate(&self, description: &ImageDescription, count: u32) -> Result<Vec<BackingImage>> {
        let bpp = Self::bytes_per_pixel(description.format)
            .ok_or(Error::Configuration(ConfigError::UnsupportedFormat(description.format)))?;

        let row_pitch = (description.extent.width * bpp).next_multiple_of(ROW_ALIGNMENT);
        let size = row_pitch as u64 * description.extent.height as u64 * description.array_layers as u64;

        let mut buffers = self.buffers();
        if let Some(budget) = self.budget {
            let in_use: u64 = buffers.values().map(|b| b.len() as u64).sum();
            if in_use + size * count as u64 > budget {
                layer_warn!(
                    "wsi::HostAllocator",
                    "Allocation of {} x {} bytes exceeds budget ({} of {} in use)",
                    count, size, in_use, budget
                );
                return Err(Error::OutOfDeviceMemory);
            }
        }

        // All-or-nothing: build every buffer before publishing any handle
        let mut fresh = Vec::with_capacity(count as usize);
        for _ in 0..count {
            fresh.push(zeroed(size as usize)?);
        }

        let images = fresh
            .into_iter()
            .map(|pixels| {
                let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
                buffers.insert(handle, pixels);
                BackingImage { handle, modifier: None, size, row_pitch }
            })
            .collect();

        layer_debug!(
            "wsi::HostAllocator",
            "Allocated {} images of {}x{} {:?} ({} bytes each)",
            count, description.extent.width, description.extent.height, description.format, size
        );
        Ok(images)
    }

    fn free(&self, images: &[BackingImage]) {
        let mut buffers = self.buffers();
        for image in images {
            if buffers.remove(&image.handle).is_none() {
                layer_warn!("wsi::HostAllocator", "Free of unknown image 0x{:x}", image.handle);
            }
        }
    }
}
