/// Image pool - the fixed array of presentable images and their states
///
/// Every transition goes through [`ImagePool::transition`], which checks the
/// current state, so each image is in exactly one state at any instant. The
/// pool itself is not synchronized; the swapchain keeps it behind its mutex.

use crate::backend::{AllocatorBackend, BackingImage, ImageDescription};
use crate::error::{ConfigError, Result};
use crate::layer_error;
use super::image::{ImageState, StateCounts, SwapchainImage};

#[derive(Debug)]
struct ImageSlot {
    state: ImageState,
    backing: BackingImage,
    present_id: Option<u64>,
}

/// Fixed-size pool of presentable images
#[derive(Debug)]
pub struct ImagePool {
    slots: Vec<ImageSlot>,
    /// Cleared once the backing storage has been handed back for freeing
    owns_backing: bool,
}

impl ImagePool {
    /// Allocate `count` backing images and start every image FREE
    ///
    /// Fails without leaving anything allocated. An allocator that returns
    /// the wrong number of images has whatever it returned freed again.
    pub fn create(
        allocator: &dyn AllocatorBackend,
        description: &ImageDescription,
        count: u32,
    ) -> Result<Self> {
        if count == 0 {
            return Err(ConfigError::ImageCountOutOfRange { requested: 0, min: 1, max: 0 }.into());
        }

        let backing = allocator.allocate(description, count)?;
        if backing.len() != count as usize {
            layer_error!("wsi::ImagePool",
                "Allocator returned {} images, {} requested", backing.len(), count);
            allocator.free(&backing);
            return Err(ConfigError::InvalidParameter(format!(
                "allocator returned {} of {} images", backing.len(), count
            ))
            .into());
        }

        Ok(Self::from_backing(backing))
    }

    /// Build a pool over already allocated storage
    pub(crate) fn from_backing(backing: Vec<BackingImage>) -> Self {
        let slots = backing
            .into_iter()
            .map(|backing| ImageSlot {
                state: ImageState::Free,
                backing,
                present_id: None,
            })
            .collect();
        Self { slots, owns_backing: true }
    }

    /// Number of images
    pub fn len(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Whether the pool is empty (never true for a created pool)
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// State of one image
    pub fn state(&self, index: u32) -> Result<ImageState> {
        Ok(self.slot(index)?.state)
    }

    /// Backing storage of one image
    pub fn backing(&self, index: u32) -> Result<BackingImage> {
        Ok(self.slot(index)?.backing)
    }

    /// Present id of the last present queued for this image
    pub fn present_id(&self, index: u32) -> Result<Option<u64>> {
        Ok(self.slot(index)?.present_id)
    }

    pub(crate) fn set_present_id(&mut self, index: u32, present_id: Option<u64>) -> Result<()> {
        self.slot_mut(index)?.present_id = present_id;
        Ok(())
    }

    /// Lowest-index FREE image
    pub fn find_free(&self) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.state == ImageState::Free)
            .map(|index| index as u32)
    }

    /// Move an image to `to` if it is currently in one of `from`
    ///
    /// Returns the previous state; on mismatch nothing changes and a
    /// configuration error naming the actual state is returned.
    pub fn transition(&mut self, index: u32, from: &[ImageState], to: ImageState) -> Result<ImageState> {
        let slot = self.slot_mut(index)?;
        let previous = slot.state;
        if !from.contains(&previous) {
            return Err(ConfigError::InvalidImageState { index, state: previous.name() }.into());
        }
        slot.state = to;
        Ok(previous)
    }

    /// Force every in-flight image back to FREE (device lost)
    pub(crate) fn abandon_in_flight(&mut self) -> u32 {
        let mut abandoned = 0;
        for slot in self.slots.iter_mut().filter(|slot| slot.state.is_in_flight()) {
            slot.state = ImageState::Free;
            abandoned += 1;
        }
        abandoned
    }

    /// Number of images in each state
    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for slot in &self.slots {
            match slot.state {
                ImageState::Free => counts.free += 1,
                ImageState::Acquired => counts.acquired += 1,
                ImageState::PendingPresent => counts.pending_present += 1,
                ImageState::PresentedAwaitingRelease => counts.presented_awaiting_release += 1,
            }
        }
        counts
    }

    /// Image descriptors in index order
    pub fn images(&self) -> Vec<SwapchainImage> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| SwapchainImage { index: index as u32, backing: slot.backing })
            .collect()
    }

    /// Hand the backing storage over for freeing
    ///
    /// Returns the storage on the first call and nothing afterwards, so the
    /// storage can be freed at most once.
    pub(crate) fn take_backing(&mut self) -> Vec<BackingImage> {
        if !self.owns_backing {
            return Vec::new();
        }
        self.owns_backing = false;
        self.slots.iter().map(|slot| slot.backing).collect()
    }

    fn slot(&self, index: u32) -> Result<&ImageSlot> {
        let count = self.len();
        self.slots
            .get(index as usize)
            .ok_or_else(|| ConfigError::ImageIndexOutOfRange { index, count }.into())
    }

    fn slot_mut(&mut self, index: u32) -> Result<&mut ImageSlot> {
        let count = self.len();
        self.slots
            .get_mut(index as usize)
            .ok_or_else(|| ConfigError::ImageIndexOutOfRange { index, count }.into())
    }
}

#[cfg(test)]
#[path = "image_pool_tests.rs"]
mod tests;
