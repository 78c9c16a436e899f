/// Swapchain image types

use crate::backend::BackingImage;

/// Lifecycle state of a presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageState {
    /// Owned by the layer, ready to be acquired
    Free,
    /// Owned by the application
    Acquired,
    /// Queued for presentation, not yet handed to the platform
    PendingPresent,
    /// Handed to the platform, not yet released back
    PresentedAwaitingRelease,
}

impl ImageState {
    /// Stable name used in errors and logs
    pub fn name(self) -> &'static str {
        match self {
            ImageState::Free => "FREE",
            ImageState::Acquired => "ACQUIRED",
            ImageState::PendingPresent => "PENDING_PRESENT",
            ImageState::PresentedAwaitingRelease => "PRESENTED_AWAITING_RELEASE",
        }
    }

    /// Owned by the presentation path (queued or on the display)
    pub fn is_in_flight(self) -> bool {
        matches!(self, ImageState::PendingPresent | ImageState::PresentedAwaitingRelease)
    }
}

/// A presentable image as reported by `get_images`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainImage {
    /// Index, stable for the swapchain lifetime
    pub index: u32,
    /// Backing storage
    pub backing: BackingImage,
}

/// Number of images in each state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub free: u32,
    pub acquired: u32,
    pub pending_present: u32,
    pub presented_awaiting_release: u32,
}

impl StateCounts {
    /// Sum over all states (always the pool size)
    pub fn total(&self) -> u32 {
        self.free + self.acquired + self.pending_present + self.presented_awaiting_release
    }

    /// Images owned by the presentation path
    pub fn in_flight(&self) -> u32 {
        self.pending_present + self.presented_awaiting_release
    }
}
