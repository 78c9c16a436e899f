/// Collaborator contracts - allocator and platform backends
///
/// The layer never allocates image memory or talks to a display system
/// itself. Both concerns go through the traits defined here, so any driver
/// and any windowing system can be plugged in underneath the swapchain core.

pub mod allocator;
pub mod platform;

pub use allocator::*;
pub use platform::*;

// Mock collaborators for tests (no GPU or display required)
#[cfg(test)]
pub mod mock_backend;
