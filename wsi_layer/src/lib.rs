/*!
# WSI Layer

Vendor-agnostic swapchain core for a Vulkan-style window system integration
layer.

The layer owns the lifecycle of presentable images and schedules their
presentation. It never allocates memory or talks to a display system itself:
both go through backend traits, so the same core runs on top of any driver
and any windowing system.

## Architecture

- **Swapchain**: image pool state machine, acquire/present/release façade
- **PresentEngine**: synchronous or threaded presentation scheduling
- **Sync bridge**: completion signals and presentation timing samples
- **Backends**: `AllocatorBackend` (image storage) and `PlatformBackend`
  (surface queries and buffer hand-off)
- **Instance / Device**: handle registries and the handle-based API

A headless reference backend lives in the `wsi_layer_headless` crate.
*/

// Internal modules
mod error;
mod layer;
pub mod log;
pub mod config;
pub mod backend;
pub mod sync;
pub mod swapchain;
pub mod platform;
pub mod registry;
mod device;
mod instance;

// Main wsi namespace module
pub mod wsi {
    // Error types
    pub use crate::error::{ConfigError, Error, Result};

    // Layer-wide services (logger)
    pub use crate::layer::Layer;

    // Configuration
    pub use crate::config::{LayerConfig, PresentStrategy};

    // Contexts
    pub use crate::device::{Device, QueuePresentResult, SwapchainPresent};
    pub use crate::instance::Instance;

    // Logging sub-module (types only; the layer_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Backend contracts
    pub mod backend {
        pub use crate::backend::*;
    }

    // Swapchain core
    pub mod swapchain {
        pub use crate::swapchain::*;
    }

    // Signals and timing
    pub mod sync {
        pub use crate::sync::*;
    }

    // Platform discovery
    pub mod platform {
        pub use crate::platform::*;
    }
}

// Re-export the Vulkan type definitions used throughout the API
pub use ash::vk;
