/*!
# WSI Layer - Headless Backend

Reference backends for `wsi_layer` that need neither a GPU nor a display.

- **HeadlessPlatform**: a surface whose "display" records every presented
  frame, with optional refresh pacing and displayed-buffer retention
- **HostAllocator**: backing storage in plain host memory, with an optional
  byte budget

Used to run the layer in CI and as a template for real platform backends.
*/

mod headless_surface;
mod host_allocator;

pub use headless_surface::{HeadlessConfig, HeadlessPlatform, PresentedFrame};
pub use host_allocator::HostAllocator;
