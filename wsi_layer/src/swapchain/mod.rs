/// Swapchain core - image pool, negotiation, present engines and the façade

pub mod capabilities;
pub mod image;
pub mod image_pool;
pub(crate) mod present_engine;
#[allow(clippy::module_inception)]
pub mod swapchain;

pub use capabilities::*;
pub use image::*;
pub use image_pool::ImagePool;
pub use swapchain::{ImageReleaser, PresentInfo, Swapchain, SwapchainStatus};
