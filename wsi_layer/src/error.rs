//! Error types for the WSI layer
//!
//! Every fallible layer operation returns [`Result`]. The variants follow the
//! error taxonomy of the presentation engine: configuration errors fail the
//! call without leaving partial state, transient errors are returned for the
//! caller to retry, degradations are irreversible, resource exhaustion fails
//! only the specific call, and device loss abandons outstanding work.

use std::fmt;
use ash::vk;

/// Result type for WSI layer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a request was rejected as invalid for the current configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Requested format/color space pair is not reported by the surface
    UnsupportedFormat(vk::Format),
    /// Requested present mode is not reported by the surface
    UnsupportedPresentMode(vk::PresentModeKHR),
    /// Requested image count is outside the surface limits (max 0 = unbounded)
    ImageCountOutOfRange { requested: u32, min: u32, max: u32 },
    /// Requested usage flags are not a subset of the supported usage
    UnsupportedUsage(vk::ImageUsageFlags),
    /// Requested extent lies outside the surface extent bounds
    ExtentOutOfRange(vk::Extent2D),
    /// Array layer count is zero or above the surface maximum
    InvalidArrayLayers(u32),
    /// A feature was requested without the matching extension being enabled
    FeatureNotEnabled(&'static str),
    /// Image index is not part of the swapchain
    ImageIndexOutOfRange { index: u32, count: u32 },
    /// Image is not in the state the operation requires
    InvalidImageState { index: u32, state: &'static str },
    /// Present id is zero or not greater than the previous one
    NonMonotonicPresentId { id: u64, last: u64 },
    /// Any other invalid parameter
    InvalidParameter(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnsupportedFormat(format) => write!(f, "unsupported format {:?}", format),
            ConfigError::UnsupportedPresentMode(mode) => write!(f, "unsupported present mode {:?}", mode),
            ConfigError::ImageCountOutOfRange { requested, min, max } => {
                write!(f, "image count {} outside [{}, {}]", requested, min, max)
            }
            ConfigError::UnsupportedUsage(usage) => write!(f, "unsupported image usage {:?}", usage),
            ConfigError::ExtentOutOfRange(extent) => {
                write!(f, "extent {}x{} outside surface bounds", extent.width, extent.height)
            }
            ConfigError::InvalidArrayLayers(layers) => write!(f, "invalid array layer count {}", layers),
            ConfigError::FeatureNotEnabled(feature) => write!(f, "feature {} is not enabled", feature),
            ConfigError::ImageIndexOutOfRange { index, count } => {
                write!(f, "image index {} out of range (count: {})", index, count)
            }
            ConfigError::InvalidImageState { index, state } => {
                write!(f, "image {} is in state {}", index, state)
            }
            ConfigError::NonMonotonicPresentId { id, last } => {
                write!(f, "present id {} must be greater than {}", id, last)
            }
            ConfigError::InvalidParameter(msg) => write!(f, "{}", msg),
        }
    }
}

/// WSI layer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid parameters or unsupported configuration
    Configuration(ConfigError),

    /// No image was available and the caller asked not to wait
    NotReady,

    /// The wait expired before the condition was met
    Timeout,

    /// The swapchain no longer matches its surface; recreate it
    OutOfDate,

    /// The surface is gone
    SurfaceLost,

    /// Host allocation failed
    OutOfHostMemory,

    /// Backing storage allocation failed
    OutOfDeviceMemory,

    /// The device was lost; outstanding work is abandoned
    DeviceLost,

    /// Handle does not refer to a live object
    InvalidHandle(u64),

    /// A required extension is missing
    ExtensionNotPresent(String),

    /// Platform I/O failure reported by a backend
    Platform(String),
}

impl Error {
    /// Recoverable condition the caller may retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::NotReady | Error::Timeout)
    }

    /// Irreversible condition; only destroy/recreate is permitted afterward
    pub fn is_degradation(&self) -> bool {
        matches!(self, Error::OutOfDate | Error::SurfaceLost | Error::DeviceLost)
    }

    /// Allocation failure that only fails the current call
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Error::OutOfHostMemory | Error::OutOfDeviceMemory)
    }

    /// The API result code reported to the application for this error
    pub fn vk_result(&self) -> vk::Result {
        match self {
            Error::Configuration(ConfigError::UnsupportedFormat(_)) => vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            Error::Configuration(ConfigError::FeatureNotEnabled(_)) => vk::Result::ERROR_FEATURE_NOT_PRESENT,
            Error::Configuration(_) => vk::Result::ERROR_INITIALIZATION_FAILED,
            Error::NotReady => vk::Result::NOT_READY,
            Error::Timeout => vk::Result::TIMEOUT,
            Error::OutOfDate => vk::Result::ERROR_OUT_OF_DATE_KHR,
            Error::SurfaceLost => vk::Result::ERROR_SURFACE_LOST_KHR,
            Error::OutOfHostMemory => vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            Error::OutOfDeviceMemory => vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            Error::DeviceLost => vk::Result::ERROR_DEVICE_LOST,
            Error::InvalidHandle(_) => vk::Result::ERROR_UNKNOWN,
            Error::ExtensionNotPresent(_) => vk::Result::ERROR_EXTENSION_NOT_PRESENT,
            Error::Platform(_) => vk::Result::ERROR_UNKNOWN,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Error::Configuration(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(err) => write!(f, "Configuration error: {}", err),
            Error::NotReady => write!(f, "Not ready"),
            Error::Timeout => write!(f, "Timeout"),
            Error::OutOfDate => write!(f, "Swapchain out of date"),
            Error::SurfaceLost => write!(f, "Surface lost"),
            Error::OutOfHostMemory => write!(f, "Out of host memory"),
            Error::OutOfDeviceMemory => write!(f, "Out of device memory"),
            Error::DeviceLost => write!(f, "Device lost"),
            Error::InvalidHandle(handle) => write!(f, "Invalid handle: {:#x}", handle),
            Error::ExtensionNotPresent(name) => write!(f, "Extension not present: {}", name),
            Error::Platform(msg) => write!(f, "Platform error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
