/// Instance context - platforms, surfaces and devices
///
/// Created from the application's enabled instance extensions. Surfaces and
/// devices are registered against the raw handles the application uses for
/// them, so later calls can look them up.

use std::sync::Arc;
use crate::backend::{AllocatorBackend, PlatformBackend};
use crate::config::LayerConfig;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::platform::{
    device_extensions_required_by_layer, find_enabled_layer_platforms,
    instance_extensions_required_by_layer, merge_extensions, PlatformSet, SURFACE_EXTENSION,
};
use crate::registry::Registry;
use crate::{layer_info, layer_warn};

/// Layer state for one instance
pub struct Instance {
    platforms: PlatformSet,
    enabled_extensions: Vec<String>,
    config: LayerConfig,
    surfaces: Registry<dyn PlatformBackend>,
    devices: Registry<Device>,
}

impl Instance {
    /// Resolve the platforms the layer handles and the extensions it adds
    ///
    /// Enabling a layer-handled surface without `VK_KHR_surface` fails with
    /// `Error::ExtensionNotPresent`.
    pub fn new<S: AsRef<str>>(enabled_extensions: &[S], config: LayerConfig) -> Result<Self> {
        let platforms = find_enabled_layer_platforms(enabled_extensions);

        let enabled_extensions = if platforms.is_empty() {
            merge_extensions(enabled_extensions, &[])
        } else {
            if !enabled_extensions.iter().any(|e| e.as_ref() == SURFACE_EXTENSION) {
                return Err(Error::ExtensionNotPresent(SURFACE_EXTENSION.to_string()));
            }
            merge_extensions(enabled_extensions, &instance_extensions_required_by_layer(platforms))
        };

        layer_info!("wsi::Instance", "Layer platforms: {:?}", platforms);
        Ok(Self {
            platforms,
            enabled_extensions,
            config,
            surfaces: Registry::new("surface"),
            devices: Registry::new("device"),
        })
    }

    /// Platforms the layer handles on this instance
    pub fn platforms(&self) -> PlatformSet {
        self.platforms
    }

    /// Application extensions plus the ones the layer added
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    pub fn is_extension_enabled(&self, name: &str) -> bool {
        self.enabled_extensions.iter().any(|e| e == name)
    }

    pub fn register_surface(&self, handle: u64, surface: Arc<dyn PlatformBackend>) -> Result<()> {
        self.surfaces.associate(handle, surface)
    }

    pub fn surface(&self, handle: u64) -> Result<Arc<dyn PlatformBackend>> {
        self.surfaces.get(handle)
    }

    /// Forget a surface; swapchains still bound to it report `SurfaceLost`
    pub fn destroy_surface(&self, handle: u64) -> Result<()> {
        self.surfaces.disassociate(handle).map(drop)
    }

    /// Register a device created on this instance
    ///
    /// `available` lists the physical device's extensions; the layer adds
    /// the ones its platforms need and fails if any is missing.
    pub fn create_device<S: AsRef<str>, A: AsRef<str>>(
        &self,
        handle: u64,
        allocator: Arc<dyn AllocatorBackend>,
        enabled_extensions: &[S],
        available: &[A],
    ) -> Result<Arc<Device>> {
        let required = device_extensions_required_by_layer(self.platforms, available)?;
        let enabled = merge_extensions(enabled_extensions, &required);
        let device = Arc::new(Device::new(allocator, enabled, self.config.clone()));
        self.devices.associate(handle, device.clone())?;
        Ok(device)
    }

    pub fn device(&self, handle: u64) -> Result<Arc<Device>> {
        self.devices.get(handle)
    }

    /// Forget a device and destroy its swapchains
    pub fn destroy_device(&self, handle: u64) -> Result<()> {
        self.devices.disassociate(handle)?.destroy_all();
        Ok(())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        let devices = self.devices.drain();
        if !devices.is_empty() {
            layer_warn!("wsi::Instance", "{} devices still registered at instance destruction", devices.len());
        }
        for (_, device) in devices {
            device.destroy_all();
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
