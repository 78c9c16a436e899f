/// Platform discovery - which surfaces the layer handles and what it needs
///
/// At instance creation the layer looks at the surface extensions the
/// application enabled, keeps the platforms it implements, and adds the
/// instance and device extensions those platforms rely on.

use bitflags::bitflags;
use crate::error::{Error, Result};

/// Instance extension every layer-handled surface builds on
pub const SURFACE_EXTENSION: &str = "VK_KHR_surface";

/// Device extension exposing swapchains
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Surface extensions the layer never handles; they are passed down untouched
pub const UNSUPPORTED_SURFACE_EXTENSIONS: [&str; 3] =
    ["VK_KHR_win32_surface", "VK_EXT_metal_surface", "VK_KHR_android_surface"];

/// Window systems the layer can present to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Headless,
    Wayland,
    X11,
    Display,
}

bitflags! {
    /// Set of platforms enabled on an instance
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PlatformSet: u32 {
        const HEADLESS = 1 << 0;
        const WAYLAND = 1 << 1;
        const X11 = 1 << 2;
        const DISPLAY = 1 << 3;
    }
}

impl Platform {
    pub const ALL: [Platform; 4] = [Platform::Headless, Platform::Wayland, Platform::X11, Platform::Display];

    /// Surface extensions that select this platform
    pub fn surface_extensions(self) -> &'static [&'static str] {
        match self {
            Platform::Headless => &["VK_EXT_headless_surface"],
            Platform::Wayland => &["VK_KHR_wayland_surface"],
            Platform::X11 => &["VK_KHR_xcb_surface", "VK_KHR_xlib_surface"],
            Platform::Display => &["VK_KHR_display"],
        }
    }

    pub fn flag(self) -> PlatformSet {
        match self {
            Platform::Headless => PlatformSet::HEADLESS,
            Platform::Wayland => PlatformSet::WAYLAND,
            Platform::X11 => PlatformSet::X11,
            Platform::Display => PlatformSet::DISPLAY,
        }
    }

    /// Instance extensions this platform needs beyond its surface extension
    fn instance_extensions(self) -> &'static [&'static str] {
        match self {
            Platform::Headless => &[],
            Platform::Wayland | Platform::X11 => &[
                "VK_KHR_get_physical_device_properties2",
                "VK_KHR_external_memory_capabilities",
                "VK_KHR_external_fence_capabilities",
                "VK_KHR_external_semaphore_capabilities",
            ],
            Platform::Display => &["VK_KHR_get_physical_device_properties2"],
        }
    }

    /// Device extensions this platform needs to share buffers and fences
    fn device_extensions(self) -> &'static [&'static str] {
        match self {
            Platform::Headless => &[],
            Platform::Wayland | Platform::X11 => &[
                "VK_KHR_external_memory_fd",
                "VK_EXT_external_memory_dma_buf",
                "VK_EXT_image_drm_format_modifier",
                "VK_KHR_external_fence_fd",
                "VK_KHR_external_semaphore_fd",
            ],
            Platform::Display => &["VK_EXT_image_drm_format_modifier"],
        }
    }
}

impl PlatformSet {
    /// Individual platforms in the set
    pub fn platforms(self) -> impl Iterator<Item = Platform> {
        Platform::ALL.into_iter().filter(move |p| self.contains(p.flag()))
    }
}

/// Platforms the layer handles among the enabled instance extensions
pub fn find_enabled_layer_platforms<S: AsRef<str>>(extensions: &[S]) -> PlatformSet {
    let mut platforms = PlatformSet::empty();
    for platform in Platform::ALL {
        let enabled = extensions
            .iter()
            .any(|name| platform.surface_extensions().contains(&name.as_ref()));
        if enabled {
            platforms |= platform.flag();
        }
    }
    platforms
}

fn push_unique(list: &mut Vec<&'static str>, names: &[&'static str]) {
    for &name in names {
        if !list.contains(&name) {
            list.push(name);
        }
    }
}

/// Instance extensions the layer enables on top of the application's
pub fn instance_extensions_required_by_layer(platforms: PlatformSet) -> Vec<&'static str> {
    let mut required = Vec::new();
    if !platforms.is_empty() {
        push_unique(&mut required, &[SURFACE_EXTENSION]);
    }
    for platform in platforms.platforms() {
        push_unique(&mut required, platform.instance_extensions());
    }
    required
}

/// Device extensions the layer enables on top of the application's
///
/// Fails with `Error::ExtensionNotPresent` naming the first extension the
/// physical device does not offer.
pub fn device_extensions_required_by_layer<S: AsRef<str>>(
    platforms: PlatformSet,
    available: &[S],
) -> Result<Vec<&'static str>> {
    let mut required = Vec::new();
    for platform in platforms.platforms() {
        push_unique(&mut required, platform.device_extensions());
    }
    if let Some(missing) = required
        .iter()
        .find(|name| !available.iter().any(|a| a.as_ref() == **name))
    {
        return Err(Error::ExtensionNotPresent(missing.to_string()));
    }
    Ok(required)
}

/// Whether `name` is a surface extension the layer leaves to the driver
pub fn is_unsupported_surface_extension(name: &str) -> bool {
    UNSUPPORTED_SURFACE_EXTENSIONS.contains(&name)
}

/// `enabled` followed by every name of `extra` it does not already contain
pub fn merge_extensions<S: AsRef<str>>(enabled: &[S], extra: &[&str]) -> Vec<String> {
    let mut merged: Vec<String> = enabled.iter().map(|s| s.as_ref().to_string()).collect();
    for name in extra {
        if !merged.iter().any(|m| m == name) {
            merged.push(name.to_string());
        }
    }
    merged
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
