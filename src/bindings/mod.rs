// Bindings layer
//
// Core Vulkan types come from ash. This module adds the hand-mirrored
// window-system surface extensions, the by-name extension loader they share,
// the blend attachment descriptor and the allocator function table.

pub mod blend;
pub mod loader;
pub mod vma;
pub mod wayland;
pub mod xlib;

pub use blend::ColorBlendAttachment;
pub use loader::LoadError;
pub use vma::VulkanFunctions;
pub use wayland::{WaylandSurface, WaylandSurfaceCreateInfoKHR, KHR_WAYLAND_SURFACE_EXTENSION_NAME};
pub use xlib::{XlibSurface, XlibSurfaceCreateInfoKHR, KHR_XLIB_SURFACE_EXTENSION_NAME};
