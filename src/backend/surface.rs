// Platform surfaces
//
// Wayland and Xlib surfaces are created through the hand-mirrored extension
// loaders in `crate::bindings`; Win32 goes through ash's loader.

use crate::bindings::wayland::{WaylandSurface, WaylandSurfaceCreateInfoKHR};
use crate::bindings::xlib::{VisualId, XlibSurface, XlibSurfaceCreateInfoKHR};
use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_void, CStr};

/// Instance extensions needed to present to windows on `display`.
pub fn required_instance_extensions(display: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    let platform = match display {
        RawDisplayHandle::Wayland(_) => WaylandSurface::name(),
        RawDisplayHandle::Xlib(_) => XlibSurface::name(),
        RawDisplayHandle::Windows(_) => ash::extensions::khr::Win32Surface::name(),
        other => anyhow::bail!("Unsupported display handle: {:?}", other),
    };
    Ok(vec![ash::extensions::khr::Surface::name(), platform])
}

/// Platform-specific presentation query kept alongside the surface.
pub enum PresentationSupport {
    Wayland {
        loader: WaylandSurface,
        display: *mut c_void,
    },
    Xlib {
        loader: XlibSurface,
        dpy: *mut c_void,
        visual_id: VisualId,
    },
    /// No platform query exists; rely on the generic surface query alone.
    Any,
}

impl PresentationSupport {
    pub fn supports(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> bool {
        unsafe {
            match self {
                Self::Wayland { loader, display } => loader
                    .get_physical_device_wayland_presentation_support(
                        physical_device,
                        queue_family_index,
                        *display,
                    ),
                Self::Xlib { loader, dpy, visual_id } => loader
                    .get_physical_device_xlib_presentation_support(
                        physical_device,
                        queue_family_index,
                        *dpy,
                        *visual_id,
                    ),
                Self::Any => true,
            }
        }
    }
}

/// Create a surface for the given window.
///
/// # Safety
/// The handles must stay valid for as long as the returned surface exists.
pub unsafe fn create_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> Result<(vk::SurfaceKHR, PresentationSupport)> {
    match (display, window) {
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) => {
            let loader = WaylandSurface::new(entry, instance)?;
            let create_info = WaylandSurfaceCreateInfoKHR::new(
                display.display.as_ptr(),
                window.surface.as_ptr(),
            );
            let surface = loader
                .create_wayland_surface(&create_info, None)
                .context("vkCreateWaylandSurfaceKHR failed")?;
            log::info!("Created Wayland surface");
            Ok((
                surface,
                PresentationSupport::Wayland {
                    loader,
                    display: display.display.as_ptr(),
                },
            ))
        }
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)) => {
            let dpy = display
                .display
                .context("Xlib display handle has no Display")?
                .as_ptr();
            let loader = XlibSurface::new(entry, instance)?;
            let create_info = XlibSurfaceCreateInfoKHR::new(dpy, window.window);
            let surface = loader
                .create_xlib_surface(&create_info, None)
                .context("vkCreateXlibSurfaceKHR failed")?;
            log::info!("Created Xlib surface");
            Ok((
                surface,
                PresentationSupport::Xlib {
                    loader,
                    dpy,
                    visual_id: window.visual_id,
                },
            ))
        }
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
            let hinstance = handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const c_void;
            let hwnd = handle.hwnd.get() as *const c_void;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            let loader = ash::extensions::khr::Win32Surface::new(entry, instance);
            let surface = loader.create_win32_surface(&create_info, None)?;
            log::info!("Created Win32 surface");
            Ok((surface, PresentationSupport::Any))
        }
        (display, window) => anyhow::bail!(
            "Unsupported window handle type: {:?} / {:?}",
            display,
            window
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{AppKitDisplayHandle, WaylandDisplayHandle, XlibDisplayHandle};
    use std::ptr::NonNull;

    #[test]
    fn wayland_needs_surface_and_wayland_extensions() {
        let display = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(NonNull::dangling()));
        let extensions = required_instance_extensions(display).unwrap();
        let names: Vec<_> = extensions.iter().map(|e| e.to_str().unwrap()).collect();
        assert_eq!(names, ["VK_KHR_surface", "VK_KHR_wayland_surface"]);
    }

    #[test]
    fn xlib_needs_surface_and_xlib_extensions() {
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let extensions = required_instance_extensions(display).unwrap();
        let names: Vec<_> = extensions.iter().map(|e| e.to_str().unwrap()).collect();
        assert_eq!(names, ["VK_KHR_surface", "VK_KHR_xlib_surface"]);
    }

    #[test]
    fn unsupported_platform_is_an_error() {
        let display = RawDisplayHandle::AppKit(AppKitDisplayHandle::new());
        assert!(required_instance_extensions(display).is_err());
    }

    #[test]
    fn generic_presentation_always_supported() {
        assert!(PresentationSupport::Any.supports(vk::PhysicalDevice::null(), 0));
    }
}
