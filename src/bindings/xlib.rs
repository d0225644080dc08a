// VK_KHR_xlib_surface

use super::loader::{instance_fn_table, instance_resolver, LoadError};
use ash::prelude::VkResult;
use ash::vk;
use std::ffi::{c_ulong, c_void, CStr};
use std::ptr;

pub const KHR_XLIB_SURFACE_EXTENSION_NAME: &CStr = c"VK_KHR_xlib_surface";

/// X11 `Window` XID.
pub type Window = c_ulong;
/// X11 `VisualID`.
pub type VisualId = c_ulong;

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct XlibSurfaceCreateInfoKHR {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub flags: vk::XlibSurfaceCreateFlagsKHR,
    /// `Display*`
    pub dpy: *mut c_void,
    pub window: Window,
}

impl Default for XlibSurfaceCreateInfoKHR {
    fn default() -> Self {
        Self {
            s_type: vk::StructureType::XLIB_SURFACE_CREATE_INFO_KHR,
            p_next: ptr::null(),
            flags: vk::XlibSurfaceCreateFlagsKHR::empty(),
            dpy: ptr::null_mut(),
            window: 0,
        }
    }
}

impl XlibSurfaceCreateInfoKHR {
    pub fn new(dpy: *mut c_void, window: Window) -> Self {
        Self {
            dpy,
            window,
            ..Default::default()
        }
    }
}

#[allow(non_camel_case_types)]
pub type PFN_vkCreateXlibSurfaceKHR = unsafe extern "system" fn(
    instance: vk::Instance,
    p_create_info: *const XlibSurfaceCreateInfoKHR,
    p_allocator: *const vk::AllocationCallbacks,
    p_surface: *mut vk::SurfaceKHR,
) -> vk::Result;

#[allow(non_camel_case_types)]
pub type PFN_vkGetPhysicalDeviceXlibPresentationSupportKHR = unsafe extern "system" fn(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    dpy: *mut c_void,
    visual_id: VisualId,
) -> vk::Bool32;

instance_fn_table! {
    pub struct XlibSurfaceFn {
        pub create_xlib_surface_khr: PFN_vkCreateXlibSurfaceKHR
            => c"vkCreateXlibSurfaceKHR",
        pub get_physical_device_xlib_presentation_support_khr:
            PFN_vkGetPhysicalDeviceXlibPresentationSupportKHR
            => c"vkGetPhysicalDeviceXlibPresentationSupportKHR",
    }
}

/// Loaded VK_KHR_xlib_surface entry points bound to one instance.
#[derive(Clone)]
pub struct XlibSurface {
    handle: vk::Instance,
    fp: XlibSurfaceFn,
}

impl XlibSurface {
    pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, LoadError> {
        let handle = instance.handle();
        let fp = XlibSurfaceFn::load_with(instance_resolver(entry, handle))?;
        Ok(Self { handle, fp })
    }

    pub const fn name() -> &'static CStr {
        KHR_XLIB_SURFACE_EXTENSION_NAME
    }

    /// # Safety
    /// `create_info.dpy` must be an open display and `create_info.window` one of its windows.
    pub unsafe fn create_xlib_surface(
        &self,
        create_info: &XlibSurfaceCreateInfoKHR,
        allocation_callbacks: Option<&vk::AllocationCallbacks>,
    ) -> VkResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        (self.fp.create_xlib_surface_khr)(
            self.handle,
            create_info,
            allocation_callbacks.map_or(ptr::null(), |a| a as *const _),
            &mut surface,
        )
        .result_with_success(surface)
    }

    /// # Safety
    /// `dpy` must be an open X11 `Display*`.
    pub unsafe fn get_physical_device_xlib_presentation_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        dpy: *mut c_void,
        visual_id: VisualId,
    ) -> bool {
        (self.fp.get_physical_device_xlib_presentation_support_khr)(
            physical_device,
            queue_family_index,
            dpy,
            visual_id,
        ) != vk::FALSE
    }

    pub fn fp(&self) -> &XlibSurfaceFn {
        &self.fp
    }

    pub fn instance(&self) -> vk::Instance {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn create_info_matches_native_layout() {
        type Native = vk::XlibSurfaceCreateInfoKHR;

        assert_eq!(size_of::<XlibSurfaceCreateInfoKHR>(), size_of::<Native>());
        assert_eq!(align_of::<XlibSurfaceCreateInfoKHR>(), align_of::<Native>());
        assert_eq!(offset_of!(XlibSurfaceCreateInfoKHR, s_type), offset_of!(Native, s_type));
        assert_eq!(offset_of!(XlibSurfaceCreateInfoKHR, p_next), offset_of!(Native, p_next));
        assert_eq!(offset_of!(XlibSurfaceCreateInfoKHR, flags), offset_of!(Native, flags));
        assert_eq!(offset_of!(XlibSurfaceCreateInfoKHR, dpy), offset_of!(Native, dpy));
        assert_eq!(offset_of!(XlibSurfaceCreateInfoKHR, window), offset_of!(Native, window));
    }

    #[test]
    fn default_sets_structure_type() {
        let info = XlibSurfaceCreateInfoKHR::default();
        assert_eq!(info.s_type, vk::StructureType::XLIB_SURFACE_CREATE_INFO_KHR);
        assert_eq!(info.s_type.as_raw(), 1_000_004_000);
        assert!(info.p_next.is_null());
        assert!(info.dpy.is_null());
        assert_eq!(info.window, 0);
    }

    #[test]
    fn window_is_an_unsigned_long_xid() {
        assert_eq!(size_of::<Window>(), size_of::<vk::Window>());
    }

    #[test]
    fn extension_name() {
        assert_eq!(XlibSurface::name().to_bytes(), b"VK_KHR_xlib_surface");
        assert_eq!(XlibSurface::name(), ash::extensions::khr::XlibSurface::name());
    }

    const FAKE_SURFACE: u64 = 0xface;

    unsafe extern "system" fn create_ok(
        _instance: vk::Instance,
        _info: *const XlibSurfaceCreateInfoKHR,
        _allocator: *const vk::AllocationCallbacks,
        surface: *mut vk::SurfaceKHR,
    ) -> vk::Result {
        *surface = vk::Handle::from_raw(FAKE_SURFACE);
        vk::Result::SUCCESS
    }

    unsafe extern "system" fn create_fails(
        _instance: vk::Instance,
        _info: *const XlibSurfaceCreateInfoKHR,
        _allocator: *const vk::AllocationCallbacks,
        _surface: *mut vk::SurfaceKHR,
    ) -> vk::Result {
        vk::Result::ERROR_INITIALIZATION_FAILED
    }

    unsafe extern "system" fn unsupported(
        _physical_device: vk::PhysicalDevice,
        _queue_family_index: u32,
        _dpy: *mut c_void,
        _visual_id: VisualId,
    ) -> vk::Bool32 {
        vk::FALSE
    }

    unsafe extern "system" fn supported_for_visual_33(
        _physical_device: vk::PhysicalDevice,
        _queue_family_index: u32,
        _dpy: *mut c_void,
        visual_id: VisualId,
    ) -> vk::Bool32 {
        if visual_id == 33 { vk::TRUE } else { vk::FALSE }
    }

    fn fake_loader(
        create: PFN_vkCreateXlibSurfaceKHR,
        support: PFN_vkGetPhysicalDeviceXlibPresentationSupportKHR,
    ) -> XlibSurface {
        XlibSurface {
            handle: vk::Instance::null(),
            fp: XlibSurfaceFn {
                create_xlib_surface_khr: create,
                get_physical_device_xlib_presentation_support_khr: support,
            },
        }
    }

    #[test]
    fn create_returns_written_surface() {
        let loader = fake_loader(create_ok, unsupported);
        let info = XlibSurfaceCreateInfoKHR::new(ptr::null_mut(), 0x0040_0001);
        let surface = unsafe { loader.create_xlib_surface(&info, None) }.unwrap();
        assert_eq!(vk::Handle::as_raw(surface), FAKE_SURFACE);
    }

    #[test]
    fn create_passes_error_code_through() {
        let loader = fake_loader(create_fails, unsupported);
        let info = XlibSurfaceCreateInfoKHR::default();
        let result = unsafe { loader.create_xlib_surface(&info, None) };
        assert_eq!(result, Err(vk::Result::ERROR_INITIALIZATION_FAILED));
    }

    #[test]
    fn presentation_support_forwards_visual_and_converts_bool32() {
        let pd = vk::PhysicalDevice::null();
        let dpy = ptr::null_mut();

        let loader = fake_loader(create_ok, unsupported);
        assert!(!unsafe { loader.get_physical_device_xlib_presentation_support(pd, 0, dpy, 33) });

        let loader = fake_loader(create_ok, supported_for_visual_33);
        assert!(unsafe { loader.get_physical_device_xlib_presentation_support(pd, 0, dpy, 33) });
        assert!(!unsafe { loader.get_physical_device_xlib_presentation_support(pd, 0, dpy, 34) });
    }
}
