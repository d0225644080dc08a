// VK_KHR_wayland_surface

use super::loader::{instance_fn_table, instance_resolver, LoadError};
use ash::prelude::VkResult;
use ash::vk;
use std::ffi::{c_void, CStr};
use std::ptr;

pub const KHR_WAYLAND_SURFACE_EXTENSION_NAME: &CStr = c"VK_KHR_wayland_surface";

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct WaylandSurfaceCreateInfoKHR {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub flags: vk::WaylandSurfaceCreateFlagsKHR,
    /// `wl_display*`
    pub display: *mut c_void,
    /// `wl_surface*`
    pub surface: *mut c_void,
}

impl Default for WaylandSurfaceCreateInfoKHR {
    fn default() -> Self {
        Self {
            s_type: vk::StructureType::WAYLAND_SURFACE_CREATE_INFO_KHR,
            p_next: ptr::null(),
            flags: vk::WaylandSurfaceCreateFlagsKHR::empty(),
            display: ptr::null_mut(),
            surface: ptr::null_mut(),
        }
    }
}

impl WaylandSurfaceCreateInfoKHR {
    pub fn new(display: *mut c_void, surface: *mut c_void) -> Self {
        Self {
            display,
            surface,
            ..Default::default()
        }
    }
}

#[allow(non_camel_case_types)]
pub type PFN_vkCreateWaylandSurfaceKHR = unsafe extern "system" fn(
    instance: vk::Instance,
    p_create_info: *const WaylandSurfaceCreateInfoKHR,
    p_allocator: *const vk::AllocationCallbacks,
    p_surface: *mut vk::SurfaceKHR,
) -> vk::Result;

#[allow(non_camel_case_types)]
pub type PFN_vkGetPhysicalDeviceWaylandPresentationSupportKHR = unsafe extern "system" fn(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    display: *mut c_void,
) -> vk::Bool32;

instance_fn_table! {
    pub struct WaylandSurfaceFn {
        pub create_wayland_surface_khr: PFN_vkCreateWaylandSurfaceKHR
            => c"vkCreateWaylandSurfaceKHR",
        pub get_physical_device_wayland_presentation_support_khr:
            PFN_vkGetPhysicalDeviceWaylandPresentationSupportKHR
            => c"vkGetPhysicalDeviceWaylandPresentationSupportKHR",
    }
}

/// Loaded VK_KHR_wayland_surface entry points bound to one instance.
#[derive(Clone)]
pub struct WaylandSurface {
    handle: vk::Instance,
    fp: WaylandSurfaceFn,
}

impl WaylandSurface {
    pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, LoadError> {
        let handle = instance.handle();
        let fp = WaylandSurfaceFn::load_with(instance_resolver(entry, handle))?;
        Ok(Self { handle, fp })
    }

    pub const fn name() -> &'static CStr {
        KHR_WAYLAND_SURFACE_EXTENSION_NAME
    }

    /// # Safety
    /// `create_info.display` and `create_info.surface` must be live Wayland objects.
    pub unsafe fn create_wayland_surface(
        &self,
        create_info: &WaylandSurfaceCreateInfoKHR,
        allocation_callbacks: Option<&vk::AllocationCallbacks>,
    ) -> VkResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        (self.fp.create_wayland_surface_khr)(
            self.handle,
            create_info,
            allocation_callbacks.map_or(ptr::null(), |a| a as *const _),
            &mut surface,
        )
        .result_with_success(surface)
    }

    /// # Safety
    /// `display` must be a live `wl_display*`.
    pub unsafe fn get_physical_device_wayland_presentation_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        display: *mut c_void,
    ) -> bool {
        (self.fp.get_physical_device_wayland_presentation_support_khr)(
            physical_device,
            queue_family_index,
            display,
        ) != vk::FALSE
    }

    pub fn fp(&self) -> &WaylandSurfaceFn {
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
        type Native = vk::WaylandSurfaceCreateInfoKHR;

        assert_eq!(size_of::<WaylandSurfaceCreateInfoKHR>(), size_of::<Native>());
        assert_eq!(align_of::<WaylandSurfaceCreateInfoKHR>(), align_of::<Native>());
        assert_eq!(offset_of!(WaylandSurfaceCreateInfoKHR, s_type), offset_of!(Native, s_type));
        assert_eq!(offset_of!(WaylandSurfaceCreateInfoKHR, p_next), offset_of!(Native, p_next));
        assert_eq!(offset_of!(WaylandSurfaceCreateInfoKHR, flags), offset_of!(Native, flags));
        assert_eq!(offset_of!(WaylandSurfaceCreateInfoKHR, display), offset_of!(Native, display));
        assert_eq!(offset_of!(WaylandSurfaceCreateInfoKHR, surface), offset_of!(Native, surface));
    }

    #[test]
    fn default_sets_structure_type() {
        let info = WaylandSurfaceCreateInfoKHR::default();
        assert_eq!(info.s_type, vk::StructureType::WAYLAND_SURFACE_CREATE_INFO_KHR);
        assert_eq!(info.s_type.as_raw(), 1_000_006_000);
        assert!(info.p_next.is_null());
        assert!(info.display.is_null());
        assert!(info.surface.is_null());
    }

    #[test]
    fn extension_name() {
        assert_eq!(WaylandSurface::name().to_bytes(), b"VK_KHR_wayland_surface");
        assert_eq!(WaylandSurface::name(), ash::extensions::khr::WaylandSurface::name());
    }

    const FAKE_SURFACE: u64 = 0x5eed;

    unsafe extern "system" fn create_ok(
        _instance: vk::Instance,
        _info: *const WaylandSurfaceCreateInfoKHR,
        _allocator: *const vk::AllocationCallbacks,
        surface: *mut vk::SurfaceKHR,
    ) -> vk::Result {
        *surface = vk::Handle::from_raw(FAKE_SURFACE);
        vk::Result::SUCCESS
    }

    unsafe extern "system" fn create_fails(
        _instance: vk::Instance,
        _info: *const WaylandSurfaceCreateInfoKHR,
        _allocator: *const vk::AllocationCallbacks,
        _surface: *mut vk::SurfaceKHR,
    ) -> vk::Result {
        vk::Result::ERROR_INITIALIZATION_FAILED
    }

    unsafe extern "system" fn unsupported(
        _physical_device: vk::PhysicalDevice,
        _queue_family_index: u32,
        _display: *mut c_void,
    ) -> vk::Bool32 {
        vk::FALSE
    }

    unsafe extern "system" fn supported_on_family_two(
        _physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        _display: *mut c_void,
    ) -> vk::Bool32 {
        // Any nonzero value counts as true
        if queue_family_index == 2 { 7 } else { vk::FALSE }
    }

    fn fake_loader(
        create: PFN_vkCreateWaylandSurfaceKHR,
        support: PFN_vkGetPhysicalDeviceWaylandPresentationSupportKHR,
    ) -> WaylandSurface {
        WaylandSurface {
            handle: vk::Instance::null(),
            fp: WaylandSurfaceFn {
                create_wayland_surface_khr: create,
                get_physical_device_wayland_presentation_support_khr: support,
            },
        }
    }

    #[test]
    fn create_returns_written_surface() {
        let loader = fake_loader(create_ok, unsupported);
        let info = WaylandSurfaceCreateInfoKHR::default();
        let surface = unsafe { loader.create_wayland_surface(&info, None) }.unwrap();
        assert_eq!(vk::Handle::as_raw(surface), FAKE_SURFACE);
    }

    #[test]
    fn create_passes_error_code_through() {
        let loader = fake_loader(create_fails, unsupported);
        let info = WaylandSurfaceCreateInfoKHR::default();
        let result = unsafe { loader.create_wayland_surface(&info, None) };
        assert_eq!(result, Err(vk::Result::ERROR_INITIALIZATION_FAILED));
    }

    #[test]
    fn presentation_support_converts_bool32() {
        let pd = vk::PhysicalDevice::null();
        let display = ptr::null_mut();

        let loader = fake_loader(create_ok, unsupported);
        assert!(!unsafe { loader.get_physical_device_wayland_presentation_support(pd, 0, display) });

        let loader = fake_loader(create_ok, supported_on_family_two);
        assert!(!unsafe { loader.get_physical_device_wayland_presentation_support(pd, 0, display) });
        assert!(unsafe { loader.get_physical_device_wayland_presentation_support(pd, 2, display) });
    }
}
