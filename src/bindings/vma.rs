// Allocator Vulkan function table
//
// Mirror of `VmaVulkanFunctions`: the pointers a memory allocator calls back
// into. Slot order is the native one and must not change. Every slot is
// nullable; the allocator fetches what it needs and ignores the rest.

use super::loader::{device_resolver, instance_resolver};
use ash::vk;
use std::ffi::CStr;

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct VulkanFunctions {
    pub vk_get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
    pub vk_get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>,
    pub vk_get_physical_device_properties: Option<vk::PFN_vkGetPhysicalDeviceProperties>,
    pub vk_get_physical_device_memory_properties: Option<vk::PFN_vkGetPhysicalDeviceMemoryProperties>,
    pub vk_allocate_memory: Option<vk::PFN_vkAllocateMemory>,
    pub vk_free_memory: Option<vk::PFN_vkFreeMemory>,
    pub vk_map_memory: Option<vk::PFN_vkMapMemory>,
    pub vk_unmap_memory: Option<vk::PFN_vkUnmapMemory>,
    pub vk_flush_mapped_memory_ranges: Option<vk::PFN_vkFlushMappedMemoryRanges>,
    pub vk_invalidate_mapped_memory_ranges: Option<vk::PFN_vkInvalidateMappedMemoryRanges>,
    pub vk_bind_buffer_memory: Option<vk::PFN_vkBindBufferMemory>,
    pub vk_bind_image_memory: Option<vk::PFN_vkBindImageMemory>,
    pub vk_get_buffer_memory_requirements: Option<vk::PFN_vkGetBufferMemoryRequirements>,
    pub vk_get_image_memory_requirements: Option<vk::PFN_vkGetImageMemoryRequirements>,
    pub vk_create_buffer: Option<vk::PFN_vkCreateBuffer>,
    pub vk_destroy_buffer: Option<vk::PFN_vkDestroyBuffer>,
    pub vk_create_image: Option<vk::PFN_vkCreateImage>,
    pub vk_destroy_image: Option<vk::PFN_vkDestroyImage>,
    pub vk_cmd_copy_buffer: Option<vk::PFN_vkCmdCopyBuffer>,
    /// Core on Vulkan >= 1.1, `VK_KHR_get_memory_requirements2` below.
    pub vk_get_buffer_memory_requirements2_khr: Option<vk::PFN_vkGetBufferMemoryRequirements2>,
    pub vk_get_image_memory_requirements2_khr: Option<vk::PFN_vkGetImageMemoryRequirements2>,
    /// Core on Vulkan >= 1.1, `VK_KHR_bind_memory2` below.
    pub vk_bind_buffer_memory2_khr: Option<vk::PFN_vkBindBufferMemory2>,
    pub vk_bind_image_memory2_khr: Option<vk::PFN_vkBindImageMemory2>,
    pub vk_get_physical_device_memory_properties2_khr:
        Option<vk::PFN_vkGetPhysicalDeviceMemoryProperties2>,
    /// Core on Vulkan >= 1.3, `VK_KHR_maintenance4` below.
    pub vk_get_device_buffer_memory_requirements:
        Option<vk::PFN_vkGetDeviceBufferMemoryRequirements>,
    pub vk_get_device_image_memory_requirements:
        Option<vk::PFN_vkGetDeviceImageMemoryRequirements>,
}

fn at_least(api_version: u32, major: u32, minor: u32) -> bool {
    (vk::api_version_major(api_version), vk::api_version_minor(api_version)) >= (major, minor)
}

fn pick(core: &'static CStr, khr: &'static CStr, use_core: bool) -> &'static CStr {
    if use_core {
        core
    } else {
        khr
    }
}

/// Reinterprets a resolved entry point as the slot's function type.
///
/// # Safety
/// `T` must be the function pointer type registered under the resolved name.
unsafe fn cast<T: Copy>(raw: vk::PFN_vkVoidFunction) -> Option<T> {
    debug_assert_eq!(
        std::mem::size_of::<T>(),
        std::mem::size_of::<unsafe extern "system" fn()>()
    );
    raw.map(|f| std::mem::transmute_copy::<unsafe extern "system" fn(), T>(&f))
}

impl VulkanFunctions {
    /// Fills the table through the given resolvers, picking core or `KHR`
    /// names according to `api_version`. Unresolved slots stay null.
    pub fn load_with<I, D>(api_version: u32, mut instance_fn: I, mut device_fn: D) -> Self
    where
        I: FnMut(&CStr) -> vk::PFN_vkVoidFunction,
        D: FnMut(&CStr) -> vk::PFN_vkVoidFunction,
    {
        let vk11 = at_least(api_version, 1, 1);
        let vk13 = at_least(api_version, 1, 3);

        unsafe {
            Self {
                vk_get_instance_proc_addr: cast(instance_fn(c"vkGetInstanceProcAddr")),
                vk_get_device_proc_addr: cast(instance_fn(c"vkGetDeviceProcAddr")),
                vk_get_physical_device_properties: cast(instance_fn(c"vkGetPhysicalDeviceProperties")),
                vk_get_physical_device_memory_properties: cast(instance_fn(
                    c"vkGetPhysicalDeviceMemoryProperties",
                )),
                vk_allocate_memory: cast(device_fn(c"vkAllocateMemory")),
                vk_free_memory: cast(device_fn(c"vkFreeMemory")),
                vk_map_memory: cast(device_fn(c"vkMapMemory")),
                vk_unmap_memory: cast(device_fn(c"vkUnmapMemory")),
                vk_flush_mapped_memory_ranges: cast(device_fn(c"vkFlushMappedMemoryRanges")),
                vk_invalidate_mapped_memory_ranges: cast(device_fn(c"vkInvalidateMappedMemoryRanges")),
                vk_bind_buffer_memory: cast(device_fn(c"vkBindBufferMemory")),
                vk_bind_image_memory: cast(device_fn(c"vkBindImageMemory")),
                vk_get_buffer_memory_requirements: cast(device_fn(c"vkGetBufferMemoryRequirements")),
                vk_get_image_memory_requirements: cast(device_fn(c"vkGetImageMemoryRequirements")),
                vk_create_buffer: cast(device_fn(c"vkCreateBuffer")),
                vk_destroy_buffer: cast(device_fn(c"vkDestroyBuffer")),
                vk_create_image: cast(device_fn(c"vkCreateImage")),
                vk_destroy_image: cast(device_fn(c"vkDestroyImage")),
                vk_cmd_copy_buffer: cast(device_fn(c"vkCmdCopyBuffer")),
                vk_get_buffer_memory_requirements2_khr: cast(device_fn(pick(
                    c"vkGetBufferMemoryRequirements2",
                    c"vkGetBufferMemoryRequirements2KHR",
                    vk11,
                ))),
                vk_get_image_memory_requirements2_khr: cast(device_fn(pick(
                    c"vkGetImageMemoryRequirements2",
                    c"vkGetImageMemoryRequirements2KHR",
                    vk11,
                ))),
                vk_bind_buffer_memory2_khr: cast(device_fn(pick(
                    c"vkBindBufferMemory2",
                    c"vkBindBufferMemory2KHR",
                    vk11,
                ))),
                vk_bind_image_memory2_khr: cast(device_fn(pick(
                    c"vkBindImageMemory2",
                    c"vkBindImageMemory2KHR",
                    vk11,
                ))),
                vk_get_physical_device_memory_properties2_khr: cast(instance_fn(pick(
                    c"vkGetPhysicalDeviceMemoryProperties2",
                    c"vkGetPhysicalDeviceMemoryProperties2KHR",
                    vk11,
                ))),
                vk_get_device_buffer_memory_requirements: cast(device_fn(pick(
                    c"vkGetDeviceBufferMemoryRequirements",
                    c"vkGetDeviceBufferMemoryRequirementsKHR",
                    vk13,
                ))),
                vk_get_device_image_memory_requirements: cast(device_fn(pick(
                    c"vkGetDeviceImageMemoryRequirements",
                    c"vkGetDeviceImageMemoryRequirementsKHR",
                    vk13,
                ))),
            }
        }
    }

    pub fn load(
        entry: &ash::Entry,
        instance: &ash::Instance,
        device: &ash::Device,
        api_version: u32,
    ) -> Self {
        Self::load_with(
            api_version,
            instance_resolver(entry, instance.handle()),
            device_resolver(instance, device.handle()),
        )
    }

    /// Names of the Vulkan 1.0 slots that are still null.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let slots = [
            ("vkGetInstanceProcAddr", self.vk_get_instance_proc_addr.is_some()),
            ("vkGetDeviceProcAddr", self.vk_get_device_proc_addr.is_some()),
            ("vkGetPhysicalDeviceProperties", self.vk_get_physical_device_properties.is_some()),
            (
                "vkGetPhysicalDeviceMemoryProperties",
                self.vk_get_physical_device_memory_properties.is_some(),
            ),
            ("vkAllocateMemory", self.vk_allocate_memory.is_some()),
            ("vkFreeMemory", self.vk_free_memory.is_some()),
            ("vkMapMemory", self.vk_map_memory.is_some()),
            ("vkUnmapMemory", self.vk_unmap_memory.is_some()),
            ("vkFlushMappedMemoryRanges", self.vk_flush_mapped_memory_ranges.is_some()),
            (
                "vkInvalidateMappedMemoryRanges",
                self.vk_invalidate_mapped_memory_ranges.is_some(),
            ),
            ("vkBindBufferMemory", self.vk_bind_buffer_memory.is_some()),
            ("vkBindImageMemory", self.vk_bind_image_memory.is_some()),
            ("vkGetBufferMemoryRequirements", self.vk_get_buffer_memory_requirements.is_some()),
            ("vkGetImageMemoryRequirements", self.vk_get_image_memory_requirements.is_some()),
            ("vkCreateBuffer", self.vk_create_buffer.is_some()),
            ("vkDestroyBuffer", self.vk_destroy_buffer.is_some()),
            ("vkCreateImage", self.vk_create_image.is_some()),
            ("vkDestroyImage", self.vk_destroy_image.is_some()),
            ("vkCmdCopyBuffer", self.vk_cmd_copy_buffer.is_some()),
        ];

        slots
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect()
    }
}

impl std::fmt::Debug for VulkanFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanFunctions")
            .field("missing_required", &self.missing_required())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::mem::{offset_of, size_of};

    unsafe extern "system" fn placeholder() {}

    fn resolve_all(log: &RefCell<Vec<String>>) -> impl FnMut(&CStr) -> vk::PFN_vkVoidFunction + '_ {
        move |name| {
            log.borrow_mut().push(name.to_str().unwrap().to_owned());
            Some(placeholder as unsafe extern "system" fn())
        }
    }

    #[test]
    fn table_has_twenty_six_pointer_slots() {
        let ptr = size_of::<usize>();
        assert_eq!(size_of::<VulkanFunctions>(), 26 * ptr);
        assert_eq!(offset_of!(VulkanFunctions, vk_get_instance_proc_addr), 0);
        assert_eq!(offset_of!(VulkanFunctions, vk_allocate_memory), 4 * ptr);
        assert_eq!(offset_of!(VulkanFunctions, vk_cmd_copy_buffer), 18 * ptr);
        assert_eq!(offset_of!(VulkanFunctions, vk_get_buffer_memory_requirements2_khr), 19 * ptr);
        assert_eq!(offset_of!(VulkanFunctions, vk_get_physical_device_memory_properties2_khr), 23 * ptr);
        assert_eq!(offset_of!(VulkanFunctions, vk_get_device_image_memory_requirements), 25 * ptr);
    }

    #[test]
    fn vulkan_1_0_uses_extension_names() {
        let instance_log = RefCell::new(Vec::new());
        let device_log = RefCell::new(Vec::new());
        let table = VulkanFunctions::load_with(
            vk::API_VERSION_1_0,
            resolve_all(&instance_log),
            resolve_all(&device_log),
        );

        assert!(table.missing_required().is_empty());
        let device_log = device_log.borrow();
        assert!(device_log.contains(&"vkGetBufferMemoryRequirements2KHR".to_owned()));
        assert!(device_log.contains(&"vkBindImageMemory2KHR".to_owned()));
        assert!(device_log.contains(&"vkGetDeviceBufferMemoryRequirementsKHR".to_owned()));
        assert!(instance_log
            .borrow()
            .contains(&"vkGetPhysicalDeviceMemoryProperties2KHR".to_owned()));
    }

    #[test]
    fn vulkan_1_2_uses_core_names_for_1_1_functions() {
        let instance_log = RefCell::new(Vec::new());
        let device_log = RefCell::new(Vec::new());
        VulkanFunctions::load_with(
            vk::API_VERSION_1_2,
            resolve_all(&instance_log),
            resolve_all(&device_log),
        );

        let device_log = device_log.borrow();
        assert!(device_log.contains(&"vkGetBufferMemoryRequirements2".to_owned()));
        assert!(device_log.contains(&"vkBindBufferMemory2".to_owned()));
        assert!(device_log.contains(&"vkGetDeviceImageMemoryRequirementsKHR".to_owned()));
        assert!(instance_log
            .borrow()
            .contains(&"vkGetPhysicalDeviceMemoryProperties2".to_owned()));
    }

    #[test]
    fn vulkan_1_3_uses_core_maintenance4_names() {
        let instance_log = RefCell::new(Vec::new());
        let device_log = RefCell::new(Vec::new());
        VulkanFunctions::load_with(
            vk::API_VERSION_1_3,
            resolve_all(&instance_log),
            resolve_all(&device_log),
        );

        let device_log = device_log.borrow();
        assert!(device_log.contains(&"vkGetDeviceBufferMemoryRequirements".to_owned()));
        assert!(device_log.contains(&"vkGetDeviceImageMemoryRequirements".to_owned()));
    }

    #[test]
    fn instance_and_device_slots_use_their_own_resolver() {
        let instance_log = RefCell::new(Vec::new());
        let device_log = RefCell::new(Vec::new());
        VulkanFunctions::load_with(
            vk::API_VERSION_1_2,
            resolve_all(&instance_log),
            resolve_all(&device_log),
        );

        assert_eq!(instance_log.borrow().len(), 5);
        assert_eq!(device_log.borrow().len(), 21);
        assert!(!device_log.borrow().contains(&"vkGetPhysicalDeviceProperties".to_owned()));
    }

    #[test]
    fn unresolved_slots_stay_null() {
        let table = VulkanFunctions::load_with(vk::API_VERSION_1_2, |_| None, |_| None);

        assert!(table.vk_get_device_image_memory_requirements.is_none());
        let missing = table.missing_required();
        assert_eq!(missing.len(), 19);
        assert_eq!(missing.first(), Some(&"vkGetInstanceProcAddr"));
        assert_eq!(missing.last(), Some(&"vkCmdCopyBuffer"));
    }

    #[test]
    fn default_table_is_empty() {
        assert_eq!(VulkanFunctions::default().missing_required().len(), 19);
    }
}
