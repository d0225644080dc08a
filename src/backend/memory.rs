// Memory allocator binding
//
// A thin layer over gpu-allocator shaped like the usual allocator API:
// create the allocator from instance/device handles, create a buffer and its
// backing memory in one call, destroy both in one call.
//
// gpu-allocator calls Vulkan through `ash::Device`, so the `VulkanFunctions`
// table is never handed to it. It is resolved once in `MemoryAllocator::new`
// as a capability check: every Vulkan 1.0 slot must resolve or creation fails.

use crate::bindings::VulkanFunctions;
use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;

pub struct AllocatorCreateInfo<'a> {
    pub entry: &'a ash::Entry,
    pub instance: &'a ash::Instance,
    pub device: &'a ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub vulkan_api_version: u32,
}

impl<'a> AllocatorCreateInfo<'a> {
    /// Targets Vulkan 1.2
    pub fn new(
        entry: &'a ash::Entry,
        instance: &'a ash::Instance,
        device: &'a ash::Device,
        physical_device: vk::PhysicalDevice,
    ) -> Self {
        Self {
            entry,
            instance,
            device,
            physical_device,
            vulkan_api_version: vk::API_VERSION_1_2,
        }
    }
}

/// A buffer together with the memory bound to it
pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub size: vk::DeviceSize,
    allocation: Allocation,
}

impl AllocatedBuffer {
    /// Host view of the buffer; `None` unless it lives in host-visible memory
    pub fn mapped_slice_mut(&mut self) -> Option<&mut [u8]> {
        self.allocation.mapped_slice_mut()
    }
}

pub struct MemoryAllocator {
    device: ash::Device,
    allocator: Mutex<Allocator>,
}

impl MemoryAllocator {
    pub fn new(info: &AllocatorCreateInfo) -> Result<Self> {
        let functions =
            VulkanFunctions::load(info.entry, info.instance, info.device, info.vulkan_api_version);
        check_functions(&functions)?;
        log::debug!("{:?}", functions);

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: info.instance.clone(),
            device: info.device.clone(),
            physical_device: info.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .context("Failed to create memory allocator")?;

        log::info!(
            "Memory allocator ready (Vulkan {}.{})",
            vk::api_version_major(info.vulkan_api_version),
            vk::api_version_minor(info.vulkan_api_version)
        );

        Ok(Self {
            device: info.device.clone(),
            allocator: Mutex::new(allocator),
        })
    }

    /// Create a buffer, allocate memory for it in `location` and bind the two
    pub fn create_buffer(
        &self,
        buffer_info: &vk::BufferCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<AllocatedBuffer> {
        let buffer = unsafe { self.device.create_buffer(buffer_info, None) }
            .with_context(|| format!("Failed to create buffer '{}'", name))?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = self.allocator.lock().allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e).with_context(|| format!("Failed to allocate memory for '{}'", name));
            }
        };

        let bound = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            unsafe { self.device.destroy_buffer(buffer, None) };
            let _ = self.allocator.lock().free(allocation);
            return Err(e).with_context(|| format!("Failed to bind memory for '{}'", name));
        }

        log::debug!("Created buffer '{}' ({} bytes, {:?})", name, buffer_info.size, location);

        Ok(AllocatedBuffer {
            buffer,
            size: buffer_info.size,
            allocation,
        })
    }

    /// Free the buffer's memory and destroy the buffer
    pub fn destroy_buffer(&self, buffer: AllocatedBuffer) -> Result<()> {
        self.allocator
            .lock()
            .free(buffer.allocation)
            .context("Failed to free buffer memory")?;
        unsafe { self.device.destroy_buffer(buffer.buffer, None) };
        Ok(())
    }
}

/// Fail when any Vulkan 1.0 entry point the allocator relies on is missing
fn check_functions(functions: &VulkanFunctions) -> Result<()> {
    let missing = functions.missing_required();
    if !missing.is_empty() {
        anyhow::bail!("Allocator entry points unavailable: {}", missing.join(", "));
    }
    Ok(())
}

/// Copy `data` into the start of a host-visible buffer
pub fn upload_slice<T: bytemuck::Pod>(buffer: &mut AllocatedBuffer, data: &[T]) -> Result<()> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let mapped = buffer
        .mapped_slice_mut()
        .context("Buffer is not host visible")?;
    write_bytes(mapped, bytes)
}

fn write_bytes(dst: &mut [u8], src: &[u8]) -> Result<()> {
    if src.len() > dst.len() {
        anyhow::bail!(
            "Upload of {} bytes does not fit in {} byte buffer",
            src.len(),
            dst.len()
        );
    }
    dst[..src.len()].copy_from_slice(src);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_function_table_is_rejected() {
        let err = check_functions(&VulkanFunctions::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("vkAllocateMemory"));
        assert!(message.contains("vkCmdCopyBuffer"));
        // Extension slots are optional
        assert!(!message.contains("vkBindBufferMemory2"));
    }

    #[test]
    fn write_bytes_copies_prefix() {
        let mut dst = [0u8; 8];
        write_bytes(&mut dst, &[1, 2, 3]).unwrap();
        assert_eq!(dst, [1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn write_bytes_rejects_oversized_upload() {
        let mut dst = [0u8; 2];
        let err = write_bytes(&mut dst, &[1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("3 bytes"));
        assert_eq!(dst, [0, 0]);
    }
}
