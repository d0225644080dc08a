// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash: device bring-up, presentation, per-frame
// synchronization, pipelines and memory. Samples talk to `GraphicsDevice`.

pub mod device;
pub mod graphics_device;
pub mod memory;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use graphics_device::{Frame, GraphicsDevice};
pub use memory::{AllocatedBuffer, AllocatorCreateInfo, MemoryAllocator};
pub use swapchain::Swapchain;
