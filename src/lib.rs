//! Vulkan binding supplements and the small framework the samples run on.
//!
//! * [`bindings`]: platform surface loaders, blend attachment helpers and the
//!   allocator function table.
//! * [`backend`]: device, swapchain, per-frame rendering and memory.
//! * [`app`]: the windowed runner every sample implements [`app::Application`] for.

pub mod app;
pub mod backend;
pub mod bindings;
pub mod config;
pub mod watch;

pub use app::{run, Application};
pub use backend::{Frame, GraphicsDevice};
