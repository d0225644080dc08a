// Draws a single vertex-coloured triangle from a device-local vertex buffer.
//
// Shaders are read from `shaders/*.spv` at startup and the pipeline is rebuilt
// whenever the compiled SPIR-V changes on disk.

use anyhow::{Context, Result};
use ash::vk;
use glam::{Vec3, Vec4};
use gpu_allocator::MemoryLocation;
use std::path::{Path, PathBuf};
use vkbridge::backend::memory::upload_slice;
use vkbridge::backend::pipeline::{
    create_empty_pipeline_layout, create_graphics_pipeline, flipped_viewport, VertexPositionColor,
};
use vkbridge::backend::shader::read_spirv_file;
use vkbridge::backend::{AllocatedBuffer, AllocatorCreateInfo, MemoryAllocator};
use vkbridge::watch::ShaderWatcher;
use vkbridge::{Application, Frame, GraphicsDevice};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.2, 1.0];
const VERTEX_SHADER: &str = "triangle.vert.spv";
const FRAGMENT_SHADER: &str = "triangle.frag.spv";

fn triangle_vertices() -> [VertexPositionColor; 3] {
    [
        VertexPositionColor::new(Vec3::new(0.0, 0.5, 0.0), Vec4::new(1.0, 0.0, 0.0, 1.0)),
        VertexPositionColor::new(Vec3::new(0.5, -0.5, 0.0), Vec4::new(0.0, 1.0, 0.0, 1.0)),
        VertexPositionColor::new(Vec3::new(-0.5, -0.5, 0.0), Vec4::new(0.0, 0.0, 1.0, 1.0)),
    ]
}

struct DrawTriangle {
    shader_dir: PathBuf,
    // Dropped in `destroy`, before the device goes away
    allocator: Option<MemoryAllocator>,
    vertex_buffer: Option<AllocatedBuffer>,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    watcher: Option<ShaderWatcher>,
}

impl DrawTriangle {
    fn new(shader_dir: PathBuf) -> Self {
        Self {
            shader_dir,
            allocator: None,
            vertex_buffer: None,
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            watcher: None,
        }
    }

    fn build_pipeline(&self, graphics: &GraphicsDevice) -> Result<vk::Pipeline> {
        let vert_code = read_spirv_file(&self.shader_dir.join(VERTEX_SHADER))?;
        let frag_code = read_spirv_file(&self.shader_dir.join(FRAGMENT_SHADER))?;

        let device = graphics.device();
        let vert = graphics.create_shader_module(&vert_code)?;
        let frag = match graphics.create_shader_module(&frag_code) {
            Ok(frag) => frag,
            Err(e) => {
                unsafe { device.destroy_shader_module(vert, None) };
                return Err(e);
            }
        };

        let pipeline = graphics.render_pass().and_then(|render_pass| {
            create_graphics_pipeline(device, render_pass, self.pipeline_layout, vert, frag)
        });

        // Modules are only needed while the pipeline is created
        unsafe {
            device.destroy_shader_module(vert, None);
            device.destroy_shader_module(frag, None);
        }

        pipeline
    }

    /// Stage the vertices in host memory, copy them into a GPU-only buffer
    fn create_vertex_buffer(
        graphics: &GraphicsDevice,
        allocator: &MemoryAllocator,
    ) -> Result<AllocatedBuffer> {
        let vertices = triangle_vertices();
        let size = (vertices.len() * VertexPositionColor::SIZE_IN_BYTES) as vk::DeviceSize;

        let staging_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let mut staging =
            allocator.create_buffer(&staging_info, MemoryLocation::CpuToGpu, "triangle staging")?;

        let result = upload_slice(&mut staging, &vertices).and_then(|_| {
            let vertex_info = vk::BufferCreateInfo::builder()
                .size(size)
                .usage(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let vertex_buffer =
                allocator.create_buffer(&vertex_info, MemoryLocation::GpuOnly, "triangle vertices")?;

            let copy = graphics.get_command_buffer(true).and_then(|cmd| {
                let region = vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size,
                };
                unsafe {
                    graphics
                        .device()
                        .cmd_copy_buffer(cmd, staging.buffer, vertex_buffer.buffer, &[region]);
                }
                graphics.flush_command_buffer(cmd)
            });

            match copy {
                Ok(()) => Ok(vertex_buffer),
                Err(e) => {
                    allocator.destroy_buffer(vertex_buffer)?;
                    Err(e)
                }
            }
        });

        allocator.destroy_buffer(staging)?;
        result.context("Failed to upload triangle vertices")
    }

    fn reload_shaders(&mut self, graphics: &GraphicsDevice) -> Result<()> {
        log::info!("Shaders changed, rebuilding pipeline");
        graphics.wait_idle()?;

        match self.build_pipeline(graphics) {
            Ok(pipeline) => {
                unsafe { graphics.device().destroy_pipeline(self.pipeline, None) };
                self.pipeline = pipeline;
            }
            // Keep drawing with the old pipeline until the shaders compile again
            Err(e) => log::warn!("Pipeline rebuild failed: {:#}", e),
        }
        Ok(())
    }
}

impl Application for DrawTriangle {
    fn name(&self) -> &str {
        "02-DrawTriangle"
    }

    fn initialize(&mut self, graphics: &GraphicsDevice) -> Result<()> {
        let vulkan = graphics.vulkan();
        let allocator = MemoryAllocator::new(&AllocatorCreateInfo::new(
            &vulkan.entry,
            &vulkan.instance,
            &vulkan.device,
            vulkan.physical_device,
        ))?;

        self.pipeline_layout = create_empty_pipeline_layout(graphics.device())?;
        self.pipeline = self.build_pipeline(graphics)?;
        self.vertex_buffer = Some(Self::create_vertex_buffer(graphics, &allocator)?);
        self.allocator = Some(allocator);

        self.watcher = ShaderWatcher::new(&self.shader_dir)
            .map_err(|e| log::warn!("Shader hot reload disabled: {:#}", e))
            .ok();

        Ok(())
    }

    fn update(&mut self, graphics: &GraphicsDevice) -> Result<()> {
        let changed = self.watcher.as_ref().is_some_and(ShaderWatcher::poll_changed);
        if changed {
            self.reload_shaders(graphics)?;
        }
        Ok(())
    }

    fn draw(&mut self, device: &ash::Device, frame: &Frame) -> Result<()> {
        let vertex_buffer = self.vertex_buffer.as_ref().context("Vertex buffer not created")?;
        let cmd = frame.command_buffer;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: CLEAR_COLOR },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(frame.render_pass)
            .framebuffer(frame.framebuffer)
            .render_area(frame.render_area())
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);

            // Flip Y to match the Direct3D convention the vertices are written in
            device.cmd_set_viewport(cmd, 0, &[flipped_viewport(frame.extent)]);
            device.cmd_set_scissor(cmd, 0, &[frame.render_area()]);

            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer.buffer], &[0]);
            device.cmd_draw(cmd, 3, 1, 0, 0);

            device.cmd_end_render_pass(cmd);
        }

        Ok(())
    }

    fn destroy(&mut self, graphics: &GraphicsDevice) {
        self.watcher = None;
        let device = graphics.device();

        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
        }

        if let Some(allocator) = self.allocator.take() {
            if let Some(buffer) = self.vertex_buffer.take() {
                if let Err(e) = allocator.destroy_buffer(buffer) {
                    log::warn!("{:#}", e);
                }
            }
        }
    }
}

/// `shaders/` next to the executable, else the one in the source tree
fn resolve_shader_dir(exe: Option<&Path>, fallback: &Path) -> PathBuf {
    exe.and_then(Path::parent)
        .map(|dir| dir.join("shaders"))
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(|| fallback.join("shaders"))
}

fn main() -> Result<()> {
    let exe = std::env::current_exe().ok();
    let shader_dir = resolve_shader_dir(exe.as_deref(), Path::new(env!("CARGO_MANIFEST_DIR")));
    vkbridge::run(DrawTriangle::new(shader_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertices_are_red_green_blue() {
        let [top, right, left] = triangle_vertices();
        assert_eq!(top.position, [0.0, 0.5, 0.0]);
        assert_eq!(top.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(right.position, [0.5, -0.5, 0.0]);
        assert_eq!(right.color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(left.position, [-0.5, -0.5, 0.0]);
        assert_eq!(left.color, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn vertex_data_is_tightly_packed() {
        let vertices = triangle_vertices();
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 3 * 28);
    }

    #[test]
    fn clears_to_dark_blue() {
        assert_eq!(CLEAR_COLOR, [0.0, 0.0, 0.2, 1.0]);
    }

    #[test]
    fn shaders_next_to_executable_win() {
        let install = std::env::temp_dir().join(format!("vkbridge-install-{}", std::process::id()));
        std::fs::create_dir_all(install.join("shaders")).unwrap();
        let exe = install.join("draw_triangle");

        let dir = resolve_shader_dir(Some(&exe), Path::new("/source"));
        std::fs::remove_dir_all(&install).unwrap();

        assert_eq!(dir, install.join("shaders"));
    }

    #[test]
    fn source_tree_is_the_fallback() {
        let fallback = Path::new(env!("CARGO_MANIFEST_DIR"));
        let missing = Path::new("/nonexistent-vkbridge-dir/draw_triangle");

        assert_eq!(resolve_shader_dir(Some(missing), fallback), fallback.join("shaders"));
        assert_eq!(resolve_shader_dir(None, fallback), fallback.join("shaders"));
    }
}
