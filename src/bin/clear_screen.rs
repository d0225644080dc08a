// Clears the window to an animated colour; the green channel ramps up and wraps.

use anyhow::Result;
use ash::vk;
use vkbridge::{Application, Frame, GraphicsDevice};

const GREEN_STEP: f32 = 0.001;

struct ClearScreen {
    green: f32,
}

/// Advance the green channel one step, wrapping to 0 once it passes 1
fn next_green(green: f32) -> f32 {
    let g = green + GREEN_STEP;
    if g > 1.0 {
        0.0
    } else {
        g
    }
}

impl Application for ClearScreen {
    fn name(&self) -> &str {
        "01-ClearScreen"
    }

    fn initialize(&mut self, _graphics: &GraphicsDevice) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self, device: &ash::Device, frame: &Frame) -> Result<()> {
        self.green = next_green(self.green);

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [1.0, self.green, 0.0, 1.0],
            },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(frame.render_pass)
            .framebuffer(frame.framebuffer)
            .render_area(frame.render_area())
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(
                frame.command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            device.cmd_set_blend_constants(frame.command_buffer, &[1.0, 1.0, 1.0, 1.0]);
            device.cmd_end_render_pass(frame.command_buffer);
        }

        Ok(())
    }

    fn destroy(&mut self, _graphics: &GraphicsDevice) {}
}

fn main() -> Result<()> {
    vkbridge::run(ClearScreen { green: 0.0 })
}
