// Pipeline color blend attachment state
//
// `vk::PipelineColorBlendAttachmentState::default()` zeroes every field,
// which leaves the write mask empty and nothing reaches the attachment.
// `ColorBlendAttachment` carries the native "blending off" values instead.

use ash::vk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_color_blend_factor: vk::BlendFactor,
    pub dst_color_blend_factor: vk::BlendFactor,
    pub color_blend_op: vk::BlendOp,
    pub src_alpha_blend_factor: vk::BlendFactor,
    pub dst_alpha_blend_factor: vk::BlendFactor,
    pub alpha_blend_op: vk::BlendOp,
    pub color_write_mask: vk::ColorComponentFlags,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_blend_factor: vk::BlendFactor::ONE,
            dst_color_blend_factor: vk::BlendFactor::ZERO,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        }
    }
}

impl ColorBlendAttachment {
    /// Blending disabled, all channels written.
    pub fn opaque() -> Self {
        Self::default()
    }

    /// Classic `src * a + dst * (1 - a)` blending.
    pub fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            ..Self::default()
        }
    }

    pub fn with_write_mask(mut self, mask: vk::ColorComponentFlags) -> Self {
        self.color_write_mask = mask;
        self
    }

    pub fn to_vk(self) -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: if self.blend_enable { vk::TRUE } else { vk::FALSE },
            src_color_blend_factor: self.src_color_blend_factor,
            dst_color_blend_factor: self.dst_color_blend_factor,
            color_blend_op: self.color_blend_op,
            src_alpha_blend_factor: self.src_alpha_blend_factor,
            dst_alpha_blend_factor: self.dst_alpha_blend_factor,
            alpha_blend_op: self.alpha_blend_op,
            color_write_mask: self.color_write_mask,
        }
    }
}

impl From<ColorBlendAttachment> for vk::PipelineColorBlendAttachmentState {
    fn from(value: ColorBlendAttachment) -> Self {
        value.to_vk()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_native_no_blend_state() {
        let state = ColorBlendAttachment::default().to_vk();

        assert_eq!(state.blend_enable, vk::FALSE);
        assert_eq!(state.src_color_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ZERO);
        assert_eq!(state.color_blend_op, vk::BlendOp::ADD);
        assert_eq!(state.src_alpha_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(state.dst_alpha_blend_factor, vk::BlendFactor::ZERO);
        assert_eq!(state.alpha_blend_op, vk::BlendOp::ADD);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn write_mask_covers_all_four_channels() {
        let mask = ColorBlendAttachment::opaque().color_write_mask;
        assert_eq!(mask.as_raw(), 0xF);
    }

    #[test]
    fn alpha_blend_enables_blending() {
        let state: vk::PipelineColorBlendAttachmentState = ColorBlendAttachment::alpha_blend().into();

        assert_eq!(state.blend_enable, vk::TRUE);
        assert_eq!(state.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert_eq!(state.color_blend_op, vk::BlendOp::ADD);
    }

    #[test]
    fn write_mask_override() {
        let state = ColorBlendAttachment::opaque()
            .with_write_mask(vk::ColorComponentFlags::R | vk::ColorComponentFlags::G)
            .to_vk();
        assert_eq!(state.color_write_mask.as_raw(), 0x3);
    }
}
