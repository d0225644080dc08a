// Shader module loading
//
// Vulkan consumes SPIR-V words. `ash::util::read_spv` checks the magic
// number and realigns the bytes, so files read into a `Vec<u8>` are safe to
// hand over.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;

/// Decode SPIR-V bytes into 32-bit words
pub fn decode_spirv(code: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(code)).context("Invalid SPIR-V bytecode")
}

/// Load SPIR-V shader from bytes and create a shader module
pub fn create_shader_module(device: &ash::Device, code: &[u8]) -> Result<vk::ShaderModule> {
    let words = decode_spirv(code)?;
    let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

    unsafe {
        device
            .create_shader_module(&create_info, None)
            .context("Failed to create shader module")
    }
}

/// Read a compiled shader from disk
pub fn read_spirv_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| {
        format!(
            "Failed to read shader {:?} (compile it with `glslc` or install the Vulkan SDK)",
            path
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn decodes_little_endian_words() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&SPIRV_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());

        let words = decode_spirv(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = [0x03, 0x02, 0x23, 0x07, 0x00];
        assert!(decode_spirv(&bytes).is_err());
    }

    #[test]
    fn rejects_missing_magic() {
        let bytes = 0xDEAD_BEEFu32.to_le_bytes();
        assert!(decode_spirv(&bytes).is_err());
    }

    #[test]
    fn missing_file_mentions_path() {
        let err = read_spirv_file(Path::new("no/such/shader.spv")).unwrap_err();
        assert!(format!("{:#}", err).contains("shader.spv"));
    }
}
