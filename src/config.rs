// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section has defaults, so a missing file, a missing section or a
// missing key all fall back to something that runs.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use winit::keyboard::KeyCode;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Root configuration structure
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub controls: ControlsConfig,
}

/// Window settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Overrides the sample's own name in the title bar
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: None,
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub max_frames_in_flight: usize,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            max_frames_in_flight: 2,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: false,
            log_file: "vkbridge.log".to_string(),
            show_fps: true,
        }
    }
}

/// Control key bindings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControlsConfig {
    pub fullscreen_key: String,
    pub quit_key: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            fullscreen_key: "F11".to_string(),
            quit_key: "Escape".to_string(),
        }
    }
}

impl ControlsConfig {
    pub fn quit_key_code(&self) -> KeyCode {
        parse_key(&self.quit_key).unwrap_or_else(|| {
            log::warn!("Unknown quit key '{}', using Escape", self.quit_key);
            KeyCode::Escape
        })
    }

    pub fn fullscreen_key_code(&self) -> KeyCode {
        parse_key(&self.fullscreen_key).unwrap_or_else(|| {
            log::warn!("Unknown fullscreen key '{}', using F11", self.fullscreen_key);
            KeyCode::F11
        })
    }
}

/// Maps a key name from the config file to a physical key code.
pub fn parse_key(name: &str) -> Option<KeyCode> {
    const LETTERS: [KeyCode; 26] = [
        KeyCode::KeyA, KeyCode::KeyB, KeyCode::KeyC, KeyCode::KeyD, KeyCode::KeyE,
        KeyCode::KeyF, KeyCode::KeyG, KeyCode::KeyH, KeyCode::KeyI, KeyCode::KeyJ,
        KeyCode::KeyK, KeyCode::KeyL, KeyCode::KeyM, KeyCode::KeyN, KeyCode::KeyO,
        KeyCode::KeyP, KeyCode::KeyQ, KeyCode::KeyR, KeyCode::KeyS, KeyCode::KeyT,
        KeyCode::KeyU, KeyCode::KeyV, KeyCode::KeyW, KeyCode::KeyX, KeyCode::KeyY,
        KeyCode::KeyZ,
    ];
    const FUNCTION_KEYS: [KeyCode; 12] = [
        KeyCode::F1, KeyCode::F2, KeyCode::F3, KeyCode::F4, KeyCode::F5, KeyCode::F6,
        KeyCode::F7, KeyCode::F8, KeyCode::F9, KeyCode::F10, KeyCode::F11, KeyCode::F12,
    ];

    let name = name.trim().to_ascii_lowercase();
    match name.as_str() {
        "escape" | "esc" => return Some(KeyCode::Escape),
        "space" => return Some(KeyCode::Space),
        "enter" | "return" => return Some(KeyCode::Enter),
        "tab" => return Some(KeyCode::Tab),
        _ => {}
    }

    if let [letter @ b'a'..=b'z'] = name.as_bytes() {
        return Some(LETTERS[(letter - b'a') as usize]);
    }

    let number: usize = name.strip_prefix('f')?.parse().ok()?;
    FUNCTION_KEYS.get(number.checked_sub(1)?).copied()
}

/// Where the configuration came from. Kept so it can be reported once the
/// logger exists, since loading happens before logging is set up.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Missing(PathBuf),
    Invalid(PathBuf, anyhow::Error),
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
}

impl LoadedConfig {
    pub fn report(&self) {
        match &self.source {
            ConfigSource::File(path) => {
                log::info!("Loaded configuration from {:?}", path);
                log::debug!("Config: {:?}", self.config);
            }
            ConfigSource::Missing(path) => {
                log::info!("Config file not found at {:?}, using defaults", path);
            }
            ConfigSource::Invalid(path, e) => {
                log::warn!("Failed to load {:?}: {:#}. Using defaults.", path, e);
            }
        }
    }
}

impl Config {
    /// Load `config.toml`, falling back to defaults if it is missing or broken
    pub fn load() -> LoadedConfig {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> LoadedConfig {
        let path = path.as_ref();

        if !path.exists() {
            return LoadedConfig {
                config: Config::default(),
                source: ConfigSource::Missing(path.to_path_buf()),
            };
        }

        match Self::load_from_path(path) {
            Ok(config) => LoadedConfig {
                config,
                source: ConfigSource::File(path.to_path_buf()),
            },
            Err(e) => LoadedConfig {
                config: Config::default(),
                source: ConfigSource::Invalid(path.to_path_buf(), e),
            },
        }
    }

    /// Load configuration from a specific path; a missing file gives defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.graphics.max_frames_in_flight == 0 {
            anyhow::bail!("graphics.max_frames_in_flight must be at least 1");
        }
        Ok(config)
    }

    /// Window title: the configured override, or the sample's own name
    pub fn title<'a>(&'a self, app_name: &'a str) -> &'a str {
        self.window.title.as_deref().unwrap_or(app_name)
    }

    /// Get present mode as Vulkan enum
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                vk::PresentModeKHR::FIFO
            }
        }
    }
}
