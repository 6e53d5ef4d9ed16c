//! Configuration management for crabcamera-session
//!
//! A TOML file carries the initial camera properties a view starts with and
//! the pixel format preferences handed to the format negotiator.

use crate::errors::CameraError;
use crate::types::PixelFormat;
use crate::view::CameraProps;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrabSessionConfig {
    #[serde(default)]
    pub camera: CameraProps,
    #[serde(default)]
    pub negotiation: NegotiationConfig,
}

/// Ordered pixel format preferences, most preferred first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Formats tried for video and frame-processing streams
    pub video_formats: Vec<PixelFormat>,
    /// Formats tried for still photo streams
    pub photo_formats: Vec<PixelFormat>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            video_formats: vec![PixelFormat::Yuv420_888],
            photo_formats: vec![PixelFormat::Jpeg],
        }
    }
}

impl CrabSessionConfig {
    /// Environment prefix for layered overrides, e.g. `CRABCAMERA_SESSION__CAMERA__ZOOM=2.0`
    pub const ENV_PREFIX: &'static str = "CRABCAMERA_SESSION";

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::InvalidConfig(format!("Failed to read config file: {}", e)))?;

        let config: CrabSessionConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::InvalidConfig(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(CameraError::InvalidConfig)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the file (if present) and apply `CRABCAMERA_SESSION__*` environment overrides
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let layered = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CameraError::InvalidConfig(format!("Failed to layer config: {}", e)))?;

        let config: CrabSessionConfig = layered
            .try_deserialize()
            .map_err(|e| CameraError::InvalidConfig(format!("Failed to parse config: {}", e)))?;

        config.validate().map_err(CameraError::InvalidConfig)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CameraError::InvalidConfig(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::InvalidConfig(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::InvalidConfig(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabcamera-session.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.negotiation.video_formats.is_empty() {
            return Err("At least one preferred video format is required".to_string());
        }
        if self.negotiation.photo_formats.is_empty() {
            return Err("At least one preferred photo format is required".to_string());
        }

        if let Some(format) = &self.camera.format {
            if format.video_width == 0 || format.video_height == 0 {
                return Err("Invalid video resolution".to_string());
            }
            if format.photo_width == 0 || format.photo_height == 0 {
                return Err("Invalid photo resolution".to_string());
            }
        }
        if let Some(fps) = self.camera.fps {
            if fps == 0 || fps > 240 {
                return Err("Invalid FPS (must be 1-240)".to_string());
            }
        }
        if !self.camera.zoom.is_finite() || self.camera.zoom <= 0.0 {
            return Err("Zoom must be a positive factor".to_string());
        }
        if let Some(orientation) = &self.camera.orientation {
            orientation
                .parse::<crate::orientation::Orientation>()
                .map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}
