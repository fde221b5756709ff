use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};

/// Hard upper bound on channels a session can describe.
pub const MAX_CHANNELS: usize = 8;

/// Identifier answered to PING unless configured otherwise.
pub const DEFAULT_DEVICE_ID: u64 = 0x1122_3344_AABB_CCDD;

/// Protocol revision reported in DEVICE_INFO.
pub const DEFAULT_PROTOCOL_VERSION: u8 = 6;

/// Firmware version reported in DEVICE_INFO (v2.1).
pub const DEFAULT_FIRMWARE_VERSION: u16 = 0x0201;

/// Sample format bit for signed 16-bit samples.
pub const FORMAT_INT16: u8 = 0x01;

/// Sample format bit for signed 32-bit samples.
pub const FORMAT_INT32: u8 = 0x02;

const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Static description and initial stream settings of one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelSpec {
    pub name: String,
    pub max_sample_rate: u32,
    /// Bitmask of supported sample formats.
    pub supported_formats: u16,
    pub enabled: bool,
    pub sample_rate: u32,
    pub format: u8,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for ChannelSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_sample_rate: 100_000,
            supported_formats: u16::from(FORMAT_INT16 | FORMAT_INT32),
            enabled: true,
            sample_rate: 10_000,
            format: FORMAT_INT16,
        }
    }
}

/// Identity and channel layout of the simulated device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub device_id: u64,
    pub protocol_version: u8,
    pub firmware_version: u16,
    pub channels: Vec<ChannelSpec>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            firmware_version: DEFAULT_FIRMWARE_VERSION,
            channels: vec![ChannelSpec::new("Voltage"), ChannelSpec::new("Current")],
        }
    }
}

impl SessionConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(DeviceError::Config(format!(
                "{} is {} bytes, limit is {MAX_CONFIG_FILE_SIZE}",
                path.display(),
                metadata.len()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.len() > MAX_CHANNELS {
            return Err(DeviceError::Config(format!(
                "{} channels configured, at most {MAX_CHANNELS} supported",
                self.channels.len()
            )));
        }
        for (id, channel) in self.channels.iter().enumerate() {
            if channel.name.len() > usize::from(u8::MAX) {
                return Err(DeviceError::Config(format!(
                    "channel {id} name is {} bytes, at most 255 allowed",
                    channel.name.len()
                )));
            }
        }
        Ok(())
    }
}
