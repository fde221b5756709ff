//! Payload layouts for every command that carries data.
//!
//! All multi-byte fields are little-endian. Each type encodes to the exact
//! bytes the device puts on the wire and decodes them back, so hosts, tests
//! and the CLI share one definition.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use devlink_frame::MAX_PAYLOAD;
use serde::Serialize;

use crate::error::{DeviceError, Result};

/// Samples per channel in every DATA_PACKET.
pub const SAMPLES_PER_PACKET: u16 = 100;

/// STATUS_RESPONSE is padded to this length.
pub const STATUS_PAYLOAD_LEN: usize = 8;

pub const EVENT_PAYLOAD_LEN: usize = 14;

/// Size of one `(channel, rate, format)` entry in CONFIGURE_STREAM.
pub const CHANNEL_CONFIG_ENTRY_LEN: usize = 6;

const DATA_HEADER_LEN: usize = 8;

fn ensure(what: &'static str, payload: &[u8], needed: usize) -> Result<()> {
    if payload.len() < needed {
        return Err(DeviceError::Truncated {
            what,
            needed,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StreamMode {
    Continuous = 0,
    Trigger = 1,
}

impl TryFrom<u8> for StreamMode {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Continuous),
            1 => Ok(Self::Trigger),
            other => Err(DeviceError::InvalidPayload {
                what: "status",
                reason: format!("unknown mode {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StreamStatus {
    Stopped = 0,
    Running = 1,
}

impl TryFrom<u8> for StreamStatus {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Stopped),
            1 => Ok(Self::Running),
            other => Err(DeviceError::InvalidPayload {
                what: "status",
                reason: format!("unknown stream status {other}"),
            }),
        }
    }
}

/// PONG payload: the device identifier.
pub fn encode_pong(device_id: u64) -> [u8; 8] {
    device_id.to_le_bytes()
}

pub fn decode_pong(payload: &[u8]) -> Result<u64> {
    ensure("pong", payload, 8)?;
    Ok((&payload[..8]).get_u64_le())
}

/// STATUS_RESPONSE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub mode: StreamMode,
    pub status: StreamStatus,
    pub error_flag: u8,
    pub error_code: u8,
}

impl StatusReport {
    pub fn encode(&self) -> [u8; STATUS_PAYLOAD_LEN] {
        let mut out = [0u8; STATUS_PAYLOAD_LEN];
        out[0] = self.mode as u8;
        out[1] = self.status as u8;
        out[2] = self.error_flag;
        out[3] = self.error_code;
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        ensure("status", payload, 4)?;
        Ok(Self {
            mode: StreamMode::try_from(payload[0])?,
            status: StreamStatus::try_from(payload[1])?,
            error_flag: payload[2],
            error_code: payload[3],
        })
    }
}

/// One channel as advertised in DEVICE_INFO_RESPONSE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDescriptor {
    pub id: u8,
    pub max_sample_rate: u32,
    pub supported_formats: u16,
    pub name: String,
}

/// DEVICE_INFO_RESPONSE payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub protocol_version: u8,
    pub firmware_version: u16,
    pub channels: Vec<ChannelDescriptor>,
}

impl DeviceInfo {
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(4 + self.channels.len() * 16);
        out.put_u8(self.protocol_version);
        out.put_u16_le(self.firmware_version);
        out.put_u8(self.channels.len() as u8);
        for channel in &self.channels {
            let name = &channel.name.as_bytes()[..channel.name.len().min(usize::from(u8::MAX))];
            out.put_u8(channel.id);
            out.put_u32_le(channel.max_sample_rate);
            out.put_u16_le(channel.supported_formats);
            out.put_u8(name.len() as u8);
            out.put_slice(name);
        }
        out.freeze()
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        const WHAT: &str = "device info";
        ensure(WHAT, payload, 4)?;
        let mut buf = payload;
        let protocol_version = buf.get_u8();
        let firmware_version = buf.get_u16_le();
        let count = buf.get_u8();

        let mut channels = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let offset = payload.len() - buf.len();
            ensure(WHAT, payload, offset + 8)?;
            let id = buf.get_u8();
            let max_sample_rate = buf.get_u32_le();
            let supported_formats = buf.get_u16_le();
            let name_len = usize::from(buf.get_u8());
            ensure(WHAT, payload, offset + 8 + name_len)?;
            let name = String::from_utf8_lossy(&buf[..name_len]).into_owned();
            buf.advance(name_len);
            channels.push(ChannelDescriptor {
                id,
                max_sample_rate,
                supported_formats,
                name,
            });
        }

        Ok(Self {
            protocol_version,
            firmware_version,
            channels,
        })
    }
}

/// One entry of a CONFIGURE_STREAM request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelConfigEntry {
    pub channel_id: u8,
    /// Zero disables the channel.
    pub sample_rate: u32,
    pub format: u8,
}

/// Build a CONFIGURE_STREAM payload.
pub fn encode_configure_stream(entries: &[ChannelConfigEntry]) -> Bytes {
    let mut out = BytesMut::with_capacity(1 + entries.len() * CHANNEL_CONFIG_ENTRY_LEN);
    out.put_u8(entries.len() as u8);
    for entry in entries {
        out.put_u8(entry.channel_id);
        out.put_u32_le(entry.sample_rate);
        out.put_u8(entry.format);
    }
    out.freeze()
}

/// Parse a CONFIGURE_STREAM payload.
///
/// Returns `None` for an empty payload. Otherwise yields at most `count`
/// entries, stopping early at the first entry the payload cannot hold.
pub fn parse_configure_stream(payload: &[u8]) -> Option<Vec<ChannelConfigEntry>> {
    let (&count, mut rest) = payload.split_first()?;
    let mut entries = Vec::with_capacity(usize::from(count));
    while entries.len() < usize::from(count) && rest.len() >= CHANNEL_CONFIG_ENTRY_LEN {
        entries.push(ChannelConfigEntry {
            channel_id: rest.get_u8(),
            sample_rate: rest.get_u32_le(),
            format: rest.get_u8(),
        });
    }
    Some(entries)
}

/// DATA_PACKET payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataPacket {
    pub timestamp: u32,
    /// Bit `n` set when channel `n` contributes samples.
    pub channel_mask: u16,
    pub sample_count: u16,
    /// `sample_count` samples per enabled channel, lowest channel first.
    pub samples: Vec<i16>,
}

impl DataPacket {
    pub fn channel_count(&self) -> usize {
        self.channel_mask.count_ones() as usize
    }

    /// Samples of the `index`-th enabled channel.
    pub fn channel_samples(&self, index: usize) -> Option<&[i16]> {
        let count = usize::from(self.sample_count);
        self.samples.get(index * count..(index + 1) * count)
    }

    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(DATA_HEADER_LEN + self.samples.len() * 2);
        out.put_u32_le(self.timestamp);
        out.put_u16_le(self.channel_mask);
        out.put_u16_le(self.sample_count);
        for &sample in &self.samples {
            out.put_i16_le(sample);
        }
        out.freeze()
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        const WHAT: &str = "data packet";
        ensure(WHAT, payload, DATA_HEADER_LEN)?;
        let mut buf = payload;
        let timestamp = buf.get_u32_le();
        let channel_mask = buf.get_u16_le();
        let sample_count = buf.get_u16_le();

        let total = channel_mask.count_ones() as usize * usize::from(sample_count);
        let expected = DATA_HEADER_LEN + total * 2;
        if payload.len() != expected {
            return Err(DeviceError::InvalidPayload {
                what: WHAT,
                reason: format!("expected {expected} bytes, got {}", payload.len()),
            });
        }
        let samples = (0..total).map(|_| buf.get_i16_le()).collect();

        Ok(Self {
            timestamp,
            channel_mask,
            sample_count,
            samples,
        })
    }
}

/// EVENT_TRIGGERED payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventTriggered {
    pub timestamp: u32,
    pub channel: u16,
    pub pre_samples: u32,
    pub post_samples: u32,
}

impl EventTriggered {
    pub fn encode(&self) -> [u8; EVENT_PAYLOAD_LEN] {
        let mut out = [0u8; EVENT_PAYLOAD_LEN];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.timestamp);
        buf.put_u16_le(self.channel);
        buf.put_u32_le(self.pre_samples);
        buf.put_u32_le(self.post_samples);
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        ensure("event", payload, EVENT_PAYLOAD_LEN)?;
        let mut buf = payload;
        Ok(Self {
            timestamp: buf.get_u32_le(),
            channel: buf.get_u16_le(),
            pre_samples: buf.get_u32_le(),
            post_samples: buf.get_u32_le(),
        })
    }
}

/// Severity carried in a LOG_MESSAGE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    pub fn from_code(value: u8) -> Result<Self> {
        match value {
            1 => Ok(LogLevel::Error),
            2 => Ok(LogLevel::Warn),
            3 => Ok(LogLevel::Info),
            4 => Ok(LogLevel::Debug),
            other => Err(DeviceError::InvalidPayload {
                what: "log message",
                reason: format!("unknown level {other}"),
            }),
        }
    }
}

/// LOG_MESSAGE payload: a level byte followed by UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub text: String,
}

impl LogMessage {
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    /// Encode, cutting the text at a character boundary if it would not fit
    /// in one frame.
    pub fn encode(&self) -> Bytes {
        let mut end = self.text.len().min(MAX_PAYLOAD - 1);
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        let mut out = BytesMut::with_capacity(1 + end);
        out.put_u8(self.level as u8);
        out.put_slice(&self.text.as_bytes()[..end]);
        out.freeze()
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        ensure("log message", payload, 1)?;
        let level = LogLevel::from_code(payload[0])?;
        let text = std::str::from_utf8(&payload[1..]).map_err(|err| {
            DeviceError::InvalidPayload {
                what: "log message",
                reason: err.to_string(),
            }
        })?;
        Ok(Self::new(level, text))
    }
}

pub const NACK_PARAM_ERROR: u8 = 0x01;
pub const NACK_STATUS_ERROR: u8 = 0x02;
pub const NACK_COMMAND_NOT_SUPPORTED: u8 = 0x05;

/// Reason carried by a NACK frame as `(category, code)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nack {
    ParamError(u8),
    StatusError(u8),
    CommandNotSupported,
}

impl Nack {
    /// CONFIGURE_STREAM with an empty payload.
    pub const EMPTY_CONFIGURATION: Nack = Nack::ParamError(0x01);

    /// REQUEST_BUFFERED_DATA with no captured trigger.
    pub const NO_TRIGGER_DATA: Nack = Nack::StatusError(0x02);

    pub fn category(self) -> u8 {
        match self {
            Nack::ParamError(_) => NACK_PARAM_ERROR,
            Nack::StatusError(_) => NACK_STATUS_ERROR,
            Nack::CommandNotSupported => NACK_COMMAND_NOT_SUPPORTED,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Nack::ParamError(code) | Nack::StatusError(code) => code,
            Nack::CommandNotSupported => 0x00,
        }
    }

    pub fn encode(self) -> [u8; 2] {
        [self.category(), self.code()]
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        ensure("nack", payload, 2)?;
        match payload[0] {
            NACK_PARAM_ERROR => Ok(Nack::ParamError(payload[1])),
            NACK_STATUS_ERROR => Ok(Nack::StatusError(payload[1])),
            NACK_COMMAND_NOT_SUPPORTED => Ok(Nack::CommandNotSupported),
            other => Err(DeviceError::InvalidPayload {
                what: "nack",
                reason: format!("unknown category {other:#04x}"),
            }),
        }
    }
}

impl std::fmt::Display for Nack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Nack::ParamError(code) => write!(f, "parameter error (code {code:#04x})"),
            Nack::StatusError(code) => write!(f, "status error (code {code:#04x})"),
            Nack::CommandNotSupported => f.write_str("command not supported"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pong_is_little_endian_id() {
        let payload = encode_pong(0x1122_3344_AABB_CCDD);
        assert_eq!(payload, [0xDD, 0xCC, 0xBB, 0xAA, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(decode_pong(&payload).unwrap(), 0x1122_3344_AABB_CCDD);
    }

    #[test]
    fn status_is_padded() {
        let report = StatusReport {
            mode: StreamMode::Trigger,
            status: StreamStatus::Running,
            error_flag: 0,
            error_code: 0,
        };
        assert_eq!(report.encode(), [1, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(StatusReport::decode(&report.encode()).unwrap(), report);
    }

    #[test]
    fn device_info_layout() {
        let info = DeviceInfo {
            protocol_version: 6,
            firmware_version: 0x0201,
            channels: vec![ChannelDescriptor {
                id: 0,
                max_sample_rate: 100_000,
                supported_formats: 0x0003,
                name: "Voltage".into(),
            }],
        };
        let bytes = info.encode();
        assert_eq!(
            &bytes[..],
            &[
                6, 0x01, 0x02, 1, 0, 0xA0, 0x86, 0x01, 0x00, 0x03, 0x00, 7, b'V', b'o', b'l',
                b't', b'a', b'g', b'e'
            ]
        );
        assert_eq!(DeviceInfo::decode(&bytes).unwrap(), info);
    }

    #[test]
    fn device_info_truncated_name() {
        let mut bytes = DeviceInfo {
            protocol_version: 6,
            firmware_version: 1,
            channels: vec![ChannelDescriptor {
                id: 0,
                max_sample_rate: 1,
                supported_formats: 1,
                name: "abc".into(),
            }],
        }
        .encode()
        .to_vec();
        bytes.pop();
        assert!(matches!(
            DeviceInfo::decode(&bytes),
            Err(DeviceError::Truncated { .. })
        ));
    }

    #[test]
    fn configure_stream_parsing_is_bounded() {
        let entries = [
            ChannelConfigEntry {
                channel_id: 0,
                sample_rate: 10_000,
                format: 1,
            },
            ChannelConfigEntry {
                channel_id: 1,
                sample_rate: 0,
                format: 1,
            },
        ];
        let payload = encode_configure_stream(&entries);
        assert_eq!(&payload[..7], &[2, 0, 0x10, 0x27, 0, 0, 1]);
        assert_eq!(parse_configure_stream(&payload).unwrap(), entries);

        // Count claims more entries than the payload carries.
        let mut short = payload.to_vec();
        short[0] = 5;
        short.truncate(1 + CHANNEL_CONFIG_ENTRY_LEN + 3);
        assert_eq!(parse_configure_stream(&short).unwrap(), &entries[..1]);

        assert!(parse_configure_stream(&[]).is_none());
        assert!(parse_configure_stream(&[0]).unwrap().is_empty());
    }

    #[test]
    fn data_packet_layout() {
        let packet = DataPacket {
            timestamp: 0x0102_0304,
            channel_mask: 0b101,
            sample_count: 2,
            samples: vec![1, -1, 300, -300],
        };
        let bytes = packet.encode();
        assert_eq!(&bytes[..8], &[0x04, 0x03, 0x02, 0x01, 0x05, 0x00, 0x02, 0x00]);
        assert_eq!(&bytes[8..10], &[0x01, 0x00]);
        assert_eq!(&bytes[10..12], &[0xFF, 0xFF]);

        let decoded = DataPacket::decode(&bytes).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.channel_samples(1).unwrap(), &[300, -300]);
        assert!(decoded.channel_samples(2).is_none());
    }

    #[test]
    fn data_packet_length_checked() {
        let mut bytes = DataPacket {
            timestamp: 0,
            channel_mask: 1,
            sample_count: 3,
            samples: vec![0, 0, 0],
        }
        .encode()
        .to_vec();
        bytes.pop();
        assert!(matches!(
            DataPacket::decode(&bytes),
            Err(DeviceError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn event_layout() {
        let event = EventTriggered {
            timestamp: 5000,
            channel: 0,
            pre_samples: 1000,
            post_samples: 1000,
        };
        let bytes = event.encode();
        assert_eq!(
            bytes,
            [0x88, 0x13, 0, 0, 0, 0, 0xE8, 0x03, 0, 0, 0xE8, 0x03, 0, 0]
        );
        assert_eq!(EventTriggered::decode(&bytes).unwrap(), event);
    }

    #[test]
    fn log_message_roundtrip_and_limits() {
        let msg = LogMessage::new(LogLevel::Warn, "rx overflow");
        let bytes = msg.encode();
        assert_eq!(bytes[0], 2);
        assert_eq!(LogMessage::decode(&bytes).unwrap(), msg);

        let long = LogMessage::new(LogLevel::Info, "é".repeat(MAX_PAYLOAD));
        let bytes = long.encode();
        assert!(bytes.len() <= MAX_PAYLOAD);
        assert!(LogMessage::decode(&bytes).is_ok());

        assert!(LogMessage::decode(&[9, b'x']).is_err());
    }

    #[test]
    fn nack_payloads() {
        assert_eq!(Nack::EMPTY_CONFIGURATION.encode(), [0x01, 0x01]);
        assert_eq!(Nack::NO_TRIGGER_DATA.encode(), [0x02, 0x02]);
        assert_eq!(Nack::CommandNotSupported.encode(), [0x05, 0x00]);
        assert_eq!(Nack::decode(&[0x02, 0x02]).unwrap(), Nack::NO_TRIGGER_DATA);
        assert!(Nack::decode(&[0x07, 0x00]).is_err());
    }
}
