use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use devlink_device::payload::{decode_pong, parse_configure_stream};
use devlink_device::{
    DataPacket, DeviceInfo, EndpointStats, EventTriggered, LogMessage, Nack, StatusReport,
};
use devlink_frame::{command_name, CommandId, Frame};
use serde::Serialize;
use serde_json::{json, Value};

use crate::hexfmt::to_hex;

const FRAME_SCHEMA: &str = "https://schemas.3leaps.dev/devlink/cli/v1/frame.schema.json";
const ENCODED_SCHEMA: &str = "https://schemas.3leaps.dev/devlink/cli/v1/encoded-frame.schema.json";
const STATS_SCHEMA: &str = "https://schemas.3leaps.dev/devlink/cli/v1/endpoint-stats.schema.json";

/// Payload bytes shown before the preview is cut.
const PREVIEW_BYTES: usize = 32;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    schema_id: &'a str,
    command: u8,
    command_name: &'a str,
    seq: u8,
    payload_size: usize,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    schema_id: &'a str,
    command: u8,
    command_name: &'a str,
    seq: u8,
    size: usize,
    frame: String,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    schema_id: &'a str,
    transport: &'a str,
    #[serde(flatten)]
    stats: &'a EndpointStats,
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let details = payload_details(frame);
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                schema_id: FRAME_SCHEMA,
                command: frame.command,
                command_name: command_name(frame.command),
                seq: frame.seq,
                payload_size: frame.payload.len(),
                payload: to_hex(&frame.payload),
                details,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "SEQ", "SIZE", "DETAILS"])
                .add_row(vec![
                    format!("{} (0x{:02X})", command_name(frame.command), frame.command),
                    frame.seq.to_string(),
                    frame.payload.len().to_string(),
                    details
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| payload_preview(&frame.payload)),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let summary = details
                .map(|d| d.to_string())
                .unwrap_or_else(|| payload_preview(&frame.payload));
            println!(
                "cmd={} (0x{:02X}) seq={} size={} {}",
                command_name(frame.command),
                frame.command,
                frame.seq,
                frame.payload.len(),
                summary
            );
        }
    }
}

pub fn print_encoded(command: u8, seq: u8, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EncodedOutput {
                schema_id: ENCODED_SCHEMA,
                command,
                command_name: command_name(command),
                seq,
                size: wire.len(),
                frame: to_hex(wire),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "SEQ", "SIZE", "FRAME"])
                .add_row(vec![
                    command_name(command).to_string(),
                    seq.to_string(),
                    wire.len().to_string(),
                    to_hex(wire),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", to_hex(wire)),
    }
}

pub fn print_stats(transport: &str, stats: &EndpointStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                schema_id: STATS_SCHEMA,
                transport,
                stats,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METRIC", "VALUE"]);
            for (name, value) in stats_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = stats_rows(stats)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("transport={transport} {}", fields.join(" "));
        }
    }
}

fn stats_rows(stats: &EndpointStats) -> [(&'static str, u64); 6] {
    [
        ("iterations", stats.iterations),
        ("bytes_received", stats.bytes_received),
        ("bytes_lost", stats.bytes_lost),
        ("frames_received", stats.frames_received),
        ("frames_rejected", stats.frames_rejected),
        ("frames_sent", stats.frames_sent),
    ]
}

fn payload_preview(payload: &[u8]) -> String {
    if payload.is_empty() {
        return "-".to_string();
    }
    if payload.len() <= PREVIEW_BYTES {
        return to_hex(payload);
    }
    format!(
        "{} ... ({} bytes)",
        to_hex(&payload[..PREVIEW_BYTES]),
        payload.len()
    )
}

fn to_details<T: Serialize>(decoded: devlink_device::Result<T>) -> devlink_device::Result<Value> {
    Ok(serde_json::to_value(decoded?)?)
}

/// Structured view of a payload whose layout the command defines.
fn payload_details(frame: &Frame) -> Option<Value> {
    let payload = frame.payload.as_ref();
    let decoded = match frame.command_id()? {
        CommandId::Pong => {
            decode_pong(payload).map(|id| json!({ "device_id": format!("{id:#018x}") }))
        }
        CommandId::StatusResponse => to_details(StatusReport::decode(payload)),
        CommandId::DeviceInfoResponse => to_details(DeviceInfo::decode(payload)),
        CommandId::EventTriggered => to_details(EventTriggered::decode(payload)),
        CommandId::LogMessage => to_details(LogMessage::decode(payload)),
        CommandId::DataPacket => DataPacket::decode(payload).map(|packet| data_summary(&packet)),
        CommandId::Nack => Nack::decode(payload).map(|nack| {
            json!({
                "category": nack.category(),
                "code": nack.code(),
                "reason": nack.to_string(),
            })
        }),
        CommandId::ConfigureStream => match parse_configure_stream(payload) {
            Some(entries) => to_details(Ok(entries)),
            None => return None,
        },
        _ => return None,
    };
    Some(decoded.unwrap_or_else(|err| json!({ "error": err.to_string() })))
}

fn data_summary(packet: &DataPacket) -> Value {
    let min = packet.samples.iter().copied().min();
    let max = packet.samples.iter().copied().max();
    json!({
        "timestamp": packet.timestamp,
        "channel_mask": packet.channel_mask,
        "channels": packet.channel_count(),
        "sample_count": packet.sample_count,
        "min": min,
        "max": max,
    })
}
