use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the simulated device on a transport.
    Serve(ServeArgs),
    /// Decode one frame given as hex.
    Decode(DecodeArgs),
    /// Build a frame and print it as hex.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum TransportKind {
    /// Single-client TCP server.
    Tcp,
    /// In-memory host that replays the built-in command script.
    Loopback,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Transport to serve on.
    #[arg(long, value_enum, default_value = "tcp")]
    pub transport: TransportKind,
    /// Address to listen on (tcp transport): "host:port", "port" or "host".
    #[arg(long, value_name = "ADDR", default_value = "0.0.0.0:9001")]
    pub bind: String,
    /// Session configuration file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Seed for trigger timing, for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Stop after this many milliseconds instead of waiting for a signal.
    #[arg(long, value_name = "MS")]
    pub duration_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex; spaces and multiple arguments are allowed.
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Command id, decimal or 0x-prefixed hex.
    #[arg(long, value_parser = parse_u8)]
    pub cmd: u8,
    /// Sequence number, decimal or 0x-prefixed hex.
    #[arg(long, default_value = "0", value_parser = parse_u8)]
    pub seq: u8,
    /// Payload bytes as hex.
    #[arg(long, value_name = "HEX")]
    pub payload: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_u8(value: &str) -> Result<u8, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|err| format!("'{value}' is not a byte value: {err}"))
}

#[cfg(test)]
mod tests {
    use super::parse_u8;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_u8("20"), Ok(20));
        assert_eq!(parse_u8("0x14"), Ok(0x14));
        assert_eq!(parse_u8("0XFF"), Ok(0xFF));
        assert!(parse_u8("256").is_err());
        assert!(parse_u8("0x").is_err());
    }
}
