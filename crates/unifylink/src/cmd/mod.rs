use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use unifylink_engine::LinkConfig;
use unifylink_frame::{FrameConfig, Integrity, DEFAULT_MAX_PAYLOAD};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod monitor;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one frame and print it.
    Encode(EncodeArgs),
    /// Find and print frames in a byte capture.
    Decode(DecodeArgs),
    /// Attach to a device and report link counters.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Codec options shared by every command that touches the wire.
#[derive(Args, Debug, Clone, Copy)]
pub struct WireArgs {
    /// Frames carry no CRC; the check word holds 8-bit flags instead.
    #[arg(long)]
    pub no_crc: bool,
    /// Largest payload accepted, in bytes (at most 8191).
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

impl WireArgs {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload,
            integrity: if self.no_crc {
                Integrity::None
            } else {
                Integrity::Crc16
            },
        }
    }

    pub fn link_config(&self) -> LinkConfig {
        let frame = self.frame_config();
        LinkConfig {
            frame,
            max_queue_bytes: 4 * frame.max_frame_len(),
            max_receive_bytes: 4 * frame.max_frame_len(),
        }
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Component id.
    #[arg(long, short = 'c')]
    pub component: u8,
    /// Data id within the component.
    #[arg(long, short = 'd')]
    pub data: u8,
    /// Payload as hex digits.
    #[arg(long, conflicts_with = "text")]
    pub hex: Option<String>,
    /// Payload as UTF-8 text.
    #[arg(long, conflicts_with = "hex")]
    pub text: Option<String>,
    /// Sequence id to stamp.
    #[arg(long, default_value_t = 0)]
    pub seq: u8,
    /// Frame flags (3 bits with CRC, 8 bits without).
    #[arg(long, default_value_t = 0)]
    pub flags: u8,
    #[command(flatten)]
    pub wire: WireArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file to read; `-` or absent reads stdin.
    pub input: Option<PathBuf>,
    /// Input is hex text rather than raw bytes.
    #[arg(long)]
    pub hex: bool,
    #[command(flatten)]
    pub wire: WireArgs,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Device node (already configured serial port, pipe or capture file).
    #[arg(env = "UNIFY_LINK_DEVICE")]
    pub device: PathBuf,
    /// Counter report interval (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Exit after N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Ask motors and encoders for feedback every interval.
    #[arg(long, conflicts_with = "listen_only")]
    pub request_feedback: bool,
    /// Never write to the device; outbound frames are discarded.
    #[arg(long)]
    pub listen_only: bool,
    #[command(flatten)]
    pub wire: WireArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
