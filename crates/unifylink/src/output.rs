use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use unifylink_engine::LinkStats;
use unifylink_frame::{component_name, Frame};

use crate::catalog::describe;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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
    seq: u8,
    component_id: u8,
    component: &'a str,
    data_id: u8,
    flags: u8,
    payload_size: usize,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoded: Option<serde_json::Value>,
}

impl<'a> FrameOutput<'a> {
    fn new(frame: &'a Frame) -> Self {
        Self {
            seq: frame.seq,
            component_id: frame.component_id,
            component: component_name(frame.component_id),
            data_id: frame.data_id,
            flags: frame.flags,
            payload_size: frame.payload.len(),
            payload: hex::encode(&frame.payload),
            decoded: describe(frame),
        }
    }
}

pub fn print_frames(frames: &[Frame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                print_json(&FrameOutput::new(frame));
            }
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["SEQ", "COMPONENT", "DATA", "FLAGS", "SIZE", "PAYLOAD"]);
            for frame in frames {
                table.add_row(vec![
                    frame.seq.to_string(),
                    component_name(frame.component_id).to_string(),
                    frame.data_id.to_string(),
                    format!("{:#04x}", frame.flags),
                    frame.payload.len().to_string(),
                    payload_preview(&frame.payload),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                let out = FrameOutput::new(frame);
                print!(
                    "seq={} component={} ({}) data={} flags={:#04x} size={} payload={}",
                    out.seq,
                    out.component_id,
                    out.component,
                    out.data_id,
                    out.flags,
                    out.payload_size,
                    payload_preview(&frame.payload)
                );
                match out.decoded {
                    Some(decoded) => println!(" decoded={decoded}"),
                    None => println!(),
                }
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(&frame.payload);
            }
        }
    }
}

pub fn print_stats(stats: &LinkStats, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(stats),
        OutputFormat::Table => {
            let mut table = new_table(vec!["COUNTER", "VALUE"]);
            for (name, value) in stats_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = stats_rows(stats)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn stats_rows(stats: &LinkStats) -> [(&'static str, u64); 9] {
    [
        ("success", stats.success_count),
        ("transport_errors", stats.transport_error_count),
        ("decode_errors", stats.decode_error_count),
        ("sequence_gaps", stats.sequence_gap_count),
        ("bytes_received", stats.bytes_received),
        ("bytes_drained", stats.bytes_drained),
        ("frames_enqueued", stats.frames_enqueued),
        ("enqueue_rejected", stats.enqueue_rejected),
        ("receive_overflow", stats.receive_overflow),
    ]
}

fn payload_preview(payload: &[u8]) -> String {
    const PREVIEW_BYTES: usize = 16;
    if payload.len() <= PREVIEW_BYTES {
        hex::encode(payload)
    } else {
        format!(
            "{}.. ({} bytes)",
            hex::encode(&payload[..PREVIEW_BYTES]),
            payload.len()
        )
    }
}
