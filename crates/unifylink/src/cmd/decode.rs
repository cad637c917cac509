use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc;

use serde::Serialize;
use unifylink_engine::{Engine, Handler, LinkStats};
use unifylink_frame::Frame;

use crate::cmd::encode::parse_hex;
use crate::cmd::DecodeArgs;
use crate::exit::{io_error, link_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frames, print_json, print_stats, OutputFormat};

#[derive(Serialize)]
struct DecodeSummary {
    frames: usize,
    trailing_bytes: usize,
    stats: LinkStats,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = read_input(args.input.as_deref())?;
    let capture = if args.hex {
        let text = String::from_utf8(raw)
            .map_err(|_| CliError::new(DATA_INVALID, "hex input is not valid UTF-8"))?;
        parse_hex(&text)?
    } else {
        raw
    };

    let (frames, engine) = scan(&capture, &args)?;
    let trailing_bytes = engine.buffered_bytes();
    tracing::debug!(
        frames = frames.len(),
        trailing_bytes,
        "capture scanned"
    );

    print_frames(&frames, format);
    match format {
        OutputFormat::Json => print_json(&DecodeSummary {
            frames: frames.len(),
            trailing_bytes,
            stats: engine.stats(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => print_stats(&engine.stats(), format),
        OutputFormat::Raw => {}
    }

    if frames.is_empty() && !capture.is_empty() {
        return Err(CliError::new(DATA_INVALID, "no frames found in input"));
    }
    Ok(SUCCESS)
}

fn read_input(path: Option<&Path>) -> CliResult<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => fs::read(path)
            .map_err(|err| io_error(&format!("failed to read {}", path.display()), err)),
        _ => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed to read stdin", err))?;
            Ok(buf)
        }
    }
}

/// Feed the capture through a full engine so counters match what a live
/// link would report.
fn scan(capture: &[u8], args: &DecodeArgs) -> CliResult<(Vec<Frame>, Engine)> {
    let mut engine = Engine::new(args.wire.link_config());
    let (tx, rx) = mpsc::channel();
    for component_id in 0..=u8::MAX {
        for data_id in 0..=u8::MAX {
            let tx = tx.clone();
            engine.register(
                component_id,
                data_id,
                Handler::raw(move |frame: &Frame| {
                    let _ = tx.send(frame.clone());
                }),
            );
        }
    }
    drop(tx);

    let mut rest = capture;
    while !rest.is_empty() {
        let room = engine.receive_capacity();
        let (chunk, tail) = rest.split_at(room.min(rest.len()));
        engine
            .push_received_bytes(chunk)
            .map_err(|err| link_error("scan failed", err))?;
        engine.run_parse_pass();
        rest = tail;
    }

    let frames = rx.try_iter().collect();
    Ok((frames, engine))
}
