use serde::Serialize;
use unifylink_frame::Frame;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{new_table, print_json, print_raw, OutputFormat};

#[derive(Serialize)]
struct EncodedOutput {
    seq: u8,
    component_id: u8,
    data_id: u8,
    flags: u8,
    crc: bool,
    size: usize,
    frame: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = payload_from_args(&args)?;
    let config = args.wire.frame_config();
    let frame = Frame::new(args.component, args.data, payload)
        .with_seq(args.seq)
        .with_flags(args.flags);
    let wire = frame
        .to_bytes(&config)
        .map_err(|err| frame_error("encode failed", err))?;
    tracing::debug!(size = wire.len(), "frame encoded");

    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            seq: args.seq,
            component_id: args.component,
            data_id: args.data,
            flags: args.flags,
            crc: !args.wire.no_crc,
            size: wire.len(),
            frame: hex::encode(&wire),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["COMPONENT", "DATA", "SEQ", "SIZE", "FRAME"]);
            table.add_row(vec![
                args.component.to_string(),
                args.data.to_string(),
                args.seq.to_string(),
                wire.len().to_string(),
                hex::encode(&wire),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", hex::encode(&wire)),
        OutputFormat::Raw => print_raw(&wire),
    }

    Ok(SUCCESS)
}

fn payload_from_args(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    match (&args.hex, &args.text) {
        (Some(hex_text), _) => parse_hex(hex_text),
        (None, Some(text)) => Ok(text.as_bytes().to_vec()),
        (None, None) => Ok(Vec::new()),
    }
}

/// Decode hex digits, ignoring whitespace.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&digits).map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_ignores_whitespace() {
        assert_eq!(parse_hex("a0 01\n02").unwrap(), vec![0xA0, 0x01, 0x02]);
    }

    #[test]
    fn parse_hex_rejects_odd_length() {
        assert_eq!(parse_hex("abc").unwrap_err().code, DATA_INVALID);
    }
}
