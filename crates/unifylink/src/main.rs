mod catalog;
mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "unify-link", version, about = "Unify Link frame tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). Overridden by UNIFY_LINK_LOG.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_encode_subcommand() {
        let cli = Cli::try_parse_from([
            "unify-link",
            "encode",
            "--component",
            "1",
            "--data",
            "4",
            "--hex",
            "0a0b",
        ])
        .expect("encode args should parse");

        assert!(matches!(cli.command, Command::Encode(_)));
    }

    #[test]
    fn rejects_out_of_range_component() {
        let err = Cli::try_parse_from(["unify-link", "encode", "--component", "300", "--data", "1"])
            .expect_err("component above 255 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_monitor_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "unify-link",
            "monitor",
            "/dev/ttyACM0",
            "--interval",
            "500ms",
            "--format",
            "json",
        ])
        .expect("monitor args should parse");
        assert!(matches!(cli.command, Command::Monitor(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
