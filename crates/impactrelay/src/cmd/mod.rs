use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use impactrelay_acquire::{DEFAULT_ACQUISITION_BAUD, DEFAULT_ACQUISITION_PORT};
use impactrelay_detect::{DEFAULT_MIN_GAP, DEFAULT_THRESHOLD};
use impactrelay_relay::{DEFAULT_RELAY_BAUD, DEFAULT_RELAY_PORT};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod ports;
pub mod replay;
pub mod run;
pub mod set_threshold;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire from the ADC, detect events and relay them until Ctrl-C.
    Run(RunArgs),
    /// Run a captured acquisition byte stream through the detection pipeline.
    Replay(ReplayArgs),
    /// Decode and print traffic from the relay link.
    Listen(ListenArgs),
    /// Send a threshold command over the relay link.
    SetThreshold(SetThresholdArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::SetThreshold(args) => set_threshold::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Detection settings shared by `run` and `replay`.
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Initial amplitude threshold.
    #[arg(long, env = "IMPACTRELAY_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: i64,
    /// Merge events closer than this many samples.
    #[arg(long, env = "IMPACTRELAY_MIN_GAP", default_value_t = DEFAULT_MIN_GAP)]
    pub min_gap: usize,
    /// Number of recent events listed in the final report.
    #[arg(long, default_value_t = 30)]
    pub last: usize,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Acquisition serial port.
    #[arg(long, env = "IMPACTRELAY_PORT", default_value = DEFAULT_ACQUISITION_PORT)]
    pub port: String,
    /// Acquisition baud rate.
    #[arg(long, env = "IMPACTRELAY_BAUD", default_value_t = DEFAULT_ACQUISITION_BAUD)]
    pub baud: u32,
    /// Relay serial port.
    #[arg(long, env = "IMPACTRELAY_RELAY_PORT", default_value = DEFAULT_RELAY_PORT)]
    pub relay_port: String,
    /// Relay baud rate.
    #[arg(long, env = "IMPACTRELAY_RELAY_BAUD", default_value_t = DEFAULT_RELAY_BAUD)]
    pub relay_baud: u32,
    /// Do not open the relay link.
    #[arg(long)]
    pub no_relay: bool,
    #[command(flatten)]
    pub detect: DetectArgs,
    /// Sleep when the acquisition link is idle (e.g. 2ms).
    #[arg(long, default_value = "2ms")]
    pub idle_sleep: String,
    /// Pause before each relayed frame (e.g. 10ms).
    #[arg(long, default_value = "10ms")]
    pub relay_delay: String,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// File holding raw acquisition bytes.
    pub file: PathBuf,
    #[command(flatten)]
    pub detect: DetectArgs,
    /// Feed the capture in chunks of this many bytes.
    #[arg(long, default_value_t = 4096)]
    pub chunk: usize,
    /// Write the relay byte stream that would have been sent to this file.
    #[arg(long, value_name = "FILE")]
    pub relay_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Relay serial port.
    #[arg(long, env = "IMPACTRELAY_RELAY_PORT", default_value = DEFAULT_RELAY_PORT, conflicts_with = "file")]
    pub port: String,
    /// Relay baud rate.
    #[arg(long, env = "IMPACTRELAY_RELAY_BAUD", default_value_t = DEFAULT_RELAY_BAUD)]
    pub baud: u32,
    /// Decode a captured relay stream instead of a live port.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SetThresholdArgs {
    /// Threshold multiplier: the new threshold is N x 10,000,000.
    #[arg(value_parser = clap::value_parser!(u8).range(1..=20))]
    pub multiplier: u8,
    /// Relay serial port.
    #[arg(long, env = "IMPACTRELAY_RELAY_PORT", default_value = DEFAULT_RELAY_PORT)]
    pub port: String,
    /// Relay baud rate.
    #[arg(long, env = "IMPACTRELAY_RELAY_BAUD", default_value_t = DEFAULT_RELAY_BAUD)]
    pub baud: u32,
    /// Wait this long for the THRESHOLD= acknowledgement (e.g. 2s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub wait: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
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
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("0ms").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("fast").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("-1s").unwrap_err().code, USAGE);
    }
}
