//! Command-line entry point: argument handling, logging setup and the
//! plugin-contract glue around [`probe::run`].

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use env_logger::Env;
use log::LevelFilter;

use check_snmp_winsvc::config_generator;
use check_snmp_winsvc::ping::SystemPing;
use check_snmp_winsvc::probe::{self, ProbeError, ProbeTarget};
use check_snmp_winsvc::snmp::NetSnmp;
use check_snmp_winsvc::{Runner, Status, Verdict};

/// Tag starting every status line.
const PLUGIN: &str = "WINSVC";
/// Name of the generated Icinga2 CheckCommand object.
const ICINGA_COMMAND: &str = "snmp-winsvc";
/// Prefix for the generated Icinga2 custom variables.
const ICINGA_VAR_PREFIX: &str = "winsvc";

/// Checks over SNMP whether a service on a Windows host is running.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Hostname or address of the Windows host
    #[arg(short = 'H', long)]
    host: String,

    /// SNMP v1 community string
    #[arg(short = 'C', long, default_value = "public")]
    community: String,

    /// Display name of the service, e.g. "Print Spooler"
    #[arg(short, long)]
    service: String,

    /// Timeout of a single SNMP request
    #[arg(short, long, value_name = "SECONDS", default_value_t = 2)]
    timeout: u64,

    /// Log more detail to stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    // Config generation runs before parsing so it works without check
    // arguments: GENERATE_ICINGA_COMMAND=1 check_snmp_winsvc
    if let Err(err) = config_generator::print_icinga_command_config_if_env_and_exit(
        ICINGA_COMMAND,
        ICINGA_VAR_PREFIX,
        &Cli::command(),
    ) {
        Verdict::new(Status::Unknown, err.to_string()).print_and_exit(PLUGIN);
    }

    let cli = parse_or_unknown();
    init_logging(cli.verbose);

    let timeout = cli.timeout;
    let target = ProbeTarget {
        host: cli.host,
        community: cli.community,
        service: cli.service,
    };

    Runner::new(PLUGIN)
        .on_error(|_: &ProbeError| Status::Unknown)
        .safe_run(|| {
            let snmp = NetSnmp::locate(timeout)?;
            let pinger = SystemPing::new();
            probe::run(&pinger, &snmp, &target)
        })
        .print_and_exit()
}

/// Parses the command line, reporting argument errors as an UNKNOWN status
/// line instead of clap's multi-line usage dump. Help and version keep
/// their native output and exit codes.
fn parse_or_unknown() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => Verdict::new(Status::Unknown, one_line(&err)).print_and_exit(PLUGIN),
    }
}

/// Collapses a rendered clap error to its message lines, dropping the
/// `error: ` prefix and everything from the usage section on.
fn one_line(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let mut parts = Vec::new();
    for line in rendered.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Usage:") {
            break;
        }
        parts.push(line.strip_prefix("error: ").unwrap_or(line).to_owned());
    }
    if parts.is_empty() {
        return "invalid arguments".to_owned();
    }
    parts.join(" ")
}

/// Logging goes to stderr; stdout carries nothing but the status line.
fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp(None);
    let _ = builder.try_init();
}
