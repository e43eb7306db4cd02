//! Building blocks for `check_snmp_winsvc`, a monitoring plugin that asks a
//! Windows host over SNMP whether a named service is running.
//!
//! The crate has two layers. This module plus [`runner`] and
//! [`config_generator`] form a small plugin toolkit: severity handling,
//! perfdata rendering and the one-status-line output contract. The probe
//! itself lives in [`ping`], [`snmp`], [`table`] and [`probe`], wired
//! together by the `check_snmp_winsvc` binary.

use std::fmt;
use std::process;

pub mod config_generator;
pub mod ping;
pub mod probe;
mod runner;
pub mod snmp;
pub mod table;

pub use crate::runner::{Runner, RunnerResult};

/// A plugin severity as the monitoring system understands it.
///
/// The probe never emits [`Status::Critical`]: a service that is absent or
/// not active is reported as WARNING so that hosts where the service is not
/// expected do not page anyone. The variant stays because the exit-code
/// table is fixed by the plugin API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// Process exit code the monitoring system maps back to a severity.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    /// Upper-case label used on the status line.
    pub fn label(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One perfdata sample, rendered as `label=value;warn;crit;min;max`.
///
/// Threshold and range fields are rendered even when empty (`running=1;;;;`)
/// because the consuming perfdata parser expects all five fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Perf {
    label: String,
    value: i64,
    warn: Option<i64>,
    crit: Option<i64>,
    min: Option<i64>,
    max: Option<i64>,
}

impl Perf {
    pub fn new(label: &str, value: i64) -> Self {
        Perf {
            label: label.to_owned(),
            value,
            warn: None,
            crit: None,
            min: None,
            max: None,
        }
    }

    pub fn with_thresholds(mut self, warn: i64, crit: i64) -> Self {
        self.warn = Some(warn);
        self.crit = Some(crit);
        self
    }

    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Label with `=` replaced, single quotes doubled and the whole label
    /// quoted when it contains spaces, per the perfdata format rules.
    fn sanitized_label(&self) -> String {
        let label = self.label.replace('=', "_").replace('\'', "''");
        if label.contains(' ') {
            format!("'{}'", label)
        } else {
            label
        }
    }
}

impl fmt::Display for Perf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.sanitized_label(), self.value)?;
        for field in [self.warn, self.crit, self.min, self.max] {
            match field {
                Some(v) => write!(f, ";{}", v)?,
                None => write!(f, ";")?,
            }
        }
        Ok(())
    }
}

/// The terminal result of a probe run: a severity, a human-readable message
/// and any perfdata that goes with it. Exactly one verdict is produced per
/// run and rendering it is the only thing that ever writes to stdout.
///
/// ```
/// use check_snmp_winsvc::{Perf, Status, Verdict};
///
/// let verdict = Verdict::new(Status::Ok, "Print Spooler is running")
///     .with_perf(Perf::new("running", 1));
/// assert_eq!(
///     verdict.status_line("WINSVC"),
///     "WINSVC OK - Print Spooler is running | running=1;;;;"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    status: Status,
    message: String,
    perf: Vec<Perf>,
}

impl Verdict {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Verdict {
            status,
            message: message.into(),
            perf: Vec::new(),
        }
    }

    pub fn with_perf(mut self, perf: Perf) -> Self {
        self.perf.push(perf);
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The single line the monitoring system consumes:
    /// `<plugin> <SEVERITY> - <message>[ | <perfdata>]`.
    pub fn status_line(&self, plugin: &str) -> String {
        let mut line = format!("{} {} - {}", plugin, self.status, self.message);
        if !self.perf.is_empty() {
            line.push_str(" |");
            for perf in &self.perf {
                line.push(' ');
                line.push_str(&perf.to_string());
            }
        }
        line
    }

    /// Prints the status line and terminates with the matching exit code.
    pub fn print_and_exit(&self, plugin: &str) -> ! {
        println!("{}", self.status_line(plugin));
        process::exit(self.status.exit_code())
    }
}
