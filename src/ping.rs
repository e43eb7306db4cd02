//! Reachability collaborator backed by the system `ping` binary.
//!
//! The probe only needs four coarse outcomes from it; everything else about
//! ICMP stays the tool's problem.

use std::io;
use std::process::Command;

use log::debug;

/// What a reachability probe concluded about the target host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PingOutcome {
    /// At least one echo reply came back; partial loss counts.
    Reachable,
    /// Every echo request went unanswered.
    NoReply,
    /// The host name did not resolve.
    Unresolved,
    /// No route to the target network or host.
    NoRoute,
}

#[derive(Debug, thiserror::Error)]
pub enum PingError {
    #[error("failed to run ping: {0}")]
    Spawn(#[from] io::Error),
}

/// The prober seam the pipeline sees; tests substitute their own.
pub trait Pinger {
    fn probe(&self, host: &str) -> Result<PingOutcome, PingError>;
}

/// Sends a couple of echo requests with a hard overall deadline, then
/// classifies the tool's combined output.
pub struct SystemPing {
    count: u32,
    deadline_secs: u32,
}

impl SystemPing {
    pub fn new() -> Self {
        SystemPing {
            count: 2,
            deadline_secs: 3,
        }
    }
}

impl Default for SystemPing {
    fn default() -> Self {
        SystemPing::new()
    }
}

impl Pinger for SystemPing {
    fn probe(&self, host: &str) -> Result<PingOutcome, PingError> {
        let output = Command::new("ping")
            .arg("-c")
            .arg(self.count.to_string())
            .arg("-w")
            .arg(self.deadline_secs.to_string())
            .arg(host)
            .output()?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let outcome = classify_ping_output(&text);
        debug!("ping {}: {:?}", host, outcome);
        Ok(outcome)
    }
}

/// Phrasings differ between ping implementations and libc versions, so each
/// outcome matches a small set of substrings, case-insensitively.
const UNRESOLVED_PATTERNS: &[&str] = &[
    "name or service not known",
    "unknown host",
    "failure in name resolution",
    "cannot resolve",
];

const NO_ROUTE_PATTERNS: &[&str] = &[
    "network is unreachable",
    "no route to host",
    "destination host unreachable",
    "destination net unreachable",
];

/// Resolution and routing failures are checked before total loss: an
/// unreachable destination also reports 100% packet loss, and the more
/// specific diagnosis wins.
fn classify_ping_output(text: &str) -> PingOutcome {
    let text = text.to_ascii_lowercase();

    if UNRESOLVED_PATTERNS.iter().any(|p| text.contains(p)) {
        return PingOutcome::Unresolved;
    }
    if NO_ROUTE_PATTERNS.iter().any(|p| text.contains(p)) {
        return PingOutcome::NoRoute;
    }
    if text.contains("100% packet loss") || text.contains("100.0% packet loss") {
        return PingOutcome::NoReply;
    }

    PingOutcome::Reachable
}
