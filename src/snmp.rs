//! SNMP transport collaborator: thin wrappers around the net-snmp
//! command-line tools.
//!
//! The probe never speaks SNMP itself. It hands an OID to `snmpget` or
//! `snmpwalk` and parses whatever text comes back, so the contract here is
//! deliberately narrow: a GET yields at most one raw line, a WALK yields raw
//! `<oid> <value>` lines.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SnmpError {
    #[error("{tool} not found on PATH (net-snmp tools are required)")]
    ToolMissing {
        tool: &'static str,
        #[source]
        source: which::Error,
    },
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },
}

/// The transport seam the pipeline sees; tests substitute their own.
pub trait SnmpTransport {
    /// Single GET. `None` when the agent produced no value at all.
    fn get(&self, host: &str, community: &str, oid: &str) -> Result<Option<String>, SnmpError>;

    /// Subtree walk: one raw `<numeric-oid> <value>` line per entry, in
    /// agent order. An empty vector is a valid (empty) result.
    fn walk(&self, host: &str, community: &str, oid: &str) -> Result<Vec<String>, SnmpError>;
}

/// Resolved locations of the net-snmp tools plus the per-request knobs
/// passed on every invocation.
pub struct NetSnmp {
    snmpget: PathBuf,
    snmpwalk: PathBuf,
    timeout_secs: u64,
}

impl NetSnmp {
    /// Resolves both tools up front so a missing net-snmp installation is
    /// reported before any network traffic happens.
    pub fn locate(timeout_secs: u64) -> Result<Self, SnmpError> {
        let snmpget = which::which("snmpget").map_err(|source| SnmpError::ToolMissing {
            tool: "snmpget",
            source,
        })?;
        let snmpwalk = which::which("snmpwalk").map_err(|source| SnmpError::ToolMissing {
            tool: "snmpwalk",
            source,
        })?;
        debug!(
            "using {} and {}",
            snmpget.display(),
            snmpwalk.display()
        );

        Ok(NetSnmp {
            snmpget,
            snmpwalk,
            timeout_secs,
        })
    }

    /// Runs one tool invocation and returns its stdout. A non-zero exit
    /// (timeout, no such name) is not an error at this layer: the stdout the
    /// tool produced is still the probe's input, and what an empty result
    /// means is the caller's call.
    fn run(
        &self,
        tool: &'static str,
        path: &Path,
        output_opts: &str,
        host: &str,
        community: &str,
        oid: &str,
    ) -> Result<String, SnmpError> {
        let output = Command::new(path)
            .args(["-v", "1", "-c", community])
            .arg("-t")
            .arg(self.timeout_secs.to_string())
            .args(["-r", "1"])
            .arg(output_opts)
            .args([host, oid])
            .output()
            .map_err(|source| SnmpError::Spawn { tool, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} {} exited with {}: {}", tool, oid, output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SnmpTransport for NetSnmp {
    fn get(&self, host: &str, community: &str, oid: &str) -> Result<Option<String>, SnmpError> {
        // -Oqv prints the bare value, which is all a GET is used for here.
        let stdout = self.run("snmpget", &self.snmpget, "-Oqv", host, community, oid)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned))
    }

    fn walk(&self, host: &str, community: &str, oid: &str) -> Result<Vec<String>, SnmpError> {
        // -Onqe: numeric OIDs, quick print, numeric enums. Keeps the output
        // independent of whatever MIBs happen to be installed.
        let stdout = self.run("snmpwalk", &self.snmpwalk, "-Onqe", host, community, oid)?;
        let lines: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        debug!("snmpwalk {} returned {} lines", oid, lines.len());
        Ok(lines)
    }
}
