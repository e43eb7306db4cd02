//! The probe pipeline: reachability check, platform check, table read and
//! classification, each stage either producing the final verdict or handing
//! off to the next.

use log::{debug, info};

use crate::ping::{PingError, PingOutcome, Pinger};
use crate::snmp::{SnmpError, SnmpTransport};
use crate::table::{self, ServiceTable};
use crate::{Perf, Status, Verdict};

/// `sysDescr.0`: free-text description of the managed node.
pub const SYS_DESCR_OID: &str = ".1.3.6.1.2.1.1.1.0";

/// Substring of `sysDescr` that identifies a Windows agent. The LAN Manager
/// service table only exists on hosts whose description carries it.
const WINDOWS_MARKER: &str = "Windows";

/// What one probe run is pointed at.
#[derive(Clone, Debug)]
pub struct ProbeTarget {
    pub host: String,
    pub community: String,
    pub service: String,
}

/// A collaborator failure the probe cannot turn into a verdict on its own.
/// The runner maps these to UNKNOWN.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Ping(#[from] PingError),
    #[error(transparent)]
    Snmp(#[from] SnmpError),
}

/// Outcome of a pipeline stage.
enum Gate {
    Proceed,
    Halt(Verdict),
}

/// A host that does not answer ping gets UNKNOWN, not WARNING: the probe
/// cannot tell anything about the service, and host-down alerting is the
/// host check's job.
fn reachability_gate<P: Pinger>(pinger: &P, host: &str) -> Result<Gate, ProbeError> {
    let gate = match pinger.probe(host)? {
        PingOutcome::Reachable => Gate::Proceed,
        PingOutcome::NoReply => Gate::Halt(Verdict::new(
            Status::Unknown,
            format!("no ping reply from {}", host),
        )),
        PingOutcome::Unresolved => Gate::Halt(Verdict::new(
            Status::Unknown,
            format!("could not resolve hostname {}", host),
        )),
        PingOutcome::NoRoute => Gate::Halt(Verdict::new(
            Status::Unknown,
            format!("could not find a route to {}", host),
        )),
    };
    Ok(gate)
}

/// Fetches `sysDescr.0` and halts unless it marks the host as Windows.
///
/// No answer covers both a wrong community string and an agent that is not
/// running; SNMP gives no way to tell them apart, so one message names both.
fn platform_gate<T: SnmpTransport>(
    snmp: &T,
    host: &str,
    community: &str,
) -> Result<Gate, ProbeError> {
    let gate = match snmp.get(host, community, SYS_DESCR_OID)? {
        None => Gate::Halt(Verdict::new(
            Status::Warning,
            format!(
                "could not query SNMP on {} (wrong community string or SNMP service not running)",
                host
            ),
        )),
        Some(descr) if !descr.contains(WINDOWS_MARKER) => Gate::Halt(Verdict::new(
            Status::Warning,
            format!("{} does not look like a Windows host: {}", host, descr),
        )),
        Some(descr) => {
            debug!("platform accepted, sysDescr: {}", descr);
            Gate::Proceed
        }
    };
    Ok(gate)
}

/// Turns the joined table into the verdict for one service name.
///
/// An active row wins OK outright, wherever it sits in the table; only when
/// no row with the name is active does a stopped or paused row count. The
/// no-match case deliberately stays WARNING rather than CRITICAL so that a
/// service absent from a host does not page anyone.
fn classify(table: &ServiceTable, service: &str) -> Verdict {
    let mut seen_inactive = false;

    for (suffix, record) in table.iter() {
        let Some((name, state)) = record.complete() else {
            continue;
        };
        if name != service {
            continue;
        }
        if state.is_active() {
            debug!("{} active at index {}", name, suffix);
            return Verdict::new(Status::Ok, format!("{} is running", service))
                .with_perf(Perf::new("running", 1));
        }
        debug!("{} is {} at index {}", name, state, suffix);
        seen_inactive = true;
    }

    let message = if seen_inactive {
        format!("{} exists but is not running", service)
    } else {
        format!("{} is not running or was not found", service)
    };
    Verdict::new(Status::Warning, message).with_perf(Perf::new("running", 0))
}

/// Runs the full pipeline against one target.
///
/// Stages run in order and the first halting stage decides the verdict;
/// nothing past it touches the network. Errors bubble up untranslated.
pub fn run<P, T>(pinger: &P, snmp: &T, target: &ProbeTarget) -> Result<Verdict, ProbeError>
where
    P: Pinger,
    T: SnmpTransport,
{
    info!("checking service {:?} on {}", target.service, target.host);

    if let Gate::Halt(verdict) = reachability_gate(pinger, &target.host)? {
        return Ok(verdict);
    }
    if let Gate::Halt(verdict) = platform_gate(snmp, &target.host, &target.community)? {
        return Ok(verdict);
    }

    let table = table::read_service_table(snmp, &target.host, &target.community)?;
    Ok(classify(&table, &target.service))
}
