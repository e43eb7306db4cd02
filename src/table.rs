//! The LAN Manager service table: walk-line grammar, the index type and the
//! two-pass name/state join.
//!
//! The Windows SNMP service exposes installed services under
//! `svSvcTable` (`.1.3.6.1.4.1.77.1.2.3`), indexed by the service name as a
//! length-prefixed byte sequence encoded into the OID. The probe walks the
//! name and operating-state columns separately and joins them on that index.
//! The install-state and can-be-uninstalled/paused columns of the same table
//! are never queried.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::snmp::{SnmpError, SnmpTransport};

/// `svSvcName`: display name of each installed service.
pub const SVC_NAME_OID: &str = ".1.3.6.1.4.1.77.1.2.3.1.1";
/// `svSvcOperatingState`: numeric run state of each installed service.
pub const SVC_STATE_OID: &str = ".1.3.6.1.4.1.77.1.2.3.1.3";

/// Table index: the sub-OID trailing a column prefix.
///
/// It encodes the length-prefixed service name, but the probe treats it as
/// opaque: all that matters is that the same index shows up in both columns
/// and that indexes are totally ordered, so iteration is deterministic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OidSuffix(Vec<u32>);

#[derive(Debug, thiserror::Error)]
#[error("not a dotted numeric sub-oid")]
pub struct InvalidOidSuffix;

impl FromStr for OidSuffix {
    type Err = InvalidOidSuffix;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidOidSuffix);
        }
        s.split('.')
            .map(|segment| segment.parse::<u32>().map_err(|_| InvalidOidSuffix))
            .collect::<Result<Vec<u32>, _>>()
            .map(OidSuffix)
    }
}

impl fmt::Display for OidSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}

/// One walk line reduced to the parts the probe uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    pub suffix: OidSuffix,
    pub value: String,
}

/// Parses one raw walk line against a column prefix.
///
/// Grammar: `<prefix>.<suffix> <quoted-or-bare-value>`, where `<suffix>` is
/// a dotted run of decimal segments and surrounding double quotes on the
/// value are stripped. Anything else (blank lines, tool diagnostics, a
/// sibling column whose textual OID merely starts with the prefix) yields
/// `None`, the skip signal. A walk is never aborted by an odd line.
pub fn parse_walk_line(prefix: &str, line: &str) -> Option<WalkEntry> {
    let line = line.trim();
    let line = line.strip_prefix('.').unwrap_or(line);
    let prefix = prefix.trim_start_matches('.');

    // Requiring the separating dot keeps `...3.1.13` out of a `...3.1.1`
    // walk: after the prefix there must be a fresh suffix segment.
    let rest = line.strip_prefix(prefix)?.strip_prefix('.')?;
    let (suffix, raw_value) = rest.split_once(char::is_whitespace)?;
    let suffix: OidSuffix = suffix.parse().ok()?;

    Some(WalkEntry {
        suffix,
        value: unquote(raw_value.trim()).to_owned(),
    })
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

/// Windows service operating states, per the LAN Manager MIB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatingState {
    Active,
    ContinuePending,
    PausePending,
    Paused,
    /// A code outside the documented 1..=4 range, kept verbatim.
    Unrecognized(u32),
}

impl OperatingState {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => OperatingState::Active,
            2 => OperatingState::ContinuePending,
            3 => OperatingState::PausePending,
            4 => OperatingState::Paused,
            other => OperatingState::Unrecognized(other),
        }
    }

    /// Only `active` counts as running; every other state is "exists but is
    /// not running" territory.
    pub fn is_active(self) -> bool {
        self == OperatingState::Active
    }
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingState::Active => f.write_str("active"),
            OperatingState::ContinuePending => f.write_str("continue-pending"),
            OperatingState::PausePending => f.write_str("pause-pending"),
            OperatingState::Paused => f.write_str("paused"),
            OperatingState::Unrecognized(code) => write!(f, "state {}", code),
        }
    }
}

/// One row of the joined table. Each field is filled by its own walk pass;
/// a row only counts once both passes contributed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceRecord {
    name: Option<String>,
    state: Option<OperatingState>,
}

impl ServiceRecord {
    /// The row as `(name, state)` if both passes populated it, `None` for a
    /// half row. Half rows must never match a service lookup.
    pub fn complete(&self) -> Option<(&str, OperatingState)> {
        match (&self.name, self.state) {
            (Some(name), Some(state)) => Some((name.as_str(), state)),
            _ => None,
        }
    }
}

/// Joined name/state rows keyed by [`OidSuffix`]. Iteration is ascending by
/// index, so scans over the table are deterministic regardless of the order
/// the agent returned entries in.
#[derive(Debug, Default)]
pub struct ServiceTable {
    rows: BTreeMap<OidSuffix, ServiceRecord>,
}

impl ServiceTable {
    pub fn new() -> Self {
        ServiceTable::default()
    }

    pub fn record_name(&mut self, suffix: OidSuffix, name: String) {
        self.rows.entry(suffix).or_default().name = Some(name);
    }

    pub fn record_state(&mut self, suffix: OidSuffix, state: OperatingState) {
        self.rows.entry(suffix).or_default().state = Some(state);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OidSuffix, &ServiceRecord)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Walks the name and state columns and joins them on the index suffix.
///
/// The two passes are independent: an entry that shows up in only one walk
/// (a service appearing or vanishing between them) stays incomplete and is
/// skipped by the classifier, so it degrades to "not found" rather than a
/// wrong match. A state value that does not parse as an integer is dropped
/// the same way.
pub fn read_service_table<T: SnmpTransport>(
    snmp: &T,
    host: &str,
    community: &str,
) -> Result<ServiceTable, SnmpError> {
    let mut table = ServiceTable::new();

    for line in snmp.walk(host, community, SVC_NAME_OID)? {
        if let Some(entry) = parse_walk_line(SVC_NAME_OID, &line) {
            table.record_name(entry.suffix, entry.value);
        }
    }

    for line in snmp.walk(host, community, SVC_STATE_OID)? {
        if let Some(entry) = parse_walk_line(SVC_STATE_OID, &line) {
            match entry.value.parse::<u32>() {
                Ok(code) => table.record_state(entry.suffix, OperatingState::from_code(code)),
                Err(_) => debug!(
                    "dropping non-numeric state {:?} at index {}",
                    entry.value, entry.suffix
                ),
            }
        }
    }

    debug!("service table joined, {} rows", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSnmp {
        names: Vec<String>,
        states: Vec<String>,
    }

    impl SnmpTransport for FakeSnmp {
        fn get(&self, _: &str, _: &str, _: &str) -> Result<Option<String>, SnmpError> {
            unreachable!("the table reader never issues a GET");
        }

        fn walk(&self, _: &str, _: &str, oid: &str) -> Result<Vec<String>, SnmpError> {
            if oid == SVC_NAME_OID {
                Ok(self.names.clone())
            } else {
                Ok(self.states.clone())
            }
        }
    }

    /// Builds the length-prefixed index suffix the agent derives from a
    /// service name.
    fn name_suffix(name: &str) -> String {
        let mut parts = vec![name.len().to_string()];
        parts.extend(name.bytes().map(|b| b.to_string()));
        parts.join(".")
    }

    fn name_line(name: &str) -> String {
        format!("{}.{} \"{}\"", SVC_NAME_OID, name_suffix(name), name)
    }

    fn state_line(name: &str, code: u32) -> String {
        format!("{}.{} {}", SVC_STATE_OID, name_suffix(name), code)
    }

    #[test]
    fn test_suffix_parse_and_display() {
        let suffix: OidSuffix = "13.80.114.105".parse().unwrap();
        assert_eq!(suffix.to_string(), "13.80.114.105");

        assert!("".parse::<OidSuffix>().is_err());
        assert!("13.80.x".parse::<OidSuffix>().is_err());
        assert!("13..80".parse::<OidSuffix>().is_err());
    }

    #[test]
    fn test_suffix_ordering_is_segment_wise() {
        let a: OidSuffix = "4.71.102.115.101".parse().unwrap();
        let b: OidSuffix = "13.80.114.105.110".parse().unwrap();
        // Numeric segment order, not lexicographic string order.
        assert!(a < b);
    }

    #[test]
    fn test_parse_walk_line_quoted_and_bare() {
        let entry = parse_walk_line(
            SVC_NAME_OID,
            &format!("{}.4.71.102.115.101 \"Gfse\"", SVC_NAME_OID),
        )
        .unwrap();
        assert_eq!(entry.suffix.to_string(), "4.71.102.115.101");
        assert_eq!(entry.value, "Gfse");

        // Quick-print output may leave multi-word values bare.
        let entry = parse_walk_line(
            SVC_NAME_OID,
            &format!("{}.{} Print Spooler", SVC_NAME_OID, name_suffix("Print Spooler")),
        )
        .unwrap();
        assert_eq!(entry.value, "Print Spooler");
    }

    #[test]
    fn test_parse_walk_line_tolerates_missing_leading_dot() {
        let line = format!(
            "{}.4.71.102.115.101 1",
            SVC_STATE_OID.trim_start_matches('.')
        );
        let entry = parse_walk_line(SVC_STATE_OID, &line).unwrap();
        assert_eq!(entry.value, "1");
    }

    #[test]
    fn test_parse_walk_line_skips_garbage() {
        for line in [
            "",
            "   ",
            "Timeout: No Response from win01",
            "End of MIB",
            ".1.3.6.1.2.1.1.1.0 whatever",
        ] {
            assert!(parse_walk_line(SVC_NAME_OID, line).is_none(), "{line:?}");
        }

        // No value token at all.
        let bare = format!("{}.4.71.102.115.101", SVC_NAME_OID);
        assert!(parse_walk_line(SVC_NAME_OID, &bare).is_none());

        // Suffix is not numeric.
        let bad_suffix = format!("{}.x.y \"Gfse\"", SVC_NAME_OID);
        assert!(parse_walk_line(SVC_NAME_OID, &bad_suffix).is_none());
    }

    #[test]
    fn test_parse_walk_line_rejects_sibling_column() {
        // `...3.1.13` starts with the text of `...3.1.1` but is a different
        // column; the dot boundary must keep it out.
        let sibling = ".1.3.6.1.4.1.77.1.2.3.1.13.4.71.102.115.101 \"x\"";
        assert!(parse_walk_line(SVC_NAME_OID, sibling).is_none());
    }

    #[test]
    fn test_join_builds_complete_records() {
        let snmp = FakeSnmp {
            names: vec![name_line("Print Spooler"), name_line("DHCP Client")],
            states: vec![state_line("Print Spooler", 1), state_line("DHCP Client", 4)],
        };

        let table = read_service_table(&snmp, "win01", "public").unwrap();
        assert_eq!(table.len(), 2);

        let rows: Vec<(&str, OperatingState)> =
            table.iter().filter_map(|(_, r)| r.complete()).collect();
        assert!(rows.contains(&("Print Spooler", OperatingState::Active)));
        assert!(rows.contains(&("DHCP Client", OperatingState::Paused)));
    }

    #[test]
    fn test_entry_in_one_pass_only_stays_incomplete() {
        let snmp = FakeSnmp {
            names: vec![name_line("Print Spooler")],
            states: vec![state_line("DHCP Client", 1)],
        };

        let table = read_service_table(&snmp, "win01", "public").unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|(_, record)| record.complete().is_none()));
    }

    #[test]
    fn test_non_numeric_state_stays_incomplete() {
        let snmp = FakeSnmp {
            names: vec![name_line("Print Spooler")],
            states: vec![format!(
                "{}.{} running",
                SVC_STATE_OID,
                name_suffix("Print Spooler")
            )],
        };

        let table = read_service_table(&snmp, "win01", "public").unwrap();
        assert!(table.iter().all(|(_, record)| record.complete().is_none()));
    }

    #[test]
    fn test_diagnostic_lines_do_not_abort_the_walk() {
        let snmp = FakeSnmp {
            names: vec![
                "Timeout: No Response from win01".to_owned(),
                name_line("Print Spooler"),
            ],
            states: vec![state_line("Print Spooler", 1)],
        };

        let table = read_service_table(&snmp, "win01", "public").unwrap();
        let rows: Vec<(&str, OperatingState)> =
            table.iter().filter_map(|(_, r)| r.complete()).collect();
        assert_eq!(rows, vec![("Print Spooler", OperatingState::Active)]);
    }

    #[test]
    fn test_operating_state_codes() {
        assert_eq!(OperatingState::from_code(1), OperatingState::Active);
        assert_eq!(OperatingState::from_code(2), OperatingState::ContinuePending);
        assert_eq!(OperatingState::from_code(3), OperatingState::PausePending);
        assert_eq!(OperatingState::from_code(4), OperatingState::Paused);
        assert_eq!(OperatingState::from_code(9), OperatingState::Unrecognized(9));

        assert!(OperatingState::Active.is_active());
        assert!(!OperatingState::Paused.is_active());
        assert!(!OperatingState::Unrecognized(0).is_active());

        assert_eq!(OperatingState::Unrecognized(9).to_string(), "state 9");
    }
}
