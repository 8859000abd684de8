//! Result types for enumeration output.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::NsidError;

/// Per-run tally of path outcomes. Every path is counted exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStats {
    /// Number of paths probed.
    pub total: u32,
    /// Paths that got a response, with or without NSID.
    pub answered: u32,
    /// Paths whose round trip exceeded the timeout.
    pub timeouts: u32,
    /// Paths that failed below the DNS layer.
    pub transport_failures: u32,
    /// Paths whose NSID options were truncated and yielded no identifier.
    pub malformed: u32,
}

impl PathStats {
    /// Counts a failed path under its failure kind.
    pub fn record_failure(&mut self, err: &NsidError) {
        match err {
            NsidError::Timeout => self.timeouts += 1,
            NsidError::MalformedIdentifier { .. } => self.malformed += 1,
            _ => self.transport_failures += 1,
        }
    }

    /// Number of paths without a usable response.
    pub fn failed(&self) -> u32 {
        self.timeouts + self.transport_failures + self.malformed
    }

    /// Share of failed paths, in percent.
    pub fn failure_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failed() as f64 / self.total as f64 * 100.0
    }
}

/// The merged outcome of all paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationResult {
    /// Distinct identifiers, lexicographically sorted.
    pub identifiers: Vec<String>,
    /// Path outcome tally.
    pub stats: PathStats,
}

/// The resolver that was probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDestination {
    /// Target as given by the user.
    pub target: String,
    /// Resolved address.
    pub ip_address: IpAddr,
    /// Destination port.
    pub port: u16,
}

/// The question sent on every path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultQuery {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub class: String,
}

/// Complete enumeration results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Results {
    /// Destination information.
    pub destination: ResultDestination,
    /// Query information.
    pub query: ResultQuery,
    /// First source port of the range.
    pub base_port: u16,
    /// Number of paths probed.
    pub paths: u8,
    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
    /// Distinct identifiers, lexicographically sorted.
    pub identifiers: Vec<String>,
    /// Path outcome tally.
    pub stats: PathStats,
}

impl Results {
    /// Serializes the results to JSON with indentation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
