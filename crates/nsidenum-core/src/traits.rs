//! Seams between the enumeration engine and the network.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::NsidResult;

/// Probes a single path, identified by its source port.
///
/// Implementations perform exactly one request/response exchange and return
/// the identifiers found in the response. An empty list means the responder
/// did not attach any NSID.
#[async_trait]
pub trait PathProbe: Send + Sync {
    /// Runs the probe bound to `source_port`.
    async fn probe(&self, source_port: u16) -> NsidResult<Vec<String>>;
}

/// Looks up the candidate addresses of a hostname.
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Returns the candidates in resolver order.
    ///
    /// Returns `Err` if the name cannot be resolved at all.
    async fn lookup(&self, host: &str) -> NsidResult<Vec<IpAddr>>;
}
