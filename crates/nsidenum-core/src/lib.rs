//! Core engine for enumerating the DNS servers behind an anycast address.
//!
//! A resolver address served by several machines (anycast, ECMP or NAT
//! pools) hides which instance answered a query. Each probe asks for the
//! server's NSID (RFC 5001) and is sent from a different source port, so
//! per-flow load balancing spreads the probes over the backends:
//!
//! - [`AddressResolver`] picks the single target address
//! - [`ProbeSession`] performs one NSID query from one source port
//! - [`PathEnumerator`] fans out over the port range and merges the results
//! - [`NsidError`] for error handling

pub mod error;
pub mod execution;
pub mod nsid;
pub mod probe;
pub mod resolver;
pub mod result;
pub mod runner;
pub mod traits;
pub mod types;

pub use error::{NsidError, NsidResult};
pub use execution::PathEnumerator;
pub use probe::{ProbeSession, UdpPathProbe};
pub use resolver::{AddressResolver, SystemLookup};
pub use result::{EnumerationResult, PathStats, ResultDestination, ResultQuery, Results};
pub use runner::{enumerate, run_enumeration};
pub use traits::{HostLookup, PathProbe};
pub use types::{AddressFamily, EnumerationRequest, ProbeConfig, QuerySpec};
