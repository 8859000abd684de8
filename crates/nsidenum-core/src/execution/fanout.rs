//! Fan-out over the source port range.
//!
//! Every path runs as its own task; the enumerator waits for all of them and
//! merges their identifiers into one sorted, duplicate-free list.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::result::{EnumerationResult, PathStats};
use crate::types::validate_port_range;
use crate::{NsidResult, PathProbe, ProbeConfig};

/// Runs one probe per source port and aggregates their identifiers.
pub struct PathEnumerator<P> {
    probe: Arc<P>,
    base_port: u16,
    path_count: u8,
}

impl<P: PathProbe + 'static> PathEnumerator<P> {
    /// Creates an enumerator over the port range of `config`.
    pub fn new(probe: P, config: &ProbeConfig) -> NsidResult<Self> {
        Self::with_ports(probe, config.base_port, config.path_count)
    }

    /// Creates an enumerator over `[base_port, base_port + path_count)`.
    pub fn with_ports(probe: P, base_port: u16, path_count: u8) -> NsidResult<Self> {
        validate_port_range(base_port, path_count as u16)?;
        Ok(Self {
            probe: Arc::new(probe),
            base_port,
            path_count,
        })
    }

    /// The source ports probed, one per path.
    pub fn source_ports(&self) -> RangeInclusive<u16> {
        // Range validated in the constructor.
        self.base_port..=self.base_port + (self.path_count as u16 - 1)
    }

    /// Probes every path and returns the merged identifiers.
    ///
    /// Per-path failures are logged and counted but never abort the run, so
    /// the result is always available, possibly empty. The identifiers are
    /// sorted regardless of the order in which the probes complete.
    pub async fn enumerate(&self) -> EnumerationResult {
        let mut tasks = JoinSet::new();
        for source_port in self.source_ports() {
            let probe = Arc::clone(&self.probe);
            tasks.spawn(async move { (source_port, probe.probe(source_port).await) });
        }

        let mut identifiers = BTreeSet::new();
        let mut stats = PathStats::default();

        while let Some(joined) = tasks.join_next().await {
            stats.total += 1;
            match joined {
                Ok((source_port, Ok(found))) => {
                    debug!(
                        source_port = source_port,
                        identifiers = ?found,
                        "Path answered"
                    );
                    stats.answered += 1;
                    identifiers.extend(found);
                }
                Ok((source_port, Err(e))) => {
                    warn!(source_port = source_port, error = %e, "Path failed");
                    stats.record_failure(&e);
                }
                Err(e) => {
                    warn!(error = %e, "Probe task did not complete");
                    stats.transport_failures += 1;
                }
            }
        }

        info!(
            paths = stats.total,
            answered = stats.answered,
            identifiers = identifiers.len(),
            "Enumeration finished"
        );

        EnumerationResult {
            identifiers: identifiers.into_iter().collect(),
            stats,
        }
    }
}
