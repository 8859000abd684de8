//! Target address resolution with family selection.

use async_trait::async_trait;
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::{AddressFamily, HostLookup, NsidError, NsidResult};

/// Host lookup backed by the system resolver configuration.
pub struct SystemLookup {
    resolver: TokioAsyncResolver,
}

impl SystemLookup {
    /// Creates a lookup using the system configuration, falling back to the
    /// library defaults if it cannot be read.
    pub fn new() -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                warn!(error = %e, "System DNS config unavailable, using default resolvers");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        // Both families are needed so the caller can apply its own constraint.
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl Default for SystemLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> NsidResult<Vec<IpAddr>> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| NsidError::ResolutionFailed {
                target: host.to_string(),
                source: Box::new(e),
            })?;
        Ok(lookup.iter().collect())
    }
}

/// Resolves a user supplied target to exactly one address.
pub struct AddressResolver<L> {
    lookup: L,
}

impl<L: HostLookup> AddressResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Resolves `target` honoring the `family` constraint.
    ///
    /// Literal addresses are checked against the constraint without any
    /// lookup. Hostnames resolve to the first candidate of a matching family.
    /// IPv4-mapped IPv6 addresses are returned as plain IPv4.
    pub async fn resolve(&self, target: &str, family: AddressFamily) -> NsidResult<IpAddr> {
        let target = target.trim();

        if let Ok(ip) = target.parse::<IpAddr>() {
            let ip = ip.to_canonical();
            if !family.matches(&ip) {
                return Err(NsidError::AddressFamilyMismatch {
                    address: ip,
                    family,
                });
            }
            return Ok(ip);
        }

        let candidates = self.lookup.lookup(target).await?;
        debug!(target = target, candidates = ?candidates, "Looked up target");

        select_address(&candidates, family).ok_or_else(|| NsidError::NoMatchingAddress {
            target: target.to_string(),
            family,
        })
    }
}

/// Picks the first candidate satisfying the constraint.
fn select_address(candidates: &[IpAddr], family: AddressFamily) -> Option<IpAddr> {
    candidates
        .iter()
        .map(IpAddr::to_canonical)
        .find(|ip| family.matches(ip))
}
