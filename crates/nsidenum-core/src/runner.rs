//! Orchestrates a full run: resolve the target once, then probe every path.

use tracing::{debug, info};

use crate::result::{ResultDestination, ResultQuery, Results};
use crate::{
    AddressResolver, EnumerationRequest, HostLookup, NsidResult, PathEnumerator, PathProbe,
    ProbeConfig, QuerySpec, SystemLookup, UdpPathProbe,
};

/// Runs an enumeration with the system resolver and UDP probes.
pub async fn enumerate(request: &EnumerationRequest) -> NsidResult<Results> {
    run_enumeration(request, SystemLookup::new(), UdpPathProbe::new).await
}

/// Runs an enumeration with the given lookup and probe factory.
///
/// Resolution errors are returned before `make_probe` is called, so no
/// probe is ever sent for a target that cannot be resolved.
pub async fn run_enumeration<L, F, P>(
    request: &EnumerationRequest,
    lookup: L,
    make_probe: F,
) -> NsidResult<Results>
where
    L: HostLookup,
    F: FnOnce(QuerySpec, ProbeConfig) -> P,
    P: PathProbe + 'static,
{
    request.validate()?;

    let resolver = AddressResolver::new(lookup);
    let target_ip = resolver.resolve(&request.target, request.family).await?;
    debug!("Resolved {} to {}", request.target, target_ip);

    let config = ProbeConfig::from_request(request, target_ip)?;

    let plural = if config.path_count > 1 { "s" } else { "" };
    info!(
        "Enumerating {} path{} on {}({}):{} with base source port {} and timeout {:?}",
        config.path_count,
        plural,
        request.target,
        target_ip,
        config.dest_port,
        config.base_port,
        config.timeout
    );

    let query = ResultQuery {
        name: request.query.name().to_string(),
        record_type: request.query.record_type().to_string(),
        class: request.query.class().to_string(),
    };

    let enumerator = PathEnumerator::new(make_probe(request.query.clone(), config.clone()), &config)?;
    let result = enumerator.enumerate().await;

    Ok(Results {
        destination: ResultDestination {
            target: request.target.clone(),
            ip_address: target_ip,
            port: config.dest_port,
        },
        query,
        base_port: config.base_port,
        paths: config.path_count,
        timeout_ms: config.timeout.as_millis() as u64,
        identifiers: result.identifiers,
        stats: result.stats,
    })
}
