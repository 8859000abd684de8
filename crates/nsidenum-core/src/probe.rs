//! A single NSID probe over UDP.

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::serialize::binary::BinEncodable;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::nsid::{extract_identifiers, nsid_request_edns, EDNS_PAYLOAD_SIZE};
use crate::{NsidError, NsidResult, PathProbe, ProbeConfig, QuerySpec};

/// One identification query sent from one source port.
#[derive(Debug, Clone)]
pub struct ProbeSession<'a> {
    query: &'a QuerySpec,
    target: SocketAddr,
    source_port: u16,
    timeout: Duration,
}

impl<'a> ProbeSession<'a> {
    pub fn new(
        query: &'a QuerySpec,
        target: SocketAddr,
        source_port: u16,
        timeout: Duration,
    ) -> Self {
        Self {
            query,
            target,
            source_port,
            timeout,
        }
    }

    pub fn source_port(&self) -> u16 {
        self.source_port
    }

    /// Sends the query and returns the identifiers found in the response.
    ///
    /// The timeout covers the whole exchange. A response without NSID gives
    /// an empty list, one with several NSID options gives one identifier
    /// each. Truncated options are dropped with a warning as long as another
    /// identifier of the same response was read; otherwise the probe fails
    /// with [`NsidError::MalformedIdentifier`].
    pub async fn send(&self) -> NsidResult<Vec<String>> {
        let query_id: u16 = rand::random();
        let request = build_query(self.query, query_id)?;

        let datagram = timeout(self.timeout, self.exchange(&request, query_id))
            .await
            .map_err(|_| NsidError::Timeout)??;

        let extracted = extract_identifiers(&datagram)?;
        for err in &extracted.malformed {
            warn!(source_port = self.source_port, error = %err, "Dropping NSID payload");
        }
        if extracted.identifiers.is_empty() {
            if let Some(err) = extracted.malformed.into_iter().next() {
                return Err(err);
            }
        }

        trace!(
            source_port = self.source_port,
            identifiers = ?extracted.identifiers,
            "Probe answered"
        );
        Ok(extracted.identifiers)
    }

    /// Returns the raw datagram of the matching response.
    async fn exchange(&self, request: &[u8], query_id: u16) -> NsidResult<Vec<u8>> {
        let local = SocketAddr::new(unspecified_for(&self.target.ip()), self.source_port);
        let socket = UdpSocket::bind(local).await.map_err(|e| {
            NsidError::TransportFailure(format!("failed to bind {}: {}", local, e))
        })?;

        socket.send_to(request, self.target).await?;

        let mut buf = vec![0u8; EDNS_PAYLOAD_SIZE as usize];
        loop {
            let (len, from) = socket.recv_from(&mut buf).await?;
            if from != self.target {
                trace!(from = %from, "Ignoring datagram from unexpected peer");
                continue;
            }

            let message = Message::from_vec(&buf[..len]).map_err(|e| {
                NsidError::TransportFailure(format!("invalid response from {}: {}", from, e))
            })?;
            if message.id() != query_id || message.message_type() != MessageType::Response {
                trace!(id = message.id(), "Ignoring unrelated message");
                continue;
            }
            return Ok(buf[..len].to_vec());
        }
    }
}

impl std::fmt::Display for ProbeSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Probe(query='{}', resolver={}, source_port={}, timeout={:?})",
            self.query, self.target, self.source_port, self.timeout
        )
    }
}

/// Encodes the NSID query: recursion desired, one question, EDNS with NSID.
pub fn build_query(query: &QuerySpec, id: u16) -> NsidResult<Vec<u8>> {
    let mut question = Query::query(query.name().clone(), query.record_type());
    question.set_query_class(query.class());

    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(question);
    message.set_edns(nsid_request_edns());

    message
        .to_bytes()
        .map_err(|e| NsidError::Internal(format!("failed to encode query: {}", e)))
}

fn unspecified_for(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

/// [`PathProbe`] that runs a UDP [`ProbeSession`] per source port.
#[derive(Debug, Clone)]
pub struct UdpPathProbe {
    query: QuerySpec,
    config: ProbeConfig,
}

impl UdpPathProbe {
    pub fn new(query: QuerySpec, config: ProbeConfig) -> Self {
        Self { query, config }
    }

    /// The session for `source_port`.
    pub fn session(&self, source_port: u16) -> ProbeSession<'_> {
        ProbeSession::new(
            &self.query,
            self.config.target_addr(),
            source_port,
            self.config.timeout,
        )
    }
}

#[async_trait]
impl PathProbe for UdpPathProbe {
    async fn probe(&self, source_port: u16) -> NsidResult<Vec<String>> {
        let session = self.session(source_port);
        debug!(probe = %session, "Sending probe");
        session.send().await
    }
}
