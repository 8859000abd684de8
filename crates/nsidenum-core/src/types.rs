//! Core types for NSID enumeration.

use hickory_proto::rr::{DNSClass, Name, RecordType};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{NsidError, NsidResult};

pub const DEFAULT_QUERY_NAME: &str = ".";
pub const DEFAULT_QUERY_TYPE: &str = "A";
pub const DEFAULT_QUERY_CLASS: &str = "IN";
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_BASE_PORT: u16 = 12345;
pub const DEFAULT_DEST_PORT: u16 = 53;
pub const DEFAULT_PATH_COUNT: u16 = 1;
pub const MAX_PATH_COUNT: u16 = 255;

/// Protocol family constraint applied when selecting the target address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl AddressFamily {
    /// Builds the constraint from the `-4` / `-6` switches.
    pub fn from_flags(force_v4: bool, force_v6: bool) -> NsidResult<Self> {
        match (force_v4, force_v6) {
            (true, true) => Err(NsidError::ConflictingFamilies),
            (true, false) => Ok(AddressFamily::V4),
            (false, true) => Ok(AddressFamily::V6),
            (false, false) => Ok(AddressFamily::Any),
        }
    }

    /// Returns true if `ip` satisfies this constraint.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) count as IPv4.
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4 => ip.to_canonical().is_ipv4(),
            AddressFamily::V6 => ip.to_canonical().is_ipv6(),
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Any => write!(f, "any"),
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// The question carried by every probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    name: Name,
    record_type: RecordType,
    class: DNSClass,
}

impl QuerySpec {
    /// Creates a query for `name`, made fully qualified if it is not already.
    pub fn new(name: &str, record_type: RecordType, class: DNSClass) -> NsidResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NsidError::EmptyQueryName);
        }
        let fqdn = if name.ends_with('.') {
            name.to_string()
        } else {
            format!("{}.", name)
        };
        let name = Name::from_utf8(&fqdn).map_err(|e| NsidError::InvalidQueryName {
            name: fqdn.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            name,
            record_type,
            class,
        })
    }

    /// Creates a query from type and class mnemonics such as `TXT` and `CH`.
    pub fn from_mnemonics(name: &str, record_type: &str, class: &str) -> NsidResult<Self> {
        Self::new(
            name,
            parse_record_type(record_type)?,
            parse_class(class)?,
        )
    }

    /// The `id.server. CH TXT` preset used for resolver self-identification.
    pub fn id_server() -> Self {
        Self {
            name: Name::from_ascii("id.server.").unwrap_or_else(|_| Name::root()),
            record_type: RecordType::TXT,
            class: DNSClass::CH,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn class(&self) -> DNSClass {
        self.class
    }
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            name: Name::root(),
            record_type: RecordType::A,
            class: DNSClass::IN,
        }
    }
}

impl std::fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.name, self.class, self.record_type)
    }
}

/// Parses a record type mnemonic, case-insensitively.
pub fn parse_record_type(s: &str) -> NsidResult<RecordType> {
    let upper = s.trim().to_ascii_uppercase();
    RecordType::from_str(&upper).map_err(|_| NsidError::UnknownRecordType(s.to_string()))
}

/// Parses a class mnemonic, case-insensitively. `CHAOS` is accepted for `CH`.
pub fn parse_class(s: &str) -> NsidResult<DNSClass> {
    let upper = s.trim().to_ascii_uppercase();
    let upper = if upper == "CHAOS" { "CH".to_string() } else { upper };
    DNSClass::from_str(&upper).map_err(|_| NsidError::UnknownClass(s.to_string()))
}

/// Checks that `[base_port, base_port + path_count)` fits in the port space.
pub fn validate_port_range(base_port: u16, path_count: u16) -> NsidResult<()> {
    if base_port == 0 {
        return Err(NsidError::InvalidPort {
            what: "source",
            port: base_port,
        });
    }
    if path_count == 0 || path_count > MAX_PATH_COUNT {
        return Err(NsidError::InvalidPathCount(path_count));
    }
    if base_port as u32 + path_count as u32 - 1 > u16::MAX as u32 {
        return Err(NsidError::InvalidPortRange {
            base_port,
            path_count,
        });
    }
    Ok(())
}

/// Everything needed to run an enumeration, before the target is resolved.
#[derive(Debug, Clone)]
pub struct EnumerationRequest {
    /// Target resolver, literal address or hostname.
    pub target: String,
    /// Address family constraint for the target.
    pub family: AddressFamily,
    /// The question sent on every path.
    pub query: QuerySpec,
    /// Destination port of the resolver.
    pub dest_port: u16,
    /// First source port of the range.
    pub base_port: u16,
    /// Number of paths (source ports) to probe.
    pub path_count: u16,
    /// Round-trip timeout of each probe.
    pub timeout: Duration,
}

impl Default for EnumerationRequest {
    fn default() -> Self {
        Self {
            target: String::new(),
            family: AddressFamily::Any,
            query: QuerySpec::default(),
            dest_port: DEFAULT_DEST_PORT,
            base_port: DEFAULT_BASE_PORT,
            path_count: DEFAULT_PATH_COUNT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl EnumerationRequest {
    /// Validates the request.
    pub fn validate(&self) -> NsidResult<()> {
        if self.target.trim().is_empty() {
            return Err(NsidError::EmptyTarget);
        }
        if self.dest_port == 0 {
            return Err(NsidError::InvalidPort {
                what: "destination",
                port: self.dest_port,
            });
        }
        if self.timeout.is_zero() {
            return Err(NsidError::InvalidTimeout);
        }
        validate_port_range(self.base_port, self.path_count)
    }
}

/// Immutable per-run probe configuration, built once the target is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Resolved target address.
    pub target: IpAddr,
    /// Destination port.
    pub dest_port: u16,
    /// First source port of the range.
    pub base_port: u16,
    /// Number of paths to probe.
    pub path_count: u8,
    /// Round-trip timeout of each probe.
    pub timeout: Duration,
    /// Family constraint the target was selected with.
    pub family: AddressFamily,
}

impl ProbeConfig {
    /// Builds a validated configuration from a request and its resolved target.
    pub fn from_request(request: &EnumerationRequest, target: IpAddr) -> NsidResult<Self> {
        request.validate()?;
        let path_count = u8::try_from(request.path_count)
            .map_err(|_| NsidError::InvalidPathCount(request.path_count))?;

        let config = Self {
            target,
            dest_port: request.dest_port,
            base_port: request.base_port,
            path_count,
            timeout: request.timeout,
            family: request.family,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> NsidResult<()> {
        if self.dest_port == 0 {
            return Err(NsidError::InvalidPort {
                what: "destination",
                port: self.dest_port,
            });
        }
        if self.timeout.is_zero() {
            return Err(NsidError::InvalidTimeout);
        }
        if !self.family.matches(&self.target) {
            return Err(NsidError::AddressFamilyMismatch {
                address: self.target,
                family: self.family,
            });
        }
        validate_port_range(self.base_port, self.path_count as u16)
    }

    /// The source ports to probe from, one per path.
    pub fn source_ports(&self) -> RangeInclusive<u16> {
        let last = self.base_port as u32 + self.path_count.max(1) as u32 - 1;
        self.base_port..=last.min(u16::MAX as u32) as u16
    }

    /// The resolver socket address.
    pub fn target_addr(&self) -> SocketAddr {
        SocketAddr::new(self.target, self.dest_port)
    }
}
