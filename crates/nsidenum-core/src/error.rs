//! Error types for NSID enumeration.

use std::net::IpAddr;
use thiserror::Error;

use crate::types::AddressFamily;

/// Main error type for resolution, probing and configuration.
#[derive(Error, Debug)]
pub enum NsidError {
    // Resolution errors
    #[error("Failed to resolve {target}: {source}")]
    ResolutionFailed {
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Address {address} does not match the requested family ({family})")]
    AddressFamilyMismatch {
        address: IpAddr,
        family: AddressFamily,
    },

    #[error("No {family} address found for {target}")]
    NoMatchingAddress {
        target: String,
        family: AddressFamily,
    },

    // Per-path probe errors
    #[error("Timed out waiting for a response")]
    Timeout,

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Malformed NSID payload {payload}: {reason}")]
    MalformedIdentifier { payload: String, reason: String },

    // Configuration errors
    #[error("Invalid source port range: base port {base_port} with {path_count} paths exceeds 65535")]
    InvalidPortRange { base_port: u16, path_count: u16 },

    #[error("Invalid {what} port: {port}")]
    InvalidPort { what: &'static str, port: u16 },

    #[error("Path count must be between 1 and 255, got {0}")]
    InvalidPathCount(u16),

    #[error("Timeout must be positive")]
    InvalidTimeout,

    #[error("Query name cannot be empty")]
    EmptyQueryName,

    #[error("Invalid query name {name}: {reason}")]
    InvalidQueryName { name: String, reason: String },

    #[error("Invalid query type: {0}")]
    UnknownRecordType(String),

    #[error("Invalid query class: {0}")]
    UnknownClass(String),

    #[error("Cannot force both IPv4 and IPv6")]
    ConflictingFamilies,

    #[error("Target cannot be empty")]
    EmptyTarget,

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NsidError {
    /// Returns true if this error aborts the whole run.
    ///
    /// Only target resolution problems are fatal. Every per-path failure is
    /// tolerated and merely logged by the enumerator.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ResolutionFailed { .. }
                | Self::AddressFamilyMismatch { .. }
                | Self::NoMatchingAddress { .. }
        )
    }

    /// Returns true if this error comes from validating user input.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidPortRange { .. }
                | Self::InvalidPort { .. }
                | Self::InvalidPathCount(_)
                | Self::InvalidTimeout
                | Self::EmptyQueryName
                | Self::InvalidQueryName { .. }
                | Self::UnknownRecordType(_)
                | Self::UnknownClass(_)
                | Self::ConflictingFamilies
                | Self::EmptyTarget
        )
    }
}

impl From<std::io::Error> for NsidError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => NsidError::Timeout,
            std::io::ErrorKind::WouldBlock => NsidError::Timeout,
            _ => NsidError::TransportFailure(err.to_string()),
        }
    }
}

/// Result type alias for enumeration operations.
pub type NsidResult<T> = Result<T, NsidError>;
