//! NSID (RFC 5001) option handling.
//!
//! The accessor here is the only place that looks inside the EDNS
//! extension of a response; callers get plain identifiers.
//!
//! Responses are read from the received datagram rather than from a parsed
//! [`hickory_proto::op::Message`], whose OPT keeps a single option per code.
//! A responder may carry several NSID options and each one is a candidate.

use hickory_proto::error::ProtoError;
use hickory_proto::op::{Edns, Header, Query};
use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption};
use hickory_proto::rr::{Name, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder};
use std::fmt::Write;

use crate::{NsidError, NsidResult};

/// UDP payload size advertised in queries, large enough for any NSID.
pub const EDNS_PAYLOAD_SIZE: u16 = 4096;

/// Builds the EDNS extension requesting the responder's NSID.
pub fn nsid_request_edns() -> Edns {
    let mut edns = Edns::new();
    edns.set_max_payload(EDNS_PAYLOAD_SIZE);
    edns.options_mut()
        .insert(EdnsOption::Unknown(u16::from(EdnsCode::NSID), Vec::new()));
    edns
}

/// Decodes an NSID payload into an identifier string.
///
/// UTF-8 payloads are used as is. Anything else is kept as `0x`-prefixed
/// hex so that binary identifiers still tell backends apart.
pub fn decode_identifier(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(id) => id.to_string(),
        Err(_) => format!("0x{}", to_hex(payload)),
    }
}

/// Hex form of a payload, two digits per octet as RFC 5001 displays it.
pub fn to_hex(payload: &[u8]) -> String {
    payload.iter().fold(String::with_capacity(payload.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

/// Decoded identifiers of one response plus the options that failed.
#[derive(Debug, Default)]
pub struct ExtractedIds {
    pub identifiers: Vec<String>,
    pub malformed: Vec<NsidError>,
}

/// Extracts every NSID identifier carried by a response datagram.
///
/// Empty payloads are skipped: they are what a responder echoes when it has
/// nothing to report. An OPT whose options run past its RDATA yields the
/// identifiers read so far plus a [`NsidError::MalformedIdentifier`].
pub fn extract_identifiers(datagram: &[u8]) -> NsidResult<ExtractedIds> {
    let mut extracted = ExtractedIds::default();
    let opts = opt_rdata(datagram)
        .map_err(|e| NsidError::TransportFailure(format!("invalid response: {}", e)))?;
    for rdata in opts {
        read_nsid_options(rdata, &mut extracted);
    }
    Ok(extracted)
}

/// Returns the RDATA of every OPT record in the additional section.
fn opt_rdata(datagram: &[u8]) -> Result<Vec<&[u8]>, ProtoError> {
    let mut decoder = BinDecoder::new(datagram);
    let header = Header::read(&mut decoder)?;

    for _ in 0..header.query_count() {
        Query::read(&mut decoder)?;
    }

    let records = header.answer_count() as usize
        + header.name_server_count() as usize
        + header.additional_count() as usize;
    let additional_from = records - header.additional_count() as usize;

    let mut opts = Vec::new();
    for index in 0..records {
        Name::read(&mut decoder)?;
        let record_type = RecordType::from(decoder.read_u16()?.unverified());
        let _class = decoder.read_u16()?.unverified();
        let _ttl = decoder.read_u32()?.unverified();
        let rd_length = decoder.read_u16()?.unverified() as usize;
        let rdata = decoder.read_slice(rd_length)?.unverified();

        if index >= additional_from && record_type == RecordType::OPT {
            opts.push(rdata);
        }
    }
    Ok(opts)
}

/// Walks the option TLVs of one OPT RDATA, keeping NSID payloads.
fn read_nsid_options(rdata: &[u8], extracted: &mut ExtractedIds) {
    let nsid = u16::from(EdnsCode::NSID);
    let mut rest = rdata;

    while !rest.is_empty() {
        if rest.len() < 4 {
            extracted.malformed.push(NsidError::MalformedIdentifier {
                payload: to_hex(rest),
                reason: "truncated EDNS option header".to_string(),
            });
            return;
        }
        let code = u16::from_be_bytes([rest[0], rest[1]]);
        let length = u16::from_be_bytes([rest[2], rest[3]]) as usize;
        let body = &rest[4..];
        if body.len() < length {
            if code == nsid {
                extracted.malformed.push(NsidError::MalformedIdentifier {
                    payload: to_hex(body),
                    reason: format!(
                        "option length {} exceeds {} remaining bytes",
                        length,
                        body.len()
                    ),
                });
            }
            return;
        }

        let (payload, next) = body.split_at(length);
        if code == nsid && !payload.is_empty() {
            extracted.identifiers.push(decode_identifier(payload));
        }
        rest = next;
    }
}
