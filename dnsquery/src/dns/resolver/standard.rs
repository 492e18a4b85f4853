//! # dnsquery Message Codec
//!
//! This module defines the representation of DNS messages used by the resolver.
//! It provides the building blocks for constructing, encoding, and parsing DNS messages in a
//! controlled way, suitable for use by the transport and engine layers.
//!
//! Key features include:
//! - Fully structured DNS message representation with `DnsMessage`.
//! - Header, question, answer, authority, and additional sections.
//! - Encoding and decoding DNS header flags via `DnsHeaderFlags`.
//! - Typed resource records (`ResourceRecord`) carrying decoded [`RData`].
//! - ID generation for queries (`generate_id()`).
//!
//! ## Sections
//!
//! - **HeaderSection**: Contains the message ID, flags, and counts of each section.
//! - **DnsHeaderFlags**: Represents the 16-bit flags field and supports encoding/decoding.
//! - **QuestionSection**: Holds the query name, type, and class.
//! - **ResourceRecord**: Owner name, type, class, TTL, and RDATA, shared by the answer,
//!   authority and additional sections.
//!
//! ## Usage
//!
//! ```rust
//! use dnsquery::dns::resolver::{build_query, parse_response, RecordType};
//!
//! let query = build_query(0x1234, "example.com", RecordType::A, true).unwrap();
//! let parsed = parse_response(&query).unwrap();
//!
//! assert_eq!(parsed.header.id, 0x1234);
//! assert_eq!(parsed.question.unwrap().name, "example.com");
//! ```
//!
//! Every parse failure discards the whole message: there are no partially decoded results.
use crate::dns::compressor::{CompressorErrors, MessageCompressor};
use crate::dns::resolver::rdata::RData;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Upper bound accepted for any section count of a received message.
///
/// A 512-byte UDP reply cannot hold more records than this; larger counts are rejected before
/// anything is allocated.
pub const MAX_SECTION_RECORDS: u16 = 256;

/// Size of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// Class IN.
pub const CLASS_IN: u16 = 1;

pub(crate) mod internal {
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    /// Generates a random 16-bit ID for a DNS query.
    pub fn generate_id() -> u16 {
        let mut thread_rng = rand::rng();
        let mut rng = SmallRng::from_rng(&mut thread_rng);

        rng.random::<u16>()
    }
}

pub use internal::generate_id;

/// Builds the wire form of a single-question query.
///
/// The header carries `qr = 0`, `opcode = 0`, `qd_count = 1` and both `rd` and `ra` set to
/// `recursion_desired`. The question class is always IN.
pub fn build_query(
    id: u16,
    name: &str,
    record_type: RecordType,
    recursion_desired: bool,
) -> Result<Vec<u8>, CompressorErrors> {
    DnsMessage::new_query(id, name, record_type, recursion_desired).encode_query()
}

/// Parses a complete DNS message, see [`DnsMessage::decode`].
pub fn parse_response(message: &[u8]) -> Result<DnsMessage, DecodeQueryErrors> {
    DnsMessage::decode(message)
}

/// Represents a full DNS message, including header and all four sections.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DnsMessage {
    pub header: HeaderSection,
    // The question for the name server
    pub question: Option<QuestionSection>,
    // RRs answering the question
    pub answer: Vec<ResourceRecord>,
    // RRs pointing toward an authority
    pub authority: Vec<ResourceRecord>,
    // RRs holding additional information
    pub additional: Vec<ResourceRecord>,
}

impl DnsMessage {
    /// Creates a new standard query message.
    ///
    /// # Arguments
    /// * `id` - Identifier echoed back by the server.
    /// * `target` - The domain name to query.
    /// * `record_type` - Type of record (A, MX, LOC, etc.).
    /// * `recursion_desired` - Value of both the RD and RA bits.
    pub fn new_query(
        id: u16,
        target: &str,
        record_type: RecordType,
        recursion_desired: bool,
    ) -> DnsMessage {
        DnsMessage {
            header: HeaderSection {
                id,
                flags: DnsHeaderFlags {
                    qr: false,
                    opcode: OpCodeOptions::StandardQuery as u8,
                    aa: false,
                    tc: false,
                    rd: recursion_desired,
                    ra: recursion_desired,
                    z: 0,
                    rcode: 0,
                }
                .to_u16(),
                qd_count: 1,
                an_count: 0,
                ns_count: 0,
                ar_count: 0,
            },
            question: Some(QuestionSection {
                name: target.to_string(),
                record_type,
                class: CLASS_IN,
            }),
            answer: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Encodes the header and question without name compression.
    pub fn encode_query(&self) -> Result<Vec<u8>, CompressorErrors> {
        let mut message: Vec<u8> = Vec::with_capacity(HEADER_LEN + 64);
        message.extend_from_slice(&self.header.to_bytes());

        if let Some(question) = &self.question {
            MessageCompressor::encode_into(&question.name, &mut message)?;
            message.extend_from_slice(&question.record_type.to_bytes());
            message.extend_from_slice(&question.class.to_be_bytes());
        }
        Ok(message)
    }

    /// Encodes the whole message, compressing repeated names.
    ///
    /// Section counts are written from the actual section lengths, and each record's
    /// `rd_length` is recomputed from the encoded rdata.
    pub fn encode(&self) -> Result<Vec<u8>, CompressorErrors> {
        let mut message: Vec<u8> = Vec::with_capacity(512);
        let mut pointer_map: HashMap<String, usize> = HashMap::new();

        let header = HeaderSection {
            qd_count: self.question.is_some() as u16,
            an_count: self.answer.len() as u16,
            ns_count: self.authority.len() as u16,
            ar_count: self.additional.len() as u16,
            ..self.header
        };
        message.extend_from_slice(&header.to_bytes());

        if let Some(question) = &self.question {
            MessageCompressor::compress(&question.name, &mut message, &mut pointer_map)?;
            message.extend_from_slice(&question.record_type.to_bytes());
            message.extend_from_slice(&question.class.to_be_bytes());
        }

        for record in self
            .answer
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            record.encode(&mut message, &mut pointer_map)?;
        }
        Ok(message)
    }

    /// Parses a DNS message received from the network.
    ///
    /// Section counts are checked against [`MAX_SECTION_RECORDS`] before any record is read.
    /// Only the first question is kept when a server echoes more than one.
    pub fn decode(message: &[u8]) -> Result<DnsMessage, DecodeQueryErrors> {
        let header = HeaderSection::from_bytes(message)?;

        for (section, count) in [
            ("question", header.qd_count),
            ("answer", header.an_count),
            ("authority", header.ns_count),
            ("additional", header.ar_count),
        ] {
            if count > MAX_SECTION_RECORDS {
                return Err(DecodeQueryErrors::UnsupportedSectionCount {
                    section,
                    count,
                    max: MAX_SECTION_RECORDS,
                });
            }
        }

        let mut cursor = HEADER_LEN;
        let mut question = None;
        for _ in 0..header.qd_count {
            let (parsed, consumed) = QuestionSection::decode(message, cursor)?;
            cursor += consumed;
            question.get_or_insert(parsed);
        }

        let answer = ResourceRecord::decode_section(message, &mut cursor, header.an_count)?;
        let authority = ResourceRecord::decode_section(message, &mut cursor, header.ns_count)?;
        let additional = ResourceRecord::decode_section(message, &mut cursor, header.ar_count)?;

        trace!(
            id = header.id,
            answer = answer.len(),
            authority = authority.len(),
            additional = additional.len(),
            trailing = message.len() - cursor,
            "decoded DNS message"
        );

        Ok(DnsMessage {
            header,
            question,
            answer,
            authority,
            additional,
        })
    }

    /// Structured view of the header flags.
    pub fn flags(&self) -> DnsHeaderFlags {
        DnsHeaderFlags::from_u16(self.header.flags)
    }

    /// Response code carried in the header.
    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::from(self.flags().rcode)
    }

    /// Keeps only the A records of the additional section, in their original order.
    ///
    /// The header counts keep describing the message as received.
    pub fn retain_ipv4_glue(&mut self) {
        self.additional.retain(|record| match record.record_type {
            RecordType::A => true,
            RecordType::Aaaa => {
                debug!(name = %record.name, "skipping AAAA glue record");
                false
            }
            other => {
                trace!(name = %record.name, record_type = %other, "dropping additional record");
                false
            }
        });
    }
}

/// Represents the header section of a DNS message.
///
/// The header contains an ID, flags, and counts for each section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HeaderSection {
    /// Identifier to match requests and responses.
    pub id: u16,
    /// Flags and control bits for the DNS message.
    /// Use [`DnsHeaderFlags`]
    pub flags: u16,
    /// Number of entries in the question section.
    pub qd_count: u16,
    /// Number of resource records in the answer section.
    pub an_count: u16,
    /// Number of name server records in the authority section.
    pub ns_count: u16,
    /// Number of resource records in the additional section.
    pub ar_count: u16,
}

#[allow(clippy::wrong_self_convention)]
impl HeaderSection {
    /// Converts the header into a 12-byte array suitable for network transmission.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..2].copy_from_slice(&self.id.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.flags.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.qd_count.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.an_count.to_be_bytes());
        bytes[8..10].copy_from_slice(&self.ns_count.to_be_bytes());
        bytes[10..12].copy_from_slice(&self.ar_count.to_be_bytes());
        bytes
    }

    /// Reads the header from the first 12 bytes of `message`.
    pub fn from_bytes(message: &[u8]) -> Result<Self, DecodeQueryErrors> {
        Ok(Self {
            id: read_u16(message, 0)?,
            flags: read_u16(message, 2)?,
            qd_count: read_u16(message, 4)?,
            an_count: read_u16(message, 6)?,
            ns_count: read_u16(message, 8)?,
            ar_count: read_u16(message, 10)?,
        })
    }
}

/// Represents the 16-bit DNS flags field (RFC 1035 §4.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsHeaderFlags {
    /// Query/Response flag
    pub qr: bool,
    /// Operation code
    /// Use `OpCodeOptions`
    pub opcode: u8,
    /// Authoritative Answer
    pub aa: bool,
    /// Truncation flag
    pub tc: bool,
    /// Recursion Desired
    pub rd: bool,
    /// Recursion Available
    pub ra: bool,
    /// Reserved bits (RFC 1035)
    pub z: u8,
    /// Response code
    pub rcode: u8,
}

// 3-15 reserved for future use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCodeOptions {
    StandardQuery = 0,
    InverseQuery = 1,
    ServerStatusRequest = 2,
}

impl DnsHeaderFlags {
    /// Encode the flags into a 16-bit integer.
    pub fn to_u16(self) -> u16 {
        ((self.qr as u16) << 15)
            | ((self.opcode as u16 & 0b1111) << 11)
            | ((self.aa as u16) << 10)
            | ((self.tc as u16) << 9)
            | ((self.rd as u16) << 8)
            | ((self.ra as u16) << 7)
            | ((self.z as u16 & 0b111) << 4)
            | (self.rcode as u16 & 0b1111)
    }
    /// Decode from a 16-bit integer into structured flags.
    pub fn from_u16(value: u16) -> Self {
        Self {
            qr: (value >> 15) & 1 != 0,
            opcode: ((value >> 11) & 0b1111) as u8,
            aa: (value >> 10) & 1 != 0,
            tc: (value >> 9) & 1 != 0,
            rd: (value >> 8) & 1 != 0,
            ra: (value >> 7) & 1 != 0,
            z: ((value >> 4) & 0b111) as u8,
            rcode: (value & 0b1111) as u8,
        }
    }
}

/// RCODE values of RFC 1035 §4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ResponseCode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Other(u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormatError,
            2 => ResponseCode::ServerFailure,
            3 => ResponseCode::NameError,
            4 => ResponseCode::NotImplemented,
            5 => ResponseCode::Refused,
            other => ResponseCode::Other(other),
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::NoError => write!(f, "NOERROR"),
            ResponseCode::FormatError => write!(f, "FORMERR"),
            ResponseCode::ServerFailure => write!(f, "SERVFAIL"),
            ResponseCode::NameError => write!(f, "NXDOMAIN"),
            ResponseCode::NotImplemented => write!(f, "NOTIMP"),
            ResponseCode::Refused => write!(f, "REFUSED"),
            ResponseCode::Other(code) => write!(f, "RCODE{code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QuestionSection {
    /// The domain name being queried.
    pub name: String,
    /// The type of DNS record being requested (e.g., A, MX, LOC).
    pub record_type: RecordType,
    /// The class of the DNS record (usually IN for Internet, or CH for Chaos).
    pub class: u16,
}

impl QuestionSection {
    fn decode(message: &[u8], start: usize) -> Result<(Self, usize), DecodeQueryErrors> {
        let (name, consumed) = MessageCompressor::decompress(message, start)?;
        let cursor = start + consumed;
        let record_type = RecordType::from(read_u16(message, cursor)?);
        let class = read_u16(message, cursor + 2)?;

        Ok((
            Self {
                name,
                record_type,
                class,
            },
            consumed + 4,
        ))
    }
}

/// A single resource record of the answer, authority or additional section.
/// All RRs (resource records) have the same top level format shown.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ResourceRecord {
    /// The domain name that owns this record.
    pub name: String,
    /// The type of DNS record (e.g., A, NS, MX).
    pub record_type: RecordType,
    /// The class of the DNS record (usually IN).
    pub class: u16,
    /// Time-to-live of the record in seconds, 0 means do not cache.
    pub ttl: u32,
    /// Length of the RDATA field.
    pub rd_length: u16,
    /// The decoded resource data.
    pub rdata: RData,
}

impl ResourceRecord {
    /// Builds a class IN record, `rd_length` is filled in when the message is encoded.
    pub fn new(name: &str, ttl: u32, rdata: RData) -> Self {
        Self {
            name: name.to_string(),
            record_type: rdata.record_type(),
            class: CLASS_IN,
            ttl,
            rd_length: 0,
            rdata,
        }
    }

    fn decode_section(
        message: &[u8],
        cursor: &mut usize,
        count: u16,
    ) -> Result<Vec<Self>, DecodeQueryErrors> {
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (record, consumed) = Self::decode(message, *cursor)?;
            *cursor += consumed;
            records.push(record);
        }
        Ok(records)
    }

    /// Decodes one record at `start`, returning it with the number of bytes it occupied.
    pub fn decode(message: &[u8], start: usize) -> Result<(Self, usize), DecodeQueryErrors> {
        let (name, consumed) = MessageCompressor::decompress(message, start)?;
        let cursor = start + consumed;

        let record_type = RecordType::from(read_u16(message, cursor)?);
        let class = read_u16(message, cursor + 2)?;
        let ttl = read_u32(message, cursor + 4)?;
        let rd_length = read_u16(message, cursor + 8)?;

        let rdata_start = cursor + 10;
        let rdata_end = rdata_start + rd_length as usize;
        if rdata_end > message.len() {
            return Err(DecodeQueryErrors::truncated(rdata_end - 1, message));
        }

        let rdata = RData::decode(record_type, message, rdata_start, rd_length)?;

        Ok((
            Self {
                name,
                record_type,
                class,
                ttl,
                rd_length,
                rdata,
            },
            rdata_end - start,
        ))
    }

    fn encode(
        &self,
        message: &mut Vec<u8>,
        pointer_map: &mut HashMap<String, usize>,
    ) -> Result<(), CompressorErrors> {
        MessageCompressor::compress(&self.name, message, pointer_map)?;
        message.extend_from_slice(&self.record_type.to_bytes());
        message.extend_from_slice(&self.class.to_be_bytes());
        message.extend_from_slice(&self.ttl.to_be_bytes());

        let length_at = message.len();
        message.extend_from_slice(&[0, 0]);
        self.rdata.encode(message, pointer_map)?;

        let rd_length = (message.len() - length_at - 2) as u16;
        message[length_at..length_at + 2].copy_from_slice(&rd_length.to_be_bytes());
        Ok(())
    }
}

/// TYPE fields are used in resource records.  Note that these types are a subset of QTYPEs.
///
/// Types without a dedicated variant are kept as [`RecordType::Unknown`].
///
/// # Example
///
/// ```rust
/// use dnsquery::dns::resolver::RecordType;
///
/// assert_eq!(RecordType::Loc.to_bytes(), [0x00, 0x1d]);
/// assert_eq!(RecordType::from(99), RecordType::Unknown(99));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RecordType {
    // A host address
    A,
    // An authoritative name server
    Ns,
    // The Canonical name for an alias
    Cname,
    // Marks the start of a zone of authority
    Soa,
    // Mail exchange
    Mx,
    // IPv6 host address
    Aaaa,
    // Location information (RFC 1876)
    Loc,
    Unknown(u16),
}

#[allow(clippy::wrong_self_convention)]
impl RecordType {
    /// Encode the record type as a 2-byte big-endian value.
    pub fn to_bytes(self) -> [u8; 2] {
        u16::from(self).to_be_bytes()
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::Ns,
            5 => RecordType::Cname,
            6 => RecordType::Soa,
            15 => RecordType::Mx,
            28 => RecordType::Aaaa,
            29 => RecordType::Loc,
            other => RecordType::Unknown(other),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Soa => 6,
            RecordType::Mx => 15,
            RecordType::Aaaa => 28,
            RecordType::Loc => 29,
            RecordType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::Ns => write!(f, "NS"),
            RecordType::Cname => write!(f, "CNAME"),
            RecordType::Soa => write!(f, "SOA"),
            RecordType::Mx => write!(f, "MX"),
            RecordType::Aaaa => write!(f, "AAAA"),
            RecordType::Loc => write!(f, "LOC"),
            RecordType::Unknown(other) => write!(f, "TYPE{other}"),
        }
    }
}

pub(crate) fn read_u16(message: &[u8], offset: usize) -> Result<u16, DecodeQueryErrors> {
    message
        .get(offset..offset + 2)
        .map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
        .ok_or_else(|| DecodeQueryErrors::truncated(offset + 1, message))
}

pub(crate) fn read_u32(message: &[u8], offset: usize) -> Result<u32, DecodeQueryErrors> {
    message
        .get(offset..offset + 4)
        .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .ok_or_else(|| DecodeQueryErrors::truncated(offset + 3, message))
}

/// Errors raised while decoding a received message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeQueryErrors {
    #[error("Truncated DNS message: offset {offset} is past the end ({len} bytes)")]
    TruncatedMessage { offset: usize, len: usize },
    #[error("Invalid compression pointer at offset {offset} (target {target})")]
    InvalidCompressionPointer { offset: usize, target: usize },
    #[error("Unsupported label type 0x{label:02x} at offset {offset}")]
    UnsupportedLabelType { offset: usize, label: u8 },
    #[error("Domain name starting at offset {offset} expands past 255 bytes")]
    NameTooLong { offset: usize },
    #[error("Unsupported LOC version {0}")]
    UnsupportedLocVersion(u8),
    #[error("The {section} section declares {count} records, the limit is {max}")]
    UnsupportedSectionCount {
        section: &'static str,
        count: u16,
        max: u16,
    },
    #[error("Invalid RDATA length for {record_type}: expected {expected} bytes, found {found}")]
    InvalidRdataLength {
        record_type: RecordType,
        expected: usize,
        found: usize,
    },
    #[error("RDATA of {record_type} runs past its declared length of {rd_length} bytes")]
    RdataOverrun {
        record_type: RecordType,
        rd_length: u16,
    },
}

impl DecodeQueryErrors {
    pub(crate) fn truncated(offset: usize, message: &[u8]) -> Self {
        DecodeQueryErrors::TruncatedMessage {
            offset,
            len: message.len(),
        }
    }
}
