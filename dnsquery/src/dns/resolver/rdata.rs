//! Typed RDATA decoding.
//!
//! [`RData::decode`] interprets the rdata window of a resource record according to its type.
//! Name-bearing types (NS, CNAME, MX, SOA) are decoded against the whole message so compression
//! pointers resolve, but the name itself must end inside the window.
//!
//! LOC records (RFC 1876) are kept in their raw form in [`LocData`]; the accessors convert them
//! to degrees/minutes/seconds, meters and precisions when needed.
use crate::dns::compressor::{CompressorErrors, MessageCompressor};
use crate::dns::resolver::standard::{DecodeQueryErrors, RecordType, read_u16, read_u32};
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Decoded resource data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(String),
    Cname(String),
    Mx { preference: u16, exchange: String },
    Soa(SoaData),
    Loc(LocData),
    /// Raw bytes of a type without a dedicated decoder.
    Opaque(Vec<u8>),
}

/// SOA rdata (RFC 1035 §3.3.13).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SoaData {
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

impl RData {
    /// Decodes `rd_length` bytes of rdata starting at `start` inside `message`.
    ///
    /// The caller guarantees the window lies inside `message`.
    pub fn decode(
        record_type: RecordType,
        message: &[u8],
        start: usize,
        rd_length: u16,
    ) -> Result<RData, DecodeQueryErrors> {
        let end = start + rd_length as usize;
        let window = message
            .get(start..end)
            .ok_or_else(|| DecodeQueryErrors::truncated(end.saturating_sub(1), message))?;

        let rdata = match record_type {
            RecordType::A => {
                let octets: [u8; 4] =
                    window
                        .try_into()
                        .map_err(|_| DecodeQueryErrors::InvalidRdataLength {
                            record_type,
                            expected: 4,
                            found: window.len(),
                        })?;
                RData::A(Ipv4Addr::from(octets))
            }
            RecordType::Aaaa => {
                let octets: [u8; 16] =
                    window
                        .try_into()
                        .map_err(|_| DecodeQueryErrors::InvalidRdataLength {
                            record_type,
                            expected: 16,
                            found: window.len(),
                        })?;
                RData::Aaaa(Ipv6Addr::from(octets))
            }
            RecordType::Ns => RData::Ns(read_name(message, start, end, record_type, rd_length)?.0),
            RecordType::Cname => {
                RData::Cname(read_name(message, start, end, record_type, rd_length)?.0)
            }
            RecordType::Mx => {
                if window.len() < 3 {
                    return Err(DecodeQueryErrors::InvalidRdataLength {
                        record_type,
                        expected: 3,
                        found: window.len(),
                    });
                }
                let preference = read_u16(message, start)?;
                let (exchange, _) = read_name(message, start + 2, end, record_type, rd_length)?;
                RData::Mx {
                    preference,
                    exchange,
                }
            }
            RecordType::Soa => {
                let (mname, consumed) = read_name(message, start, end, record_type, rd_length)?;
                let (rname, consumed_r) =
                    read_name(message, start + consumed, end, record_type, rd_length)?;

                let fields = start + consumed + consumed_r;
                if fields + 20 > end {
                    return Err(DecodeQueryErrors::RdataOverrun {
                        record_type,
                        rd_length,
                    });
                }
                RData::Soa(SoaData {
                    mname,
                    rname,
                    serial: read_u32(message, fields)?,
                    refresh: read_u32(message, fields + 4)?,
                    retry: read_u32(message, fields + 8)?,
                    expire: read_u32(message, fields + 12)?,
                    minimum: read_u32(message, fields + 16)?,
                })
            }
            RecordType::Loc => RData::Loc(LocData::decode(window)?),
            RecordType::Unknown(_) => RData::Opaque(window.to_vec()),
        };
        Ok(rdata)
    }

    /// Record type this rdata belongs to.
    ///
    /// Opaque data has no type of its own and reports `TYPE0`.
    pub fn record_type(&self) -> RecordType {
        match self {
            RData::A(_) => RecordType::A,
            RData::Aaaa(_) => RecordType::Aaaa,
            RData::Ns(_) => RecordType::Ns,
            RData::Cname(_) => RecordType::Cname,
            RData::Mx { .. } => RecordType::Mx,
            RData::Soa(_) => RecordType::Soa,
            RData::Loc(_) => RecordType::Loc,
            RData::Opaque(_) => RecordType::Unknown(0),
        }
    }

    /// The address of an A record.
    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            RData::A(address) => Some(*address),
            _ => None,
        }
    }

    /// The target of an NS record.
    pub fn as_ns(&self) -> Option<&str> {
        match self {
            RData::Ns(name) => Some(name),
            _ => None,
        }
    }

    pub(crate) fn encode(
        &self,
        message: &mut Vec<u8>,
        pointer_map: &mut HashMap<String, usize>,
    ) -> Result<(), CompressorErrors> {
        match self {
            RData::A(address) => message.extend_from_slice(&address.octets()),
            RData::Aaaa(address) => message.extend_from_slice(&address.octets()),
            RData::Ns(name) | RData::Cname(name) => {
                MessageCompressor::compress(name, message, pointer_map)?
            }
            RData::Mx {
                preference,
                exchange,
            } => {
                message.extend_from_slice(&preference.to_be_bytes());
                MessageCompressor::compress(exchange, message, pointer_map)?;
            }
            RData::Soa(soa) => {
                MessageCompressor::compress(&soa.mname, message, pointer_map)?;
                MessageCompressor::compress(&soa.rname, message, pointer_map)?;
                for field in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum] {
                    message.extend_from_slice(&field.to_be_bytes());
                }
            }
            RData::Loc(loc) => message.extend_from_slice(&loc.to_bytes()),
            RData::Opaque(bytes) => message.extend_from_slice(bytes),
        }
        Ok(())
    }
}

fn read_name(
    message: &[u8],
    start: usize,
    end: usize,
    record_type: RecordType,
    rd_length: u16,
) -> Result<(String, usize), DecodeQueryErrors> {
    let (name, consumed) = MessageCompressor::decompress(message, start)?;
    if start + consumed > end {
        return Err(DecodeQueryErrors::RdataOverrun {
            record_type,
            rd_length,
        });
    }
    Ok((name, consumed))
}

fn fqdn(name: &str) -> String {
    if name.is_empty() {
        ".".to_string()
    } else {
        format!("{name}.")
    }
}

/// Zone-file presentation of the rdata.
impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(address) => write!(f, "{address}"),
            RData::Aaaa(address) => write!(f, "{address}"),
            RData::Ns(name) | RData::Cname(name) => write!(f, "{}", fqdn(name)),
            RData::Mx {
                preference,
                exchange,
            } => write!(f, "{preference} {}", fqdn(exchange)),
            RData::Soa(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                fqdn(&soa.mname),
                fqdn(&soa.rname),
                soa.serial,
                soa.refresh,
                soa.retry,
                soa.expire,
                soa.minimum
            ),
            RData::Loc(loc) => write!(f, "{}", loc.zone()),
            RData::Opaque(bytes) => {
                write!(f, "\\# {}", bytes.len())?;
                if !bytes.is_empty() {
                    write!(f, " ")?;
                    for byte in bytes {
                        write!(f, "{byte:02x}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

const LOC_EQUATOR: i64 = 1 << 31;
const LOC_ALTITUDE_BASE: i64 = 100_000 * 100;

/// LOC rdata in its wire representation (RFC 1876 §2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LocData {
    pub version: u8,
    /// Diameter of the enclosing sphere, mantissa/exponent encoded.
    pub size: u8,
    pub horiz_pre: u8,
    pub vert_pre: u8,
    /// Thousandths of an arc-second, offset by 2^31.
    pub latitude: u32,
    /// Thousandths of an arc-second, offset by 2^31.
    pub longitude: u32,
    /// Centimeters above a base 100000 m below the WGS 84 spheroid.
    pub altitude: u32,
}

impl LocData {
    pub const WIRE_LEN: usize = 16;

    /// Decodes the 16-byte LOC rdata.
    ///
    /// Only version 0 is defined; any other version is rejected before the length is checked.
    pub fn decode(rdata: &[u8]) -> Result<Self, DecodeQueryErrors> {
        if let Some(&version) = rdata.first()
            && version != 0
        {
            return Err(DecodeQueryErrors::UnsupportedLocVersion(version));
        }
        if rdata.len() != Self::WIRE_LEN {
            return Err(DecodeQueryErrors::InvalidRdataLength {
                record_type: RecordType::Loc,
                expected: Self::WIRE_LEN,
                found: rdata.len(),
            });
        }

        Ok(Self {
            version: rdata[0],
            size: rdata[1],
            horiz_pre: rdata[2],
            vert_pre: rdata[3],
            latitude: read_u32(rdata, 4)?,
            longitude: read_u32(rdata, 8)?,
            altitude: read_u32(rdata, 12)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut bytes = [0u8; Self::WIRE_LEN];
        bytes[0] = self.version;
        bytes[1] = self.size;
        bytes[2] = self.horiz_pre;
        bytes[3] = self.vert_pre;
        bytes[4..8].copy_from_slice(&self.latitude.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.longitude.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.altitude.to_be_bytes());
        bytes
    }

    pub fn latitude(&self) -> Coordinate {
        Coordinate::from_raw(self.latitude, ['N', 'S'])
    }

    pub fn longitude(&self) -> Coordinate {
        Coordinate::from_raw(self.longitude, ['E', 'W'])
    }

    pub fn altitude(&self) -> Altitude {
        Altitude {
            centimeters: self.altitude as i64 - LOC_ALTITUDE_BASE,
        }
    }

    pub fn size(&self) -> Precision {
        Precision::from_raw(self.size)
    }

    pub fn horizontal_precision(&self) -> Precision {
        Precision::from_raw(self.horiz_pre)
    }

    pub fn vertical_precision(&self) -> Precision {
        Precision::from_raw(self.vert_pre)
    }

    /// Master-file form, e.g. `41 24 0.499 N 2 10 52.530 E 47.00m 30m 10m 10m`.
    pub fn zone(&self) -> String {
        format!(
            "{} {} {}m {}m {}m {}m",
            self.latitude().zone(),
            self.longitude().zone(),
            self.altitude().meters_fixed(),
            self.size().meters(),
            self.horizontal_precision().meters(),
            self.vertical_precision().meters()
        )
    }
}

/// A latitude or longitude split into degrees, minutes, seconds and milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub milliseconds: u32,
    /// `N`/`S` for latitudes, `E`/`W` for longitudes.
    pub hemisphere: char,
}

impl Coordinate {
    fn from_raw(raw: u32, [positive, negative]: [char; 2]) -> Self {
        let signed = raw as i64 - LOC_EQUATOR;
        let hemisphere = if signed < 0 { negative } else { positive };

        let mut remaining = signed.unsigned_abs();
        let milliseconds = (remaining % 1000) as u32;
        remaining /= 1000;
        let seconds = (remaining % 60) as u32;
        remaining /= 60;
        let minutes = (remaining % 60) as u32;
        let degrees = (remaining / 60) as u32;

        Self {
            degrees,
            minutes,
            seconds,
            milliseconds,
            hemisphere,
        }
    }

    fn zone(&self) -> String {
        format!(
            "{} {} {}.{:03} {}",
            self.degrees, self.minutes, self.seconds, self.milliseconds, self.hemisphere
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}°{}′{}.{:03}″ {}",
            self.degrees, self.minutes, self.seconds, self.milliseconds, self.hemisphere
        )
    }
}

/// Altitude relative to the WGS 84 spheroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Altitude {
    pub centimeters: i64,
}

impl Altitude {
    fn meters_fixed(&self) -> String {
        let sign = if self.centimeters < 0 { "-" } else { "" };
        let magnitude = self.centimeters.unsigned_abs();
        format!("{sign}{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

impl fmt::Display for Altitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} m", self.meters_fixed())
    }
}

/// Size or precision value, `mantissa * 10^exponent` centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub centimeters: u64,
}

impl Precision {
    fn from_raw(raw: u8) -> Self {
        let mantissa = ((raw >> 4) % 10) as u64;
        let exponent = ((raw & 0x0F) % 10) as u32;
        Self {
            centimeters: mantissa * 10u64.pow(exponent),
        }
    }

    /// Whole meters, truncated.
    pub fn meters(&self) -> u64 {
        self.centimeters / 100
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} m", self.meters())
    }
}
