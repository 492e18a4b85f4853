//! # DNS Transporter
//!
//! The `transporter` module moves encoded queries to a name server and brings the raw reply
//! back. It knows nothing about resolution strategy: the engine decides *where* to send a query,
//! the transporter only performs the exchange.
//!
//! ## Public API
//!
//! - [`Transport`]
//!   The seam used by the resolver engine. One blocking request/response exchange per call.
//!
//! - [`UdpTransport`]
//!   Sends one datagram per attempt from an ephemeral socket and waits for a reply whose ID
//!   matches the query, with a per-attempt timeout and a retry budget.
//!
//! - [`parse_resolv_conf`] / [`system_nameservers`]
//!   Read the ordered `nameserver` entries of `/etc/resolv.conf`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dnsquery::dns::resolver::build_query;
//! use dnsquery::dns::resolver::RecordType;
//! use dnsquery::dns::resolver::transporter::{Transport, UdpTransport};
//! use std::time::Duration;
//!
//! let transport = UdpTransport::new(Duration::from_secs(2), 2);
//! let query = build_query(0x2a2a, "example.com", RecordType::A, true).unwrap();
//! let reply = transport.exchange(&query, "1.1.1.1:53".parse().unwrap()).unwrap();
//! println!("{} bytes", reply.len());
//! ```
//!
//! ## Implementation notes
//!
//! - Replies are read into a 512-byte buffer (RFC 1035 §2.3.4 UDP limit). There is no TCP
//!   fallback; a reply with the TC bit set is logged and returned as-is.
//! - A reply whose ID differs from the query ID is discarded and uses up the attempt.
use crate::dns::resolver::standard::DnsHeaderFlags;
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Largest reply read from the socket.
pub const MAX_UDP_PAYLOAD: usize = 512;

/// Location of the system resolver configuration.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// A blocking request/response exchange with a single name server.
pub trait Transport {
    /// Sends `query` to `server` and returns the raw reply.
    fn exchange(&self, query: &[u8], server: SocketAddr) -> Result<Vec<u8>, UdpErrors>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn exchange(&self, query: &[u8], server: SocketAddr) -> Result<Vec<u8>, UdpErrors> {
        (**self).exchange(query, server)
    }
}

/// UDP transport with a per-attempt timeout and `1 + retries` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpTransport {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            retries: 1,
        }
    }
}

impl UdpTransport {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }
}

impl Transport for UdpTransport {
    fn exchange(&self, query: &[u8], server: SocketAddr) -> Result<Vec<u8>, UdpErrors> {
        let local: SocketAddr = match server {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_read_timeout(Some(self.timeout))?;

        let attempts = 1 + self.retries;
        let mut buf = [0u8; MAX_UDP_PAYLOAD];

        for attempt in 1..=attempts {
            debug!(%server, attempt, bytes = query.len(), "sending DNS query");
            socket.send_to(query, server)?;

            let (len, source) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    warn!(%server, attempt, timeout = ?self.timeout, "no reply before timeout");
                    continue;
                }
                Err(e) => return Err(UdpErrors::SocketIo(e)),
            };

            let response = &buf[..len];
            if len < 2 || response.get(..2) != query.get(..2) {
                warn!(%server, %source, attempt, "discarding reply with mismatched ID");
                continue;
            }

            let flags = response
                .get(2..4)
                .map(|bytes| DnsHeaderFlags::from_u16(u16::from_be_bytes([bytes[0], bytes[1]])));
            if flags.is_some_and(|flags| flags.tc) {
                warn!(%server, "reply is truncated (TC set), using the partial message");
            }

            trace!(%server, %source, bytes = len, "received DNS reply");
            return Ok(response.to_vec());
        }

        Err(UdpErrors::NoResponse { server, attempts })
    }
}

/// Represents errors that may occur when sending or receiving DNS queries over UDP.
#[derive(Debug, Error)]
pub enum UdpErrors {
    #[error("{0}")]
    SocketIo(#[from] io::Error),
    #[error("No DNS response from {server} after {attempts} attempt(s)")]
    NoResponse { server: SocketAddr, attempts: u32 },
}

/// Extracts the ordered `nameserver` addresses of a resolv.conf document.
///
/// Comment lines (`#` or `;`) are skipped and so are entries that are not IP addresses.
pub fn parse_resolv_conf(contents: &str) -> Vec<IpAddr> {
    let mut servers = Vec::new();

    for line in contents.lines().map(str::trim) {
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let mut fields = line.split_whitespace();
        if fields.next() != Some("nameserver") {
            continue;
        }
        let Some(address) = fields.next() else {
            continue;
        };

        match address.parse::<IpAddr>() {
            Ok(ip) => servers.push(ip),
            Err(_) => warn!(entry = address, "ignoring unparsable nameserver entry"),
        }
    }
    servers
}

/// Reads the nameservers configured in [`RESOLV_CONF`].
pub fn system_nameservers() -> io::Result<Vec<IpAddr>> {
    let contents = std::fs::read_to_string(RESOLV_CONF)?;
    let servers = parse_resolv_conf(&contents);
    debug!(count = servers.len(), "loaded system nameservers");
    Ok(servers)
}
