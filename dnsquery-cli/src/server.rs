//! # ServerArg
//!
//! Parser for the `@server[:port]` command-line argument.
//!
//! **Accepted forms:**
//! - `@192.0.2.1` and `@192.0.2.1:5353`
//! - `@::1`, `@[::1]` and `@[2001:db8::1]:5353` (a port requires brackets)
//!
//! ## Example
//!
//! ```rust,ignore
//! let server: ServerArg = "@1.1.1.1:53".parse().unwrap();
//! assert_eq!(server.port, Some(53));
//! ```
use std::fmt::Display;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

/// A validated `@server[:port]` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerArg {
    pub ip: IpAddr,
    pub target_type: TargetType,
    /// `None` when the argument carries no port.
    pub port: Option<u16>,
}

impl Display for ServerArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.ip, self.port) {
            (IpAddr::V6(ip), Some(port)) => write!(f, "@[{ip}]:{port}"),
            (ip, Some(port)) => write!(f, "@{ip}:{port}"),
            (ip, None) => write!(f, "@{ip}"),
        }
    }
}

/// Represents the address family of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    IPv4,
    IPv6,
}

impl Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IPv4 => write!(f, "ipv4"),
            Self::IPv6 => write!(f, "ipv6"),
        }
    }
}

impl TargetType {
    fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => TargetType::IPv4,
            IpAddr::V6(_) => TargetType::IPv6,
        }
    }
}

/// Represents possible errors when parsing a server argument.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServerArgErrors {
    #[error("The server must start with '@' => @server[:port]")]
    MissingAt,
    #[error("The server is empty")]
    ServerEmpty,
    #[error("Invalid server => must be an IPv4 or IPv6 address, got '{0}'")]
    InvalidTargetType(String),
    #[error("Invalid port => (1 -> 65,535), got '{0}'")]
    InvalidPort(String),
}

impl FromStr for ServerArg {
    type Err = ServerArgErrors;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerArg::new(s)
    }
}

impl TryFrom<&str> for ServerArg {
    type Error = ServerArgErrors;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ServerArg::new(value)
    }
}

impl ServerArg {
    /// Parses `@server[:port]`.
    ///
    /// # Errors
    /// Returns [`ServerArgErrors`] if:
    /// - The argument does not start with `@` or is empty
    /// - The host is not an IP address
    /// - The port is not in 1..=65535
    pub fn new(input: &str) -> Result<ServerArg, ServerArgErrors> {
        let server = input.strip_prefix('@').ok_or(ServerArgErrors::MissingAt)?;

        if server.is_empty() {
            return Err(ServerArgErrors::ServerEmpty);
        }

        // bare address, including unbracketed IPv6
        if let Ok(ip) = server.parse::<IpAddr>() {
            return Ok(ServerArg {
                ip,
                target_type: TargetType::of(&ip),
                port: None,
            });
        }

        let (host, port) = if let Some(bracketed) = server.strip_prefix('[') {
            let (host, rest) = bracketed
                .split_once(']')
                .ok_or_else(|| ServerArgErrors::InvalidTargetType(server.to_string()))?;
            let ip = host
                .parse::<Ipv6Addr>()
                .map_err(|_| ServerArgErrors::InvalidTargetType(host.to_string()))?;
            (IpAddr::V6(ip), rest)
        } else {
            let (host, rest) = server
                .find(':')
                .map(|at| server.split_at(at))
                .unwrap_or((server, ""));
            let ip = host
                .parse::<IpAddr>()
                .map_err(|_| ServerArgErrors::InvalidTargetType(host.to_string()))?;
            (ip, rest)
        };

        let port = match port {
            "" => None,
            rest => {
                let digits = rest
                    .strip_prefix(':')
                    .ok_or_else(|| ServerArgErrors::InvalidPort(rest.to_string()))?;
                match digits.parse::<u16>() {
                    Ok(0) | Err(_) => return Err(ServerArgErrors::InvalidPort(digits.to_string())),
                    Ok(port) => Some(port),
                }
            }
        };

        Ok(ServerArg {
            ip: host,
            target_type: TargetType::of(&host),
            port,
        })
    }
}
