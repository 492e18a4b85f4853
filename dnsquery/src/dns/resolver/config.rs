//! Resolver configuration.
//!
//! Everything a resolution needs is carried by [`ResolverConfig`] and handed to the engine
//! explicitly; the library keeps no global settings.
use crate::dns::resolver::ResolverErrors;
use crate::dns::resolver::standard::{RecordType, generate_id};
use crate::dns::resolver::transporter::system_nameservers;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DNS_PORT: u16 = 53;
pub const DEFAULT_MAX_STEPS: usize = 32;

/// How the name is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum QueryMode {
    /// One query with the Recursion Desired bit set.
    #[default]
    Recursive,
    /// Walk the delegation chain starting from the root zone.
    Iterative,
}

/// How query IDs are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// The low 16 bits of the process ID, identical for every query of the process.
    #[default]
    ProcessId,
    /// A fresh random ID per query.
    Random,
}

impl IdPolicy {
    pub fn next_id(&self) -> u16 {
        match self {
            IdPolicy::ProcessId => std::process::id() as u16,
            IdPolicy::Random => generate_id(),
        }
    }
}

/// Parameters of one resolution.
///
/// # Example
///
/// ```rust
/// use dnsquery::dns::resolver::{QueryMode, RecordType, ResolverConfig};
/// use std::time::Duration;
///
/// let config = ResolverConfig::new("example.com", RecordType::Loc)
///     .with_server("192.0.2.53".parse().unwrap())
///     .with_port(5353)
///     .with_mode(QueryMode::Iterative)
///     .with_timeout(Duration::from_millis(500));
///
/// assert_eq!(config.default_server().unwrap().to_string(), "192.0.2.53:5353");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub name: String,
    pub record_type: RecordType,
    pub mode: QueryMode,
    /// Explicit server; when absent the first system nameserver is used.
    pub server: Option<IpAddr>,
    /// Port used for the configured (or system) server.
    pub port: u16,
    /// System nameservers, in resolv.conf order.
    pub nameservers: Vec<IpAddr>,
    pub timeout: Duration,
    pub retries: u32,
    /// Upper bound on the number of exchanges of an iterative resolution.
    pub max_steps: usize,
    pub id_policy: IdPolicy,
}

impl ResolverConfig {
    pub fn new(name: &str, record_type: RecordType) -> Self {
        Self {
            name: name.to_string(),
            record_type,
            mode: QueryMode::default(),
            server: None,
            port: DNS_PORT,
            nameservers: Vec::new(),
            timeout: Duration::from_secs(3),
            retries: 1,
            max_steps: DEFAULT_MAX_STEPS,
            id_policy: IdPolicy::default(),
        }
    }

    /// Same as [`ResolverConfig::new`] with the nameservers of `/etc/resolv.conf`.
    pub fn from_system(name: &str, record_type: RecordType) -> io::Result<Self> {
        Ok(Self::new(name, record_type).with_nameservers(system_nameservers()?))
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_server(mut self, server: IpAddr) -> Self {
        self.server = Some(server);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_nameservers(mut self, nameservers: Vec<IpAddr>) -> Self {
        self.nameservers = nameservers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_id_policy(mut self, id_policy: IdPolicy) -> Self {
        self.id_policy = id_policy;
        self
    }

    /// The server the first query goes to: the explicit server, else the first system
    /// nameserver, on the configured port.
    pub fn default_server(&self) -> Result<SocketAddr, ResolverErrors> {
        self.server
            .or_else(|| self.nameservers.first().copied())
            .map(|ip| SocketAddr::new(ip, self.port))
            .ok_or(ResolverErrors::NoNameserver)
    }

    /// The first system nameserver on port 53, used for glue lookups.
    pub fn local_resolver(&self) -> Result<SocketAddr, ResolverErrors> {
        self.nameservers
            .first()
            .map(|ip| SocketAddr::new(*ip, DNS_PORT))
            .ok_or(ResolverErrors::NoNameserver)
    }
}
