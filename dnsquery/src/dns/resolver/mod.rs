//! # dnsquery DNS Resolver
//!
//! A lightweight, blocking DNS resolver built in pure Rust, following
//! [RFC 1035](https://datatracker.ietf.org/doc/html/rfc1035).
//!
//! ## Features
//!
//! - **Recursive resolution**: a single query with the Recursion Desired bit set, sent to the
//!   configured server or the first system nameserver.
//! - **Iterative resolution**: the delegation chain is walked from the root zone down to an
//!   authoritative server, following glue records and resolving glueless delegations through
//!   the local resolver.
//! - Typed RDATA for `A`, `AAAA`, `NS`, `CNAME`, `MX`, `SOA` and `LOC`.
//!
//! ### Available Features
//!
//! | Feature       | Description                                                              |
//! |---------------|--------------------------------------------------------------------------|
//! | `std`         | Enables the UDP transport, the configuration and the resolver engine.    |
//! | `serde`       | Derives `Serialize` for messages and resolution results.                 |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "std")]
//! # {
//! use dnsquery::dns::resolver::{QueryMode, RecordType, Resolver, ResolverConfig};
//!
//! let config = ResolverConfig::new("systemadmin.es", RecordType::Loc)
//!     .with_nameservers(vec!["192.168.1.1".parse().unwrap()])
//!     .with_server("198.41.0.4".parse().unwrap())
//!     .with_mode(QueryMode::Iterative);
//!
//! let resolution = Resolver::udp(&config).resolve(&config).unwrap();
//! for step in &resolution.steps {
//!     println!("{} {} @{}", step.name, step.record_type, step.server);
//! }
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Errors are reported through `thiserror` types:
//!
//! - `ResolverErrors`: top-level resolver errors from the public API.
//! - `UdpErrors`: network failures such as timeouts.
//! - `DecodeQueryErrors`: message parsing failures.
//! - `CompressorErrors`: names that cannot be encoded.
//!
//! This allows ergonomic usage with the `?` operator.

pub mod rdata;
pub mod standard;

pub use self::rdata::{Altitude, Coordinate, LocData, Precision, RData, SoaData};
pub use self::standard::{
    DecodeQueryErrors, DnsHeaderFlags, DnsMessage, HeaderSection, MAX_SECTION_RECORDS,
    OpCodeOptions, QuestionSection, RecordType, ResourceRecord, ResponseCode, build_query,
    generate_id, parse_response,
};

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        pub mod config;
        pub mod iterative;
        pub mod transporter;

        #[cfg(test)]
        pub(crate) mod scripted;

        pub use self::config::{DNS_PORT, IdPolicy, QueryMode, ResolverConfig};
        pub use self::iterative::{IterationStep, Phase, ResolverState};
        pub use self::transporter::{Transport, UdpErrors, UdpTransport};

        use crate::dns::compressor::CompressorErrors;
        use std::net::SocketAddr;
        use thiserror::Error;
        use tracing::{debug, info};

        /// Resolution engine over a [`Transport`].
        #[derive(Debug, Clone)]
        pub struct Resolver<T: Transport> {
            transport: T,
        }

        impl Resolver<UdpTransport> {
            /// A resolver over UDP using the timeout and retry budget of `config`.
            pub fn udp(config: &ResolverConfig) -> Self {
                Self::new(UdpTransport::new(config.timeout, config.retries))
            }
        }

        impl<T: Transport> Resolver<T> {
            pub fn new(transport: T) -> Self {
                Self { transport }
            }

            pub fn transport(&self) -> &T {
                &self.transport
            }

            /// Resolves `config.name` with the mode selected in `config`.
            ///
            /// # Errors
            /// Returns [`ResolverErrors`] if no server is known, a message cannot be exchanged or
            /// decoded, a server answers with a non-zero RCODE, or the iterative walk gets stuck.
            pub fn resolve(&self, config: &ResolverConfig) -> Result<Resolution, ResolverErrors> {
                info!(
                    name = %config.name,
                    record_type = %config.record_type,
                    mode = ?config.mode,
                    "resolving"
                );
                match config.mode {
                    QueryMode::Recursive => self.resolve_recursive(config),
                    QueryMode::Iterative => iterative::resolve(self, config),
                }
            }

            /// One query with RD set to the configured server, sections returned as received.
            pub fn resolve_recursive(
                &self,
                config: &ResolverConfig,
            ) -> Result<Resolution, ResolverErrors> {
                let server = config.default_server()?;
                let reply = self.query(config, server, &config.name, config.record_type, true)?;

                Ok(Resolution::from_reply(reply, ResolutionStatus::Done, server, Vec::new()))
            }

            /// Sends one query and returns the decoded reply with its glue reduced to A records.
            pub(crate) fn query(
                &self,
                config: &ResolverConfig,
                server: SocketAddr,
                name: &str,
                record_type: RecordType,
                recursion_desired: bool,
            ) -> Result<DnsMessage, ResolverErrors> {
                let id = config.id_policy.next_id();
                let query = build_query(id, name, record_type, recursion_desired)?;
                let bytes = self.transport.exchange(&query, server)?;
                let mut reply = parse_response(&bytes)?;

                let rcode = reply.response_code();
                debug!(
                    %server,
                    name,
                    %record_type,
                    %rcode,
                    answer = reply.answer.len(),
                    authority = reply.authority.len(),
                    additional = reply.additional.len(),
                    "exchange complete"
                );
                if rcode != ResponseCode::NoError {
                    return Err(ResolverErrors::ServerError(rcode));
                }

                reply.retain_ipv4_glue();
                Ok(reply)
            }
        }

        /// Whether the resolution produced an answer.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub enum ResolutionStatus {
            /// The last query for the target returned a non-empty answer section.
            Done,
            /// The walk ended without an answer; the sections are those of the last reply.
            Exhausted,
        }

        /// Result of [`Resolver::resolve`].
        #[derive(Debug, Clone, PartialEq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub struct Resolution {
            pub answer: Vec<ResourceRecord>,
            pub authority: Vec<ResourceRecord>,
            pub additional: Vec<ResourceRecord>,
            pub status: ResolutionStatus,
            /// Server that sent the final reply.
            pub server: SocketAddr,
            /// Every exchange of an iterative resolution, in order. Empty for recursive mode.
            pub steps: Vec<IterationStep>,
        }

        impl Resolution {
            fn from_reply(
                reply: DnsMessage,
                status: ResolutionStatus,
                server: SocketAddr,
                steps: Vec<IterationStep>,
            ) -> Self {
                Self {
                    answer: reply.answer,
                    authority: reply.authority,
                    additional: reply.additional,
                    status,
                    server,
                    steps,
                }
            }
        }

        /// Represents high-level resolver errors exposed to users.
        #[derive(Debug, Error)]
        pub enum ResolverErrors {
            #[error("Could not decode the DNS response: {0}")]
            Decode(#[from] DecodeQueryErrors),
            #[error("Could not encode the DNS query: {0}")]
            Compressor(#[from] CompressorErrors),
            #[error(transparent)]
            Udp(#[from] UdpErrors),
            #[error("The name server answered {0}")]
            ServerError(ResponseCode),
            #[error("Iterative resolution of {name} failed after {steps} step(s): {reason}")]
            IterativeResolutionFailed {
                name: String,
                steps: usize,
                reason: &'static str,
            },
            #[error("No DNS server given and no nameserver found in /etc/resolv.conf")]
            NoNameserver,
        }
    }
}
