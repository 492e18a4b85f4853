#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dnsquery
//!
//! A small, blocking DNS client written in Rust. It builds RFC 1035 query messages, sends them
//! over UDP, decodes the replies and resolves names either with a single recursive request or by
//! walking the delegation chain from the root zone down to an authoritative server.
//!
//! ## Features
//!
//! - **Message codec** - Header, question and resource-record encoding/decoding, including
//!   name compression (RFC 1035 §4.1.4) with loop-safe pointer following.
//! - **Typed RDATA** - A, AAAA, NS, CNAME, MX, SOA and LOC (RFC 1876).
//! - **Recursive resolution** - One request with the Recursion Desired bit set.
//! - **Iterative resolution** - Root → TLD → authoritative walk with glue handling and a bounded
//!   step budget.
//!
//! ## Feature Variants
//!
//! - **Default (`std`) version**
//!   - Blocking UDP transport using `std::net`.
//!   - Recursive and iterative resolver engine.
//!
//! - **Codec-only version** (`default-features = false`)
//!   - Only parsing, encoding/decoding of DNS messages and helpers.
//!   - No transport included, bring your own.
//!
//! - **`serde`**
//!   - Derives `Serialize` for messages, records and resolution results.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "std")]
//! # {
//! use dnsquery::dns::resolver::{QueryMode, RecordType, Resolver, ResolverConfig, UdpTransport};
//!
//! let config = ResolverConfig::from_system("example.com", RecordType::A)
//!     .unwrap()
//!     .with_mode(QueryMode::Iterative);
//!
//! let resolver = Resolver::new(UdpTransport::default());
//! match resolver.resolve(&config) {
//!     Ok(resolution) => {
//!         for record in &resolution.answer {
//!             println!("{:?}", record);
//!         }
//!     }
//!     Err(e) => eprintln!("Resolution failed: {e}"),
//! }
//! # }
//! ```
//!
//! ### Decoding a LOC record
//!
//! ```rust
//! use dnsquery::dns::resolver::LocData;
//!
//! let rdata = [
//!     0x00, 0x33, 0x13, 0x13, 0x88, 0xe2, 0x2d, 0x73, 0x80, 0x77, 0xd1, 0xf2, 0x00, 0x98, 0xa8,
//!     0xdc,
//! ];
//! let loc = LocData::decode(&rdata).unwrap();
//! assert_eq!(loc.latitude().to_string(), "41°24′0.499″ N");
//! assert_eq!(loc.altitude().to_string(), "47.00 m");
//! ```
//!
//! ## Architecture
//!
//! - **`dns::compressor`** - Domain name encoding, compression and decompression.
//! - **`dns::resolver`** - Message model, RDATA decoding, transport and the resolver engine.
//!
//! ## License
//!
//! This project is licensed under the MIT License.

pub mod dns;
