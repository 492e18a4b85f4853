//! # dnsquery DNS Library
//!
//! The library is split into features that allow you to choose the level of functionality:
//!
//! ## Features
//!
//! - **Codec only** (`default-features = false`)
//!   - Pure DNS message parsing, encoding, and decoding.
//!   - No built-in transport; you can plug in your own.
//!
//! - **Standard (`std`)**
//!   - Blocking resolver using `std::net` (UDP).
//!   - Recursive and iterative resolution for A, MX and LOC queries.
//!
//! ## Modules
//!
//! - `compressor`: Domain name encoding, compression and decompression.
//! - `resolver`: Message model, RDATA decoding and (with `std`) the resolver engine.
//! - `resolver::transporter`: The `Transport` seam, the UDP implementation and system nameserver
//!   discovery.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "std")]
//! # {
//! use dnsquery::dns::resolver::{RecordType, Resolver, ResolverConfig, UdpTransport};
//!
//! let config = ResolverConfig::new("example.com", RecordType::Mx)
//!     .with_server("1.1.1.1".parse().unwrap());
//!
//! match Resolver::new(UdpTransport::default()).resolve(&config) {
//!     Ok(response) => {
//!         for answer in response.answer {
//!             println!("MX: {:?}", answer.rdata);
//!         }
//!     }
//!     Err(e) => eprintln!("DNS resolution failed: {e}"),
//! }
//! # }
//! ```

pub mod compressor;

pub mod resolver;
