//! # classic-tls
//!
//! A TLS 1.0–1.2 protocol core: the record and handshake codec, the
//! role-parameterized handshake state machine, and record protection
//! with independent read/write cipher switching.
//!
//! The crate deliberately stops at the protocol: sockets, certificate
//! chain validation and configuration loading belong to the caller.
//! Feed peer bytes in with [`Session::read_tls`], drain bytes for the
//! peer with [`Session::write_tls`], and drive everything with
//! [`Session::process_new_packets`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use classic_tls::{ClientConfig, ClientSession};
//!
//! let config = Arc::new(ClientConfig::new());
//! let mut sess = ClientSession::new(&config);
//! // shuttle bytes between `sess` and the transport...
//! ```

/// Internal protocol encoding/decoding; exposed for integration
/// tests and the curious, but not part of the stable interface.
#[doc(hidden)]
pub mod msgs;

mod cipher;
mod client;
mod client_hs;
mod error;
mod handshake;
mod hash_hs;
mod key;
mod prf;
mod rand;
mod server;
mod server_hs;
mod session;
mod sign;
pub mod suites;
mod verify;
mod x509;

pub use crate::client::{ClientConfig, ClientSession};
pub use crate::error::TlsError;
pub use crate::key::{Certificate, PrivateKey};
pub use crate::msgs::enums::{AlertDescription, CipherSuite, ProtocolVersion};
pub use crate::server::{ServerConfig, ServerSession};
pub use crate::session::{Session, Side, TlsEvent};
pub use crate::sign::RsaSigner;
pub use crate::suites::{SupportedCipherSuite, ALL_CIPHERSUITES};
