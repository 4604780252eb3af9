//! Crate root for `edhoc-engine`.
//!
//! A transport-agnostic implementation of a four-message EDHOC-class
//! authenticated key exchange for constrained devices. The crate is layered
//! hexagonally:
//!
//! * `domain` – cipher-suite table, method registry, credentials, wire message
//!   structs and validation, the shared error taxonomy.
//! * `ports` – the [`ports::crypto::CryptoProvider`] trait every primitive
//!   (hash, HKDF, AEAD, ECDH, KEM, signatures) is reached through.
//! * `adapters` – a pure-software provider built on the RustCrypto stack.
//! * `protocol` – CBOR sequence codec, transcript hashes, the PRK key
//!   schedule, and signature/MAC authentication material.
//! * `application` – the [`application::initiator::Initiator`] and
//!   [`application::responder::Responder`] session state machines.
//!
//! Sessions own all intermediate secrets and zeroize them on completion or
//! abort. Nothing here performs I/O: callers move the returned byte strings
//! over whatever transport they have.
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;
pub mod protocol;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use application::initiator::Initiator;
pub use application::responder::Responder;
pub use domain::errors::EdhocError;
pub use domain::suites::{Method, Suite};
