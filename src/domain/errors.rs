//! Shared error taxonomy for the handshake engine.
//!
//! Every fallible operation in the crate resolves to [`EdhocError`]. The
//! variants deliberately carry only coarse detail: a peer observing error
//! behaviour must not be able to distinguish "decryption failed" from
//! "signature invalid" from "credential unknown" — all of those surface as
//! [`EdhocError::AuthenticationFailed`]. Finer-grained cause information is
//! emitted through `tracing` at debug level for the local operator only.

use crate::ports::crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdhocError {
    /// Cipher suite label is unknown, or known but not enabled.
    #[error("unsupported cipher suite {label}")]
    UnsupportedSuite { label: u64 },

    /// Method label is unknown, not enabled, or incompatible with the suite.
    #[error("unsupported method {label}")]
    UnsupportedMethod { label: u64 },

    /// Inbound bytes do not parse as the expected message, or a parsed field
    /// violates a structural rule (wrong length, illegal value, trailing
    /// bytes).
    #[error("malformed message: {field}")]
    MalformedMessage { field: &'static str },

    /// A field exceeds the engine's fixed capacity for it.
    #[error("{field} length {actual} exceeds capacity {capacity}")]
    BufferTooSmall {
        field: &'static str,
        capacity: usize,
        actual: usize,
    },

    /// A cryptographic primitive reported failure (bad point, bad key
    /// encoding, internal provider error).
    #[error("crypto primitive failure")]
    CryptoPrimitiveFailure(#[from] CryptoError),

    /// Peer authentication failed. Covers AEAD tag mismatch on a protected
    /// message, unparseable protected plaintext, unknown peer credential and
    /// signature/MAC verification failure, indistinguishably.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A syntactically valid message arrived in a session state that does not
    /// accept it.
    #[error("message not acceptable in current state")]
    OutOfStateMessage,

    /// The session was aborted (explicitly or by a prior error); no further
    /// messages or exports are possible.
    #[error("session aborted")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable_and_coarse() {
        let e = EdhocError::UnsupportedSuite { label: 9 };
        assert_eq!(e.to_string(), "unsupported cipher suite 9");
        let e = EdhocError::BufferTooSmall {
            field: "ead",
            capacity: 64,
            actual: 90,
        };
        assert_eq!(e.to_string(), "ead length 90 exceeds capacity 64");
        // Authentication failures must not leak which check tripped.
        assert_eq!(
            EdhocError::AuthenticationFailed.to_string(),
            "authentication failed"
        );
    }
}
