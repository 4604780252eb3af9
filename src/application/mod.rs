//! Application layer: the per-role handshake session state machines.
//!
//! A session owns one role's view of a single handshake: configuration,
//! ephemeral keys, the PRK chain, and the state that gates which message is
//! acceptable next. Any processing error aborts the session and zeroizes its
//! secrets; the caller sees the error, the peer sees only silence or a
//! uniform failure from the transport.

pub mod initiator;
pub mod responder;

use crate::domain::creds::{Credential, LocalCredential};
use crate::domain::errors::EdhocError;
use crate::domain::suites::{Method, Suite};
use crate::ports::crypto::{CryptoError, CryptoProvider};
use crate::protocol::keyschedule::AeadMaterial;
use crate::protocol::transcript::TranscriptHash;
use zeroize::Zeroizing;

/// Role-independent session configuration.
pub struct SessionConfig {
    pub method: Method,
    /// Connection identifier this side will advertise.
    pub c_local: crate::domain::creds::ConnId,
    pub local: LocalCredential,
    pub peer: Credential,
}

/// Seal a protected plaintext with the transcript hash as associated data.
pub(crate) fn seal_protected<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    keys: &AeadMaterial,
    th: &TranscriptHash,
    plaintext: &[u8],
) -> Result<Vec<u8>, EdhocError> {
    Ok(crypto.aead_encrypt(suite.edhoc_aead, &keys.key, &keys.iv, th.as_bytes(), plaintext)?)
}

/// Open a protected ciphertext. A tag mismatch is an authentication failure,
/// not a primitive failure: the peer either holds the wrong keys or tampered.
pub(crate) fn open_protected<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    keys: &AeadMaterial,
    th: &TranscriptHash,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, EdhocError> {
    crypto
        .aead_decrypt(suite.edhoc_aead, &keys.key, &keys.iv, th.as_bytes(), ciphertext)
        .map_err(|e| match e {
            CryptoError::TagMismatch => EdhocError::AuthenticationFailed,
            other => EdhocError::CryptoPrimitiveFailure(other),
        })
}
