//! Crypto provider port.
//!
//! Every primitive the handshake touches goes through [`CryptoProvider`], so
//! the protocol and application layers stay free of algorithm crates and a
//! deployment can swap in a hardware-backed provider. The trait is
//! algorithm-parameterised rather than suite-parameterised: callers pass the
//! algorithm identifiers they pulled from the resolved [`Suite`]
//! (`crate::domain::suites::Suite`), and a provider that does not implement
//! one returns [`CryptoError::Unsupported`].

use crate::domain::suites::{AeadAlg, HashAlg, KexAlg, SignAlg};
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors a provider can report. `TagMismatch` and `SignatureInvalid` are the
/// only variants that mean "the peer's data did not verify"; everything else
/// is a local/environmental failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("aead tag mismatch")]
    TagMismatch,
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("invalid key material: {0}")]
    InvalidKey(&'static str),
    #[error("algorithm not supported by this provider: {0}")]
    Unsupported(&'static str),
    #[error("internal provider failure: {0}")]
    Internal(&'static str),
}

/// A freshly generated key-agreement keypair. For KEM algorithms `public` is
/// the encapsulation key and `secret` the decapsulation key.
pub struct KeyPair {
    pub public: Vec<u8>,
    pub secret: Zeroizing<Vec<u8>>,
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Result of a KEM encapsulation.
pub struct Encapsulated {
    pub ciphertext: Vec<u8>,
    pub shared_secret: Zeroizing<Vec<u8>>,
}

pub trait CryptoProvider {
    fn hash(&self, alg: HashAlg, data: &[u8]) -> Vec<u8>;

    /// HKDF-Extract. Infallible for the registered hash algorithms.
    fn hkdf_extract(&self, alg: HashAlg, salt: &[u8], ikm: &[u8]) -> Zeroizing<Vec<u8>>;

    /// HKDF-Expand to `out_len` bytes.
    fn hkdf_expand(
        &self,
        alg: HashAlg,
        prk: &[u8],
        info: &[u8],
        out_len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// AEAD seal; returns ciphertext with the tag appended.
    fn aead_encrypt(
        &self,
        alg: AeadAlg,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// AEAD open; `ciphertext` includes the trailing tag.
    fn aead_decrypt(
        &self,
        alg: AeadAlg,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Generate an ephemeral keypair (or KEM keypair) for `alg`.
    fn kex_generate(&self, alg: KexAlg) -> Result<KeyPair, CryptoError>;

    /// Classic Diffie-Hellman shared secret. For P-256 both the peer key and
    /// the result are x-coordinate-only.
    fn ecdh(
        &self,
        alg: KexAlg,
        secret: &[u8],
        peer_public: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Encapsulate to a KEM public key.
    fn kem_encapsulate(&self, alg: KexAlg, peer_public: &[u8])
    -> Result<Encapsulated, CryptoError>;

    /// Decapsulate a KEM ciphertext with our decapsulation key.
    fn kem_decapsulate(
        &self,
        alg: KexAlg,
        secret: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    fn sign(&self, alg: SignAlg, secret: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn verify(
        &self,
        alg: SignAlg,
        public: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError>;
}
