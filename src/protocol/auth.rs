//! Authentication material: the sig_or_mac field of the protected
//! plaintexts.
//!
//! Three shapes, selected by the method:
//! * signature over a domain-separated payload binding identity, credential
//!   and transcript hash;
//! * static-DH MAC derived from the chain PRK that already mixed the
//!   sender's static key agreement;
//! * KEM MAC derived from a PRK extracted from the transcript hash and the
//!   KEM secret encapsulated to the sender's static key.
//!
//! MAC comparison is constant-time. Verification failure of any shape is
//! reported as [`EdhocError::AuthenticationFailed`] with no further detail.

use crate::domain::creds::ConnId;
use crate::domain::errors::EdhocError;
use crate::domain::suites::{AuthKind, Suite};
use crate::ports::crypto::{CryptoError, CryptoProvider};
use crate::protocol::keyschedule::{self, InfoLabel, Prk};
use crate::protocol::transcript::TranscriptHash;
use crate::protocol::wire::{encode_mac_context, encode_signature_payload};
use subtle::ConstantTimeEq;

/// What the local side proves possession with.
pub enum AuthSecret<'a> {
    /// Long-term signing key for the suite's signature algorithm.
    SigningKey(&'a [u8]),
    /// PRK the MAC derives from: the chain PRK for static-DH, the
    /// transcript-bound KEM PRK for the KEM method.
    MacPrk(&'a Prk),
}

/// What the peer's authenticator is checked against.
pub enum AuthVerifier<'a> {
    PublicKey(&'a [u8]),
    MacPrk(&'a Prk),
}

/// Per-message binding: everything the authenticator must commit to.
pub struct AuthBinding<'a> {
    pub label: InfoLabel,
    pub c_r: Option<&'a ConnId>,
    pub id_cred: &'a [u8],
    pub cred: &'a [u8],
    pub th: &'a TranscriptHash,
    pub ead: Option<&'a [u8]>,
}

/// The MAC is the AEAD tag over an empty plaintext with the context as
/// associated data. Key and IV expand from the PRK under the message's MAC
/// label with the transcript hash as the info context; their info structures
/// differ by output length. The suite invariant mac_len == tag_len makes the
/// tag the right size.
fn derive_mac<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    prk: &Prk,
    binding: &AuthBinding<'_>,
) -> Result<Vec<u8>, EdhocError> {
    let context = encode_mac_context(
        binding.c_r,
        binding.id_cred,
        binding.th.as_bytes(),
        binding.cred,
        binding.ead,
    )?;
    let aead = suite.edhoc_aead;
    let th = binding.th.as_bytes();
    let key = keyschedule::expand(crypto, suite, prk, binding.label, th, aead.key_len())?;
    let iv = keyschedule::expand(crypto, suite, prk, binding.label, th, aead.iv_len())?;
    Ok(crypto.aead_encrypt(aead, &key, &iv, &context, b"")?)
}

/// Produce the sig_or_mac field for an outgoing protected plaintext.
pub fn compute_sig_or_mac<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    secret: AuthSecret<'_>,
    binding: &AuthBinding<'_>,
) -> Result<Vec<u8>, EdhocError> {
    match secret {
        AuthSecret::SigningKey(key) => {
            let payload = encode_signature_payload(
                binding.id_cred,
                binding.cred,
                binding.th.as_bytes(),
                binding.ead,
            )?;
            Ok(crypto.sign(suite.edhoc_sign, key, &payload)?)
        }
        AuthSecret::MacPrk(prk) => derive_mac(crypto, suite, prk, binding),
    }
}

/// Check the sig_or_mac field of an inbound protected plaintext.
pub fn verify_sig_or_mac<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    verifier: AuthVerifier<'_>,
    binding: &AuthBinding<'_>,
    sig_or_mac: &[u8],
) -> Result<(), EdhocError> {
    // The field length is fixed by suite and kind; a wrong size can never
    // verify and gets the same uniform error.
    let expected_len = match &verifier {
        AuthVerifier::PublicKey(_) => suite.sig_or_mac_len(AuthKind::Signature),
        AuthVerifier::MacPrk(_) => suite.sig_or_mac_len(AuthKind::StaticDh),
    };
    if let Some(len) = expected_len
        && sig_or_mac.len() != len
    {
        return Err(EdhocError::AuthenticationFailed);
    }
    match verifier {
        AuthVerifier::PublicKey(key) => {
            let payload = encode_signature_payload(
                binding.id_cred,
                binding.cred,
                binding.th.as_bytes(),
                binding.ead,
            )?;
            match crypto.verify(suite.edhoc_sign, key, &payload, sig_or_mac) {
                Ok(()) => Ok(()),
                Err(CryptoError::SignatureInvalid | CryptoError::InvalidKey(_)) => {
                    Err(EdhocError::AuthenticationFailed)
                }
                Err(e) => Err(EdhocError::CryptoPrimitiveFailure(e)),
            }
        }
        AuthVerifier::MacPrk(prk) => {
            let expected = derive_mac(crypto, suite, prk, binding)?;
            if bool::from(expected.as_slice().ct_eq(sig_or_mac)) {
                Ok(())
            } else {
                Err(EdhocError::AuthenticationFailed)
            }
        }
    }
}
