//! PRK chain and key derivation.
//!
//! The chain runs PRK_2e -> PRK_3e2m -> PRK_4e3m -> PRK_out -> PRK_exporter.
//! The two middle links mix in a static-DH secret when the corresponding side
//! authenticates by static key agreement, and pass through unchanged
//! otherwise. All Expand calls go through one info structure: a CBOR sequence
//! of (label, context, length), so no two derivations can collide unless
//! label, context and length all match.

use crate::domain::errors::EdhocError;
use crate::domain::suites::Suite;
use crate::ports::crypto::CryptoProvider;
use crate::protocol::transcript::TranscriptHash;
use crate::protocol::wire::encode_info;
use zeroize::Zeroizing;

/// Expand labels. Values are wire-stable: changing one changes every derived
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoLabel {
    K2 = 0,
    Salt3e2m = 1,
    Mac2 = 2,
    K3 = 3,
    Iv3 = 4,
    Salt4e3m = 5,
    Mac3 = 6,
    PrkOut = 7,
    K4 = 8,
    Iv4 = 9,
    PrkExporter = 10,
    Iv2 = 11,
}

impl InfoLabel {
    #[must_use]
    pub const fn value(self) -> u64 {
        self as u64
    }
}

/// A pseudorandom key in the chain. Wraps its bytes in `Zeroizing` so links
/// dropped as the handshake advances do not linger.
#[derive(Clone)]
pub struct Prk(Zeroizing<Vec<u8>>);

impl Prk {
    #[must_use]
    pub fn new(bytes: Zeroizing<Vec<u8>>) -> Self {
        Prk(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for Prk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Prk(<redacted>)")
    }
}

/// HKDF-Expand from a chain PRK with the shared info structure.
pub fn expand<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    prk: &Prk,
    label: InfoLabel,
    context: &[u8],
    out_len: usize,
) -> Result<Zeroizing<Vec<u8>>, EdhocError> {
    let info = encode_info(label.value(), context, out_len)?;
    Ok(crypto.hkdf_expand(suite.edhoc_hash, prk.as_bytes(), &info, out_len)?)
}

/// PRK_2e = Extract(salt = TH_2, ikm = ephemeral shared secret).
pub fn prk_2e<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    th_2: &TranscriptHash,
    shared_secret: &[u8],
) -> Prk {
    Prk::new(crypto.hkdf_extract(suite.edhoc_hash, th_2.as_bytes(), shared_secret))
}

/// Advance a middle link of the chain.
///
/// With `auth_secret = Some(s)` (static-DH authentication on the relevant
/// side): salt = Expand(prev, salt_label, TH, hash_len), next =
/// Extract(salt, s). With `None` the previous PRK passes through.
pub fn advance<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    prev: &Prk,
    salt_label: InfoLabel,
    th: &TranscriptHash,
    auth_secret: Option<&[u8]>,
) -> Result<Prk, EdhocError> {
    match auth_secret {
        Some(secret) => {
            let salt = expand(crypto, suite, prev, salt_label, th.as_bytes(), suite.hash_len())?;
            Ok(Prk::new(crypto.hkdf_extract(suite.edhoc_hash, &salt, secret)))
        }
        None => Ok(prev.clone()),
    }
}

/// PRK used by KEM authentication: Extract(salt = TH_n, ikm = KEM shared
/// secret encapsulated to the authenticating side's static key). Kept out of
/// the main chain; only the MAC derives from it.
pub fn kem_auth_prk<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    th: &TranscriptHash,
    kem_secret: &[u8],
) -> Prk {
    Prk::new(crypto.hkdf_extract(suite.edhoc_hash, th.as_bytes(), kem_secret))
}

/// PRK_out = Expand(PRK_4e3m, PrkOut, TH_4, hash_len).
pub fn prk_out<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    prk_4e3m: &Prk,
    th_4: &TranscriptHash,
) -> Result<Prk, EdhocError> {
    expand(crypto, suite, prk_4e3m, InfoLabel::PrkOut, th_4.as_bytes(), suite.hash_len())
        .map(Prk::new)
}

/// PRK_exporter = Expand(PRK_out, PrkExporter, "", hash_len).
pub fn prk_exporter<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    prk_out: &Prk,
) -> Result<Prk, EdhocError> {
    expand(crypto, suite, prk_out, InfoLabel::PrkExporter, b"", suite.hash_len()).map(Prk::new)
}

/// Application key export from PRK_exporter. Labels here are an application
/// namespace, unrelated to [`InfoLabel`].
pub fn export<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    prk_exporter: &Prk,
    label: u64,
    context: &[u8],
    out_len: usize,
) -> Result<Zeroizing<Vec<u8>>, EdhocError> {
    let info = encode_info(label, context, out_len)?;
    Ok(crypto.hkdf_expand(suite.edhoc_hash, prk_exporter.as_bytes(), &info, out_len)?)
}

/// AEAD key and IV for one protected message.
pub struct AeadMaterial {
    pub key: Zeroizing<Vec<u8>>,
    pub iv: Zeroizing<Vec<u8>>,
}

pub fn message_keys<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    prk: &Prk,
    th: &TranscriptHash,
    key_label: InfoLabel,
    iv_label: InfoLabel,
) -> Result<AeadMaterial, EdhocError> {
    let key = expand(crypto, suite, prk, key_label, th.as_bytes(), suite.edhoc_aead.key_len())?;
    let iv = expand(crypto, suite, prk, iv_label, th.as_bytes(), suite.edhoc_aead.iv_len())?;
    Ok(AeadMaterial { key, iv })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::software::SoftwareCrypto;
    use crate::domain::suites::HASH_LEN;

    fn setup() -> (SoftwareCrypto, Suite, TranscriptHash) {
        (
            SoftwareCrypto,
            Suite::resolve(0).unwrap(),
            TranscriptHash([0x42; HASH_LEN]),
        )
    }

    #[test]
    fn labels_are_distinct_and_stable() {
        let values = [
            InfoLabel::K2.value(),
            InfoLabel::Salt3e2m.value(),
            InfoLabel::Mac2.value(),
            InfoLabel::K3.value(),
            InfoLabel::Iv3.value(),
            InfoLabel::Salt4e3m.value(),
            InfoLabel::Mac3.value(),
            InfoLabel::PrkOut.value(),
            InfoLabel::K4.value(),
            InfoLabel::Iv4.value(),
            InfoLabel::PrkExporter.value(),
            InfoLabel::Iv2.value(),
        ];
        assert_eq!(values, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn passthrough_preserves_the_link() {
        let (c, s, th) = setup();
        let prk = prk_2e(&c, &s, &th, &[9u8; 32]);
        let next = advance(&c, &s, &prk, InfoLabel::Salt3e2m, &th, None).unwrap();
        assert_eq!(prk.as_bytes(), next.as_bytes());
    }

    #[test]
    fn mixing_changes_the_link() {
        let (c, s, th) = setup();
        let prk = prk_2e(&c, &s, &th, &[9u8; 32]);
        let mixed = advance(&c, &s, &prk, InfoLabel::Salt3e2m, &th, Some(&[7u8; 32])).unwrap();
        assert_ne!(prk.as_bytes(), mixed.as_bytes());
        // Same inputs, same link.
        let again = advance(&c, &s, &prk, InfoLabel::Salt3e2m, &th, Some(&[7u8; 32])).unwrap();
        assert_eq!(mixed.as_bytes(), again.as_bytes());
        // Different static secret, different link.
        let other = advance(&c, &s, &prk, InfoLabel::Salt3e2m, &th, Some(&[8u8; 32])).unwrap();
        assert_ne!(mixed.as_bytes(), other.as_bytes());
    }

    #[test]
    fn expand_separates_labels_and_contexts() {
        let (c, s, th) = setup();
        let prk = prk_2e(&c, &s, &th, &[9u8; 32]);
        let k2 = expand(&c, &s, &prk, InfoLabel::K2, th.as_bytes(), 16).unwrap();
        let k3 = expand(&c, &s, &prk, InfoLabel::K3, th.as_bytes(), 16).unwrap();
        assert_ne!(&k2[..], &k3[..]);
        let other_th = TranscriptHash([0x43; HASH_LEN]);
        let k2b = expand(&c, &s, &prk, InfoLabel::K2, other_th.as_bytes(), 16).unwrap();
        assert_ne!(&k2[..], &k2b[..]);
    }

    #[test]
    fn exporter_chain_end_to_end() {
        let (c, s, th) = setup();
        let prk_4e3m = prk_2e(&c, &s, &th, &[9u8; 32]);
        let out = prk_out(&c, &s, &prk_4e3m, &th).unwrap();
        let exp = prk_exporter(&c, &s, &out).unwrap();
        let secret = export(&c, &s, &exp, 0, b"", 16).unwrap();
        let salt = export(&c, &s, &exp, 1, b"", 8).unwrap();
        assert_eq!(secret.len(), 16);
        assert_eq!(salt.len(), 8);
        assert_ne!(&secret[..8], &salt[..]);
        // Export is repeatable: the same label and length give the same key.
        let secret2 = export(&c, &s, &exp, 0, b"", 16).unwrap();
        assert_eq!(&secret[..], &secret2[..]);
    }

    #[test]
    fn message_keys_have_suite_lengths() {
        let (c, s, th) = setup();
        let prk = prk_2e(&c, &s, &th, &[9u8; 32]);
        let m = message_keys(&c, &s, &prk, &th, InfoLabel::K2, InfoLabel::Iv2).unwrap();
        assert_eq!(m.key.len(), 16);
        assert_eq!(m.iv.len(), 13);
    }
}
