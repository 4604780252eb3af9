//! Cipher-suite table and method registry.
//!
//! Suites bind every negotiable primitive to a single small integer so the
//! rest of the engine never chooses algorithms independently. All lengths the
//! buffer sizing depends on are derived from here, and [`Suite::resolve`]
//! checks them against the crate capacities once, at resolution time, so
//! later stages can size buffers without re-checking.

use crate::domain::errors::EdhocError;

/// Output length of the suite hash. Every registered suite uses SHA-256.
pub const HASH_LEN: usize = 32;

/// Capacity limits. A field over its limit is rejected on sight.
pub const MAX_CONN_ID_LEN: usize = 8;
pub const MAX_EAD_LEN: usize = 64;
pub const MAX_ID_CRED_LEN: usize = 32;
pub const MAX_CRED_LEN: usize = 256;
pub const MAX_SIG_OR_MAC_LEN: usize = 64;
/// Largest key-material field on the wire: ML-KEM-768 encapsulation key plus
/// one ciphertext, carried together in G_X for the KEM method.
pub const MAX_KEY_FIELD_LEN: usize = 1184 + 1088;
/// Upper bound on one encoded handshake message, all fields at capacity.
pub const MAX_MESSAGE_LEN: usize = MAX_KEY_FIELD_LEN
    + MAX_CONN_ID_LEN
    + MAX_ID_CRED_LEN
    + MAX_SIG_OR_MAC_LEN
    + MAX_EAD_LEN
    + 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadAlg {
    /// AES-CCM, 16-bit length field, 64-bit tag, 128-bit key.
    AesCcm1664128,
    /// AES-CCM, 16-bit length field, 128-bit tag, 128-bit key.
    AesCcm16128128,
}

impl AeadAlg {
    #[must_use]
    pub const fn key_len(self) -> usize {
        16
    }

    #[must_use]
    pub const fn iv_len(self) -> usize {
        13
    }

    #[must_use]
    pub const fn tag_len(self) -> usize {
        match self {
            AeadAlg::AesCcm1664128 => 8,
            AeadAlg::AesCcm16128128 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Sha256,
}

impl HashAlg {
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            HashAlg::Sha256 => 32,
        }
    }
}

/// Key-agreement algorithm. KEMs share this slot with classic ECDH, exactly
/// as they share the G_X/G_Y wire positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KexAlg {
    P256,
    X25519,
    MlKem512,
    MlKem768,
}

impl KexAlg {
    #[must_use]
    pub const fn is_kem(self) -> bool {
        matches!(self, KexAlg::MlKem512 | KexAlg::MlKem768)
    }

    /// Public-key length on the wire: the x-only coordinate for P-256, the
    /// raw point for X25519, the encapsulation key for ML-KEM.
    #[must_use]
    pub const fn public_len(self) -> usize {
        match self {
            KexAlg::P256 | KexAlg::X25519 => 32,
            KexAlg::MlKem512 => 800,
            KexAlg::MlKem768 => 1184,
        }
    }

    #[must_use]
    pub const fn secret_len(self) -> usize {
        match self {
            KexAlg::P256 | KexAlg::X25519 => 32,
            KexAlg::MlKem512 => 1632,
            KexAlg::MlKem768 => 2400,
        }
    }

    /// KEM ciphertext length; zero for classic ECDH.
    #[must_use]
    pub const fn ciphertext_len(self) -> usize {
        match self {
            KexAlg::P256 | KexAlg::X25519 => 0,
            KexAlg::MlKem512 => 768,
            KexAlg::MlKem768 => 1088,
        }
    }

    #[must_use]
    pub const fn shared_secret_len(self) -> usize {
        32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignAlg {
    Es256,
    EdDsa,
    /// Registered for the KEM suites but never exercised by them: the KEM
    /// method authenticates with encapsulation, not signatures.
    HssLms,
}

impl SignAlg {
    /// Signature length, where the engine supports producing one.
    #[must_use]
    pub const fn signature_len(self) -> Option<usize> {
        match self {
            SignAlg::Es256 | SignAlg::EdDsa => Some(64),
            SignAlg::HssLms => None,
        }
    }
}

/// One row of the suite table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suite {
    pub label: u8,
    pub edhoc_aead: AeadAlg,
    pub edhoc_hash: HashAlg,
    /// Static-DH / KEM authenticator tag length for this suite.
    pub mac_len: usize,
    pub edhoc_kex: KexAlg,
    pub edhoc_sign: SignAlg,
    pub app_aead: AeadAlg,
    pub app_hash: HashAlg,
}

const SUITES: [Suite; 6] = [
    Suite {
        label: 0,
        edhoc_aead: AeadAlg::AesCcm1664128,
        edhoc_hash: HashAlg::Sha256,
        mac_len: 8,
        edhoc_kex: KexAlg::X25519,
        edhoc_sign: SignAlg::EdDsa,
        app_aead: AeadAlg::AesCcm1664128,
        app_hash: HashAlg::Sha256,
    },
    Suite {
        label: 1,
        edhoc_aead: AeadAlg::AesCcm16128128,
        edhoc_hash: HashAlg::Sha256,
        mac_len: 16,
        edhoc_kex: KexAlg::X25519,
        edhoc_sign: SignAlg::EdDsa,
        app_aead: AeadAlg::AesCcm1664128,
        app_hash: HashAlg::Sha256,
    },
    Suite {
        label: 2,
        edhoc_aead: AeadAlg::AesCcm1664128,
        edhoc_hash: HashAlg::Sha256,
        mac_len: 8,
        edhoc_kex: KexAlg::P256,
        edhoc_sign: SignAlg::Es256,
        app_aead: AeadAlg::AesCcm1664128,
        app_hash: HashAlg::Sha256,
    },
    Suite {
        label: 3,
        edhoc_aead: AeadAlg::AesCcm16128128,
        edhoc_hash: HashAlg::Sha256,
        mac_len: 16,
        edhoc_kex: KexAlg::P256,
        edhoc_sign: SignAlg::Es256,
        app_aead: AeadAlg::AesCcm1664128,
        app_hash: HashAlg::Sha256,
    },
    Suite {
        label: 4,
        edhoc_aead: AeadAlg::AesCcm1664128,
        edhoc_hash: HashAlg::Sha256,
        mac_len: 8,
        edhoc_kex: KexAlg::MlKem768,
        edhoc_sign: SignAlg::HssLms,
        app_aead: AeadAlg::AesCcm1664128,
        app_hash: HashAlg::Sha256,
    },
    Suite {
        label: 5,
        edhoc_aead: AeadAlg::AesCcm1664128,
        edhoc_hash: HashAlg::Sha256,
        mac_len: 8,
        edhoc_kex: KexAlg::MlKem512,
        edhoc_sign: SignAlg::HssLms,
        app_aead: AeadAlg::AesCcm1664128,
        app_hash: HashAlg::Sha256,
    },
];

impl Suite {
    /// Look up a suite by wire label.
    ///
    /// Besides the lookup this re-checks the row against the crate capacity
    /// constants, so "a suite that cannot fit" fails closed here instead of
    /// overflowing a buffer three modules later.
    pub fn resolve(label: u64) -> Result<Suite, EdhocError> {
        let suite = *SUITES
            .iter()
            .find(|s| u64::from(s.label) == label)
            .ok_or(EdhocError::UnsupportedSuite { label })?;
        if suite.edhoc_hash.output_len() != HASH_LEN {
            return Err(EdhocError::UnsupportedSuite { label });
        }
        let gx = suite.gx_len();
        let gy = suite.gy_len();
        let largest = gx.max(gy);
        if largest > MAX_KEY_FIELD_LEN {
            return Err(EdhocError::BufferTooSmall {
                field: "key material",
                capacity: MAX_KEY_FIELD_LEN,
                actual: largest,
            });
        }
        if suite.mac_len != suite.edhoc_aead.tag_len() {
            return Err(EdhocError::UnsupportedSuite { label });
        }
        Ok(suite)
    }

    #[must_use]
    pub const fn hash_len(&self) -> usize {
        self.edhoc_hash.output_len()
    }

    /// Exact length of the G_X field of message 1. For KEM suites this is the
    /// initiator's ephemeral encapsulation key followed by the ciphertext
    /// encapsulated to the responder's static KEM key.
    #[must_use]
    pub const fn gx_len(&self) -> usize {
        self.edhoc_kex.public_len() + self.edhoc_kex.ciphertext_len()
    }

    /// Exact length of the key-material half of message 2. For KEM suites:
    /// the ephemeral ciphertext followed by the ciphertext encapsulated to
    /// the initiator's static KEM key.
    #[must_use]
    pub const fn gy_len(&self) -> usize {
        if self.edhoc_kex.is_kem() {
            2 * self.edhoc_kex.ciphertext_len()
        } else {
            self.edhoc_kex.public_len()
        }
    }

    /// Length of the sig_or_mac field carried in protected plaintexts, given
    /// the authentication kind of the sending side.
    #[must_use]
    pub fn sig_or_mac_len(&self, kind: AuthKind) -> Option<usize> {
        match kind {
            AuthKind::Signature => self.edhoc_sign.signature_len(),
            AuthKind::StaticDh | AuthKind::Kem => Some(self.mac_len),
        }
    }
}

/// How one side proves possession of its long-term key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Signature,
    StaticDh,
    Kem,
}

/// Method labels: the (initiator, responder) authentication pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    SigSig,
    SigStat,
    StatSig,
    StatStat,
    KemKem,
}

impl Method {
    pub fn resolve(label: u64) -> Result<Method, EdhocError> {
        match label {
            0 => Ok(Method::SigSig),
            1 => Ok(Method::SigStat),
            2 => Ok(Method::StatSig),
            3 => Ok(Method::StatStat),
            4 => Ok(Method::KemKem),
            _ => Err(EdhocError::UnsupportedMethod { label }),
        }
    }

    #[must_use]
    pub const fn label(self) -> u64 {
        match self {
            Method::SigSig => 0,
            Method::SigStat => 1,
            Method::StatSig => 2,
            Method::StatStat => 3,
            Method::KemKem => 4,
        }
    }

    #[must_use]
    pub const fn initiator_auth(self) -> AuthKind {
        match self {
            Method::SigSig | Method::SigStat => AuthKind::Signature,
            Method::StatSig | Method::StatStat => AuthKind::StaticDh,
            Method::KemKem => AuthKind::Kem,
        }
    }

    #[must_use]
    pub const fn responder_auth(self) -> AuthKind {
        match self {
            Method::SigSig | Method::StatSig => AuthKind::Signature,
            Method::SigStat | Method::StatStat => AuthKind::StaticDh,
            Method::KemKem => AuthKind::Kem,
        }
    }

    /// KEM authentication needs a KEM suite and vice versa; classic methods
    /// need a classic key-agreement. Anything else is a negotiation error.
    pub fn check_suite(self, suite: &Suite) -> Result<(), EdhocError> {
        let wants_kem = matches!(self, Method::KemKem);
        if wants_kem != suite.edhoc_kex.is_kem() {
            return Err(EdhocError::UnsupportedMethod {
                label: self.label(),
            });
        }
        let signs = matches!(self.initiator_auth(), AuthKind::Signature)
            || matches!(self.responder_auth(), AuthKind::Signature);
        if signs && suite.edhoc_sign.signature_len().is_none() {
            return Err(EdhocError::UnsupportedMethod {
                label: self.label(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_registered_labels_resolve() {
        for label in 0..6u64 {
            let s = Suite::resolve(label).unwrap();
            assert_eq!(u64::from(s.label), label);
            assert_eq!(s.hash_len(), HASH_LEN);
            assert_eq!(s.mac_len, s.edhoc_aead.tag_len());
        }
    }

    #[test]
    fn unknown_suite_label_is_rejected() {
        assert!(matches!(
            Suite::resolve(6),
            Err(EdhocError::UnsupportedSuite { label: 6 })
        ));
        assert!(matches!(
            Suite::resolve(23),
            Err(EdhocError::UnsupportedSuite { label: 23 })
        ));
    }

    #[test]
    fn kem_suites_size_both_wire_halves() {
        let s = Suite::resolve(4).unwrap();
        assert_eq!(s.gx_len(), 1184 + 1088);
        assert_eq!(s.gy_len(), 2 * 1088);
        let s = Suite::resolve(5).unwrap();
        assert_eq!(s.gx_len(), 800 + 768);
        assert_eq!(s.gy_len(), 2 * 768);
    }

    #[test]
    fn classic_suites_use_bare_public_keys() {
        for label in 0..4u64 {
            let s = Suite::resolve(label).unwrap();
            assert_eq!(s.gx_len(), 32);
            assert_eq!(s.gy_len(), 32);
        }
    }

    #[test]
    fn method_suite_pairing_enforced() {
        let classic = Suite::resolve(2).unwrap();
        let kem = Suite::resolve(4).unwrap();
        assert!(Method::KemKem.check_suite(&kem).is_ok());
        assert!(Method::KemKem.check_suite(&classic).is_err());
        assert!(Method::SigSig.check_suite(&classic).is_ok());
        assert!(Method::SigSig.check_suite(&kem).is_err());
        assert!(Method::StatStat.check_suite(&kem).is_err());
    }

    #[test]
    fn method_labels_round_trip() {
        for label in 0..5u64 {
            assert_eq!(Method::resolve(label).unwrap().label(), label);
        }
        assert!(Method::resolve(5).is_err());
    }

    #[test]
    fn auth_kinds_per_method() {
        assert_eq!(Method::SigStat.initiator_auth(), AuthKind::Signature);
        assert_eq!(Method::SigStat.responder_auth(), AuthKind::StaticDh);
        assert_eq!(Method::StatSig.initiator_auth(), AuthKind::StaticDh);
        assert_eq!(Method::StatSig.responder_auth(), AuthKind::Signature);
        assert_eq!(Method::KemKem.initiator_auth(), AuthKind::Kem);
    }
}
