//! Test fixtures: credential generation for every method/suite pairing and a
//! scriptable crypto provider. Compiled only for tests or with the
//! `test-support` feature; never part of a production build.

use crate::adapters::software::SoftwareCrypto;
use crate::application::SessionConfig;
use crate::domain::creds::{ConnId, Credential, LocalCredential};
use crate::domain::suites::{AuthKind, KexAlg, Method, SignAlg, Suite};
use crate::ports::crypto::{CryptoError, CryptoProvider, Encapsulated, KeyPair};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::VecDeque;
use zeroize::Zeroizing;

/// Matching session configurations for one initiator/responder pair.
pub struct Fixture {
    pub initiator: SessionConfig,
    pub responder: SessionConfig,
}

fn signature_identity(alg: SignAlg) -> (Vec<u8>, Vec<u8>) {
    match alg {
        SignAlg::EdDsa => {
            let sk = ed25519_dalek::SigningKey::generate(&mut OsRng);
            (
                sk.to_bytes().to_vec(),
                sk.verifying_key().to_bytes().to_vec(),
            )
        }
        SignAlg::Es256 => {
            let sk = p256::ecdsa::SigningKey::random(&mut OsRng);
            let pk = sk.verifying_key().to_encoded_point(true);
            (sk.to_bytes().to_vec(), pk.as_bytes().to_vec())
        }
        SignAlg::HssLms => panic!("no fixture for hss-lms"),
    }
}

fn identity_for(kind: AuthKind, suite: &Suite) -> (Vec<u8>, Vec<u8>) {
    match kind {
        AuthKind::Signature => signature_identity(suite.edhoc_sign),
        AuthKind::StaticDh | AuthKind::Kem => {
            let kp = SoftwareCrypto
                .kex_generate(suite.edhoc_kex)
                .expect("keygen");
            (kp.secret.to_vec(), kp.public)
        }
    }
}

fn credential(tag: &[u8], kid: &[u8], public_key: &[u8]) -> Credential {
    // Keep CRED small regardless of key size by binding the key via its hash.
    let mut cred = tag.to_vec();
    cred.extend_from_slice(kid);
    cred.extend_from_slice(&Sha256::digest(public_key));
    Credential::new(kid, &cred, public_key).expect("fixture credential")
}

/// Build fresh credentials and configs for `method` on `suite_label`.
pub fn fixture(method: Method, suite_label: u64) -> Fixture {
    let suite = Suite::resolve(suite_label).expect("fixture suite");
    method.check_suite(&suite).expect("fixture pairing");

    let (i_secret, i_public) = identity_for(method.initiator_auth(), &suite);
    let (r_secret, r_public) = identity_for(method.responder_auth(), &suite);

    let cred_i = credential(b"cred-i", &[0x07], &i_public);
    let cred_r = credential(b"cred-r", &[0x18], &r_public);

    Fixture {
        initiator: SessionConfig {
            method,
            c_local: ConnId::new(&[0x0E]).expect("c_i"),
            local: LocalCredential::new(cred_i.clone(), i_secret),
            peer: cred_r.clone(),
        },
        responder: SessionConfig {
            method,
            c_local: ConnId::new(&[0x20]).expect("c_r"),
            local: LocalCredential::new(cred_r, r_secret),
            peer: cred_i,
        },
    }
}

/// A provider that delegates to [`SoftwareCrypto`] but can be scripted:
/// queued keypairs replace fresh ephemeral generation, and a forced signature
/// replaces the next real one. Interior mutability keeps it usable behind the
/// `&self` provider interface.
#[derive(Default)]
pub struct ScriptedCrypto {
    inner: SoftwareCrypto,
    kex_queue: RefCell<VecDeque<KeyPair>>,
    forced_signature: RefCell<Option<Vec<u8>>>,
}

impl ScriptedCrypto {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a keypair to be returned by the next `kex_generate` call.
    pub fn push_keypair(&self, public: Vec<u8>, secret: Vec<u8>) {
        self.kex_queue.borrow_mut().push_back(KeyPair {
            public,
            secret: Zeroizing::new(secret),
        });
    }

    /// Force the next `sign` call to return `signature` instead of signing.
    pub fn force_signature(&self, signature: Vec<u8>) {
        *self.forced_signature.borrow_mut() = Some(signature);
    }
}

impl CryptoProvider for ScriptedCrypto {
    fn hash(&self, alg: crate::domain::suites::HashAlg, data: &[u8]) -> Vec<u8> {
        self.inner.hash(alg, data)
    }

    fn hkdf_extract(
        &self,
        alg: crate::domain::suites::HashAlg,
        salt: &[u8],
        ikm: &[u8],
    ) -> Zeroizing<Vec<u8>> {
        self.inner.hkdf_extract(alg, salt, ikm)
    }

    fn hkdf_expand(
        &self,
        alg: crate::domain::suites::HashAlg,
        prk: &[u8],
        info: &[u8],
        out_len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.inner.hkdf_expand(alg, prk, info, out_len)
    }

    fn aead_encrypt(
        &self,
        alg: crate::domain::suites::AeadAlg,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.inner.aead_encrypt(alg, key, iv, aad, plaintext)
    }

    fn aead_decrypt(
        &self,
        alg: crate::domain::suites::AeadAlg,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.inner.aead_decrypt(alg, key, iv, aad, ciphertext)
    }

    fn kex_generate(&self, alg: KexAlg) -> Result<KeyPair, CryptoError> {
        if let Some(kp) = self.kex_queue.borrow_mut().pop_front() {
            return Ok(kp);
        }
        self.inner.kex_generate(alg)
    }

    fn ecdh(
        &self,
        alg: KexAlg,
        secret: &[u8],
        peer_public: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.inner.ecdh(alg, secret, peer_public)
    }

    fn kem_encapsulate(
        &self,
        alg: KexAlg,
        peer_public: &[u8],
    ) -> Result<Encapsulated, CryptoError> {
        self.inner.kem_encapsulate(alg, peer_public)
    }

    fn kem_decapsulate(
        &self,
        alg: KexAlg,
        secret: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.inner.kem_decapsulate(alg, secret, ciphertext)
    }

    fn sign(
        &self,
        alg: SignAlg,
        secret: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if let Some(sig) = self.forced_signature.borrow_mut().take() {
            return Ok(sig);
        }
        self.inner.sign(alg, secret, message)
    }

    fn verify(
        &self,
        alg: SignAlg,
        public: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        self.inner.verify(alg, public, message, signature)
    }
}
