//! Pure-software crypto provider built on the RustCrypto crates.
//!
//! Covers everything the registered suites need: SHA-256, HKDF, AES-CCM with
//! 8- and 16-byte tags, X25519 and P-256 ECDH, Ed25519 and ECDSA P-256
//! signatures, ML-KEM-512/768 encapsulation. HSS-LMS signatures are
//! registered in the suite table but not implemented here; the KEM method
//! that uses those suites never signs.
//!
//! P-256 public keys travel x-coordinate-only. For ECDH the point is
//! reconstructed with even-y parity; the shared-secret x-coordinate is the
//! same for either lift, so the parity choice is immaterial.

use crate::domain::suites::{AeadAlg, HashAlg, KexAlg, SignAlg};
use crate::ports::crypto::{CryptoError, CryptoProvider, Encapsulated, KeyPair};

use ccm::aead::generic_array::GenericArray;
use ccm::aead::{Aead, KeyInit, Payload};
use ccm::consts::{U8, U13, U16};
use ccm::Ccm;
use hkdf::Hkdf;
use kem::{Decapsulate, Encapsulate};
use ml_kem::kem::{DecapsulationKey, EncapsulationKey};
use ml_kem::{EncodedSizeUser, KemCore, MlKem512, MlKem512Params, MlKem768, MlKem768Params};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type AesCcm8 = Ccm<aes::Aes128, U8, U13>;
type AesCcm16 = Ccm<aes::Aes128, U16, U13>;

/// Stateless software provider. Ephemeral randomness comes from the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareCrypto;

fn fixed<const N: usize>(bytes: &[u8], what: &'static str) -> Result<[u8; N], CryptoError> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey(what))
}

fn ccm_seal<C: Aead>(
    cipher: &C,
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    cipher
        .encrypt(
            GenericArray::from_slice(iv),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Internal("aead seal"))
}

fn ccm_open<C: Aead>(
    cipher: &C,
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    cipher
        .decrypt(
            GenericArray::from_slice(iv),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::TagMismatch)
}

/// Lift an x-only P-256 public key back to a point (even-y) and run ECDH.
fn p256_ecdh(secret: &[u8], peer_x: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if peer_x.len() != 32 {
        return Err(CryptoError::InvalidKey("p256 public key length"));
    }
    let sk =
        p256::SecretKey::from_slice(secret).map_err(|_| CryptoError::InvalidKey("p256 scalar"))?;
    let mut sec1 = [0u8; 33];
    sec1[0] = 0x02;
    sec1[1..].copy_from_slice(peer_x);
    let pk = p256::PublicKey::from_sec1_bytes(&sec1)
        .map_err(|_| CryptoError::InvalidKey("p256 point not on curve"))?;
    let shared = p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
    Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
}

fn x25519_ecdh(secret: &[u8], peer: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let sk = x25519_dalek::StaticSecret::from(fixed::<32>(secret, "x25519 secret length")?);
    let pk = x25519_dalek::PublicKey::from(fixed::<32>(peer, "x25519 public key length")?);
    let shared = sk.diffie_hellman(&pk);
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidKey("x25519 low-order point"));
    }
    Ok(Zeroizing::new(shared.as_bytes().to_vec()))
}

macro_rules! mlkem_generate {
    ($kem:ty) => {{
        let (dk, ek) = <$kem>::generate(&mut OsRng);
        Ok(KeyPair {
            public: ek.as_bytes().to_vec(),
            secret: Zeroizing::new(dk.as_bytes().to_vec()),
        })
    }};
}

macro_rules! mlkem_encapsulate {
    ($params:ty, $ek_len:expr, $peer:expr) => {{
        let ek_bytes = fixed::<{ $ek_len }>($peer, "kem encapsulation key length")?;
        let ek = EncapsulationKey::<$params>::from_bytes(&ek_bytes.into());
        let (ct, ss) = ek
            .encapsulate(&mut OsRng)
            .map_err(|_| CryptoError::Internal("kem encapsulation"))?;
        Ok(Encapsulated {
            ciphertext: ct.to_vec(),
            shared_secret: Zeroizing::new(ss.to_vec()),
        })
    }};
}

macro_rules! mlkem_decapsulate {
    ($params:ty, $dk_len:expr, $ct_len:expr, $secret:expr, $ciphertext:expr) => {{
        let dk_bytes = fixed::<{ $dk_len }>($secret, "kem decapsulation key length")?;
        let ct_bytes = fixed::<{ $ct_len }>($ciphertext, "kem ciphertext length")?;
        let dk = DecapsulationKey::<$params>::from_bytes(&dk_bytes.into());
        let ss = dk
            .decapsulate(&ct_bytes.into())
            .map_err(|_| CryptoError::Internal("kem decapsulation"))?;
        Ok(Zeroizing::new(ss.to_vec()))
    }};
}

impl CryptoProvider for SoftwareCrypto {
    fn hash(&self, alg: HashAlg, data: &[u8]) -> Vec<u8> {
        match alg {
            HashAlg::Sha256 => Sha256::digest(data).to_vec(),
        }
    }

    fn hkdf_extract(&self, alg: HashAlg, salt: &[u8], ikm: &[u8]) -> Zeroizing<Vec<u8>> {
        match alg {
            HashAlg::Sha256 => {
                let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
                Zeroizing::new(prk.to_vec())
            }
        }
    }

    fn hkdf_expand(
        &self,
        alg: HashAlg,
        prk: &[u8],
        info: &[u8],
        out_len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match alg {
            HashAlg::Sha256 => {
                let hk = Hkdf::<Sha256>::from_prk(prk)
                    .map_err(|_| CryptoError::InvalidKey("hkdf prk length"))?;
                let mut okm = Zeroizing::new(vec![0u8; out_len]);
                hk.expand(info, &mut okm)
                    .map_err(|_| CryptoError::Internal("hkdf output length"))?;
                Ok(okm)
            }
        }
    }

    fn aead_encrypt(
        &self,
        alg: AeadAlg,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if key.len() != alg.key_len() || iv.len() != alg.iv_len() {
            return Err(CryptoError::InvalidKey("aead key or iv length"));
        }
        match alg {
            AeadAlg::AesCcm1664128 => {
                let cipher = AesCcm8::new(GenericArray::from_slice(key));
                ccm_seal(&cipher, iv, aad, plaintext)
            }
            AeadAlg::AesCcm16128128 => {
                let cipher = AesCcm16::new(GenericArray::from_slice(key));
                ccm_seal(&cipher, iv, aad, plaintext)
            }
        }
    }

    fn aead_decrypt(
        &self,
        alg: AeadAlg,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if key.len() != alg.key_len() || iv.len() != alg.iv_len() {
            return Err(CryptoError::InvalidKey("aead key or iv length"));
        }
        match alg {
            AeadAlg::AesCcm1664128 => {
                let cipher = AesCcm8::new(GenericArray::from_slice(key));
                ccm_open(&cipher, iv, aad, ciphertext)
            }
            AeadAlg::AesCcm16128128 => {
                let cipher = AesCcm16::new(GenericArray::from_slice(key));
                ccm_open(&cipher, iv, aad, ciphertext)
            }
        }
    }

    fn kex_generate(&self, alg: KexAlg) -> Result<KeyPair, CryptoError> {
        match alg {
            KexAlg::X25519 => {
                let sk = x25519_dalek::StaticSecret::random_from_rng(OsRng);
                let pk = x25519_dalek::PublicKey::from(&sk);
                Ok(KeyPair {
                    public: pk.as_bytes().to_vec(),
                    secret: Zeroizing::new(sk.to_bytes().to_vec()),
                })
            }
            KexAlg::P256 => {
                let sk = p256::SecretKey::random(&mut OsRng);
                let point = sk.public_key().to_encoded_point(false);
                let x = point
                    .x()
                    .ok_or(CryptoError::Internal("p256 identity point"))?;
                Ok(KeyPair {
                    public: x.to_vec(),
                    secret: Zeroizing::new(sk.to_bytes().to_vec()),
                })
            }
            KexAlg::MlKem512 => mlkem_generate!(MlKem512),
            KexAlg::MlKem768 => mlkem_generate!(MlKem768),
        }
    }

    fn ecdh(
        &self,
        alg: KexAlg,
        secret: &[u8],
        peer_public: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match alg {
            KexAlg::X25519 => x25519_ecdh(secret, peer_public),
            KexAlg::P256 => p256_ecdh(secret, peer_public),
            KexAlg::MlKem512 | KexAlg::MlKem768 => {
                Err(CryptoError::Unsupported("diffie-hellman on a KEM suite"))
            }
        }
    }

    fn kem_encapsulate(
        &self,
        alg: KexAlg,
        peer_public: &[u8],
    ) -> Result<Encapsulated, CryptoError> {
        match alg {
            KexAlg::MlKem512 => mlkem_encapsulate!(MlKem512Params, 800, peer_public),
            KexAlg::MlKem768 => mlkem_encapsulate!(MlKem768Params, 1184, peer_public),
            KexAlg::P256 | KexAlg::X25519 => {
                Err(CryptoError::Unsupported("encapsulation on an ECDH suite"))
            }
        }
    }

    fn kem_decapsulate(
        &self,
        alg: KexAlg,
        secret: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match alg {
            KexAlg::MlKem512 => mlkem_decapsulate!(MlKem512Params, 1632, 768, secret, ciphertext),
            KexAlg::MlKem768 => mlkem_decapsulate!(MlKem768Params, 2400, 1088, secret, ciphertext),
            KexAlg::P256 | KexAlg::X25519 => {
                Err(CryptoError::Unsupported("decapsulation on an ECDH suite"))
            }
        }
    }

    fn sign(&self, alg: SignAlg, secret: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match alg {
            SignAlg::EdDsa => {
                let sk =
                    ed25519_dalek::SigningKey::from_bytes(&fixed::<32>(secret, "ed25519 secret")?);
                Ok(sk.sign(message).to_bytes().to_vec())
            }
            SignAlg::Es256 => {
                let sk = p256::ecdsa::SigningKey::from_slice(secret)
                    .map_err(|_| CryptoError::InvalidKey("p256 signing key"))?;
                let sig: p256::ecdsa::Signature = sk.sign(message);
                Ok(sig.to_bytes().to_vec())
            }
            SignAlg::HssLms => Err(CryptoError::Unsupported("hss-lms signing")),
        }
    }

    fn verify(
        &self,
        alg: SignAlg,
        public: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        match alg {
            SignAlg::EdDsa => {
                let vk =
                    ed25519_dalek::VerifyingKey::from_bytes(&fixed::<32>(public, "ed25519 key")?)
                        .map_err(|_| CryptoError::InvalidKey("ed25519 public key"))?;
                let sig = ed25519_dalek::Signature::from_bytes(&fixed::<64>(
                    signature,
                    "ed25519 signature length",
                )?);
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::SignatureInvalid)
            }
            SignAlg::Es256 => {
                let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(public)
                    .map_err(|_| CryptoError::InvalidKey("p256 verifying key"))?;
                let sig = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::InvalidKey("p256 signature length"))?;
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::SignatureInvalid)
            }
            SignAlg::HssLms => Err(CryptoError::Unsupported("hss-lms verification")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: SoftwareCrypto = SoftwareCrypto;

    #[test]
    fn aead_roundtrip_and_tag_rejection() {
        for alg in [AeadAlg::AesCcm1664128, AeadAlg::AesCcm16128128] {
            let key = vec![0x11u8; 16];
            let iv = vec![0x22u8; 13];
            let ct = C.aead_encrypt(alg, &key, &iv, b"aad", b"hello").unwrap();
            assert_eq!(ct.len(), 5 + alg.tag_len());
            let pt = C.aead_decrypt(alg, &key, &iv, b"aad", &ct).unwrap();
            assert_eq!(&pt[..], b"hello");

            let mut bad = ct.clone();
            *bad.last_mut().unwrap() ^= 1;
            assert!(matches!(
                C.aead_decrypt(alg, &key, &iv, b"aad", &bad),
                Err(CryptoError::TagMismatch)
            ));
            assert!(matches!(
                C.aead_decrypt(alg, &key, &iv, b"other", &ct),
                Err(CryptoError::TagMismatch)
            ));
        }
    }

    #[test]
    fn empty_plaintext_yields_bare_tag() {
        let alg = AeadAlg::AesCcm1664128;
        let ct = C
            .aead_encrypt(alg, &[1u8; 16], &[2u8; 13], b"ctx", b"")
            .unwrap();
        assert_eq!(ct.len(), alg.tag_len());
        let pt = C.aead_decrypt(alg, &[1u8; 16], &[2u8; 13], b"ctx", &ct).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn ecdh_agreement_both_curves() {
        for alg in [KexAlg::X25519, KexAlg::P256] {
            let a = C.kex_generate(alg).unwrap();
            let b = C.kex_generate(alg).unwrap();
            assert_eq!(a.public.len(), alg.public_len());
            assert_eq!(a.secret.len(), alg.secret_len());
            let ab = C.ecdh(alg, &a.secret, &b.public).unwrap();
            let ba = C.ecdh(alg, &b.secret, &a.public).unwrap();
            assert_eq!(&ab[..], &ba[..]);
            assert_eq!(ab.len(), alg.shared_secret_len());
        }
    }

    #[test]
    fn x25519_rejects_low_order_point() {
        let a = C.kex_generate(KexAlg::X25519).unwrap();
        assert!(C.ecdh(KexAlg::X25519, &a.secret, &[0u8; 32]).is_err());
    }

    #[test]
    fn kem_roundtrip_both_parameter_sets() {
        for (alg, ek_len, ct_len) in [(KexAlg::MlKem512, 800, 768), (KexAlg::MlKem768, 1184, 1088)]
        {
            let kp = C.kex_generate(alg).unwrap();
            assert_eq!(kp.public.len(), ek_len);
            assert_eq!(kp.secret.len(), alg.secret_len());
            let enc = C.kem_encapsulate(alg, &kp.public).unwrap();
            assert_eq!(enc.ciphertext.len(), ct_len);
            let ss = C.kem_decapsulate(alg, &kp.secret, &enc.ciphertext).unwrap();
            assert_eq!(&ss[..], &enc.shared_secret[..]);
            assert_eq!(ss.len(), alg.shared_secret_len());
        }
    }

    #[test]
    fn kem_ops_rejected_on_ecdh_algorithms() {
        assert!(C.kem_encapsulate(KexAlg::P256, &[0u8; 32]).is_err());
        assert!(C.ecdh(KexAlg::MlKem768, &[0u8; 32], &[0u8; 32]).is_err());
    }

    #[test]
    fn sign_verify_ed25519() {
        let sk = [7u8; 32];
        let pk = ed25519_dalek::SigningKey::from_bytes(&sk)
            .verifying_key()
            .to_bytes();
        let sig = C.sign(SignAlg::EdDsa, &sk, b"message").unwrap();
        assert_eq!(sig.len(), 64);
        C.verify(SignAlg::EdDsa, &pk, b"message", &sig).unwrap();
        assert_eq!(
            C.verify(SignAlg::EdDsa, &pk, b"other", &sig),
            Err(CryptoError::SignatureInvalid)
        );
    }

    #[test]
    fn sign_verify_es256() {
        let sk = p256::ecdsa::SigningKey::random(&mut OsRng);
        let pk = sk.verifying_key().to_encoded_point(true);
        let sig = C
            .sign(SignAlg::Es256, &sk.to_bytes(), b"message")
            .unwrap();
        assert_eq!(sig.len(), 64);
        C.verify(SignAlg::Es256, pk.as_bytes(), b"message", &sig)
            .unwrap();
        assert_eq!(
            C.verify(SignAlg::Es256, pk.as_bytes(), b"tampered", &sig),
            Err(CryptoError::SignatureInvalid)
        );
    }

    #[test]
    fn hss_lms_reported_unsupported() {
        assert!(matches!(
            C.sign(SignAlg::HssLms, &[0u8; 32], b"m"),
            Err(CryptoError::Unsupported(_))
        ));
    }

    #[test]
    fn hkdf_known_answer() {
        // RFC 5869 test case 1.
        let ikm = [0x0bu8; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let info: Vec<u8> = (0xf0..=0xf9).collect();
        let prk = C.hkdf_extract(HashAlg::Sha256, &salt, &ikm);
        let okm = C.hkdf_expand(HashAlg::Sha256, &prk, &info, 42).unwrap();
        assert_eq!(
            hex::encode(&okm[..]),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }
}
