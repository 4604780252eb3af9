//! Transcript hashes TH_2, TH_3, TH_4.
//!
//! Each hash commits to everything exchanged so far, chained through the
//! previous hash rather than by re-hashing the whole flight. Inputs are the
//! exact bytes sent on the wire: message 1 whole, the ciphertexts as
//! transmitted (not their plaintexts), and the responder credential by its
//! own hash.

use crate::domain::creds::ConnId;
use crate::domain::suites::{HASH_LEN, Suite};
use crate::ports::crypto::CryptoProvider;

/// A finalized transcript hash. Not secret, but every derived key and every
/// authenticator binds to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptHash(pub [u8; HASH_LEN]);

impl TranscriptHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn digest<P: CryptoProvider>(crypto: &P, suite: &Suite, input: &[u8]) -> TranscriptHash {
        let out = crypto.hash(suite.edhoc_hash, input);
        let mut th = [0u8; HASH_LEN];
        th.copy_from_slice(&out);
        TranscriptHash(th)
    }
}

/// TH_2 = H( G_Y || C_R || H(message_1) ).
pub fn th2<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    g_y: &[u8],
    c_r: &ConnId,
    message_1: &[u8],
) -> TranscriptHash {
    let h1 = crypto.hash(suite.edhoc_hash, message_1);
    let mut input = Vec::with_capacity(g_y.len() + c_r.as_bytes().len() + h1.len());
    input.extend_from_slice(g_y);
    input.extend_from_slice(c_r.as_bytes());
    input.extend_from_slice(&h1);
    TranscriptHash::digest(crypto, suite, &input)
}

/// TH_3 = H( TH_2 || CIPHERTEXT_2 || H(CRED_R) ).
pub fn th3<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    th_2: &TranscriptHash,
    ciphertext_2: &[u8],
    cred_r: &[u8],
) -> TranscriptHash {
    let hc = crypto.hash(suite.edhoc_hash, cred_r);
    let mut input = Vec::with_capacity(HASH_LEN + ciphertext_2.len() + hc.len());
    input.extend_from_slice(th_2.as_bytes());
    input.extend_from_slice(ciphertext_2);
    input.extend_from_slice(&hc);
    TranscriptHash::digest(crypto, suite, &input)
}

/// TH_4 = H( TH_3 || CIPHERTEXT_3 ).
pub fn th4<P: CryptoProvider>(
    crypto: &P,
    suite: &Suite,
    th_3: &TranscriptHash,
    ciphertext_3: &[u8],
) -> TranscriptHash {
    let mut input = Vec::with_capacity(HASH_LEN + ciphertext_3.len());
    input.extend_from_slice(th_3.as_bytes());
    input.extend_from_slice(ciphertext_3);
    TranscriptHash::digest(crypto, suite, &input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::software::SoftwareCrypto;
    use crate::domain::suites::Suite;

    fn setup() -> (SoftwareCrypto, Suite) {
        (SoftwareCrypto, Suite::resolve(0).unwrap())
    }

    #[test]
    fn th2_changes_with_every_input() {
        let (c, s) = setup();
        let c_r = ConnId::new(&[0x0A]).unwrap();
        let base = th2(&c, &s, &[1u8; 32], &c_r, b"message-1");
        assert_ne!(base, th2(&c, &s, &[2u8; 32], &c_r, b"message-1"));
        assert_ne!(
            base,
            th2(&c, &s, &[1u8; 32], &ConnId::new(&[0x0B]).unwrap(), b"message-1")
        );
        assert_ne!(base, th2(&c, &s, &[1u8; 32], &c_r, b"message-2"));
    }

    #[test]
    fn th2_is_deterministic() {
        let (c, s) = setup();
        let c_r = ConnId::new(&[0x0A]).unwrap();
        assert_eq!(
            th2(&c, &s, &[1u8; 32], &c_r, b"m1"),
            th2(&c, &s, &[1u8; 32], &c_r, b"m1")
        );
    }

    #[test]
    fn chain_binds_previous_hash() {
        let (c, s) = setup();
        let c_r = ConnId::new(&[0x0A]).unwrap();
        let t2a = th2(&c, &s, &[1u8; 32], &c_r, b"m1");
        let t2b = th2(&c, &s, &[1u8; 32], &c_r, b"m1'");
        assert_ne!(
            th3(&c, &s, &t2a, b"ct2", b"cred"),
            th3(&c, &s, &t2b, b"ct2", b"cred")
        );
        let t3 = th3(&c, &s, &t2a, b"ct2", b"cred");
        assert_ne!(th4(&c, &s, &t3, b"ct3"), th4(&c, &s, &t3, b"ct3'"));
    }

    #[test]
    fn th3_commits_to_responder_credential() {
        let (c, s) = setup();
        let c_r = ConnId::new(&[0x0A]).unwrap();
        let t2 = th2(&c, &s, &[1u8; 32], &c_r, b"m1");
        assert_ne!(
            th3(&c, &s, &t2, b"ct2", b"cred-r"),
            th3(&c, &s, &t2, b"ct2", b"cred-x")
        );
    }
}
