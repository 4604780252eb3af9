//! Handshake message structs and structural validation.
//!
//! These are the decoded forms of the four messages and of the protected
//! plaintexts carried inside messages 2 and 3. Field lengths depend on the
//! negotiated suite, so validation takes the resolved [`Suite`]; the codec in
//! `protocol::wire` calls it on both encode and decode.

use crate::domain::creds::ConnId;
use crate::domain::errors::EdhocError;
use crate::domain::suites::{MAX_EAD_LEN, MAX_ID_CRED_LEN, MAX_SIG_OR_MAC_LEN, Method, Suite};

fn check_ead(ead: Option<&Vec<u8>>) -> Result<(), EdhocError> {
    if let Some(e) = ead
        && e.len() > MAX_EAD_LEN
    {
        return Err(EdhocError::BufferTooSmall {
            field: "external authorization data",
            capacity: MAX_EAD_LEN,
            actual: e.len(),
        });
    }
    Ok(())
}

/// Message 1: method, suite selection, initiator key material, C_I, ?EAD_1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message1 {
    pub method: Method,
    pub suite_label: u8,
    pub g_x: Vec<u8>,
    pub c_i: ConnId,
    pub ead_1: Option<Vec<u8>>,
}

impl Message1 {
    pub fn validate(&self, suite: &Suite) -> Result<(), EdhocError> {
        if u64::from(self.suite_label) != u64::from(suite.label) {
            return Err(EdhocError::MalformedMessage {
                field: "suite label mismatch",
            });
        }
        self.method.check_suite(suite)?;
        if self.g_x.len() != suite.gx_len() {
            return Err(EdhocError::MalformedMessage {
                field: "G_X length",
            });
        }
        check_ead(self.ead_1.as_ref())
    }
}

/// Message 2: responder key material and C_R in the clear, plus the protected
/// CIPHERTEXT_2 carrying the responder's identity and authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message2 {
    pub g_y: Vec<u8>,
    pub ciphertext_2: Vec<u8>,
    pub c_r: ConnId,
}

impl Message2 {
    pub fn validate(&self, suite: &Suite) -> Result<(), EdhocError> {
        if self.g_y.len() != suite.gy_len() {
            return Err(EdhocError::MalformedMessage {
                field: "G_Y length",
            });
        }
        if self.ciphertext_2.len() < suite.edhoc_aead.tag_len() {
            return Err(EdhocError::MalformedMessage {
                field: "CIPHERTEXT_2 shorter than tag",
            });
        }
        Ok(())
    }
}

/// Message 3: a single protected ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message3 {
    pub ciphertext_3: Vec<u8>,
}

impl Message3 {
    pub fn validate(&self, suite: &Suite) -> Result<(), EdhocError> {
        if self.ciphertext_3.len() < suite.edhoc_aead.tag_len() {
            return Err(EdhocError::MalformedMessage {
                field: "CIPHERTEXT_3 shorter than tag",
            });
        }
        Ok(())
    }
}

/// Optional message 4: key-confirmation from the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message4 {
    pub ciphertext_4: Vec<u8>,
}

impl Message4 {
    pub fn validate(&self, suite: &Suite) -> Result<(), EdhocError> {
        if self.ciphertext_4.len() < suite.edhoc_aead.tag_len() {
            return Err(EdhocError::MalformedMessage {
                field: "CIPHERTEXT_4 shorter than tag",
            });
        }
        Ok(())
    }
}

/// Protected plaintext of messages 2 and 3: identity reference, signature or
/// MAC, optional external data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPlaintext {
    pub id_cred: Vec<u8>,
    pub sig_or_mac: Vec<u8>,
    pub ead: Option<Vec<u8>>,
}

impl ProtectedPlaintext {
    pub fn validate(&self) -> Result<(), EdhocError> {
        if self.id_cred.is_empty() || self.id_cred.len() > MAX_ID_CRED_LEN {
            return Err(EdhocError::BufferTooSmall {
                field: "credential identifier",
                capacity: MAX_ID_CRED_LEN,
                actual: self.id_cred.len(),
            });
        }
        if self.sig_or_mac.is_empty() || self.sig_or_mac.len() > MAX_SIG_OR_MAC_LEN {
            return Err(EdhocError::BufferTooSmall {
                field: "sig_or_mac",
                capacity: MAX_SIG_OR_MAC_LEN,
                actual: self.sig_or_mac.len(),
            });
        }
        check_ead(self.ead.as_ref())
    }
}

/// Protected plaintext of message 4: optional external data only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plaintext4 {
    pub ead: Option<Vec<u8>>,
}

impl Plaintext4 {
    pub fn validate(&self) -> Result<(), EdhocError> {
        check_ead(self.ead.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite2() -> Suite {
        Suite::resolve(2).unwrap()
    }

    #[test]
    fn message_1_field_lengths() {
        let msg = Message1 {
            method: Method::SigSig,
            suite_label: 2,
            g_x: vec![0u8; 32],
            c_i: ConnId::new(&[1]).unwrap(),
            ead_1: None,
        };
        msg.validate(&suite2()).unwrap();

        let short = Message1 {
            g_x: vec![0u8; 31],
            ..msg.clone()
        };
        assert!(short.validate(&suite2()).is_err());

        let fat_ead = Message1 {
            ead_1: Some(vec![0u8; MAX_EAD_LEN + 1]),
            ..msg
        };
        assert!(matches!(
            fat_ead.validate(&suite2()),
            Err(EdhocError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn message_1_rejects_method_suite_mismatch() {
        let msg = Message1 {
            method: Method::KemKem,
            suite_label: 2,
            g_x: vec![0u8; 32],
            c_i: ConnId::new(&[1]).unwrap(),
            ead_1: None,
        };
        assert!(matches!(
            msg.validate(&suite2()),
            Err(EdhocError::UnsupportedMethod { label: 4 })
        ));
    }

    #[test]
    fn ciphertexts_must_cover_a_tag() {
        let suite = suite2(); // 8-byte tag
        let m2 = Message2 {
            g_y: vec![0u8; 32],
            ciphertext_2: vec![0u8; 7],
            c_r: ConnId::new(&[2]).unwrap(),
        };
        assert!(m2.validate(&suite).is_err());
        let m3 = Message3 {
            ciphertext_3: vec![0u8; 8],
        };
        m3.validate(&suite).unwrap();
    }

    #[test]
    fn plaintext_capacities() {
        let pt = ProtectedPlaintext {
            id_cred: vec![1],
            sig_or_mac: vec![0u8; 64],
            ead: None,
        };
        pt.validate().unwrap();
        let fat = ProtectedPlaintext {
            sig_or_mac: vec![0u8; 65],
            ..pt
        };
        assert!(fat.validate().is_err());
    }
}
