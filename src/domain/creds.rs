//! Connection identifiers and authentication credentials.
//!
//! Credentials are provisioned out of band: the engine never fetches or
//! parses certificate chains, it is handed the credential bytes, the short
//! identifier used to reference them, and the bare public key. Long-term
//! private keys live in [`LocalCredential`] and are zeroized on drop.

use crate::domain::errors::EdhocError;
use crate::domain::suites::{MAX_CONN_ID_LEN, MAX_CRED_LEN, MAX_ID_CRED_LEN};
use zeroize::Zeroizing;

/// A connection identifier: 1..=8 opaque bytes chosen by each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnId(Vec<u8>);

impl ConnId {
    pub fn new(bytes: &[u8]) -> Result<Self, EdhocError> {
        if bytes.is_empty() {
            return Err(EdhocError::MalformedMessage {
                field: "connection identifier empty",
            });
        }
        if bytes.len() > MAX_CONN_ID_LEN {
            return Err(EdhocError::BufferTooSmall {
                field: "connection identifier",
                capacity: MAX_CONN_ID_LEN,
                actual: bytes.len(),
            });
        }
        Ok(ConnId(bytes.to_vec()))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The public half of an authentication credential.
///
/// `public_key` is interpreted per method and suite: a signature verification
/// key for signature authentication, a static key-agreement public key for
/// static-DH, or a KEM encapsulation key for the KEM method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    id_cred: Vec<u8>,
    cred: Vec<u8>,
    public_key: Vec<u8>,
}

impl Credential {
    pub fn new(id_cred: &[u8], cred: &[u8], public_key: &[u8]) -> Result<Self, EdhocError> {
        if id_cred.is_empty() || id_cred.len() > MAX_ID_CRED_LEN {
            return Err(EdhocError::BufferTooSmall {
                field: "credential identifier",
                capacity: MAX_ID_CRED_LEN,
                actual: id_cred.len(),
            });
        }
        if cred.is_empty() || cred.len() > MAX_CRED_LEN {
            return Err(EdhocError::BufferTooSmall {
                field: "credential",
                capacity: MAX_CRED_LEN,
                actual: cred.len(),
            });
        }
        Ok(Credential {
            id_cred: id_cred.to_vec(),
            cred: cred.to_vec(),
            public_key: public_key.to_vec(),
        })
    }

    #[must_use]
    pub fn id_cred(&self) -> &[u8] {
        &self.id_cred
    }

    #[must_use]
    pub fn cred(&self) -> &[u8] {
        &self.cred
    }

    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

/// A credential together with its private key.
pub struct LocalCredential {
    credential: Credential,
    secret: Zeroizing<Vec<u8>>,
}

impl LocalCredential {
    #[must_use]
    pub fn new(credential: Credential, secret: Vec<u8>) -> Self {
        LocalCredential {
            credential,
            secret: Zeroizing::new(secret),
        }
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl core::fmt::Debug for LocalCredential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalCredential")
            .field("credential", &self.credential)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conn_id_bounds() {
        assert!(ConnId::new(&[]).is_err());
        assert!(ConnId::new(&[0x17]).is_ok());
        assert!(ConnId::new(&[0u8; 8]).is_ok());
        assert!(matches!(
            ConnId::new(&[0u8; 9]),
            Err(EdhocError::BufferTooSmall { capacity: 8, .. })
        ));
    }

    #[test]
    fn credential_capacity_enforced() {
        assert!(Credential::new(&[1], &[2; 16], &[3; 32]).is_ok());
        assert!(Credential::new(&[1; 33], &[2; 16], &[3; 32]).is_err());
        assert!(Credential::new(&[1], &[2; 257], &[3; 32]).is_err());
        assert!(Credential::new(&[], &[2; 16], &[3; 32]).is_err());
    }

    #[test]
    fn local_credential_debug_redacts_secret() {
        let cred = Credential::new(&[1], &[2; 4], &[3; 32]).unwrap();
        let local = LocalCredential::new(cred, vec![9u8; 32]);
        let dbg = format!("{local:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("9, 9, 9"));
    }
}
