//! Responder session: verifies messages 1 and 3, produces message 2 and the
//! optional message 4.

use crate::application::{SessionConfig, open_protected, seal_protected};
use crate::domain::creds::{ConnId, Credential, LocalCredential};
use crate::domain::errors::EdhocError;
use crate::domain::messages::{Message2, Message4, Plaintext4, ProtectedPlaintext};
use crate::domain::suites::{AuthKind, Method, Suite};
use crate::ports::crypto::CryptoProvider;
use crate::protocol::auth::{
    AuthBinding, AuthSecret, AuthVerifier, compute_sig_or_mac, verify_sig_or_mac,
};
use crate::protocol::keyschedule::{self, InfoLabel, Prk};
use crate::protocol::transcript::{self, TranscriptHash};
use crate::protocol::wire;
use tracing::debug;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    Idle,
    RecvMsg1,
    SentMsg2,
    Completed,
    Aborted,
}

pub struct Responder<P: CryptoProvider> {
    crypto: P,
    method: Method,
    c_r: ConnId,
    local: LocalCredential,
    peer: Credential,
    enable_message_4: bool,
    state: ResponderState,

    /// Resolved from message 1; the responder accepts what it supports.
    suite: Option<Suite>,
    message_1: Option<Vec<u8>>,
    g_x: Option<Vec<u8>>,
    c_i: Option<ConnId>,
    /// KEM secret the initiator encapsulated to our static key; keys our
    /// MAC_2.
    kem_auth_r: Option<Zeroizing<Vec<u8>>>,
    /// KEM secret we encapsulated to the initiator's static key in message 2;
    /// verifies the initiator's MAC_3.
    kem_auth_i: Option<Zeroizing<Vec<u8>>>,
    th_3: Option<TranscriptHash>,
    th_4: Option<TranscriptHash>,
    prk_3e2m: Option<Prk>,
    prk_4e3m: Option<Prk>,
    prk_exporter: Option<Prk>,
}

impl<P: CryptoProvider> Responder<P> {
    /// Create an idle session. `enable_message_4` keeps the key-confirmation
    /// material alive after completion so [`Responder::write_message_4`] can
    /// run.
    pub fn new(crypto: P, config: SessionConfig, enable_message_4: bool) -> Self {
        Responder {
            crypto,
            method: config.method,
            c_r: config.c_local,
            local: config.local,
            peer: config.peer,
            enable_message_4,
            state: ResponderState::Idle,
            suite: None,
            message_1: None,
            g_x: None,
            c_i: None,
            kem_auth_r: None,
            kem_auth_i: None,
            th_3: None,
            th_4: None,
            prk_3e2m: None,
            prk_4e3m: None,
            prk_exporter: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ResponderState {
        self.state
    }

    pub fn abort(&mut self) {
        self.clear();
        self.state = ResponderState::Aborted;
        debug!("responder session aborted");
    }

    /// Process message 1: negotiation checks and key-material intake.
    /// Returns EAD_1 if present.
    pub fn read_message_1(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, EdhocError> {
        self.guard(ResponderState::Idle)?;
        match self.process_message_1(bytes) {
            Ok(ead) => {
                self.state = ResponderState::RecvMsg1;
                debug!("accepted message 1");
                Ok(ead)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Produce message 2 carrying our key material and authenticator.
    pub fn write_message_2(&mut self, ead_2: Option<&[u8]>) -> Result<Vec<u8>, EdhocError> {
        self.guard(ResponderState::RecvMsg1)?;
        match self.build_message_2(ead_2) {
            Ok(out) => {
                self.state = ResponderState::SentMsg2;
                debug!("sent message 2");
                Ok(out)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Process message 3, verifying the initiator, and finish the key
    /// schedule. Returns EAD_3.
    pub fn read_message_3(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, EdhocError> {
        self.guard(ResponderState::SentMsg2)?;
        match self.process_message_3(bytes) {
            Ok(ead) => {
                self.state = ResponderState::Completed;
                debug!("initiator authenticated, session completed");
                Ok(ead)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Produce the optional key-confirmation message 4. Valid once, after
    /// completion, and only if enabled at construction.
    pub fn write_message_4(&mut self, ead_4: Option<&[u8]>) -> Result<Vec<u8>, EdhocError> {
        if self.state == ResponderState::Aborted {
            return Err(EdhocError::Aborted);
        }
        if self.state != ResponderState::Completed || self.th_4.is_none() {
            return Err(self.fail(EdhocError::OutOfStateMessage));
        }
        match self.build_message_4(ead_4) {
            Ok(out) => {
                // One message 4 per session.
                self.th_4 = None;
                self.prk_4e3m = None;
                debug!("sent message 4");
                Ok(out)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Export application key material. Only valid once completed.
    pub fn export(
        &self,
        label: u64,
        context: &[u8],
        out_len: usize,
    ) -> Result<Zeroizing<Vec<u8>>, EdhocError> {
        match (self.state, &self.suite, &self.prk_exporter) {
            (ResponderState::Completed, Some(suite), Some(prk)) => {
                keyschedule::export(&self.crypto, suite, prk, label, context, out_len)
            }
            (ResponderState::Aborted, ..) => Err(EdhocError::Aborted),
            _ => Err(EdhocError::OutOfStateMessage),
        }
    }

    fn guard(&mut self, expected: ResponderState) -> Result<(), EdhocError> {
        if self.state == expected {
            return Ok(());
        }
        if self.state == ResponderState::Aborted {
            return Err(EdhocError::Aborted);
        }
        Err(self.fail(EdhocError::OutOfStateMessage))
    }

    fn fail(&mut self, err: EdhocError) -> EdhocError {
        debug!(error = %err, "responder handshake failed");
        self.clear();
        self.state = ResponderState::Aborted;
        err
    }

    fn clear(&mut self) {
        self.suite = None;
        self.message_1 = None;
        self.g_x = None;
        self.c_i = None;
        self.kem_auth_r = None;
        self.kem_auth_i = None;
        self.th_3 = None;
        self.th_4 = None;
        self.prk_3e2m = None;
        self.prk_4e3m = None;
        self.prk_exporter = None;
    }

    fn process_message_1(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, EdhocError> {
        let (msg, suite) = wire::decode_message_1(bytes)?;
        if msg.method != self.method {
            return Err(EdhocError::UnsupportedMethod {
                label: msg.method.label(),
            });
        }
        let kex = suite.edhoc_kex;
        if kex.is_kem() {
            let (_, ct_auth_r) = msg.g_x.split_at(kex.public_len());
            let ss = self.crypto.kem_decapsulate(kex, self.local.secret(), ct_auth_r)?;
            self.kem_auth_r = Some(ss);
        }
        self.suite = Some(suite);
        self.message_1 = Some(bytes.to_vec());
        self.g_x = Some(msg.g_x);
        self.c_i = Some(msg.c_i);
        Ok(msg.ead_1)
    }

    fn build_message_2(&mut self, ead_2: Option<&[u8]>) -> Result<Vec<u8>, EdhocError> {
        let suite = self.suite.ok_or(EdhocError::OutOfStateMessage)?;
        let kex = suite.edhoc_kex;
        let g_x = self.g_x.clone().ok_or(EdhocError::OutOfStateMessage)?;
        let message_1 = self.message_1.clone().ok_or(EdhocError::OutOfStateMessage)?;
        let c_i = self.c_i.clone().ok_or(EdhocError::OutOfStateMessage)?;
        if c_i == self.c_r {
            return Err(EdhocError::MalformedMessage {
                field: "connection identifier collision",
            });
        }

        // Key material half of message 2, plus all shared secrets we derive
        // from it.
        let (g_y, shared, g_iy) = if kex.is_kem() {
            let (ek_e, _) = g_x.split_at(kex.public_len());
            let enc_e = self.crypto.kem_encapsulate(kex, ek_e)?;
            let enc_auth_i = self.crypto.kem_encapsulate(kex, self.peer.public_key())?;
            let mut g_y = Vec::with_capacity(suite.gy_len());
            g_y.extend_from_slice(&enc_e.ciphertext);
            g_y.extend_from_slice(&enc_auth_i.ciphertext);
            self.kem_auth_i = Some(enc_auth_i.shared_secret);
            (g_y, enc_e.shared_secret, None)
        } else {
            let eph = self.crypto.kex_generate(kex)?;
            let shared = self.crypto.ecdh(kex, &eph.secret, &g_x)?;
            let g_iy = match self.method.initiator_auth() {
                AuthKind::StaticDh => {
                    Some(self.crypto.ecdh(kex, &eph.secret, self.peer.public_key())?)
                }
                AuthKind::Signature | AuthKind::Kem => None,
            };
            (eph.public.clone(), shared, g_iy)
        };

        let th_2 = transcript::th2(&self.crypto, &suite, &g_y, &self.c_r, &message_1);
        let prk_2e = keyschedule::prk_2e(&self.crypto, &suite, &th_2, &shared);
        drop(shared);

        let responder_kind = self.method.responder_auth();
        let g_rx = match responder_kind {
            AuthKind::StaticDh => Some(self.crypto.ecdh(kex, self.local.secret(), &g_x)?),
            AuthKind::Signature | AuthKind::Kem => None,
        };
        let prk_3e2m = keyschedule::advance(
            &self.crypto,
            &suite,
            &prk_2e,
            InfoLabel::Salt3e2m,
            &th_2,
            g_rx.as_deref().map(|v| &**v),
        )?;

        let binding = AuthBinding {
            label: InfoLabel::Mac2,
            c_r: Some(&self.c_r),
            id_cred: self.local.credential().id_cred(),
            cred: self.local.credential().cred(),
            th: &th_2,
            ead: ead_2,
        };
        let kem_prk;
        let secret = match responder_kind {
            AuthKind::Signature => AuthSecret::SigningKey(self.local.secret()),
            AuthKind::StaticDh => AuthSecret::MacPrk(&prk_3e2m),
            AuthKind::Kem => {
                let ss = self.kem_auth_r.as_ref().ok_or(EdhocError::OutOfStateMessage)?;
                kem_prk = keyschedule::kem_auth_prk(&self.crypto, &suite, &th_2, ss);
                AuthSecret::MacPrk(&kem_prk)
            }
        };
        let sig_or_mac = compute_sig_or_mac(&self.crypto, &suite, secret, &binding)?;

        let pt = ProtectedPlaintext {
            id_cred: self.local.credential().id_cred().to_vec(),
            sig_or_mac,
            ead: ead_2.map(<[u8]>::to_vec),
        };
        let plaintext = wire::encode_plaintext(&pt)?;
        let keys_2 = keyschedule::message_keys(
            &self.crypto,
            &suite,
            &prk_2e,
            &th_2,
            InfoLabel::K2,
            InfoLabel::Iv2,
        )?;
        let ciphertext_2 = seal_protected(&self.crypto, &suite, &keys_2, &th_2, &plaintext)?;

        let msg = Message2 {
            g_y,
            ciphertext_2: ciphertext_2.clone(),
            c_r: self.c_r.clone(),
        };
        let bytes = wire::encode_message_2(&msg, &suite)?;

        let th_3 = transcript::th3(
            &self.crypto,
            &suite,
            &th_2,
            &ciphertext_2,
            self.local.credential().cred(),
        );
        let prk_4e3m = keyschedule::advance(
            &self.crypto,
            &suite,
            &prk_3e2m,
            InfoLabel::Salt4e3m,
            &th_3,
            g_iy.as_deref().map(|v| &**v),
        )?;

        self.th_3 = Some(th_3);
        self.prk_3e2m = Some(prk_3e2m);
        self.prk_4e3m = Some(prk_4e3m);
        self.message_1 = None;
        self.g_x = None;
        self.c_i = None;
        self.kem_auth_r = None;
        Ok(bytes)
    }

    fn process_message_3(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, EdhocError> {
        let suite = self.suite.ok_or(EdhocError::OutOfStateMessage)?;
        let th_3 = self.th_3.ok_or(EdhocError::OutOfStateMessage)?;
        let prk_3e2m = self.prk_3e2m.clone().ok_or(EdhocError::OutOfStateMessage)?;
        let prk_4e3m = self.prk_4e3m.clone().ok_or(EdhocError::OutOfStateMessage)?;

        let msg = wire::decode_message_3(bytes, &suite)?;
        let keys_3 = keyschedule::message_keys(
            &self.crypto,
            &suite,
            &prk_3e2m,
            &th_3,
            InfoLabel::K3,
            InfoLabel::Iv3,
        )?;
        let plaintext = open_protected(&self.crypto, &suite, &keys_3, &th_3, &msg.ciphertext_3)?;
        let pt = wire::decode_plaintext(&plaintext)
            .map_err(|_| EdhocError::AuthenticationFailed)?;
        if pt.id_cred != self.peer.id_cred() {
            return Err(EdhocError::AuthenticationFailed);
        }

        let binding = AuthBinding {
            label: InfoLabel::Mac3,
            c_r: None,
            id_cred: &pt.id_cred,
            cred: self.peer.cred(),
            th: &th_3,
            ead: pt.ead.as_deref(),
        };
        let kem_prk;
        let verifier = match self.method.initiator_auth() {
            AuthKind::Signature => AuthVerifier::PublicKey(self.peer.public_key()),
            AuthKind::StaticDh => AuthVerifier::MacPrk(&prk_4e3m),
            AuthKind::Kem => {
                let ss = self.kem_auth_i.as_ref().ok_or(EdhocError::OutOfStateMessage)?;
                kem_prk = keyschedule::kem_auth_prk(&self.crypto, &suite, &th_3, ss);
                AuthVerifier::MacPrk(&kem_prk)
            }
        };
        verify_sig_or_mac(&self.crypto, &suite, verifier, &binding, &pt.sig_or_mac)?;

        let th_4 = transcript::th4(&self.crypto, &suite, &th_3, &msg.ciphertext_3);
        let prk_out = keyschedule::prk_out(&self.crypto, &suite, &prk_4e3m, &th_4)?;
        self.prk_exporter = Some(keyschedule::prk_exporter(&self.crypto, &suite, &prk_out)?);

        self.th_3 = None;
        self.prk_3e2m = None;
        self.kem_auth_i = None;
        if self.enable_message_4 {
            self.th_4 = Some(th_4);
        } else {
            self.prk_4e3m = None;
        }
        Ok(pt.ead)
    }

    fn build_message_4(&mut self, ead_4: Option<&[u8]>) -> Result<Vec<u8>, EdhocError> {
        let suite = self.suite.ok_or(EdhocError::OutOfStateMessage)?;
        let th_4 = self.th_4.ok_or(EdhocError::OutOfStateMessage)?;
        let prk_4e3m = self.prk_4e3m.clone().ok_or(EdhocError::OutOfStateMessage)?;
        let keys_4 = keyschedule::message_keys(
            &self.crypto,
            &suite,
            &prk_4e3m,
            &th_4,
            InfoLabel::K4,
            InfoLabel::Iv4,
        )?;
        let pt = Plaintext4 {
            ead: ead_4.map(<[u8]>::to_vec),
        };
        let plaintext = wire::encode_plaintext_4(&pt)?;
        let ciphertext_4 = seal_protected(&self.crypto, &suite, &keys_4, &th_4, &plaintext)?;
        let msg = Message4 { ciphertext_4 };
        wire::encode_message_4(&msg, &suite)
    }
}
