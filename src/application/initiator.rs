//! Initiator session: sends message 1 and 3, verifies message 2 and the
//! optional message 4.

use crate::application::{SessionConfig, open_protected, seal_protected};
use crate::domain::creds::{ConnId, Credential, LocalCredential};
use crate::domain::errors::EdhocError;
use crate::domain::messages::{Message1, Message3, ProtectedPlaintext};
use crate::domain::suites::{AuthKind, Method, Suite};
use crate::ports::crypto::{CryptoProvider, KeyPair};
use crate::protocol::auth::{
    AuthBinding, AuthSecret, AuthVerifier, compute_sig_or_mac, verify_sig_or_mac,
};
use crate::protocol::keyschedule::{self, InfoLabel, Prk};
use crate::protocol::transcript::{self, TranscriptHash};
use crate::protocol::wire;
use tracing::debug;
use zeroize::Zeroizing;

/// Which message the session will accept or produce next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorState {
    Idle,
    SentMsg1,
    RecvMsg2Verified,
    WaitingMsg4,
    Completed,
    Aborted,
}

pub struct Initiator<P: CryptoProvider> {
    crypto: P,
    suite: Suite,
    method: Method,
    c_i: ConnId,
    local: LocalCredential,
    peer: Credential,
    expect_message_4: bool,
    state: InitiatorState,

    eph: Option<KeyPair>,
    message_1: Option<Vec<u8>>,
    /// KEM secret encapsulated to the responder's static key in message 1;
    /// verifies the responder's MAC_2.
    kem_auth_r: Option<Zeroizing<Vec<u8>>>,
    /// KEM secret the responder encapsulated to our static key in message 2;
    /// keys our MAC_3.
    kem_auth_i: Option<Zeroizing<Vec<u8>>>,
    th_3: Option<TranscriptHash>,
    th_4: Option<TranscriptHash>,
    prk_3e2m: Option<Prk>,
    prk_4e3m: Option<Prk>,
    prk_exporter: Option<Prk>,
}

impl<P: CryptoProvider> Initiator<P> {
    /// Create an idle session. The suite is fixed up front: the initiator
    /// offers exactly one.
    pub fn new(
        crypto: P,
        config: SessionConfig,
        suite_label: u64,
        expect_message_4: bool,
    ) -> Result<Self, EdhocError> {
        let suite = Suite::resolve(suite_label)?;
        config.method.check_suite(&suite)?;
        Ok(Initiator {
            crypto,
            suite,
            method: config.method,
            c_i: config.c_local,
            local: config.local,
            peer: config.peer,
            expect_message_4,
            state: InitiatorState::Idle,
            eph: None,
            message_1: None,
            kem_auth_r: None,
            kem_auth_i: None,
            th_3: None,
            th_4: None,
            prk_3e2m: None,
            prk_4e3m: None,
            prk_exporter: None,
        })
    }

    #[must_use]
    pub fn state(&self) -> InitiatorState {
        self.state
    }

    /// Abort the session and zeroize all handshake secrets, including any
    /// exporter key already derived.
    pub fn abort(&mut self) {
        self.clear();
        self.state = InitiatorState::Aborted;
        debug!("initiator session aborted");
    }

    /// Produce message 1.
    pub fn write_message_1(&mut self, ead_1: Option<&[u8]>) -> Result<Vec<u8>, EdhocError> {
        self.guard(InitiatorState::Idle)?;
        match self.build_message_1(ead_1) {
            Ok(out) => {
                self.state = InitiatorState::SentMsg1;
                debug!(suite = self.suite.label, method = self.method.label(), "sent message 1");
                Ok(out)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Process message 2, verifying the responder. Returns EAD_2 if present.
    pub fn read_message_2(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, EdhocError> {
        self.guard(InitiatorState::SentMsg1)?;
        match self.process_message_2(bytes) {
            Ok(ead) => {
                self.state = InitiatorState::RecvMsg2Verified;
                debug!("responder authenticated");
                Ok(ead)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Produce message 3 and complete the key schedule. If no message 4 is
    /// expected the session completes here.
    pub fn write_message_3(&mut self, ead_3: Option<&[u8]>) -> Result<Vec<u8>, EdhocError> {
        self.guard(InitiatorState::RecvMsg2Verified)?;
        match self.build_message_3(ead_3) {
            Ok(out) => {
                if self.expect_message_4 {
                    self.state = InitiatorState::WaitingMsg4;
                } else {
                    self.finish();
                }
                debug!(state = ?self.state, "sent message 3");
                Ok(out)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Process the optional key-confirmation message 4. Returns EAD_4.
    pub fn read_message_4(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, EdhocError> {
        self.guard(InitiatorState::WaitingMsg4)?;
        match self.process_message_4(bytes) {
            Ok(ead) => {
                self.finish();
                debug!("received message 4, session completed");
                Ok(ead)
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
        match (self.state, &self.prk_exporter) {
            (InitiatorState::Completed, Some(prk)) => {
                keyschedule::export(&self.crypto, &self.suite, prk, label, context, out_len)
            }
            (InitiatorState::Aborted, _) => Err(EdhocError::Aborted),
            _ => Err(EdhocError::OutOfStateMessage),
        }
    }

    fn guard(&mut self, expected: InitiatorState) -> Result<(), EdhocError> {
        if self.state == expected {
            return Ok(());
        }
        if self.state == InitiatorState::Aborted {
            return Err(EdhocError::Aborted);
        }
        Err(self.fail(EdhocError::OutOfStateMessage))
    }

    fn fail(&mut self, err: EdhocError) -> EdhocError {
        debug!(error = %err, "initiator handshake failed");
        self.clear();
        self.state = InitiatorState::Aborted;
        err
    }

    fn clear(&mut self) {
        self.eph = None;
        self.message_1 = None;
        self.kem_auth_r = None;
        self.kem_auth_i = None;
        self.th_3 = None;
        self.th_4 = None;
        self.prk_3e2m = None;
        self.prk_4e3m = None;
        self.prk_exporter = None;
    }

    /// Drop everything except the exporter key.
    fn finish(&mut self) {
        self.eph = None;
        self.message_1 = None;
        self.kem_auth_r = None;
        self.kem_auth_i = None;
        self.th_3 = None;
        self.th_4 = None;
        self.prk_3e2m = None;
        self.prk_4e3m = None;
        self.state = InitiatorState::Completed;
    }

    fn build_message_1(&mut self, ead_1: Option<&[u8]>) -> Result<Vec<u8>, EdhocError> {
        let kex = self.suite.edhoc_kex;
        let eph = self.crypto.kex_generate(kex)?;
        let g_x = if kex.is_kem() {
            let enc = self.crypto.kem_encapsulate(kex, self.peer.public_key())?;
            let mut g_x = Vec::with_capacity(self.suite.gx_len());
            g_x.extend_from_slice(&eph.public);
            g_x.extend_from_slice(&enc.ciphertext);
            self.kem_auth_r = Some(enc.shared_secret);
            g_x
        } else {
            eph.public.clone()
        };
        let msg = Message1 {
            method: self.method,
            suite_label: self.suite.label,
            g_x,
            c_i: self.c_i.clone(),
            ead_1: ead_1.map(<[u8]>::to_vec),
        };
        let bytes = wire::encode_message_1(&msg, &self.suite)?;
        self.eph = Some(eph);
        self.message_1 = Some(bytes.clone());
        Ok(bytes)
    }

    fn process_message_2(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, EdhocError> {
        let msg = wire::decode_message_2(bytes, &self.suite)?;
        if msg.c_r == self.c_i {
            return Err(EdhocError::MalformedMessage {
                field: "connection identifier collision",
            });
        }
        let kex = self.suite.edhoc_kex;
        let eph = self.eph.as_ref().ok_or(EdhocError::OutOfStateMessage)?;
        let message_1 = self.message_1.as_deref().ok_or(EdhocError::OutOfStateMessage)?;

        // Ephemeral shared secret, and for KEM the secret bound to our static
        // key.
        let shared = if kex.is_kem() {
            let ct_len = kex.ciphertext_len();
            let (ct_e, ct_auth_i) = msg.g_y.split_at(ct_len);
            let ss_e = self.crypto.kem_decapsulate(kex, &eph.secret, ct_e)?;
            let ss_auth_i = self.crypto.kem_decapsulate(kex, self.local.secret(), ct_auth_i)?;
            self.kem_auth_i = Some(ss_auth_i);
            ss_e
        } else {
            self.crypto.ecdh(kex, &eph.secret, &msg.g_y)?
        };

        let th_2 = transcript::th2(&self.crypto, &self.suite, &msg.g_y, &msg.c_r, message_1);
        let prk_2e = keyschedule::prk_2e(&self.crypto, &self.suite, &th_2, &shared);
        drop(shared);

        // Responder static-DH mixes G_RX into the chain; other kinds pass
        // through.
        let responder_kind = self.method.responder_auth();
        let g_rx = match responder_kind {
            AuthKind::StaticDh => {
                Some(self.crypto.ecdh(kex, &eph.secret, self.peer.public_key())?)
            }
            AuthKind::Signature | AuthKind::Kem => None,
        };
        let prk_3e2m = keyschedule::advance(
            &self.crypto,
            &self.suite,
            &prk_2e,
            InfoLabel::Salt3e2m,
            &th_2,
            g_rx.as_deref().map(|v| &**v),
        )?;

        let keys_2 = keyschedule::message_keys(
            &self.crypto,
            &self.suite,
            &prk_2e,
            &th_2,
            InfoLabel::K2,
            InfoLabel::Iv2,
        )?;
        let plaintext = open_protected(&self.crypto, &self.suite, &keys_2, &th_2, &msg.ciphertext_2)?;
        // An authenticated-looking ciphertext with garbage inside gets the
        // same error as a bad tag.
        let pt = wire::decode_plaintext(&plaintext)
            .map_err(|_| EdhocError::AuthenticationFailed)?;
        if pt.id_cred != self.peer.id_cred() {
            return Err(EdhocError::AuthenticationFailed);
        }

        let binding = AuthBinding {
            label: InfoLabel::Mac2,
            c_r: Some(&msg.c_r),
            id_cred: &pt.id_cred,
            cred: self.peer.cred(),
            th: &th_2,
            ead: pt.ead.as_deref(),
        };
        let kem_prk;
        let verifier = match responder_kind {
            AuthKind::Signature => AuthVerifier::PublicKey(self.peer.public_key()),
            AuthKind::StaticDh => AuthVerifier::MacPrk(&prk_3e2m),
            AuthKind::Kem => {
                let ss = self.kem_auth_r.as_ref().ok_or(EdhocError::OutOfStateMessage)?;
                kem_prk = keyschedule::kem_auth_prk(&self.crypto, &self.suite, &th_2, ss);
                AuthVerifier::MacPrk(&kem_prk)
            }
        };
        verify_sig_or_mac(&self.crypto, &self.suite, verifier, &binding, &pt.sig_or_mac)?;

        let th_3 = transcript::th3(
            &self.crypto,
            &self.suite,
            &th_2,
            &msg.ciphertext_2,
            self.peer.cred(),
        );

        // Initiator static-DH mixes G_IY; again other kinds pass through.
        let g_iy = match self.method.initiator_auth() {
            AuthKind::StaticDh => Some(self.crypto.ecdh(kex, self.local.secret(), &msg.g_y)?),
            AuthKind::Signature | AuthKind::Kem => None,
        };
        let prk_4e3m = keyschedule::advance(
            &self.crypto,
            &self.suite,
            &prk_3e2m,
            InfoLabel::Salt4e3m,
            &th_3,
            g_iy.as_deref().map(|v| &**v),
        )?;

        self.th_3 = Some(th_3);
        self.prk_3e2m = Some(prk_3e2m);
        self.prk_4e3m = Some(prk_4e3m);
        self.eph = None;
        self.message_1 = None;
        self.kem_auth_r = None;
        Ok(pt.ead)
    }

    fn build_message_3(&mut self, ead_3: Option<&[u8]>) -> Result<Vec<u8>, EdhocError> {
        let th_3 = self.th_3.ok_or(EdhocError::OutOfStateMessage)?;
        let prk_3e2m = self.prk_3e2m.clone().ok_or(EdhocError::OutOfStateMessage)?;
        let prk_4e3m = self.prk_4e3m.clone().ok_or(EdhocError::OutOfStateMessage)?;

        let binding = AuthBinding {
            label: InfoLabel::Mac3,
            c_r: None,
            id_cred: self.local.credential().id_cred(),
            cred: self.local.credential().cred(),
            th: &th_3,
            ead: ead_3,
        };
        let kem_prk;
        let secret = match self.method.initiator_auth() {
            AuthKind::Signature => AuthSecret::SigningKey(self.local.secret()),
            AuthKind::StaticDh => AuthSecret::MacPrk(&prk_4e3m),
            AuthKind::Kem => {
                let ss = self.kem_auth_i.as_ref().ok_or(EdhocError::OutOfStateMessage)?;
                kem_prk = keyschedule::kem_auth_prk(&self.crypto, &self.suite, &th_3, ss);
                AuthSecret::MacPrk(&kem_prk)
            }
        };
        let sig_or_mac = compute_sig_or_mac(&self.crypto, &self.suite, secret, &binding)?;

        let pt = ProtectedPlaintext {
            id_cred: self.local.credential().id_cred().to_vec(),
            sig_or_mac,
            ead: ead_3.map(<[u8]>::to_vec),
        };
        let plaintext = wire::encode_plaintext(&pt)?;
        let keys_3 = keyschedule::message_keys(
            &self.crypto,
            &self.suite,
            &prk_3e2m,
            &th_3,
            InfoLabel::K3,
            InfoLabel::Iv3,
        )?;
        let ciphertext_3 = seal_protected(&self.crypto, &self.suite, &keys_3, &th_3, &plaintext)?;
        let msg = Message3 {
            ciphertext_3: ciphertext_3.clone(),
        };
        let bytes = wire::encode_message_3(&msg, &self.suite)?;

        let th_4 = transcript::th4(&self.crypto, &self.suite, &th_3, &ciphertext_3);
        let prk_out = keyschedule::prk_out(&self.crypto, &self.suite, &prk_4e3m, &th_4)?;
        self.prk_exporter = Some(keyschedule::prk_exporter(&self.crypto, &self.suite, &prk_out)?);
        self.th_4 = Some(th_4);
        Ok(bytes)
    }

    fn process_message_4(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, EdhocError> {
        let th_4 = self.th_4.ok_or(EdhocError::OutOfStateMessage)?;
        let prk_4e3m = self.prk_4e3m.clone().ok_or(EdhocError::OutOfStateMessage)?;
        let msg = wire::decode_message_4(bytes, &self.suite)?;
        let keys_4 = keyschedule::message_keys(
            &self.crypto,
            &self.suite,
            &prk_4e3m,
            &th_4,
            InfoLabel::K4,
            InfoLabel::Iv4,
        )?;
        let plaintext = open_protected(&self.crypto, &self.suite, &keys_4, &th_4, &msg.ciphertext_4)?;
        let pt = wire::decode_plaintext_4(&plaintext)
            .map_err(|_| EdhocError::AuthenticationFailed)?;
        Ok(pt.ead)
    }
}
