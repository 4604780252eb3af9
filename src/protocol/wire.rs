//! CBOR sequence codec for the four handshake messages and the protected
//! plaintexts.
//!
//! Messages are CBOR sequences: top-level data items concatenated without an
//! enclosing array. Decoding is strict: every item must be of the expected
//! major type, every byte string is capped before it is copied, optional
//! trailing items are recognised only at the exact end of input, and any
//! trailing garbage fails the whole message.

use crate::domain::creds::ConnId;
use crate::domain::errors::EdhocError;
use crate::domain::messages::{Message1, Message2, Message3, Message4, Plaintext4, ProtectedPlaintext};
use crate::domain::suites::{
    MAX_CONN_ID_LEN, MAX_EAD_LEN, MAX_ID_CRED_LEN, MAX_MESSAGE_LEN, MAX_SIG_OR_MAC_LEN, Method,
    Suite,
};
use ciborium::value::Value;
use std::io::Cursor;

/// Ciphertext fields are small: a protected plaintext at capacity plus the
/// largest tag, with slack for CBOR framing.
const MAX_CIPHERTEXT_LEN: usize = MAX_ID_CRED_LEN + MAX_SIG_OR_MAC_LEN + MAX_EAD_LEN + 16 + 16;

struct SeqWriter {
    buf: Vec<u8>,
}

impl SeqWriter {
    fn new() -> Self {
        SeqWriter { buf: Vec::new() }
    }

    fn push(&mut self, value: &Value) -> Result<(), EdhocError> {
        // Serialising into a Vec cannot fail for the values we build.
        ciborium::ser::into_writer(value, &mut self.buf)
            .map_err(|_| EdhocError::MalformedMessage { field: "encoder" })
    }

    fn uint(&mut self, v: u64) -> Result<(), EdhocError> {
        self.push(&Value::Integer(v.into()))
    }

    fn bytes(&mut self, b: &[u8]) -> Result<(), EdhocError> {
        self.push(&Value::Bytes(b.to_vec()))
    }

    fn text(&mut self, t: &str) -> Result<(), EdhocError> {
        self.push(&Value::Text(t.to_owned()))
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

struct SeqReader<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> SeqReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        SeqReader {
            cur: Cursor::new(bytes),
        }
    }

    fn at_end(&self) -> bool {
        self.cur.position() as usize == self.cur.get_ref().len()
    }

    fn value(&mut self, field: &'static str) -> Result<Value, EdhocError> {
        ciborium::de::from_reader(&mut self.cur)
            .map_err(|_| EdhocError::MalformedMessage { field })
    }

    fn uint(&mut self, field: &'static str) -> Result<u64, EdhocError> {
        match self.value(field)? {
            Value::Integer(i) => {
                u64::try_from(i128::from(i)).map_err(|_| EdhocError::MalformedMessage { field })
            }
            _ => Err(EdhocError::MalformedMessage { field }),
        }
    }

    fn bytes(&mut self, field: &'static str, cap: usize) -> Result<Vec<u8>, EdhocError> {
        match self.value(field)? {
            Value::Bytes(b) => {
                if b.len() > cap {
                    return Err(EdhocError::BufferTooSmall {
                        field,
                        capacity: cap,
                        actual: b.len(),
                    });
                }
                Ok(b)
            }
            _ => Err(EdhocError::MalformedMessage { field }),
        }
    }

    /// Optional trailing byte string: absent only when input ends exactly
    /// here.
    fn opt_bytes(
        &mut self,
        field: &'static str,
        cap: usize,
    ) -> Result<Option<Vec<u8>>, EdhocError> {
        if self.at_end() {
            return Ok(None);
        }
        self.bytes(field, cap).map(Some)
    }

    fn finish(self, field: &'static str) -> Result<(), EdhocError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(EdhocError::MalformedMessage { field })
        }
    }
}

fn check_total(bytes: &[u8]) -> Result<(), EdhocError> {
    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(EdhocError::BufferTooSmall {
            field: "message",
            capacity: MAX_MESSAGE_LEN,
            actual: bytes.len(),
        });
    }
    Ok(())
}

pub fn encode_message_1(msg: &Message1, suite: &Suite) -> Result<Vec<u8>, EdhocError> {
    msg.validate(suite)?;
    let mut w = SeqWriter::new();
    w.uint(msg.method.label())?;
    w.uint(u64::from(msg.suite_label))?;
    w.bytes(&msg.g_x)?;
    w.bytes(msg.c_i.as_bytes())?;
    if let Some(ead) = &msg.ead_1 {
        w.bytes(ead)?;
    }
    Ok(w.finish())
}

/// Decode message 1 and resolve its negotiation fields. Unknown labels fail
/// before any key material is copied.
pub fn decode_message_1(bytes: &[u8]) -> Result<(Message1, Suite), EdhocError> {
    check_total(bytes)?;
    let mut r = SeqReader::new(bytes);
    let method = Method::resolve(r.uint("method")?)?;
    let suite_label = r.uint("suite")?;
    let suite = Suite::resolve(suite_label)?;
    let g_x = r.bytes("G_X", suite.gx_len())?;
    let c_i = ConnId::new(&r.bytes("C_I", MAX_CONN_ID_LEN)?)?;
    let ead_1 = r.opt_bytes("EAD_1", MAX_EAD_LEN)?;
    r.finish("message 1 trailing bytes")?;
    let msg = Message1 {
        method,
        suite_label: suite.label,
        g_x,
        c_i,
        ead_1,
    };
    msg.validate(&suite)?;
    Ok((msg, suite))
}

pub fn encode_message_2(msg: &Message2, suite: &Suite) -> Result<Vec<u8>, EdhocError> {
    msg.validate(suite)?;
    let mut w = SeqWriter::new();
    let mut joined = Vec::with_capacity(msg.g_y.len() + msg.ciphertext_2.len());
    joined.extend_from_slice(&msg.g_y);
    joined.extend_from_slice(&msg.ciphertext_2);
    w.bytes(&joined)?;
    w.bytes(msg.c_r.as_bytes())?;
    Ok(w.finish())
}

pub fn decode_message_2(bytes: &[u8], suite: &Suite) -> Result<Message2, EdhocError> {
    check_total(bytes)?;
    let mut r = SeqReader::new(bytes);
    let joined = r.bytes("G_Y | CIPHERTEXT_2", suite.gy_len() + MAX_CIPHERTEXT_LEN)?;
    if joined.len() < suite.gy_len() + suite.edhoc_aead.tag_len() {
        return Err(EdhocError::MalformedMessage {
            field: "G_Y | CIPHERTEXT_2 too short",
        });
    }
    let (g_y, ciphertext_2) = joined.split_at(suite.gy_len());
    let c_r = ConnId::new(&r.bytes("C_R", MAX_CONN_ID_LEN)?)?;
    r.finish("message 2 trailing bytes")?;
    let msg = Message2 {
        g_y: g_y.to_vec(),
        ciphertext_2: ciphertext_2.to_vec(),
        c_r,
    };
    msg.validate(suite)?;
    Ok(msg)
}

pub fn encode_message_3(msg: &Message3, suite: &Suite) -> Result<Vec<u8>, EdhocError> {
    msg.validate(suite)?;
    let mut w = SeqWriter::new();
    w.bytes(&msg.ciphertext_3)?;
    Ok(w.finish())
}

pub fn decode_message_3(bytes: &[u8], suite: &Suite) -> Result<Message3, EdhocError> {
    check_total(bytes)?;
    let mut r = SeqReader::new(bytes);
    let ciphertext_3 = r.bytes("CIPHERTEXT_3", MAX_CIPHERTEXT_LEN)?;
    r.finish("message 3 trailing bytes")?;
    let msg = Message3 { ciphertext_3 };
    msg.validate(suite)?;
    Ok(msg)
}

pub fn encode_message_4(msg: &Message4, suite: &Suite) -> Result<Vec<u8>, EdhocError> {
    msg.validate(suite)?;
    let mut w = SeqWriter::new();
    w.bytes(&msg.ciphertext_4)?;
    Ok(w.finish())
}

pub fn decode_message_4(bytes: &[u8], suite: &Suite) -> Result<Message4, EdhocError> {
    check_total(bytes)?;
    let mut r = SeqReader::new(bytes);
    let ciphertext_4 = r.bytes("CIPHERTEXT_4", MAX_CIPHERTEXT_LEN)?;
    r.finish("message 4 trailing bytes")?;
    let msg = Message4 { ciphertext_4 };
    msg.validate(suite)?;
    Ok(msg)
}

pub fn encode_plaintext(pt: &ProtectedPlaintext) -> Result<Vec<u8>, EdhocError> {
    pt.validate()?;
    let mut w = SeqWriter::new();
    w.bytes(&pt.id_cred)?;
    w.bytes(&pt.sig_or_mac)?;
    if let Some(ead) = &pt.ead {
        w.bytes(ead)?;
    }
    Ok(w.finish())
}

pub fn decode_plaintext(bytes: &[u8]) -> Result<ProtectedPlaintext, EdhocError> {
    let mut r = SeqReader::new(bytes);
    let id_cred = r.bytes("ID_CRED", MAX_ID_CRED_LEN)?;
    let sig_or_mac = r.bytes("sig_or_mac", MAX_SIG_OR_MAC_LEN)?;
    let ead = r.opt_bytes("EAD", MAX_EAD_LEN)?;
    r.finish("plaintext trailing bytes")?;
    let pt = ProtectedPlaintext {
        id_cred,
        sig_or_mac,
        ead,
    };
    pt.validate()?;
    Ok(pt)
}

pub fn encode_plaintext_4(pt: &Plaintext4) -> Result<Vec<u8>, EdhocError> {
    pt.validate()?;
    let mut w = SeqWriter::new();
    if let Some(ead) = &pt.ead {
        w.bytes(ead)?;
    }
    Ok(w.finish())
}

pub fn decode_plaintext_4(bytes: &[u8]) -> Result<Plaintext4, EdhocError> {
    let mut r = SeqReader::new(bytes);
    let ead = r.opt_bytes("EAD_4", MAX_EAD_LEN)?;
    r.finish("plaintext 4 trailing bytes")?;
    let pt = Plaintext4 { ead };
    pt.validate()?;
    Ok(pt)
}

/// Build the CBOR-sequence context MACed by static-DH and KEM authentication.
pub fn encode_mac_context(
    c_r: Option<&ConnId>,
    id_cred: &[u8],
    th: &[u8],
    cred: &[u8],
    ead: Option<&[u8]>,
) -> Result<Vec<u8>, EdhocError> {
    let mut w = SeqWriter::new();
    if let Some(c) = c_r {
        w.bytes(c.as_bytes())?;
    }
    w.bytes(id_cred)?;
    w.bytes(th)?;
    w.bytes(cred)?;
    if let Some(e) = ead {
        w.bytes(e)?;
    }
    Ok(w.finish())
}

/// Build the byte string covered by a signature: a fixed domain-separation
/// label followed by the signer's identity binding and the transcript hash.
pub fn encode_signature_payload(
    id_cred: &[u8],
    cred: &[u8],
    th: &[u8],
    ead: Option<&[u8]>,
) -> Result<Vec<u8>, EdhocError> {
    let mut w = SeqWriter::new();
    w.text("Signature1")?;
    w.bytes(id_cred)?;
    w.bytes(cred)?;
    w.bytes(th)?;
    if let Some(e) = ead {
        w.bytes(e)?;
    }
    Ok(w.finish())
}

/// Info structure for HKDF-Expand: label, context, output length.
pub fn encode_info(label: u64, context: &[u8], out_len: usize) -> Result<Vec<u8>, EdhocError> {
    let mut w = SeqWriter::new();
    w.uint(label)?;
    w.bytes(context)?;
    w.uint(out_len as u64)?;
    Ok(w.finish())
}
