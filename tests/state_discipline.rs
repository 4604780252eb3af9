//! State-machine discipline: messages out of order, replays, exports before
//! completion, and negotiation rejections all fail closed.

use edhoc_engine::adapters::software::SoftwareCrypto;
use edhoc_engine::application::initiator::InitiatorState;
use edhoc_engine::application::responder::ResponderState;
use edhoc_engine::test_support::fixture;
use edhoc_engine::{EdhocError, Initiator, Method, Responder};

#[test]
fn initiator_rejects_unknown_suite_up_front() {
    let fx = fixture(Method::SigSig, 0);
    assert!(matches!(
        Initiator::new(SoftwareCrypto, fx.initiator, 9, false),
        Err(EdhocError::UnsupportedSuite { label: 9 })
    ));
}

#[test]
fn initiator_rejects_method_suite_mismatch_up_front() {
    let fx = fixture(Method::SigSig, 0);
    // Signature methods cannot run on a KEM suite.
    assert!(matches!(
        Initiator::new(SoftwareCrypto, fx.initiator, 4, false),
        Err(EdhocError::UnsupportedMethod { label: 0 })
    ));
}

#[test]
fn responder_rejects_unexpected_method() {
    let fx_i = fixture(Method::SigSig, 0);
    let fx_r = fixture(Method::StatStat, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx_i.initiator, 0, false).unwrap();
    let mut r = Responder::new(SoftwareCrypto, fx_r.responder, false);

    let m1 = i.write_message_1(None).unwrap();
    assert!(matches!(
        r.read_message_1(&m1),
        Err(EdhocError::UnsupportedMethod { label: 0 })
    ));
    assert_eq!(r.state(), ResponderState::Aborted);
}

#[test]
fn writing_message_1_twice_aborts() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, false).unwrap();
    i.write_message_1(None).unwrap();
    assert!(matches!(
        i.write_message_1(None),
        Err(EdhocError::OutOfStateMessage)
    ));
    assert_eq!(i.state(), InitiatorState::Aborted);
    // Everything after the abort reports the abort.
    assert!(matches!(
        i.write_message_1(None),
        Err(EdhocError::Aborted)
    ));
}

#[test]
fn message_3_before_message_2_is_out_of_state() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, false).unwrap();
    i.write_message_1(None).unwrap();
    assert!(matches!(
        i.write_message_3(None),
        Err(EdhocError::OutOfStateMessage)
    ));
    assert_eq!(i.state(), InitiatorState::Aborted);
}

#[test]
fn replayed_message_2_aborts() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, false).unwrap();
    let mut r = Responder::new(SoftwareCrypto, fx.responder, false);
    let m1 = i.write_message_1(None).unwrap();
    r.read_message_1(&m1).unwrap();
    let m2 = r.write_message_2(None).unwrap();
    i.read_message_2(&m2).unwrap();
    assert!(matches!(
        i.read_message_2(&m2),
        Err(EdhocError::OutOfStateMessage)
    ));
    assert_eq!(i.state(), InitiatorState::Aborted);
}

#[test]
fn responder_given_message_3_first_aborts() {
    let fx = fixture(Method::StatStat, 2);
    let fx2 = fixture(Method::StatStat, 2);
    let fx3 = fixture(Method::StatStat, 2);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 2, false).unwrap();
    let mut r = Responder::new(SoftwareCrypto, fx.responder, false);

    let m1 = i.write_message_1(None).unwrap();
    r.read_message_1(&m1).unwrap();
    let m2 = r.write_message_2(None).unwrap();
    i.read_message_2(&m2).unwrap();
    let m3 = i.write_message_3(None).unwrap();

    // An idle responder asked to process message 3 reports the state error.
    let mut idle = Responder::new(SoftwareCrypto, fx2.responder, false);
    assert!(matches!(
        idle.read_message_3(&m3),
        Err(EdhocError::OutOfStateMessage)
    ));
    assert_eq!(idle.state(), ResponderState::Aborted);

    // Fed through the message-1 path instead, the bytes fail to parse.
    let mut other = Responder::new(SoftwareCrypto, fx3.responder, false);
    assert!(matches!(
        other.read_message_1(&m3),
        Err(EdhocError::MalformedMessage { .. })
    ));
    assert_eq!(other.state(), ResponderState::Aborted);
}

#[test]
fn export_before_completion_is_refused_without_aborting() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, false).unwrap();
    let mut r = Responder::new(SoftwareCrypto, fx.responder, false);

    let m1 = i.write_message_1(None).unwrap();
    assert!(matches!(
        i.export(0, b"", 16),
        Err(EdhocError::OutOfStateMessage)
    ));
    // The refusal is a query error, not a protocol error: the handshake
    // continues.
    r.read_message_1(&m1).unwrap();
    let m2 = r.write_message_2(None).unwrap();
    i.read_message_2(&m2).unwrap();
    let m3 = i.write_message_3(None).unwrap();
    r.read_message_3(&m3).unwrap();
    assert!(i.export(0, b"", 16).is_ok());
}

#[test]
fn explicit_abort_wipes_exporter() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, false).unwrap();
    let mut r = Responder::new(SoftwareCrypto, fx.responder, false);
    let m1 = i.write_message_1(None).unwrap();
    r.read_message_1(&m1).unwrap();
    let m2 = r.write_message_2(None).unwrap();
    i.read_message_2(&m2).unwrap();
    let m3 = i.write_message_3(None).unwrap();
    r.read_message_3(&m3).unwrap();

    assert!(i.export(0, b"", 16).is_ok());
    i.abort();
    assert!(matches!(i.export(0, b"", 16), Err(EdhocError::Aborted)));
}

#[test]
fn message_4_without_enabling_is_out_of_state() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, false).unwrap();
    let mut r = Responder::new(SoftwareCrypto, fx.responder, false);
    let m1 = i.write_message_1(None).unwrap();
    r.read_message_1(&m1).unwrap();
    let m2 = r.write_message_2(None).unwrap();
    i.read_message_2(&m2).unwrap();
    let m3 = i.write_message_3(None).unwrap();
    r.read_message_3(&m3).unwrap();

    assert!(matches!(
        r.write_message_4(None),
        Err(EdhocError::OutOfStateMessage)
    ));
}

#[test]
fn message_4_sent_at_most_once() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, true).unwrap();
    let mut r = Responder::new(SoftwareCrypto, fx.responder, true);
    let m1 = i.write_message_1(None).unwrap();
    r.read_message_1(&m1).unwrap();
    let m2 = r.write_message_2(None).unwrap();
    i.read_message_2(&m2).unwrap();
    let m3 = i.write_message_3(None).unwrap();
    r.read_message_3(&m3).unwrap();

    r.write_message_4(None).unwrap();
    assert!(matches!(
        r.write_message_4(None),
        Err(EdhocError::OutOfStateMessage)
    ));
}

#[test]
fn oversize_ead_is_rejected_before_sending() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, false).unwrap();
    assert!(matches!(
        i.write_message_1(Some(&[0u8; 65])),
        Err(EdhocError::BufferTooSmall { .. })
    ));
    assert_eq!(i.state(), InitiatorState::Aborted);
}

#[test]
fn truncated_message_2_is_malformed() {
    let fx = fixture(Method::SigSig, 0);
    let mut i = Initiator::new(SoftwareCrypto, fx.initiator, 0, false).unwrap();
    let mut r = Responder::new(SoftwareCrypto, fx.responder, false);
    let m1 = i.write_message_1(None).unwrap();
    r.read_message_1(&m1).unwrap();
    let m2 = r.write_message_2(None).unwrap();

    assert!(i.read_message_2(&m2[..m2.len() / 2]).is_err());
    assert_eq!(i.state(), InitiatorState::Aborted);
}
