//! End-to-end card management flows against a scripted card

use std::sync::atomic::Ordering;

use cardcheck_apdu_core::{Bytes, Expectation, MockTransport, ResetKind, TransportSession};
use cardcheck_globalplatform::{
    AuthenticationFailure, ChannelOptions, ChannelState, Error, GlobalPlatform, HarnessConfig,
    ProtocolFailure, SecureChannel, SecurityLevel, StaticKeys, crypto::command_mac,
    load::load_file_data_block,
};
use hex_literal::hex;

const FCI: [u8; 20] = hex!("6F108408A000000003000000A5049F6501FF 9000");
const CARD_ANSWER: [u8; 30] = hex!("000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce4 9000");
const HOST_CHALLENGE: [u8; 8] = hex!("f0467f908e5ca23f");
const SELECT_CARD_MANAGER: [u8; 13] = hex!("00A4040008A000000003000000");
const INITIALIZE_UPDATE: [u8; 13] = hex!("8050000008f0467f908e5ca23f");
const EXTERNAL_AUTHENTICATE: [u8; 21] = hex!("84820100103CE060483AACE927A3CDA954B0E88839");
const OK: [u8; 2] = hex!("9000");
const ACK: [u8; 3] = hex!("009000");

fn gp_with(options: ChannelOptions, responses: Vec<Vec<u8>>) -> GlobalPlatform<MockTransport> {
    let channel = SecureChannel::new(
        StaticKeys::default(),
        options.with_host_challenge(HOST_CHALLENGE),
    );
    GlobalPlatform::with_parts(TransportSession::new(MockTransport::new(responses)), channel)
}

fn gp(responses: Vec<Vec<u8>>) -> GlobalPlatform<MockTransport> {
    gp_with(ChannelOptions::default(), responses)
}

/// Responses for `card()` followed by a successful `auth()`
fn handshake() -> Vec<Vec<u8>> {
    vec![FCI.to_vec(), CARD_ANSWER.to_vec(), OK.to_vec()]
}

fn commands(gp: &GlobalPlatform<MockTransport>) -> &[Bytes] {
    &gp.session().transport().commands
}

/// Recompute the C-MAC of a wrapped command without Le
fn assert_mac(gp: &GlobalPlatform<MockTransport>, wrapped: &[u8]) {
    let keys = gp.channel().context().unwrap().keys();
    let (body, mac) = wrapped.split_at(wrapped.len() - 8);
    assert_eq!(body[0] & 0x04, 0x04, "secure messaging bit");
    assert_eq!(usize::from(body[4]), body.len() - 5 + 8, "Lc includes the MAC");
    assert_eq!(command_mac(body, keys.cmac(), &[0; 8]).unwrap(), mac);
}

#[test]
fn card_auth_delete() {
    let mut responses = handshake();
    responses.push(OK.to_vec());
    let mut gp = gp(responses);

    let fci = gp.card().unwrap();
    assert_eq!(fci.as_ref(), &FCI[..18]);
    gp.auth().unwrap();
    assert_eq!(gp.channel().state(), ChannelState::Authenticated);
    gp.delete(&hex!("0102030405"), false).unwrap();

    let sent = commands(&gp);
    assert_eq!(sent[0].as_ref(), SELECT_CARD_MANAGER);
    assert_eq!(sent[1].as_ref(), INITIALIZE_UPDATE);
    assert_eq!(sent[2].as_ref(), EXTERNAL_AUTHENTICATE);
    assert_eq!(
        sent[3].as_ref(),
        hex!("84E400000F4F05010203040592CEAA7B49448EAE")
    );
    assert_eq!(gp.last_exchange().unwrap().expectation.label(), "DELETE");
}

#[test]
fn more_data_during_initialize_update() {
    let mut gp = gp(vec![
        FCI.to_vec(),
        hex!("611C").to_vec(),
        CARD_ANSWER.to_vec(),
        OK.to_vec(),
    ]);
    gp.card().unwrap();
    gp.auth().unwrap();

    let sent = commands(&gp);
    assert_eq!(sent[2].as_ref(), hex!("00C000001C"));
    assert_eq!(sent[3].as_ref(), EXTERNAL_AUTHENTICATE);
    assert!(gp.channel().is_authenticated());
}

#[test]
fn wrong_card_cryptogram_is_rejected() {
    let mut answer = CARD_ANSWER;
    answer[20] ^= 0xFF;
    let mut gp = gp(vec![FCI.to_vec(), answer.to_vec()]);
    gp.card().unwrap();

    let err = gp.auth().unwrap_err();
    assert!(matches!(
        err,
        Error::Authentication(AuthenticationFailure::CardCryptogramMismatch { .. })
    ));
    assert_eq!(gp.channel().state(), ChannelState::Rejected);
    // EXTERNAL AUTHENTICATE was never sent
    assert_eq!(commands(&gp).len(), 2);

    // the session is unusable until the next handshake
    assert!(matches!(
        gp.delete(&hex!("0102030405"), true),
        Err(Error::InvalidState {
            actual: ChannelState::Rejected,
            ..
        })
    ));
    assert_eq!(commands(&gp).len(), 2);
}

#[test]
fn refused_external_authenticate() {
    let mut gp = gp(vec![FCI.to_vec(), CARD_ANSWER.to_vec(), hex!("6982").to_vec()]);
    gp.card().unwrap();

    let err = gp.auth().unwrap_err();
    match err {
        Error::Authentication(AuthenticationFailure::Rejected(sw)) => {
            assert_eq!(sw.to_u16(), 0x6982);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(gp.channel().state(), ChannelState::Rejected);

    // a fresh attempt is allowed and starts from scratch
    let transport = gp.session_mut().transport_mut();
    transport.push_response(CARD_ANSWER.to_vec());
    transport.push_response(OK.to_vec());
    gp.auth().unwrap();
    assert!(gp.channel().is_authenticated());
}

#[test]
fn initialize_update_failure_surfaces_status() {
    let mut gp = gp(vec![FCI.to_vec(), hex!("6A88").to_vec()]);
    gp.card().unwrap();
    let err = gp.auth().unwrap_err();
    match err {
        Error::Protocol {
            step,
            status,
            reason,
        } => {
            assert_eq!(step, "INITIALIZE UPDATE");
            assert_eq!(status.to_u16(), 0x6A88);
            assert_eq!(reason, ProtocolFailure::Status);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(gp.channel().state(), ChannelState::Unauthenticated);
    assert_eq!(commands(&gp).len(), 2);
}

#[test]
fn short_initialize_update_answer() {
    let mut gp = gp(vec![FCI.to_vec(), hex!("0000026501830395366220 9000").to_vec()]);
    gp.card().unwrap();
    let err = gp.auth().unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol {
            step: "INITIALIZE UPDATE",
            reason: ProtocolFailure::TooShort {
                expected: 28,
                actual: 11
            },
            ..
        }
    ));
    assert_eq!(gp.channel().state(), ChannelState::Unauthenticated);
}

#[test]
fn failing_delete_reports_the_step() {
    let mut responses = handshake();
    responses.push(hex!("6A88").to_vec());
    let mut gp = gp(responses);
    gp.card().unwrap();
    gp.auth().unwrap();

    let err = gp.delete(&hex!("0102030405"), false).unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol {
            step: "DELETE",
            reason: ProtocolFailure::Status,
            ..
        }
    ));
    // the card refusing a command leaves the channel usable
    assert!(gp.channel().is_authenticated());
}

#[test]
fn auth_with_triple_length_keys() {
    // K1 ‖ K2 ‖ K1 derives the same session keys as the double-length K1 ‖ K2
    let key = hex!("404142434445464748494A4B4C4D4E4F4041424344454647");
    let mut responses = handshake();
    responses.push(OK.to_vec());
    let mut gp = gp(responses);
    gp.card().unwrap();
    gp.auth_with(
        StaticKeys::from_single_key(&key).unwrap(),
        ChannelOptions::default().with_host_challenge(HOST_CHALLENGE),
    )
    .unwrap();
    assert_eq!(commands(&gp)[2].as_ref(), EXTERNAL_AUTHENTICATE);

    gp.delete(&hex!("0102030405"), false).unwrap();
    assert_eq!(
        commands(&gp)[3].as_ref(),
        hex!("84E400000F4F05010203040592CEAA7B49448EAE")
    );
}

#[test]
fn upload_wraps_install_and_load_blocks() {
    let load_file: Vec<u8> = (0..300u16).map(|i| (i % 251) as u8).collect();
    let mut responses = handshake();
    responses.extend([ACK.to_vec(), OK.to_vec(), ACK.to_vec()]);
    let mut gp = gp(responses);

    gp.card().unwrap();
    gp.auth().unwrap();
    gp.upload(&hex!("A0000000620001"), &load_file).unwrap();

    let sent = commands(&gp);
    assert_eq!(sent.len(), 6);

    let install = &sent[3];
    assert_eq!(&install[..5], hex!("84E602001C"));
    assert_eq!(
        &install[5..25],
        hex!("07A0000000620001 08A000000003000000 00 00 00")
    );
    assert_mac(&gp, install);

    assert_eq!(&sent[4][..5], hex!("84E80000FF"));
    assert_eq!(&sent[5][..5], hex!("84E8800141"));

    let mut reassembled = Vec::new();
    for block in &sent[4..] {
        assert_mac(&gp, block);
        reassembled.extend_from_slice(&block[5..block.len() - 8]);
    }
    assert_eq!(reassembled, load_file_data_block(&load_file).unwrap());
}

#[test]
fn load_rejects_missing_final_ack() {
    let mut responses = handshake();
    responses.push(OK.to_vec());
    let mut gp = gp(responses);
    gp.card().unwrap();
    gp.auth().unwrap();

    assert!(matches!(
        gp.load(&hex!("01020304"), 247),
        Err(Error::Apdu(
            cardcheck_apdu_core::Error::UnexpectedResponseData { .. }
        ))
    ));
}

#[test]
fn install_and_make_selectable() {
    let mut responses = handshake();
    responses.push(ACK.to_vec());
    let mut gp = gp(responses);
    gp.card().unwrap();
    gp.auth().unwrap();

    gp.install(
        &hex!("A00000006203010C0101"),
        &hex!("A00000006203010C01"),
        None,
    )
    .unwrap();

    let install = &commands(&gp)[3];
    assert_eq!(&install[..4], hex!("84E60C00"));
    assert_eq!(
        &install[5..install.len() - 8],
        hex!(
            "09A00000006203010C01"
            "0AA00000006203010C0101"
            "0AA00000006203010C0101"
            "0100"
            "02C900"
            "00"
        )
    );
    assert_mac(&gp, install);
}

#[test]
fn no_secure_messaging_leaves_commands_plain() {
    let options = ChannelOptions::default().with_security_level(SecurityLevel::NoSecureMessaging);
    let mut responses = handshake();
    responses.push(OK.to_vec());
    let mut gp = gp_with(options, responses);

    gp.card().unwrap();
    gp.auth().unwrap();
    gp.delete(&hex!("0102030405"), false).unwrap();

    let sent = commands(&gp);
    assert_eq!(
        sent[2].as_ref(),
        hex!("84820000103CE060483AACE927BE1A4733452DEC7A")
    );
    assert_eq!(sent[3].as_ref(), hex!("80E40000074F050102030405"));
}

#[test]
fn send_wraps_only_proprietary_commands() {
    let mut responses = handshake();
    responses.extend([hex!("6F009000").to_vec(), hex!("9F7F2A9000").to_vec()]);
    let mut gp = gp(responses);
    gp.card().unwrap();
    gp.auth().unwrap();

    let (data, sw) = gp.send_hex("00A4040000", "6F00", "9000").unwrap();
    assert_eq!((data.as_str(), sw.as_str()), ("6F00", "9000"));
    assert_eq!(commands(&gp)[3].as_ref(), hex!("00A4040000"));

    let response = gp
        .send(&hex!("80CA9F7F00"), &Expectation::success().name("GET DATA"))
        .unwrap();
    assert_eq!(response.data(), &hex!("9F7F2A"));

    let wrapped = &commands(&gp)[4];
    assert_eq!(wrapped.len(), 5 + 8 + 1);
    assert_eq!(&wrapped[..5], hex!("84CA9F7F08"));
    assert_eq!(wrapped[13], 0x00, "Le kept");
    let keys = gp.channel().context().unwrap().keys();
    assert_eq!(
        command_mac(&wrapped[..5], keys.cmac(), &[0; 8]).unwrap(),
        wrapped[5..13]
    );
}

#[test]
fn card_drops_the_session() {
    let mut responses = handshake();
    responses.extend([FCI.to_vec(), OK.to_vec()]);
    let mut gp = gp(responses);
    gp.card().unwrap();
    gp.auth().unwrap();

    gp.card().unwrap();
    assert_eq!(gp.channel().state(), ChannelState::Unauthenticated);
    gp.delete(&hex!("0102030405"), false).unwrap();
    assert_eq!(commands(&gp)[4].as_ref(), hex!("80E40000074F050102030405"));
}

#[test]
fn cancellation_stops_before_the_next_exchange() {
    let mut gp = gp(handshake());
    gp.card().unwrap();

    let stop = gp.session_mut().stop_handle();
    stop.store(true, Ordering::SeqCst);
    assert!(matches!(
        gp.auth(),
        Err(Error::Apdu(cardcheck_apdu_core::Error::Cancelled))
    ));
    assert!(matches!(
        gp.card(),
        Err(Error::Apdu(cardcheck_apdu_core::Error::Cancelled))
    ));
    assert_eq!(commands(&gp).len(), 1);
}

#[test]
fn configuration_drives_reset_and_keys() {
    let mut config = HarnessConfig::default();
    config.reader.cold_reset = false;
    config.secure_channel.key_version = 0x20;

    let mut gp =
        GlobalPlatform::with_config(MockTransport::new(vec![FCI.to_vec()]), &config).unwrap();
    gp.card().unwrap();
    assert_eq!(gp.session().transport().resets, vec![ResetKind::Warm]);
    assert_eq!(gp.channel().options().key_version, 0x20);

    config.secure_channel.enc = "0011".into();
    assert!(matches!(
        GlobalPlatform::with_config(MockTransport::new(Vec::<Vec<u8>>::new()), &config),
        Err(Error::CryptoInput(_))
    ));
}
