//! BGP packet parsing tests

use super::capability::*;
use super::endec::BgpCodec;
use super::*;
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

fn convert_one_hex_digit(c: u8) -> u8 {
    if c.is_ascii_digit() {
        c - b'0'
    } else if (b'a'..=b'f').contains(&c) {
        c - b'a' + 10
    } else if (b'A'..=b'F').contains(&c) {
        c - b'A' + 10
    } else {
        panic!("invalid hex character: {}", c as char);
    }
}

pub fn hex_to_bytes(hex: &str) -> Bytes {
    let hex = hex.as_bytes();
    // Skip these characters on octet boundary
    const SKIP: &[u8] = b" \t\n\r:.";
    let mut octets = BytesMut::with_capacity(hex.len() / 2);
    let mut i = 0;
    while i < hex.len() {
        let c = hex[i];
        if SKIP.contains(&c) {
            i += 1;
            continue;
        }
        let hi = convert_one_hex_digit(c) << 4;
        assert!(i + 1 < hex.len(), "odd number of hex digits");
        let lo = convert_one_hex_digit(hex[i + 1]);
        octets.put_u8(hi | lo);
        i += 2;
    }
    octets.freeze()
}

#[test]
fn test_sanity_hex_to_bytes() {
    assert_eq!(hex_to_bytes("00"), Bytes::from_static(&[0x00]));
    assert_eq!(hex_to_bytes("01"), Bytes::from_static(&[0x01]));
    assert_eq!(hex_to_bytes("ff"), Bytes::from_static(&[0xff]));
    assert_eq!(hex_to_bytes("00ff"), Bytes::from_static(&[0x00, 0xff]));
    assert_eq!(hex_to_bytes("ff00"), Bytes::from_static(&[0xff, 0x00]));
    assert_eq!(
        hex_to_bytes("ff 00\tff"),
        Bytes::from_static(&[0xff, 0x00, 0xff])
    );
}

#[test]
fn test_empty_input() {
    let mut codec = BgpCodec;
    let mut bmut = BytesMut::new();
    assert_eq!(codec.decode(&mut bmut).unwrap(), None);
    assert!(bmut.is_empty());
}

#[test]
fn test_keepalive_message() {
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff001304");
    assert_eq!(data.len(), 19);
    let mut bmut = data.clone().into();
    let mut codec = BgpCodec;
    let msg = codec.decode(&mut bmut).unwrap().unwrap();
    assert_eq!(msg, Message::Keepalive);
    let mut bmut = BytesMut::new();
    codec.encode(Message::Keepalive, &mut bmut).unwrap();
    assert_eq!(bmut.freeze(), data);
}

#[test]
fn test_open_message_wsh_1() {
    // Dumped from a real BGP session (Wireshark and BIRD)
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 001d 01 04 fd7d 0078 ac1706a5 00");
    let mut bmut = data.clone().into();
    let mut codec = BgpCodec;
    let msg = codec.decode(&mut bmut).unwrap().unwrap();
    let Message::Open(msg) = msg else {
        panic!("unexpected message type");
    };
    assert_eq!(msg.version, 4);
    assert_eq!(msg.asn, 64893);
    assert_eq!(msg.hold_time, 120);
    assert_eq!(msg.bgp_id, Ipv4Addr::new(172, 23, 6, 165));
    assert_eq!(msg.opt_params.len(), 0);
    let mut bmut = BytesMut::new();
    codec.encode(Message::Open(msg), &mut bmut).unwrap();
    assert_eq!(bmut.freeze(), data);
}

#[test]
fn test_open_message_wsh_2() {
    // Dumped from a real BGP session (Wireshark and BIRD)
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff004501045ba000f0ac1706a2280226010400010001010400020001020005060001000100020600400200784104fcde349d46004700");
    let mut bmut = data.clone().into();
    let mut codec = BgpCodec;
    let msg = codec.decode(&mut bmut).unwrap().unwrap();
    let Message::Open(msg) = msg else {
        panic!("unexpected message type");
    };
    assert_eq!(msg.version, 4);
    assert_eq!(msg.asn, AS_TRANS);
    assert_eq!(msg.hold_time, 240);
    assert_eq!(msg.bgp_id, Ipv4Addr::new(172, 23, 6, 162));
    let OptionalParameterValue::Capabilities(cap) = msg.opt_params.first().unwrap() else {
        panic!("expected a capability parameter");
    };
    // Decoded capabilities appear in wire order
    assert_eq!(cap.len(), 9);
    assert_eq!(
        *cap.first().unwrap(),
        capability::Value::MultiProtocol(MultiProtocol {
            afi: Afi::Ipv4,
            safi: Safi::Unicast,
        })
    );
    assert_eq!(
        *cap.get(1).unwrap(),
        capability::Value::MultiProtocol(MultiProtocol {
            afi: Afi::Ipv6,
            safi: Safi::Unicast,
        })
    );
    assert_eq!(*cap.get(2).unwrap(), capability::Value::RouteRefresh);
    // Extended next hop and extended message are not interpreted here
    assert_eq!(
        *cap.get(3).unwrap(),
        capability::Value::Unsupported(
            0x05,
            Bytes::from_static(&[0x00, 0x01, 0x00, 0x01, 0x00, 0x02])
        )
    );
    assert_eq!(
        *cap.get(4).unwrap(),
        capability::Value::Unsupported(0x06, Bytes::from_static(&[]))
    );
    assert_eq!(
        *cap.get(5).unwrap(),
        capability::Value::GracefulRestart(GracefulRestart {
            restart: false,
            restart_time: 120,
        })
    );
    assert_eq!(
        *cap.get(6).unwrap(),
        capability::Value::FourOctetAsNumber(FourOctetAsNumber { asn: 4_242_420_893 })
    );
    assert_eq!(
        *cap.get(7).unwrap(),
        capability::Value::Unsupported(0x46, Bytes::from_static(&[]))
    );
    assert_eq!(
        *cap.get(8).unwrap(),
        capability::Value::Unsupported(0x47, Bytes::from_static(&[]))
    );
    let mut bmut = BytesMut::new();
    codec.encode(Message::Open(msg), &mut bmut).unwrap();
    assert_eq!(bmut.freeze(), data);
}

#[test]
fn test_open_message_two_capabilities() {
    let open = Open::new(
        100,
        180,
        Ipv4Addr::from(1),
        CapabilitiesBuilder::new()
            .mp_ipv4_unicast()
            .four_octet_as_number(100)
            .build(),
    );
    let mut codec = BgpCodec;
    let mut bmut = BytesMut::new();
    codec.encode(Message::Open(open.clone()), &mut bmut).unwrap();
    assert_eq!(
        bmut.clone().freeze(),
        hex_to_bytes(
            "ffffffffffffffffffffffffffffffff 002b 01
             04 0064 00b4 00000001 0e
             02 0c 0104 0001 0001 4104 00000064"
        )
    );
    let msg = codec.decode(&mut bmut).unwrap().unwrap();
    assert!(bmut.is_empty());
    let Message::Open(decoded) = msg else {
        panic!("unexpected message type");
    };
    assert_eq!(decoded, open);
    let OptionalParameterValue::Capabilities(cap) = decoded.opt_params.first().unwrap() else {
        panic!("expected a capability parameter");
    };
    assert!(cap.has_mp_ipv4_unicast());
    assert_eq!(cap.four_octet_as_number(), Some(100));
}

#[test]
fn test_open_message_empty_body() {
    // A bare header is only ever a KEEPALIVE; an OPEN needs a body
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 0013 01");
    let mut bmut = data.into();
    let mut codec = BgpCodec;
    let err = codec.decode(&mut bmut).unwrap_err();
    assert!(matches!(err, Error::MalformedOpen));
    let notification = err.notification().unwrap();
    assert_eq!(
        notification.code(),
        Some(NotificationErrorCode::OpenMessageError)
    );
    assert_eq!(
        notification.error_subcode,
        OpenMessageErrorSubcode::UnsupportedOptionalParameter as u8
    );
}

#[test]
fn test_open_message_bad_params_len() {
    // Parameter length claims one more octet than the body carries
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 0022 01 04 0064 00b4 00000001 06 02 03 41 01 00");
    let mut bmut = data.into();
    let mut codec = BgpCodec;
    let err = codec.decode(&mut bmut).unwrap_err();
    assert!(matches!(err, Error::MalformedOpen));
    assert_eq!(
        err.notification().unwrap().code(),
        Some(NotificationErrorCode::OpenMessageError)
    );
}

#[test]
fn test_open_message_unparseable_capability_kept_raw() {
    // Four-octet AS number capability with a truncated value: the whole
    // parameter falls back to its raw octets and the message re-encodes
    // byte-exact.
    let data = hex_to_bytes(
        "ffffffffffffffffffffffffffffffff 0022 01 04 0064 00b4 00000001 05 02 03 41 01 00",
    );
    let mut bmut = data.clone().into();
    let mut codec = BgpCodec;
    let msg = codec.decode(&mut bmut).unwrap().unwrap();
    let Message::Open(msg) = msg else {
        panic!("unexpected message type");
    };
    assert_eq!(
        *msg.opt_params.first().unwrap(),
        OptionalParameterValue::Unsupported(0x02, Bytes::from_static(&[0x41, 0x01, 0x00]))
    );
    let mut bmut = BytesMut::new();
    codec.encode(Message::Open(msg), &mut bmut).unwrap();
    assert_eq!(bmut.freeze(), data);
}

#[test]
fn test_update_message_wsh_1() {
    // Dumped from a real BGP session (Wireshark and BIRD); the body is
    // carried raw and re-encodes byte-exact.
    let data = hex_to_bytes(
        "
    ffffffffffffffffffffffffffffffff 0042 02 0000 001b
    40 01 01 00
    40 02 04 0201 fd7d
    40 03 04 ac1706a5
    c0 11 06 0201 0000fd7d
    162dff30
    162dfe30
    162d7b80
    18cb0486",
    );
    let mut bmut = data.clone().into();
    let mut codec = BgpCodec;
    let msg = codec.decode(&mut bmut).unwrap().unwrap();
    let Message::Update(msg) = msg else {
        panic!("unexpected message type");
    };
    assert_eq!(msg.0.len(), 0x42 - 19);
    assert_eq!(&msg.0[..2], &[0x00, 0x00]);
    let mut bmut = BytesMut::new();
    codec.encode(Message::Update(msg), &mut bmut).unwrap();
    assert_eq!(bmut.freeze(), data);
}

#[test]
fn test_notification_message_wsh_1() {
    // Dumped from a real BGP session (Wireshark and BIRD)
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 0015 03 06 02");
    let mut bmut = data.clone().into();
    let mut codec = BgpCodec;
    let msg = codec.decode(&mut bmut).unwrap().unwrap();
    let Message::Notification(msg) = msg else {
        panic!("unexpected message type");
    };
    assert_eq!(msg.code(), Some(NotificationErrorCode::Cease));
    assert_eq!(msg.error_subcode, 2);
    assert_eq!(msg.data, Bytes::from_static(&[]));
    assert_eq!(msg.to_string(), "Cease(2)");
    let mut bmut = BytesMut::new();
    codec.encode(Message::Notification(msg), &mut bmut).unwrap();
    assert_eq!(bmut.freeze(), data);
}

#[test]
fn test_bad_message_length() {
    // Declared length below the header size
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 0012 01");
    let mut bmut = data.into();
    let mut codec = BgpCodec;
    let err = codec.decode(&mut bmut).unwrap_err();
    assert!(matches!(err, Error::BadMessageLength(18)));
    let notification = err.notification().unwrap();
    assert_eq!(
        notification.code(),
        Some(NotificationErrorCode::MessageHeaderError)
    );
    assert_eq!(
        notification.error_subcode,
        MessageHeaderErrorSubcode::BadMessageLength as u8
    );
    assert_eq!(notification.data, Bytes::from_static(&[0x00, 0x12]));
}

#[test]
fn test_oversized_message_length() {
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 1001 02");
    let mut bmut = data.into();
    let mut codec = BgpCodec;
    let err = codec.decode(&mut bmut).unwrap_err();
    assert!(matches!(err, Error::BadMessageLength(0x1001)));
}

#[test]
fn test_bad_message_type() {
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 0013 f0");
    let mut bmut: BytesMut = data.into();
    // A later valid message must survive the bad frame
    let mut codec = BgpCodec;
    codec.encode(Message::Keepalive, &mut bmut).unwrap();
    let err = codec.decode(&mut bmut).unwrap_err();
    assert!(matches!(err, Error::BadMessageType(0xf0)));
    let notification = err.notification().unwrap();
    assert_eq!(
        notification.code(),
        Some(NotificationErrorCode::MessageHeaderError)
    );
    assert_eq!(
        notification.error_subcode,
        MessageHeaderErrorSubcode::BadMessageType as u8
    );
    assert_eq!(notification.data, Bytes::from_static(&[0xf0]));
    assert_eq!(codec.decode(&mut bmut).unwrap(), Some(Message::Keepalive));
    assert!(bmut.is_empty());
}

#[test]
fn test_non_marker_prefix() {
    let mut codec = BgpCodec;
    let mut bmut = BytesMut::new();
    // Fewer octets than a header: everything stays buffered as the tail
    bmut.extend_from_slice(&hex_to_bytes("00000000 00000001 00000002 00000003"));
    assert_eq!(codec.decode(&mut bmut).unwrap(), None);
    assert_eq!(bmut.len(), 16);
    // With a full header's worth of octets the stream is not synchronized
    bmut.extend_from_slice(&[0x00, 0x00, 0x00]);
    let err = codec.decode(&mut bmut).unwrap_err();
    assert!(matches!(err, Error::NotSynchronized));
    assert_eq!(
        err.notification().unwrap().error_subcode,
        MessageHeaderErrorSubcode::ConnectionNotSynchronized as u8
    );
    assert!(bmut.is_empty());
}

#[test]
fn test_partial_message_keeps_tail() {
    let data = hex_to_bytes("ffffffffffffffffffffffffffffffff 001d 01 04 fd7d 0078 ac1706a5 00");
    let mut codec = BgpCodec;
    let mut bmut = BytesMut::new();
    bmut.extend_from_slice(&data[..20]);
    // The fragment is not consumed
    assert_eq!(codec.decode(&mut bmut).unwrap(), None);
    assert_eq!(bmut.len(), 20);
    bmut.extend_from_slice(&data[20..]);
    assert!(matches!(
        codec.decode(&mut bmut).unwrap(),
        Some(Message::Open(_))
    ));
    assert!(bmut.is_empty());
}

/// Decode every complete message in the buffer.
fn drain(codec: &mut BgpCodec, src: &mut BytesMut) -> Vec<Message> {
    let mut messages = Vec::new();
    while let Some(msg) = codec.decode(src).unwrap() {
        messages.push(msg);
    }
    messages
}

#[test]
fn test_two_messages_concatenated() {
    let open = Open::new(
        100,
        180,
        Ipv4Addr::from(1),
        CapabilitiesBuilder::new().mp_ipv4_unicast().build(),
    );
    let mut codec = BgpCodec;
    let mut bmut = BytesMut::new();
    codec.encode(Message::Open(open.clone()), &mut bmut).unwrap();
    codec.encode(Message::Keepalive, &mut bmut).unwrap();
    let messages = drain(&mut codec, &mut bmut);
    // Wire order is preserved
    assert_eq!(messages, vec![Message::Open(open), Message::Keepalive]);
    assert!(bmut.is_empty());
}

#[test]
fn test_streaming_decode_any_split() {
    let open = Open::new(
        65551,
        90,
        Ipv4Addr::new(192, 0, 2, 1),
        CapabilitiesBuilder::new()
            .mp_ipv4_unicast()
            .four_octet_as_number(65551)
            .build(),
    );
    let mut codec = BgpCodec;
    let mut stream = BytesMut::new();
    codec.encode(Message::Open(open), &mut stream).unwrap();
    codec.encode(Message::Keepalive, &mut stream).unwrap();
    codec
        .encode(
            Message::Notification(Notification::new(
                NotificationErrorCode::Cease,
                2,
                Bytes::new(),
            )),
            &mut stream,
        )
        .unwrap();
    let stream = stream.freeze();
    let expected = drain(&mut codec, &mut stream.clone().into());
    assert_eq!(expected.len(), 3);
    // Feeding any two-way split of the stream yields the same messages
    for split in 0..=stream.len() {
        let mut bmut = BytesMut::new();
        let mut messages = Vec::new();
        bmut.extend_from_slice(&stream[..split]);
        messages.extend(drain(&mut codec, &mut bmut));
        bmut.extend_from_slice(&stream[split..]);
        messages.extend(drain(&mut codec, &mut bmut));
        assert_eq!(messages, expected, "split at {split}");
        assert!(bmut.is_empty());
    }
}
