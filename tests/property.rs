//! Property-based tests for the frame codec and handshake validation.

use std::collections::HashMap;

use proptest::prelude::*;
use wsgate::protocol::{
    Frame, HttpVersion, LengthTier, OpCode, RequestHead, apply_mask, apply_mask_fast,
    compute_accept_key, validate_request,
};
use wsgate::{Config, Error, FrameReader};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn decode(bytes: &[u8]) -> Result<Frame, Error> {
    let config = Config::default();
    block_on(async { FrameReader::new(bytes, &config).read_frame().await })
}

fn data_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![Just(OpCode::Text), Just(OpCode::Binary)]
}

fn control_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![Just(OpCode::Close), Just(OpCode::Ping), Just(OpCode::Pong)]
}

/// Payload lengths sitting on every length-tier boundary.
fn boundary_len_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![
        Just(0usize),
        Just(1),
        Just(125),
        Just(126),
        Just(65535),
        Just(65536),
    ]
}

struct Head {
    method: String,
    headers: HashMap<String, String>,
}

impl RequestHead for Head {
    fn method(&self) -> &str {
        &self.method
    }

    fn version(&self) -> HttpVersion {
        HttpVersion::HTTP_11
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_roundtrip_at_tier_boundaries(
        opcode in data_opcode_strategy(),
        len in boundary_len_strategy(),
        mask in any::<[u8; 4]>(),
        fill in any::<u8>(),
    ) {
        let payload = vec![fill; len];
        let frame = Frame::new(true, opcode, payload.clone());
        let wire = frame.to_bytes(Some(mask));

        let expected_marker = match LengthTier::for_len(len) {
            LengthTier::Inline => len as u8,
            LengthTier::Extended16 => 126,
            LengthTier::Extended64 => 127,
        };
        prop_assert_eq!(wire[1] & 0x7F, expected_marker);
        prop_assert_eq!(wire.len(), frame.wire_size(true));

        let decoded = decode(&wire).unwrap();
        prop_assert!(decoded.fin);
        prop_assert_eq!(decoded.opcode, opcode);
        prop_assert_eq!(decoded.payload(), &payload[..]);
    }

    #[test]
    fn test_roundtrip_unmasked(
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..1000),
    ) {
        let frame = Frame::new(true, opcode, payload.clone());
        let wire = frame.to_bytes(None);
        prop_assert_eq!(wire[0], 0x80 | opcode.as_u8());
        let decoded = decode(&wire).unwrap();
        prop_assert_eq!(decoded.payload(), &payload[..]);
    }

    #[test]
    fn test_mask_is_involution(
        data in prop::collection::vec(any::<u8>(), 0..2048),
        mask in any::<[u8; 4]>(),
    ) {
        let mut scalar = data.clone();
        apply_mask(&mut scalar, mask);
        let mut fast = data.clone();
        apply_mask_fast(&mut fast, mask);
        prop_assert_eq!(&scalar, &fast);

        apply_mask_fast(&mut fast, mask);
        prop_assert_eq!(fast, data);
    }

    #[test]
    fn test_truncated_frame_reports_closed(
        len in 0usize..300,
        cut in any::<prop::sample::Index>(),
    ) {
        let wire = Frame::binary(vec![7u8; len]).to_bytes(Some([1, 2, 3, 4]));
        let cut = cut.index(wire.len());
        prop_assert_eq!(decode(&wire[..cut]), Err(Error::ConnectionClosed));
    }

    #[test]
    fn test_control_frame_limit(
        opcode in control_opcode_strategy(),
        len in 0usize..300,
    ) {
        let wire = Frame::new(true, opcode, vec![0u8; len]).to_bytes(Some([9, 9, 9, 9]));
        let result = decode(&wire);
        if len <= 125 {
            prop_assert_eq!(result.unwrap().payload().len(), len);
        } else {
            prop_assert_eq!(result, Err(Error::ControlFrameTooLarge(len)));
        }
    }

    #[test]
    fn test_random_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&data);
    }

    #[test]
    fn test_accept_key_shape(key in "[A-Za-z0-9+/]{22}==") {
        let accept = compute_accept_key(&key);
        prop_assert_eq!(accept.len(), 28);
        prop_assert!(accept.ends_with('='));
    }

    #[test]
    fn test_handshake_header_values_never_panic(
        upgrade in ".{0,16}",
        connection in ".{0,16}",
        version in ".{0,8}",
        key in ".{0,32}",
    ) {
        let headers = HashMap::from([
            ("upgrade".to_string(), upgrade),
            ("connection".to_string(), connection),
            ("sec-websocket-version".to_string(), version),
            ("sec-websocket-key".to_string(), key),
            ("origin".to_string(), "http://localhost".to_string()),
        ]);
        let head = Head { method: "GET".into(), headers };
        if let Err(error) = validate_request(&head) {
            let expected_kind = matches!(
                error,
                Error::InvalidHandshake(_) | Error::InvalidHeaderValue { .. }
            );
            prop_assert!(expected_kind);
        }
    }

    #[test]
    fn test_header_values_compared_exactly(mask in prop::collection::vec(any::<bool>(), 9)) {
        let flip = |word: &str, offset: usize| -> String {
            word.chars()
                .enumerate()
                .map(|(i, c)| {
                    if mask[(i + offset) % mask.len()] {
                        c.to_ascii_uppercase()
                    } else {
                        c.to_ascii_lowercase()
                    }
                })
                .collect()
        };
        let upgrade = flip("websocket", 0);
        let connection = flip("upgrade", 3);
        let fetch_mode = flip("websocket", 5);
        let exact = upgrade == "websocket" && connection == "Upgrade" && fetch_mode == "websocket";

        let headers = HashMap::from([
            ("upgrade".to_string(), upgrade),
            ("connection".to_string(), connection),
            ("sec-fetch-mode".to_string(), fetch_mode),
            ("sec-websocket-version".to_string(), "13".to_string()),
            ("sec-websocket-key".to_string(), "dGhlIHNhbXBsZSBub25jZQ==".to_string()),
            ("origin".to_string(), "http://localhost".to_string()),
        ]);
        let head = Head { method: "GET".into(), headers };
        prop_assert_eq!(validate_request(&head).is_ok(), exact);
    }
}

#[test]
fn test_7bit_length_boundary() {
    let wire = Frame::binary(vec![0u8; 125]).to_bytes(None);
    assert_eq!(wire[1], 125);
    assert_eq!(wire.len(), 2 + 125);
}

#[test]
fn test_16bit_length_boundary() {
    let wire = Frame::binary(vec![0u8; 65535]).to_bytes(None);
    assert_eq!(wire[1], 126);
    assert_eq!(&wire[2..4], &[0xFF, 0xFF]);
    assert_eq!(wire.len(), 4 + 65535);
}

#[test]
fn test_64bit_length_boundary() {
    let wire = Frame::binary(vec![0u8; 65536]).to_bytes(None);
    assert_eq!(wire[1], 127);
    assert_eq!(&wire[2..10], &65536u64.to_be_bytes());
}
