mod common;

use common::{handshake, PatchBuilder, ReflectedField};
use schema_sync::{
    decode_handshake, DecodeError, DecoderConfig, ElementKind, FieldKind, Operation,
    PrimitiveKind, StateDecoder,
};
use serde_json::json;

const ROOM_FIELDS: &[ReflectedField<'static>] = &[("round", "uint8", 0), ("players", "map", 1)];
const PLAYER_FIELDS: &[ReflectedField<'static>] = &[
    ("name", "string", 0),
    ("hp", "int16", 0),
    ("tags", "array:string", 0),
];

fn room_handshake() -> Vec<u8> {
    handshake(&[(0, ROOM_FIELDS), (1, PLAYER_FIELDS)], 0)
}

// ---------------------------------------------------------------------------
// Registry reconstruction
// ---------------------------------------------------------------------------

#[test]
fn handshake_builds_registry() {
    let registry = decode_handshake(&room_handshake(), 0, &DecoderConfig::default()).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.root(), 0);

    let room = registry.describe(0).unwrap();
    assert_eq!(room.descriptor(0).unwrap().name, "round");
    assert_eq!(
        room.descriptor(1).unwrap().kind,
        FieldKind::Map(ElementKind::Schema(1))
    );
    let player = registry.describe(1).unwrap();
    assert_eq!(
        player.descriptor_by_name("tags").unwrap().kind,
        FieldKind::Array(ElementKind::Primitive(PrimitiveKind::String))
    );
    assert_eq!(player.descriptor(1).unwrap().kind, FieldKind::Primitive(PrimitiveKind::Int16));
}

#[test]
fn handshake_at_offset() {
    let mut bytes = vec![0x0e, 0x0e, 0x0e];
    bytes.extend(room_handshake());
    let registry = decode_handshake(&bytes, 3, &DecoderConfig::default()).unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn decoder_from_handshake_applies_patches() {
    let mut decoder =
        StateDecoder::from_handshake(&room_handshake(), 0, DecoderConfig::default()).unwrap();
    let patch = PatchBuilder::new()
        .switch(0)
        .field(Operation::Add, 1)
        .number(1)
        .switch(1)
        .slot(Operation::Add, 0)
        .string("k")
        .number(3)
        .switch(3)
        .field(Operation::Add, 0)
        .string("n")
        .field(Operation::Replace, 1)
        .i16(10)
        .build();
    decoder.apply_patch(&patch, 0).unwrap();
    assert_eq!(
        decoder.to_json(),
        json!({"round": 0, "players": {"k": {"name": "n", "hp": 10}}})
    );
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn unknown_type_string_is_unsupported() {
    let bad: &[ReflectedField<'static>] = &[("s", "set", 0)];
    let bytes = handshake(&[(0, bad)], 0);
    assert!(matches!(
        decode_handshake(&bytes, 0, &DecoderConfig::default()),
        Err(DecodeError::UnsupportedKind(_))
    ));
}

#[test]
fn dangling_child_type_is_unsupported() {
    let bad: &[ReflectedField<'static>] = &[("child", "ref", 9)];
    let bytes = handshake(&[(0, bad)], 0);
    assert!(matches!(
        decode_handshake(&bytes, 0, &DecoderConfig::default()),
        Err(DecodeError::UnsupportedKind(_))
    ));
}

#[test]
fn truncated_handshake_is_fatal() {
    let bytes = room_handshake();
    let cut = &bytes[..bytes.len() - 1];
    assert!(matches!(
        StateDecoder::from_handshake(cut, 0, DecoderConfig::default()),
        Err(DecodeError::TruncatedBuffer { .. })
    ));
}

#[test]
fn empty_handshake_has_no_schema() {
    assert_eq!(
        decode_handshake(&[], 0, &DecoderConfig::default()),
        Err(DecodeError::MissingSchema)
    );
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn patch_before_handshake_is_missing_schema() {
    let mut decoder = StateDecoder::awaiting_handshake(DecoderConfig::default());
    assert_eq!(
        decoder.apply_patch(&[0xff, 0x00, 0x00, 0x01], 0),
        Err(DecodeError::MissingSchema)
    );
    decoder.apply_handshake(&room_handshake(), 0).unwrap();
    decoder.apply_patch(&[0xff, 0x00, 0x00, 0x01], 0).unwrap();
    assert_eq!(decoder.to_json(), json!({"round": 1}));
}

#[test]
fn apply_handshake_resets_state() {
    let mut decoder =
        StateDecoder::from_handshake(&room_handshake(), 0, DecoderConfig::default()).unwrap();
    decoder
        .apply_patch(
            &PatchBuilder::new().switch(0).field(Operation::Add, 1).number(1).build(),
            0,
        )
        .unwrap();
    decoder.listeners_mut().on_change(0, |_| {});
    assert_eq!(decoder.tracked_len(), 2);

    decoder.apply_handshake(&room_handshake(), 0).unwrap();
    assert_eq!(decoder.tracked_len(), 1);
    assert!(decoder.listeners().is_empty());
}

#[test]
fn teardown_releases_everything() {
    let mut decoder =
        StateDecoder::from_handshake(&room_handshake(), 0, DecoderConfig::default()).unwrap();
    decoder.teardown();
    assert_eq!(decoder.tracked_len(), 0);
    assert!(decoder.state().is_none());
    assert_eq!(
        decoder.apply_patch(&[0xff, 0x00, 0x00, 0x01], 0),
        Err(DecodeError::MissingSchema)
    );
}
