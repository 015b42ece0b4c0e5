#![allow(dead_code)]

use schema_sync::buffers::{markers, Writer};
use schema_sync::{
    DecoderConfig, ElementKind, FieldKind, Operation, PrimitiveKind, SchemaType, StateDecoder,
    TypeRegistry,
};

pub const ROOM: u32 = 0;
pub const PLAYER: u32 = 1;
pub const VEC2: u32 = 2;
pub const BOT: u32 = 3;

/// Room { round: uint8, players: map<Player>, log: array<string>, leader: Player, motd: string }
/// Player { name: string, hp: int16, pos: Vec2 }
/// Vec2 { x: float32, y: float32 }
/// Bot { name: string, hp: int16, pos: Vec2, level: uint8 }
pub fn room_registry() -> TypeRegistry {
    TypeRegistry::builder()
        .register(
            SchemaType::new(ROOM, "Room")
                .field(0, "round", PrimitiveKind::UInt8)
                .field(1, "players", FieldKind::Map(ElementKind::Schema(PLAYER)))
                .field(2, "log", FieldKind::Array(ElementKind::Primitive(PrimitiveKind::String)))
                .field(3, "leader", FieldKind::Schema(PLAYER))
                .field(4, "motd", PrimitiveKind::String),
        )
        .register(player_type(PLAYER, "Player"))
        .register(
            SchemaType::new(VEC2, "Vec2")
                .field(0, "x", PrimitiveKind::Float32)
                .field(1, "y", PrimitiveKind::Float32),
        )
        .register(player_type(BOT, "Bot").field(3, "level", PrimitiveKind::UInt8))
        .root(ROOM)
        .build()
        .unwrap()
}

fn player_type(id: u32, name: &str) -> SchemaType {
    SchemaType::new(id, name)
        .field(0, "name", PrimitiveKind::String)
        .field(1, "hp", PrimitiveKind::Int16)
        .field(2, "pos", FieldKind::Schema(VEC2))
}

pub fn room_decoder() -> StateDecoder {
    StateDecoder::new(room_registry(), DecoderConfig::default())
}

/// Hand-assembles patch bytes.
#[derive(Default)]
pub struct PatchBuilder {
    w: Writer,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self { w: Writer::new() }
    }

    pub fn switch(&mut self, ref_id: u32) -> &mut Self {
        self.w.u8(markers::SWITCH_TO_STRUCTURE);
        self.w.number_u64(ref_id as u64);
        self
    }

    /// Schema-target operation byte.
    pub fn field(&mut self, op: Operation, index: u8) -> &mut Self {
        self.w.u8(op as u8 | index);
        self
    }

    /// Collection-target operation byte plus its position.
    pub fn slot(&mut self, op: Operation, position: u32) -> &mut Self {
        self.w.u8(op as u8);
        self.w.number_u64(position as u64);
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.w.u8(Operation::Clear as u8);
        self
    }

    pub fn type_hint(&mut self, type_id: u32) -> &mut Self {
        self.w.u8(markers::TYPE_ID);
        self.w.number_u64(type_id as u64);
        self
    }

    pub fn number(&mut self, n: u64) -> &mut Self {
        self.w.number_u64(n);
        self
    }

    pub fn number_f64(&mut self, n: f64) -> &mut Self {
        self.w.number_f64(n);
        self
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.w.string(s);
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.w.u8(v);
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.w.i16(v);
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.w.f32(v);
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.w.buf(bytes);
        self
    }

    pub fn build(&mut self) -> Vec<u8> {
        self.w.flush()
    }
}

/// Patch that creates the players map (refId 1) and puts one player per
/// `(key, refId, name)` entry into it, in order.
pub fn seed_players(players: &[(&str, u32, &str)]) -> Vec<u8> {
    let mut p = PatchBuilder::new();
    p.switch(0).field(Operation::Add, 1).number(1);
    p.switch(1);
    for (position, (key, ref_id, _)) in players.iter().enumerate() {
        p.slot(Operation::Add, position as u32).string(key).number(*ref_id as u64);
    }
    for (_, ref_id, name) in players {
        p.switch(*ref_id).field(Operation::Add, 0).string(name);
    }
    p.build()
}

/// One reflected field: name, type string, referenced type id.
pub type ReflectedField<'a> = (&'a str, &'a str, u32);

/// Encodes a handshake describing `types` with the given root.
pub fn handshake(types: &[(u32, &[ReflectedField<'_>])], root_type: u32) -> Vec<u8> {
    let mut p = PatchBuilder::new();
    let mut next_ref = 1u32;
    let mut alloc = || {
        let id = next_ref;
        next_ref += 1;
        id
    };

    let types_ref = alloc();
    p.switch(0)
        .field(Operation::Add, 0)
        .number(types_ref as u64)
        .field(Operation::Add, 1)
        .number(root_type as u64);

    let mut type_refs = Vec::new();
    p.switch(types_ref);
    for (position, _) in types.iter().enumerate() {
        let type_ref = alloc();
        type_refs.push(type_ref);
        p.slot(Operation::Add, position as u32).number(type_ref as u64);
    }

    for ((id, fields), type_ref) in types.iter().zip(type_refs) {
        let fields_ref = alloc();
        p.switch(type_ref)
            .field(Operation::Add, 0)
            .number(*id as u64)
            .field(Operation::Add, 1)
            .number(fields_ref as u64);
        let mut field_refs = Vec::new();
        p.switch(fields_ref);
        for (position, _) in fields.iter().enumerate() {
            let field_ref = alloc();
            field_refs.push(field_ref);
            p.slot(Operation::Add, position as u32).number(field_ref as u64);
        }
        for ((name, kind, referenced), field_ref) in fields.iter().zip(field_refs) {
            p.switch(field_ref)
                .field(Operation::Add, 0)
                .string(name)
                .field(Operation::Add, 1)
                .string(kind)
                .field(Operation::Add, 2)
                .number(*referenced as u64);
        }
    }
    p.build()
}
