mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{room_decoder, PatchBuilder};
use proptest::prelude::*;
use schema_sync::{ChangeField, Operation, StateDecoder, Value};

const POOL: std::ops::Range<u32> = 10..16;
const KEYS: &[&str] = &["a", "b", "c"];

#[derive(Debug, Clone)]
enum MapOp {
    Add { position: u32, key: usize, child: u32 },
    DeleteAndAdd { position: u32, key: usize, child: u32 },
    Delete { position: u32 },
    Clear,
}

fn map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        (0u32..4, 0..KEYS.len(), POOL)
            .prop_map(|(position, key, child)| MapOp::Add { position, key, child }),
        (0u32..4, 0..KEYS.len(), POOL)
            .prop_map(|(position, key, child)| MapOp::DeleteAndAdd { position, key, child }),
        (0u32..4).prop_map(|position| MapOp::Delete { position }),
        Just(MapOp::Clear),
    ]
}

#[derive(Debug, Clone)]
enum LeaderOp {
    Add(u32),
    DeleteAndAdd(u32),
    Delete,
}

fn leader_op() -> impl Strategy<Value = LeaderOp> {
    prop_oneof![
        POOL.prop_map(LeaderOp::Add),
        POOL.prop_map(LeaderOp::DeleteAndAdd),
        Just(LeaderOp::Delete),
    ]
}

#[derive(Debug, Clone)]
enum RootWrite {
    Round(u8),
    Motd(&'static str),
}

fn root_write() -> impl Strategy<Value = RootWrite> {
    prop_oneof![
        (0u8..4).prop_map(RootWrite::Round),
        prop::sample::select(vec!["", "hi", "bye"]).prop_map(RootWrite::Motd),
    ]
}

/// Position bindings and entries of the players map, as the server sees them.
#[derive(Default)]
struct MapModel {
    positions: BTreeMap<u32, &'static str>,
    entries: BTreeMap<&'static str, u32>,
}

impl MapModel {
    fn add(&mut self, position: u32, key: &'static str, child: u32) {
        if let Some(old) = self.positions.insert(position, key) {
            if old != key {
                self.entries.remove(old);
            }
        }
        self.positions.retain(|p, k| *p == position || *k != key);
        self.entries.insert(key, child);
    }
}

fn tracked_and_reachable(decoder: &StateDecoder) -> (BTreeSet<u32>, BTreeSet<u32>) {
    let tracked = decoder.refs().ids().collect();
    let reachable = decoder.refs().reachable().into_iter().collect();
    (tracked, reachable)
}

proptest! {
    #[test]
    fn map_slots_conserve_ref_counts(ops in prop::collection::vec(map_op(), 1..40)) {
        let mut decoder = room_decoder();
        decoder
            .apply_patch(&PatchBuilder::new().switch(0).field(Operation::Add, 1).number(1).build(), 0)
            .unwrap();
        let mut model = MapModel::default();

        for op in ops {
            let mut p = PatchBuilder::new();
            p.switch(1);
            match op {
                MapOp::Add { position, key, child } => {
                    p.slot(Operation::Add, position).string(KEYS[key]).number(child as u64);
                    model.add(position, KEYS[key], child);
                }
                MapOp::DeleteAndAdd { position, key, child } => {
                    p.slot(Operation::DeleteAndAdd, position).string(KEYS[key]).number(child as u64);
                    model.add(position, KEYS[key], child);
                }
                MapOp::Delete { position } => {
                    let Some(key) = model.positions.remove(&position) else {
                        continue;
                    };
                    model.entries.remove(key);
                    p.slot(Operation::Delete, position);
                }
                MapOp::Clear => {
                    p.clear();
                    model.positions.clear();
                    model.entries.clear();
                }
            }
            let changes = decoder.apply_patch(&p.build(), 0).unwrap();
            prop_assert!(changes.iter().all(|c| c.ref_id == 1));

            for id in POOL {
                let expected = model.entries.values().filter(|c| **c == id).count() as u32;
                prop_assert_eq!(decoder.ref_count(id), expected, "refId {}", id);
                prop_assert_eq!(decoder.get(id).is_some(), expected > 0, "refId {}", id);
            }
            for key in KEYS {
                let expected = model.entries.get(key).map(|c| Value::Ref(*c));
                prop_assert_eq!(decoder.field(1, key), expected.as_ref());
            }
            let (tracked, reachable) = tracked_and_reachable(&decoder);
            prop_assert_eq!(tracked, reachable);
        }
    }

    #[test]
    fn single_slot_moves_count_once(ops in prop::collection::vec(leader_op(), 1..40)) {
        let mut decoder = room_decoder();
        let mut occupant: Option<u32> = None;

        for op in ops {
            let mut p = PatchBuilder::new();
            p.switch(0);
            match op {
                LeaderOp::Add(child) => {
                    p.field(Operation::Add, 3).number(child as u64);
                    occupant = Some(child);
                }
                LeaderOp::DeleteAndAdd(child) => {
                    p.field(Operation::DeleteAndAdd, 3).number(child as u64);
                    occupant = Some(child);
                }
                LeaderOp::Delete => {
                    p.field(Operation::Delete, 3);
                    occupant = None;
                }
            }
            decoder.apply_patch(&p.build(), 0).unwrap();

            for id in POOL {
                let expected = u32::from(occupant == Some(id));
                prop_assert_eq!(decoder.ref_count(id), expected);
                prop_assert_eq!(decoder.get(id).is_some(), expected == 1);
            }
            prop_assert_eq!(decoder.tracked_len(), 1 + usize::from(occupant.is_some()));
            let (tracked, reachable) = tracked_and_reachable(&decoder);
            prop_assert_eq!(tracked, reachable);
        }
    }

    #[test]
    fn changes_follow_wire_order(writes in prop::collection::vec(root_write(), 1..30)) {
        let mut decoder = room_decoder();
        let mut round = Value::UInt(0);
        let mut motd = Value::from("");
        let mut expected = Vec::new();

        let mut p = PatchBuilder::new();
        p.switch(0);
        for write in writes {
            match write {
                RootWrite::Round(v) => {
                    p.field(Operation::Replace, 0).u8(v);
                    let next = Value::UInt(u64::from(v));
                    if next != round {
                        expected.push((0u8, next.clone()));
                        round = next;
                    }
                }
                RootWrite::Motd(s) => {
                    p.field(Operation::Add, 4).string(s);
                    let next = Value::from(s);
                    if next != motd {
                        expected.push((4u8, next.clone()));
                        motd = next;
                    }
                }
            }
        }
        let changes = decoder.apply_patch(&p.build(), 0).unwrap();
        let seen: Vec<(u8, Value)> = changes
            .iter()
            .filter_map(|c| match &c.field {
                Some(ChangeField::Field { index, .. }) => Some((*index, c.value.clone())),
                _ => None,
            })
            .collect();
        prop_assert_eq!(changes.len(), seen.len());
        prop_assert_eq!(seen, expected);
    }
}
