// SPDX-License-Identifier: Apache-2.0

//! Property: folding evicted entries oldest-first is equivalent, for every
//! layer, to replaying that layer's add/change/remove events one at a time
//! in history order. A layer whose last event is a removal is absent from
//! both consolidated maps.

#![allow(missing_docs)]
use proptest::prelude::*;
use scribe_core::{
    LayerId, NodeChange, NodeInfo, Offset, SeqId, StartingState, TraceEntry, TransactionRecord,
    TxId,
};
use std::collections::BTreeMap;

const LAYER_UNIVERSE: u32 = 4;

fn arb_node_change(layer: u32) -> impl Strategy<Value = NodeChange> {
    (
        proptest::option::of(-100i32..100),
        proptest::option::of((-50.0f32..50.0, -50.0f32..50.0)),
        proptest::option::of(0.0f32..1.0),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(move |(z, offset, alpha, visible)| {
            let mut change = NodeChange::new(LayerId::from_raw(layer));
            change.z = z;
            change.offset = offset.map(|(x, y)| Offset { x, y });
            change.alpha = alpha;
            change.visible = visible;
            change
        })
}

fn arb_changes() -> impl Strategy<Value = Vec<NodeChange>> {
    proptest::collection::vec(
        (0..LAYER_UNIVERSE).prop_flat_map(arb_node_change),
        0..4,
    )
}

fn arb_entry() -> impl Strategy<Value = TraceEntry> {
    (
        proptest::collection::vec(0..LAYER_UNIVERSE, 0..3),
        arb_changes(),
        proptest::collection::vec(0..LAYER_UNIVERSE, 0..2),
    )
        .prop_map(|(added, changes, removed)| TraceEntry {
            // Renumbered ascending by arb_history.
            seq: SeqId::from_raw(0),
            transactions: vec![TransactionRecord {
                id: TxId::from_raw(0),
                origin_uid: 0,
                origin_pid: 0,
                changes,
            }],
            added: added
                .into_iter()
                .map(|layer| NodeInfo {
                    layer: LayerId::from_raw(layer),
                    name: format!("layer-{layer}"),
                    flags: layer,
                    parent: None,
                })
                .collect(),
            removed: removed.into_iter().map(LayerId::from_raw).collect(),
        })
}

fn arb_history() -> impl Strategy<Value = Vec<TraceEntry>> {
    proptest::collection::vec(arb_entry(), 1..8).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, mut entry)| {
                let seq = i64::try_from(i).unwrap_or(0);
                entry.seq = SeqId::from_raw(seq);
                entry.transactions[0].id = TxId::from_raw(u64::try_from(seq).unwrap_or(0));
                entry
            })
            .collect()
    })
}

/// Per-layer single-event replay: the reference model the fold must match.
#[derive(Default)]
struct ReplayModel {
    fields: BTreeMap<LayerId, NodeChange>,
    alive: BTreeMap<LayerId, NodeInfo>,
}

impl ReplayModel {
    fn replay(history: &[TraceEntry]) -> Self {
        let mut model = Self::default();
        for entry in history {
            for info in &entry.added {
                model.alive.insert(info.layer, info.clone());
            }
            for tx in &entry.transactions {
                for change in &tx.changes {
                    let slot = model
                        .fields
                        .entry(change.layer)
                        .or_insert_with(|| NodeChange::new(change.layer));
                    // Event-at-a-time last-writer-wins, field by field.
                    if let Some(z) = change.z {
                        slot.z = Some(z);
                    }
                    if let Some(offset) = change.offset {
                        slot.offset = Some(offset);
                    }
                    if let Some(alpha) = change.alpha {
                        slot.alpha = Some(alpha);
                    }
                    if let Some(visible) = change.visible {
                        slot.visible = Some(visible);
                    }
                }
            }
            for layer in &entry.removed {
                model.alive.remove(layer);
                model.fields.remove(layer);
            }
        }
        model
    }
}

proptest! {
    #[test]
    fn fold_matches_per_layer_replay(history in arb_history()) {
        let mut folded = StartingState::new();
        for entry in &history {
            folded.fold_evicted(entry);
        }
        let model = ReplayModel::replay(&history);

        prop_assert_eq!(folded.fields(), &model.fields);
        prop_assert_eq!(folded.lifecycle(), &model.alive);
    }

    #[test]
    fn removed_layers_are_absent_from_both_maps(history in arb_history()) {
        let mut folded = StartingState::new();
        for entry in &history {
            folded.fold_evicted(entry);
        }

        // For every layer whose last event overall is a removal, neither
        // map may still know it.
        for layer in (0..LAYER_UNIVERSE).map(LayerId::from_raw) {
            let last_removal = history
                .iter()
                .rev()
                .find(|e| {
                    e.removed.contains(&layer)
                        || e.added.iter().any(|i| i.layer == layer)
                        || e.transactions
                            .iter()
                            .any(|t| t.changes.iter().any(|c| c.layer == layer))
                })
                .is_some_and(|e| e.removed.contains(&layer));
            if last_removal {
                prop_assert!(!folded.fields().contains_key(&layer));
                prop_assert!(!folded.lifecycle().contains_key(&layer));
            }
        }
    }
}
