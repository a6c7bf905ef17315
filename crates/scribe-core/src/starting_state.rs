// SPDX-License-Identifier: Apache-2.0
//! Rolling-checkpoint consolidation of evicted trace history.
//!
//! When the ring buffer evicts an entry, that entry's events are folded
//! into the [`StartingState`]: layer additions land in the lifecycle map,
//! masked field changes merge into the per-layer consolidated state, and
//! removals erase the layer from both maps. The fold is a deterministic
//! left-fold over the eviction sequence — entries arrive strictly in
//! ascending sequence order and are never reordered — so the starting state
//! is always equivalent to replaying the complete evicted history up to the
//! oldest retained raw entry.
//!
//! Both maps are `BTreeMap`s keyed by [`LayerId`]: snapshot synthesis
//! iterates them directly and inherits a deterministic, ascending-id order
//! without a sort pass.

use std::collections::BTreeMap;

use tracing::trace;

use crate::entry::{NodeChange, NodeInfo, TraceEntry};
use crate::ident::LayerId;

/// Consolidated effect of all evicted history.
///
/// Mutated exclusively through [`StartingState::fold_evicted`]; read-only
/// for snapshot synthesis.
#[derive(Debug, Default)]
pub struct StartingState {
    /// Per-layer consolidated field state.
    fields: BTreeMap<LayerId, NodeChange>,
    /// Layers alive per the folded history, with their lifecycle records.
    lifecycle: BTreeMap<LayerId, NodeInfo>,
}

impl StartingState {
    /// Constructs an empty starting state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one evicted entry into the consolidated maps.
    ///
    /// Called once per evicted entry, strictly in increasing sequence
    /// order, even across separate eviction episodes. Within the entry the
    /// application order is fixed to match causal order inside one commit:
    ///
    /// 1. additions enter the lifecycle map,
    /// 2. each transaction's changes merge field-wise into the per-layer
    ///    state (absent fields never clobber known values),
    /// 3. removals erase the layer from both maps.
    pub fn fold_evicted(&mut self, entry: &TraceEntry) {
        for info in &entry.added {
            self.lifecycle.insert(info.layer, info.clone());
        }
        for transaction in &entry.transactions {
            for change in &transaction.changes {
                self.fields
                    .entry(change.layer)
                    .or_insert_with(|| NodeChange::new(change.layer))
                    .merge_from(change);
            }
        }
        for layer in &entry.removed {
            self.lifecycle.remove(layer);
            self.fields.remove(layer);
        }
        trace!(
            seq = %entry.seq,
            layers = self.fields.len(),
            alive = self.lifecycle.len(),
            "folded evicted entry into starting state"
        );
    }

    /// Consolidated per-layer field state, ascending by layer id.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<LayerId, NodeChange> {
        &self.fields
    }

    /// Lifecycle records of layers alive per the folded history, ascending
    /// by layer id.
    #[must_use]
    pub fn lifecycle(&self) -> &BTreeMap<LayerId, NodeInfo> {
        &self.lifecycle
    }

    /// Returns `true` when no evicted history has been folded (or all of it
    /// has been erased by removals).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.lifecycle.is_empty()
    }

    /// Drops all consolidated state.
    pub(crate) fn clear(&mut self) {
        self.fields.clear();
        self.lifecycle.clear();
    }
}
