// SPDX-License-Identifier: Apache-2.0
//! Exportable snapshot of the retained trace.
//!
//! A snapshot is entry 0 — synthesized from the starting-state maps — then
//! every buffered raw entry in ascending sequence order. It is an owned
//! value: callers never receive a live reference into recorder state.
//!
//! Determinism contract
//! - Entry 0 renders the consolidated field map as at most one synthetic
//!   [`TransactionRecord`] (one [`NodeChange`] per consolidated layer) and
//!   the lifecycle map as the synthetic `added` list, both in ascending
//!   layer-id order.
//! - [`TraceSnapshot::encode`] produces byte-identical output for
//!   identical recorder state; [`TraceSnapshot::digest`] hashes those
//!   canonical bytes so round-trip tests can compare exports cheaply.

use serde::{Deserialize, Serialize};

use crate::entry::{TraceEntry, TransactionRecord};
use crate::error::TraceError;
use crate::ident::{SeqId, TxId};
use crate::starting_state::StartingState;

/// The exportable trace: entry 0 plus all retained raw entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    entries: Vec<TraceEntry>,
}

impl TraceSnapshot {
    /// Assembles a snapshot from the consolidated starting state and the
    /// decoded ring contents (already in ascending sequence order).
    pub(crate) fn from_parts(starting: &StartingState, buffered: Vec<TraceEntry>) -> Self {
        let mut entries = Vec::with_capacity(buffered.len() + 1);
        entries.push(baseline_entry(starting));
        entries.extend(buffered);
        Self { entries }
    }

    /// All entries, entry 0 first, then ascending sequence order.
    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Consumes the snapshot, yielding its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<TraceEntry> {
        self.entries
    }

    /// Returns `true` for the empty export of a disabled recorder.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes the snapshot to canonical CBOR bytes.
    ///
    /// # Errors
    /// Returns [`TraceError::Codec`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, TraceError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| TraceError::Codec(err.to_string()))?;
        Ok(bytes)
    }

    /// BLAKE3 digest of the canonical encoding.
    ///
    /// # Errors
    /// Returns [`TraceError::Codec`] if the canonical encoding fails.
    pub fn digest(&self) -> Result<[u8; 32], TraceError> {
        Ok(blake3::hash(&self.encode()?).into())
    }
}

/// Synthesizes entry 0 from the consolidated maps.
///
/// The synthetic transaction carries no originating principal: id, uid, and
/// pid are all zero. An empty field map yields an empty transaction list
/// rather than an empty synthetic record.
fn baseline_entry(starting: &StartingState) -> TraceEntry {
    let changes: Vec<_> = starting.fields().values().cloned().collect();
    let transactions = if changes.is_empty() {
        Vec::new()
    } else {
        vec![TransactionRecord {
            id: TxId::from_raw(0),
            origin_uid: 0,
            origin_pid: 0,
            changes,
        }]
    };
    TraceEntry {
        seq: SeqId::BASELINE,
        transactions,
        added: starting.lifecycle().values().cloned().collect(),
        removed: Vec::new(),
    }
}
