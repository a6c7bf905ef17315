// SPDX-License-Identifier: Apache-2.0
//! Trace entry data model and the canonical entry codec.
//!
//! One [`TraceEntry`] records everything committed at a single sequence id:
//! the transactions applied at that commit plus the layer additions and
//! removals observed since the previous entry. Entries are serialized to
//! canonical CBOR before they enter the ring buffer; the serialized length
//! is the byte size the ring accounts against its capacity.
//!
//! Determinism contract
//! - Encoding is `ciborium` CBOR over serde-derived structs with a fixed
//!   field order. Identical entries encode to identical bytes on every
//!   platform; changing a struct's shape is a breaking change to trace
//!   identity.
//! - Field updates are sparse: a [`NodeChange`] carries `Option` per
//!   changeable field, and only present fields participate in a merge. The
//!   wire-visible [`ChangedFields`] mask is derived from presence, never
//!   stored separately, so the two can not disagree.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::ident::{LayerId, SeqId, TxId};

/// Bitmask naming which fields of a [`NodeChange`] are set.
///
/// The mask is derived from field presence via
/// [`NodeChange::changed_fields`]; it exists for export surfaces and
/// diagnostics that want a compact summary of what a change touched.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFields(u32);

impl ChangedFields {
    /// Depth-order (z) value changed.
    pub const Z: Self = Self(1);
    /// 2D offset changed.
    pub const OFFSET: Self = Self(1 << 1);
    /// Opacity changed.
    pub const ALPHA: Self = Self(1 << 2);
    /// Visibility flag changed.
    pub const VISIBLE: Self = Self(1 << 3);

    /// The empty mask.
    pub const NONE: Self = Self(0);

    /// Returns the raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` when every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` when no field bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// 2D offset applied to a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    /// Horizontal offset in the producer's coordinate space.
    pub x: f32,
    /// Vertical offset in the producer's coordinate space.
    pub y: f32,
}

/// Sparse field update for a single layer within one transaction.
///
/// Absent fields were not touched by the transaction and must never
/// overwrite previously known values during consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeChange {
    /// The layer this change applies to.
    pub layer: LayerId,
    /// Depth-order value, when changed.
    pub z: Option<i32>,
    /// 2D offset, when changed.
    pub offset: Option<Offset>,
    /// Opacity, when changed.
    pub alpha: Option<f32>,
    /// Visibility flag, when changed.
    pub visible: Option<bool>,
}

impl NodeChange {
    /// Constructs an empty change for `layer` (no fields set).
    #[must_use]
    pub fn new(layer: LayerId) -> Self {
        Self {
            layer,
            z: None,
            offset: None,
            alpha: None,
            visible: None,
        }
    }

    /// Returns the mask of fields present in this change.
    #[must_use]
    pub fn changed_fields(&self) -> ChangedFields {
        let mut mask = ChangedFields::NONE;
        if self.z.is_some() {
            mask = mask.union(ChangedFields::Z);
        }
        if self.offset.is_some() {
            mask = mask.union(ChangedFields::OFFSET);
        }
        if self.alpha.is_some() {
            mask = mask.union(ChangedFields::ALPHA);
        }
        if self.visible.is_some() {
            mask = mask.union(ChangedFields::VISIBLE);
        }
        mask
    }

    /// Field-wise merge: every field present in `newer` overwrites the
    /// corresponding field of `self`; absent fields leave `self` untouched.
    ///
    /// This is the single primitive the starting-state fold is built on.
    pub fn merge_from(&mut self, newer: &NodeChange) {
        if let Some(z) = newer.z {
            self.z = Some(z);
        }
        if let Some(offset) = newer.offset {
            self.offset = Some(offset);
        }
        if let Some(alpha) = newer.alpha {
            self.alpha = Some(alpha);
        }
        if let Some(visible) = newer.visible {
            self.visible = Some(visible);
        }
    }
}

/// Lifecycle record for a layer added to the scene graph.
///
/// A layer is logically alive from the add event that produced this record
/// until a matching removal is observed or folded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// The layer's identifier.
    pub layer: LayerId,
    /// Display name assigned by the producer.
    pub name: String,
    /// Creation flags, opaque to the recorder.
    pub flags: u32,
    /// Parent layer, or `None` for a root.
    pub parent: Option<LayerId>,
}

/// One transaction submitted by a producer.
///
/// Immutable once committed: the recorder stores committed records as-is
/// and never edits their change lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Identifier unique per submission.
    pub id: TxId,
    /// Uid of the originating principal.
    pub origin_uid: u32,
    /// Pid of the originating principal.
    pub origin_pid: i32,
    /// Layer changes carried by the transaction, in submission order.
    pub changes: Vec<NodeChange>,
}

/// Everything committed at a single sequence id.
///
/// # Invariants
/// - Exactly one entry exists per sequence id.
/// - `added` and `removed` list lifecycle events observed since the
///   previous entry, in observation order; within one entry a given layer
///   never appears out of (add → mutate → remove) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// The commit tick this entry records.
    pub seq: SeqId,
    /// Transactions committed at `seq`, in commit order.
    pub transactions: Vec<TransactionRecord>,
    /// Layers added since the previous entry.
    pub added: Vec<NodeInfo>,
    /// Layers removed since the previous entry.
    pub removed: Vec<LayerId>,
}

/// A serialized [`TraceEntry`] as stored in the ring buffer.
///
/// The sequence id is kept alongside the payload so ordering checks and
/// introspection never require a decode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedEntry {
    /// Sequence id of the encoded entry.
    pub seq: SeqId,
    /// Canonical CBOR payload.
    pub payload: Bytes,
}

impl EncodedEntry {
    /// Byte size accounted against the ring buffer's capacity.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }
}

/// Encodes an entry to its canonical CBOR representation.
///
/// # Errors
/// Returns [`TraceError::Codec`] if serialization fails; the entry types
/// themselves are always encodable, so a failure indicates an allocation
/// or writer error.
pub fn encode_entry(entry: &TraceEntry) -> Result<EncodedEntry, TraceError> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(entry, &mut payload)
        .map_err(|err| TraceError::Codec(err.to_string()))?;
    Ok(EncodedEntry {
        seq: entry.seq,
        payload: Bytes::from(payload),
    })
}

/// Decodes an entry from its canonical CBOR representation.
///
/// # Errors
/// Returns [`TraceError::Codec`] if the payload does not parse back into a
/// [`TraceEntry`]. The ring only ever holds payloads produced by
/// [`encode_entry`], so this indicates internal corruption.
pub fn decode_entry(encoded: &EncodedEntry) -> Result<TraceEntry, TraceError> {
    ciborium::de::from_reader(encoded.payload.as_ref())
        .map_err(|err| TraceError::Codec(err.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    fn change(layer: u32) -> NodeChange {
        NodeChange {
            layer: LayerId::from_raw(layer),
            z: Some(42),
            offset: None,
            alpha: Some(0.5),
            visible: None,
        }
    }

    #[test]
    fn changed_fields_mask_tracks_presence() {
        let c = change(1);
        let mask = c.changed_fields();
        assert!(mask.contains(ChangedFields::Z));
        assert!(mask.contains(ChangedFields::ALPHA));
        assert!(!mask.contains(ChangedFields::OFFSET));
        assert!(!mask.contains(ChangedFields::VISIBLE));

        assert!(NodeChange::new(LayerId::from_raw(1))
            .changed_fields()
            .is_empty());
    }

    #[test]
    fn merge_overwrites_present_fields_only() {
        let mut base = change(1);
        let mut newer = NodeChange::new(LayerId::from_raw(1));
        newer.z = Some(7);
        newer.visible = Some(false);

        base.merge_from(&newer);
        assert_eq!(base.z, Some(7));
        assert_eq!(base.visible, Some(false));
        // Untouched by `newer`: previous values survive.
        assert_eq!(base.alpha, Some(0.5));
        assert_eq!(base.offset, None);
    }

    #[test]
    fn entry_codec_round_trips_and_sizes() {
        let entry = TraceEntry {
            seq: SeqId::from_raw(42),
            transactions: vec![TransactionRecord {
                id: TxId::from_raw(9),
                origin_uid: 1000,
                origin_pid: 1234,
                changes: vec![change(1), change(2)],
            }],
            added: vec![NodeInfo {
                layer: LayerId::from_raw(1),
                name: "parent".to_owned(),
                flags: 123,
                parent: None,
            }],
            removed: vec![LayerId::from_raw(2)],
        };

        let encoded = encode_entry(&entry).expect("encode");
        assert_eq!(encoded.seq, entry.seq);
        assert_eq!(encoded.size_bytes(), encoded.payload.len());
        assert!(encoded.size_bytes() > 0);

        let decoded = decode_entry(&encoded).expect("decode");
        assert_eq!(decoded, entry);
    }

    #[test]
    fn identical_entries_encode_identically() {
        let entry = TraceEntry {
            seq: SeqId::from_raw(1),
            transactions: vec![],
            added: vec![],
            removed: vec![],
        };
        let a = encode_entry(&entry).expect("encode a");
        let b = encode_entry(&entry).expect("encode b");
        assert_eq!(a.payload, b.payload);
    }

    #[test]
    fn decode_rejects_garbage_payload() {
        let encoded = EncodedEntry {
            seq: SeqId::from_raw(1),
            payload: Bytes::from_static(&[0xff, 0x00, 0x13]),
        };
        let result = decode_entry(&encoded);
        assert!(matches!(result, Err(TraceError::Codec(_))));
    }
}
