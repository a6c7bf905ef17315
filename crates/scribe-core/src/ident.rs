// SPDX-License-Identifier: Apache-2.0
//! Identifier types for layers, transactions, and commit sequence points.

use serde::{Deserialize, Serialize};

/// Thin wrapper around a transaction identifier.
///
/// Identifiers are opaque and issued by the producing compositor pipeline;
/// the recorder never derives meaning from them beyond equality. External
/// bindings may construct `TxId` values via [`TxId::from_raw`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TxId(u64);

impl TxId {
    /// Constructs a `TxId` from a raw `u64` value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for TxId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly typed identifier for a layer (a node in the producer's scene
/// graph).
///
/// Using a dedicated wrapper prevents accidental mixing of layer ids with
/// the raw integers that flow through transaction payloads.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LayerId(u32);

impl LayerId {
    /// Constructs a `LayerId` from a raw `u32` value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for LayerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commit sequence identifier (e.g. a vsync or frame counter).
///
/// Sequence ids are externally supplied and totally ordered. Producers may
/// submit committed sets tagged with sequence ids in any call order; the
/// recorder guarantees entries are stored and exported in ascending `SeqId`
/// order regardless.
///
/// # Invariants
/// - [`SeqId::BASELINE`] is reserved for the synthetic entry 0 of a
///   snapshot. Producers never submit it; every real commit compares
///   strictly greater than it.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SeqId(i64);

impl SeqId {
    /// Sentinel sequence id carried by the synthetic starting-state entry.
    pub const BASELINE: Self = Self(i64::MIN);

    /// Constructs a `SeqId` from a raw `i64` value.
    #[must_use]
    pub const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Returns `true` for the reserved baseline sentinel.
    #[must_use]
    pub const fn is_baseline(self) -> bool {
        self.0 == i64::MIN
    }
}

impl core::fmt::Display for SeqId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_baseline() {
            write!(f, "baseline")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
