// SPDX-License-Identifier: Apache-2.0
//! scribe-core: bounded-memory commit trace recorder.
//!
//! Records scene-graph state-transition events (transaction commits, layer
//! lifecycle changes) into a byte-capacity-bounded ring of serialized
//! entries. When old entries are evicted to make room, their content is
//! folded into a synthetic starting state so the retained trace stays
//! self-consistent and replayable from entry zero, no matter how long the
//! host compositor has been running.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod entry;
mod error;
mod ident;
mod recorder;
mod ring;
mod snapshot;
mod starting_state;

// Re-exports for stable public API
/// Trace entry data model and the canonical entry codec.
pub use entry::{
    decode_entry, encode_entry, ChangedFields, EncodedEntry, NodeChange, NodeInfo, Offset,
    TraceEntry, TransactionRecord,
};
/// Error taxonomy for recorder operations.
pub use error::TraceError;
/// Core identifier types.
pub use ident::{LayerId, SeqId, TxId};
/// The orchestrating trace recorder engine.
pub use recorder::{TraceRecorder, CONTINUOUS_BUFFER_CAPACITY_BYTES, DEFAULT_BUFFER_CAPACITY_BYTES};
/// Byte-capacity-bounded FIFO of serialized entries.
pub use ring::RingBuffer;
/// Exportable snapshot of the retained trace.
pub use snapshot::TraceSnapshot;
/// Rolling-checkpoint consolidation of evicted history.
pub use starting_state::StartingState;
