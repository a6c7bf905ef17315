// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the trace recorder.

use thiserror::Error;

/// Errors emitted by the recorder and its ring buffer.
///
/// Lifecycle no-ops (mutating calls while disabled, redundant
/// enable/disable, flushing with nothing pending) are not errors and never
/// surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// The requested buffer capacity is not a positive byte count.
    ///
    /// Capacity misconfiguration is reported to the caller rather than
    /// silently clamped; no state is mutated when this is returned.
    #[error("invalid trace buffer capacity: {bytes} bytes")]
    InvalidCapacity {
        /// The rejected capacity value.
        bytes: usize,
    },

    /// A buffered entry failed to encode or decode.
    ///
    /// Entries are encoded by the recorder itself at flush time, so a codec
    /// failure on the decode side indicates internal corruption rather than
    /// bad producer input.
    #[error("entry codec failure: {0}")]
    Codec(String),
}
