// SPDX-License-Identifier: Apache-2.0
//! The orchestrating trace recorder engine.
//!
//! [`TraceRecorder`] owns every registry the trace is built from: the
//! in-flight (queued) transaction registry, the pending-committed map keyed
//! by sequence id, the live layer registry, the ring buffer, and the
//! starting-state consolidator. One exclusive lock guards the combined
//! state; every public operation is a synchronous, bounded-latency call
//! under that lock. Producers on the compositor pipeline thread and a debug
//! thread calling [`TraceRecorder::write_snapshot`] may race freely.
//!
//! Lifecycle: **Disabled** (initial) → [`enable`](TraceRecorder::enable) →
//! **Enabled** → [`disable`](TraceRecorder::disable) → **Disabled**. Both
//! transitions are idempotent. Enabling resets every registry and starts a
//! housekeeping worker; disabling stops and joins the worker *before*
//! clearing state, so no late worker access races teardown. Mutating calls
//! while disabled are silent no-ops and retain nothing.
//!
//! The worker is auxiliary only: `flush` is synchronous and its effect is
//! visible to `write_snapshot` immediately, with no worker involvement.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::{debug, error, trace};

use crate::entry::{decode_entry, encode_entry, NodeInfo, TraceEntry, TransactionRecord};
use crate::error::TraceError;
use crate::ident::{LayerId, SeqId, TxId};
use crate::ring::RingBuffer;
use crate::snapshot::TraceSnapshot;
use crate::starting_state::StartingState;

/// Default ring capacity for on-demand (active) tracing.
pub const DEFAULT_BUFFER_CAPACITY_BYTES: usize = 512 * 1024;

/// Smaller capacity suited to always-on (continuous) tracing.
pub const CONTINUOUS_BUFFER_CAPACITY_BYTES: usize = 128 * 1024;

/// How often the housekeeping worker samples buffer usage.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shutdown signal for the housekeeping worker.
enum WorkerSignal {
    Shutdown,
}

struct WorkerHandle {
    signal: Sender<WorkerSignal>,
    join: JoinHandle<()>,
}

/// Combined mutable state guarded by the recorder's exclusive lock.
#[derive(Debug)]
struct TraceState {
    /// In-flight transactions, submitted but not yet committed. Purely
    /// diagnostic bookkeeping; never feeds flush or consolidation.
    queued: FxHashMap<TxId, TransactionRecord>,
    /// Committed-but-not-yet-flushed sets, ordered by sequence id so flush
    /// drains ascending keys in one pass.
    pending: BTreeMap<SeqId, Vec<TransactionRecord>>,
    /// Layers currently alive per observed lifecycle events.
    layers: BTreeMap<LayerId, NodeInfo>,
    /// Additions observed since the previous flush.
    pending_added: Vec<NodeInfo>,
    /// Removals observed since the previous flush.
    pending_removed: Vec<LayerId>,
    /// Highest sequence id flushed into the ring so far.
    last_flushed: Option<SeqId>,
    ring: RingBuffer,
    starting: StartingState,
}

impl TraceState {
    fn new(capacity_bytes: usize) -> Result<Self, TraceError> {
        Ok(Self {
            queued: FxHashMap::default(),
            pending: BTreeMap::new(),
            layers: BTreeMap::new(),
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
            last_flushed: None,
            ring: RingBuffer::new(capacity_bytes)?,
            starting: StartingState::new(),
        })
    }

    /// Returns every registry and the ring to empty. The configured ring
    /// capacity is persistent configuration and survives.
    fn reset(&mut self) {
        self.queued.clear();
        self.pending.clear();
        self.layers.clear();
        self.pending_added.clear();
        self.pending_removed.clear();
        self.last_flushed = None;
        self.ring.clear();
        self.starting.clear();
    }
}

/// Bounded-memory recorder of commit and layer-lifecycle events.
///
/// See the [module docs](self) for the lifecycle and locking model. All
/// methods take `&self`; the recorder is `Send + Sync` and is typically
/// shared behind an `Arc` between the compositor pipeline and a debug/dump
/// thread.
pub struct TraceRecorder {
    enabled: Arc<AtomicBool>,
    state: Arc<Mutex<TraceState>>,
    /// Guards the worker handle and serializes enable/disable transitions.
    worker: Mutex<Option<WorkerHandle>>,
}

impl TraceRecorder {
    /// Constructs a disabled recorder with [`DEFAULT_BUFFER_CAPACITY_BYTES`].
    #[must_use]
    pub fn new() -> Self {
        // The default capacity constant is non-zero, so construction can
        // not observe InvalidCapacity.
        match Self::with_capacity(DEFAULT_BUFFER_CAPACITY_BYTES) {
            Ok(recorder) => recorder,
            Err(_) => unreachable!("default capacity is a positive constant"),
        }
    }

    /// Constructs a disabled recorder bounded to `capacity_bytes`.
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidCapacity`] when `capacity_bytes` is
    /// zero.
    pub fn with_capacity(capacity_bytes: usize) -> Result<Self, TraceError> {
        Ok(Self {
            enabled: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(TraceState::new(capacity_bytes)?)),
            worker: Mutex::new(None),
        })
    }

    /// Returns `true` while the recorder is accepting events.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Transitions to Enabled: resets every registry and starts the
    /// housekeeping worker. No-op when already enabled.
    pub fn enable(&self) {
        let mut worker = lock(&self.worker);
        if self.enabled.load(Ordering::Acquire) {
            return;
        }
        lock(&self.state).reset();
        *worker = spawn_worker(Arc::clone(&self.state));
        self.enabled.store(true, Ordering::Release);
        debug!("transaction tracing enabled");
    }

    /// Transitions to Disabled: stops and joins the worker, then clears
    /// every registry and the ring contents. No-op when already disabled.
    ///
    /// The join happens before any registry is cleared, so no late
    /// worker-driven access races the teardown. The configured ring
    /// capacity survives for the next enable.
    pub fn disable(&self) {
        let mut worker = lock(&self.worker);
        if !self.enabled.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = worker.take() {
            // The worker also exits on channel disconnect; the explicit
            // signal just avoids waiting out a poll interval.
            let _ = handle.signal.send(WorkerSignal::Shutdown);
            if handle.join.join().is_err() {
                error!("trace housekeeping worker panicked before join");
            }
        }
        lock(&self.state).reset();
        debug!("transaction tracing disabled");
    }

    /// Registers a submitted-but-not-yet-committed transaction in the
    /// in-flight registry. Re-submission under the same id replaces the
    /// previous record. No-op while disabled.
    pub fn add_queued_transaction(&self, transaction: TransactionRecord) {
        let Some(mut state) = self.enabled_state() else {
            return;
        };
        state.queued.insert(transaction.id, transaction);
    }

    /// Appends `transactions` to the pending-committed set for `seq`.
    ///
    /// Sets already pending under `seq` are extended, never replaced. Call
    /// order across sequence ids is irrelevant; only flush order matters.
    /// Committed ids leave the in-flight registry. No-op while disabled.
    pub fn add_committed_transactions(&self, transactions: Vec<TransactionRecord>, seq: SeqId) {
        let Some(mut state) = self.enabled_state() else {
            return;
        };
        for transaction in &transactions {
            state.queued.remove(&transaction.id);
        }
        state.pending.entry(seq).or_default().extend(transactions);
    }

    /// Registers a layer addition: enters the live registry immediately
    /// and rides on the next flush's first entry. No-op while disabled.
    pub fn on_layer_added(
        &self,
        layer: LayerId,
        name: &str,
        flags: u32,
        parent: Option<LayerId>,
    ) {
        let Some(mut state) = self.enabled_state() else {
            return;
        };
        let info = NodeInfo {
            layer,
            name: name.to_owned(),
            flags,
            parent,
        };
        state.layers.insert(layer, info.clone());
        state.pending_added.push(info);
    }

    /// Registers a layer removal: leaves the live registry immediately and
    /// rides on the next flush's first entry. No-op while disabled.
    pub fn on_layer_removed(&self, layer: LayerId) {
        let Some(mut state) = self.enabled_state() else {
            return;
        };
        state.layers.remove(&layer);
        state.pending_removed.push(layer);
    }

    /// Drains every pending-committed key `k <= up_to` in ascending order,
    /// building one entry per key and pushing it into the ring. Evictions
    /// triggered by the pushes fold into the starting state, oldest first.
    ///
    /// Layer additions/removals observed since the previous flush ride on
    /// the first entry built here. Keys above `up_to` stay pending for a
    /// later flush. A flush with nothing pending is a no-op. No-op while
    /// disabled.
    ///
    /// # Errors
    /// Returns [`TraceError::Codec`] if an entry fails to encode, or if an
    /// evicted entry fails to decode for folding (internal corruption).
    pub fn flush(&self, up_to: SeqId) -> Result<(), TraceError> {
        let Some(mut state) = self.enabled_state() else {
            return Ok(());
        };
        let drained = if up_to.value() == i64::MAX {
            std::mem::take(&mut state.pending)
        } else {
            let kept = state.pending.split_off(&SeqId::from_raw(up_to.value() + 1));
            std::mem::replace(&mut state.pending, kept)
        };
        if drained.is_empty() {
            return Ok(());
        }

        let mut lifecycle = Some((
            std::mem::take(&mut state.pending_added),
            std::mem::take(&mut state.pending_removed),
        ));
        let entry_count = drained.len();

        let TraceState {
            ring,
            starting,
            last_flushed,
            ..
        } = &mut *state;

        for (seq, transactions) in drained {
            debug_assert!(
                last_flushed.is_none_or(|prev| prev < seq),
                "flush must push strictly ascending sequence ids"
            );
            let (added, removed) = lifecycle.take().unwrap_or_default();
            let entry = TraceEntry {
                seq,
                transactions,
                added,
                removed,
            };
            let encoded = encode_entry(&entry)?;
            ring.push(encoded, |evicted| {
                let decoded = decode_entry(&evicted)?;
                starting.fold_evicted(&decoded);
                Ok(())
            })?;
            *last_flushed = Some(seq);
        }
        debug!(entries = entry_count, up_to = %up_to, "flushed committed transactions");
        Ok(())
    }

    /// Rebounds the ring buffer to `capacity_bytes`.
    ///
    /// Capacity is persistent configuration: it is validated and stored
    /// even while disabled and survives disable/enable cycles. Shrinking
    /// below current usage evicts (and folds) immediately.
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidCapacity`] for a zero capacity, before
    /// any state is touched, or [`TraceError::Codec`] if folding an evicted
    /// entry fails.
    pub fn set_buffer_size(&self, capacity_bytes: usize) -> Result<(), TraceError> {
        let mut state = lock(&self.state);
        let TraceState { ring, starting, .. } = &mut *state;
        ring.set_capacity(capacity_bytes, |evicted| {
            let decoded = decode_entry(&evicted)?;
            starting.fold_evicted(&decoded);
            Ok(())
        })
    }

    /// Assembles the exportable trace: a synthetic entry 0 built from the
    /// starting state, then every buffered entry in ascending sequence
    /// order. Returns an owned value, never a live view of internal state.
    /// An empty snapshot is returned while disabled.
    ///
    /// # Errors
    /// Returns [`TraceError::Codec`] if a buffered entry fails to decode
    /// (internal corruption).
    pub fn write_snapshot(&self) -> Result<TraceSnapshot, TraceError> {
        let Some(state) = self.enabled_state() else {
            return Ok(TraceSnapshot::default());
        };
        let buffered = state
            .ring
            .iter()
            .map(decode_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TraceSnapshot::from_parts(&state.starting, buffered))
    }

    /// Current ring buffer usage in bytes.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        lock(&self.state).ring.used()
    }

    /// Configured ring buffer capacity in bytes.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        lock(&self.state).ring.capacity()
    }

    /// Sequence id of the oldest retained raw entry, or `None` when the
    /// ring is empty. Diagnostic surface for hosts deciding whether the
    /// window still covers an incident.
    #[must_use]
    pub fn oldest_buffered_seq(&self) -> Option<SeqId> {
        lock(&self.state).ring.front().map(|entry| entry.seq)
    }

    /// Locks the combined state, confirming the recorder is still enabled.
    ///
    /// The enabled flag is sampled again after the lock is held: a
    /// `disable()` racing the unlocked fast check performs its teardown
    /// under this same lock, so the locked re-check is authoritative and
    /// no event can land in a registry after it was cleared.
    fn enabled_state(&self) -> Option<MutexGuard<'_, TraceState>> {
        if !self.is_enabled() {
            return None;
        }
        let guard = lock(&self.state);
        self.is_enabled().then_some(guard)
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TraceRecorder {
    fn drop(&mut self) {
        self.disable();
    }
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// All state behind these locks is kept consistent per-operation, so a
/// poisoned lock carries no torn invariants worth aborting over.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawns the housekeeping worker.
///
/// The worker periodically samples buffer usage for diagnostics. It exits
/// on the shutdown signal or when the sender disconnects. A spawn failure
/// is logged and tolerated: the recorder works without its worker.
fn spawn_worker(state: Arc<Mutex<TraceState>>) -> Option<WorkerHandle> {
    let (signal, inbox) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("scribe-housekeeping".to_owned())
        .spawn(move || loop {
            match inbox.recv_timeout(WORKER_POLL_INTERVAL) {
                Ok(WorkerSignal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    let guard = lock(&state);
                    trace!(
                        used = guard.ring.used(),
                        entries = guard.ring.len(),
                        "trace buffer usage"
                    );
                }
            }
        });
    match spawned {
        Ok(join) => Some(WorkerHandle { signal, join }),
        Err(err) => {
            error!(%err, "failed to spawn trace housekeeping worker");
            None
        }
    }
}
