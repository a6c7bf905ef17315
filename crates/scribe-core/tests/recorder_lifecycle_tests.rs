// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]
use std::sync::Arc;
use std::thread;

use scribe_core::{SeqId, TraceRecorder, TransactionRecord, TxId};

fn transaction(id: u64) -> TransactionRecord {
    TransactionRecord {
        id: TxId::from_raw(id),
        origin_uid: 1,
        origin_pid: 2,
        changes: vec![],
    }
}

#[test]
fn enable_then_disable_round_trip() {
    let recorder = TraceRecorder::new();
    assert!(!recorder.is_enabled());
    recorder.enable();
    assert!(recorder.is_enabled());
    recorder.disable();
    assert!(!recorder.is_enabled());
    assert_eq!(recorder.used_bytes(), 0);
}

#[test]
fn snapshot_while_disabled_is_empty() {
    let recorder = TraceRecorder::new();
    let snapshot = recorder.write_snapshot().expect("snapshot");
    assert!(snapshot.is_empty());
}

#[test]
fn events_after_disable_are_dropped() {
    let recorder = TraceRecorder::new();
    recorder.enable();
    recorder.disable();

    recorder.add_committed_transactions(vec![transaction(1)], SeqId::from_raw(1));
    recorder.flush(SeqId::from_raw(1)).expect("flush");
    assert_eq!(recorder.used_bytes(), 0);

    // Re-enabling starts from a clean slate, not from the dropped events.
    recorder.enable();
    let snapshot = recorder.write_snapshot().expect("snapshot");
    assert_eq!(snapshot.entries().len(), 1);
    recorder.disable();
}

#[test]
fn concurrent_producers_export_ascending() {
    let recorder = Arc::new(TraceRecorder::new());
    recorder.enable();

    let mut handles = Vec::new();
    for worker in 0..4i64 {
        let recorder = Arc::clone(&recorder);
        handles.push(thread::spawn(move || {
            for i in 0..16i64 {
                let seq = worker * 16 + i;
                recorder.add_committed_transactions(
                    vec![transaction(u64::try_from(seq).expect("positive"))],
                    SeqId::from_raw(seq),
                );
            }
        }));
    }
    for handle in handles {
        handle.join().expect("producer thread");
    }

    recorder.flush(SeqId::from_raw(i64::MAX)).expect("flush");
    let snapshot = recorder.write_snapshot().expect("snapshot");
    let seqs: Vec<i64> = snapshot.entries()[1..]
        .iter()
        .map(|e| e.seq.value())
        .collect();
    assert_eq!(seqs.len(), 64);
    assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]));

    recorder.disable();
}

#[test]
fn disable_races_cleanly_with_producers() {
    let recorder = Arc::new(TraceRecorder::new());
    recorder.enable();

    let producer = {
        let recorder = Arc::clone(&recorder);
        thread::spawn(move || {
            for seq in 0..256i64 {
                recorder.add_committed_transactions(
                    vec![transaction(u64::try_from(seq).expect("positive"))],
                    SeqId::from_raw(seq),
                );
                let _ = recorder.flush(SeqId::from_raw(seq));
            }
        })
    };

    recorder.disable();
    producer.join().expect("producer thread");

    // Whatever the producer managed to land before the disable is gone,
    // and anything after it was a no-op.
    assert!(!recorder.is_enabled());
    assert_eq!(recorder.used_bytes(), 0);
    let snapshot = recorder.write_snapshot().expect("snapshot");
    assert!(snapshot.is_empty());
}
