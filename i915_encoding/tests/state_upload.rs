// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! State blocks going through the cache, the differencer and the command
//! buffer into a resolved submission.

use std::collections::HashMap;

use i915_encoding::{
    BatchBuffer, BatchError, BatchSizes, BufferId, Differencer, HwState, IndirectBucket, Segment,
    StateCache,
};

fn state(batch: &mut BatchBuffer, cache: &mut StateCache, blob: &[u32], s2: u32) -> HwState {
    let mut state = HwState::new(1);
    state.immediate[2] = s2;
    state.indirect[IndirectBucket::Static as usize] = cache.upload(batch, blob, &[]).unwrap();
    state
}

#[test]
fn unchanged_state_is_emitted_once() {
    let mut batch = BatchBuffer::new(BatchSizes::default());
    let mut cache = StateCache::new(Segment::OtherIndirect);
    let mut differencer = Differencer::new();

    let first = state(&mut batch, &mut cache, &[7, 8, 9], 0x40);
    let dirty = differencer.emit(&mut batch, &first).unwrap();
    assert!(!dirty.is_empty());
    let used = batch.used(Segment::Immediate);
    assert!(used > 0);

    // The same contents map to the same upload, so nothing is dirty.
    let again = state(&mut batch, &mut cache, &[7, 8, 9], 0x40);
    assert_eq!(again, first);
    assert!(differencer.emit(&mut batch, &again).unwrap().is_empty());
    assert_eq!(batch.used(Segment::Immediate), used);
    assert_eq!(batch.used(Segment::OtherIndirect), 3);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);

    // One register changes: only that register goes out.
    let changed = state(&mut batch, &mut cache, &[7, 8, 9], 0x41);
    let dirty = differencer.emit(&mut batch, &changed).unwrap();
    assert_eq!(dirty.immediate.iter().collect::<Vec<_>>(), [2]);
    assert_eq!(dirty.indirect.iter().count(), 0);
}

#[test]
fn submissions_resolve_every_relocation() {
    let mut batch = BatchBuffer::new(BatchSizes::default());
    let mut cache = StateCache::new(Segment::OtherIndirect);
    let mut differencer = Differencer::new();
    let current = state(&mut batch, &mut cache, &[1, 2, 3, 4], 0);
    differencer.emit(&mut batch, &current).unwrap();
    let mut submission = batch.take();
    assert!(!submission.relocs.is_empty(), "indirect state is referenced by address");

    let addresses: HashMap<BufferId, u32> = submission
        .buffers
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id, 0x10_0000 * (i as u32 + 1)))
        .collect();
    let mut unresolved = submission.clone();
    submission.resolve(|id| addresses.get(&id).copied()).unwrap();
    assert_ne!(submission, unresolved);
    assert!(matches!(
        unresolved.resolve(|_| None),
        Err(BatchError::UnknownBuffer(_))
    ));
    assert!(batch.is_empty());
}
