// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diffing and caching of hardware state.

use anyhow::Result;
use i915_encoding::{
    diff, BatchBuffer, BatchSizes, HwState, IndirectBucket, Segment, StateCache,
};

#[test]
fn state_diffed_against_itself_is_clean() -> Result<()> {
    let mut batch = BatchBuffer::new(BatchSizes::default());
    let mut cache = StateCache::new(Segment::OtherIndirect);
    let mut state = HwState::new(4);
    state.immediate[1] = 0x55;
    state.indirect[IndirectBucket::Map as usize] = cache.upload(&mut batch, &[9, 8, 7], &[])?;
    assert!(diff(Some(&state), &state).is_empty());

    // A different generation means the hardware contents are unknown.
    let next = HwState { id: 5, ..state };
    let dirty = diff(Some(&state), &next);
    assert_eq!(dirty.immediate.count(), 8);
    assert!(dirty.indirect.contains(IndirectBucket::Map));
    Ok(())
}

#[test]
fn identical_packets_are_uploaded_once() -> Result<()> {
    let mut batch = BatchBuffer::new(BatchSizes::default());
    let mut cache = StateCache::new(Segment::OtherIndirect);
    let first = cache.upload(&mut batch, &[1, 2, 3], &[])?;
    let second = cache.upload(&mut batch, &[1, 2, 3], &[])?;
    assert_eq!(first, second);
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(batch.used(Segment::OtherIndirect), 3);

    // Same hash and length, different contents.
    let other = cache.upload(&mut batch, &[3, 2, 1], &[])?;
    assert_ne!(other.offset, first.offset);
    assert_eq!(cache.stats().misses, 2);
    Ok(())
}
