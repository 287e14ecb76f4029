// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::cmd::{
    i1_load_s, li0_state, sis1_buffer_length, DIS0_BUFFER_VALID, INDIRECT_ADDRESS_MASK,
    LOAD_INDIRECT, LOAD_STATE_IMMEDIATE_1, S0, S0_VB_OFFSET_MASK, SIS0_BUFFER_VALID,
};
use crate::{
    diff, BatchBuffer, BatchError, CommandSink, Dirty, HwState, ImmediateDirty, IndirectBucket,
    IndirectDirty, Segment,
};

/// Dwords needed by the immediate-load packet for `dirty`.
pub fn immediate_packet_size(dirty: ImmediateDirty) -> u32 {
    match dirty.count() {
        0 => 0,
        n => 1 + n,
    }
}

/// Dwords needed by the indirect-load packet for `dirty`.
pub fn indirect_packet_size(dirty: IndirectDirty) -> u32 {
    let body: u32 = dirty
        .iter()
        .map(|b| if b.has_size_dword() { 2 } else { 1 })
        .sum();
    if body == 0 {
        0
    } else {
        1 + body
    }
}

/// Relocations needed to emit `dirty` from `state`.
pub fn relocation_count(state: &HwState, dirty: Dirty) -> u32 {
    let s0 = dirty.immediate.contains(S0) && state.vertex_buffer.is_some();
    s0 as u32 + dirty.indirect.iter().count() as u32
}

/// Writes the immediate-load packet: a selector header followed by one
/// dword per dirty register in register order.
pub fn emit_immediate(sink: &mut impl CommandSink, state: &HwState, dirty: ImmediateDirty) {
    if dirty.count() == 0 {
        return;
    }
    let mut header = LOAD_STATE_IMMEDIATE_1 | (dirty.count() - 1);
    for reg in dirty.iter() {
        header |= i1_load_s(reg);
    }
    sink.dword(header);
    for reg in dirty.iter() {
        match (reg, state.vertex_buffer) {
            (S0, Some(vb)) => sink.reloc(vb, S0_VB_OFFSET_MASK, state.immediate[S0]),
            _ => sink.dword(state.immediate[reg]),
        }
    }
}

/// Writes the indirect-load packet: for each dirty bucket a relocated
/// pointer and, except for dynamic state, a length dword.
pub fn emit_indirect(sink: &mut impl CommandSink, state: &HwState, dirty: IndirectDirty) {
    if dirty.0 == 0 {
        return;
    }
    let mut header = LOAD_INDIRECT | (indirect_packet_size(dirty) - 2);
    for bucket in dirty.iter() {
        header |= li0_state(bucket);
    }
    sink.dword(header);
    for bucket in dirty.iter() {
        let block = state.indirect[bucket as usize];
        let flags = if bucket == IndirectBucket::Dynamic {
            DIS0_BUFFER_VALID
        } else {
            SIS0_BUFFER_VALID
        };
        match block.buffer {
            Some(buffer) => sink.reloc(buffer, INDIRECT_ADDRESS_MASK, (block.offset * 4) | flags),
            None => sink.dword(0),
        }
        if bucket.has_size_dword() {
            sink.dword(sis1_buffer_length(block.size));
        }
    }
}

/// Tracks the state last emitted to the hardware and brings it up to date.
#[derive(Default)]
pub struct Differencer {
    hardware: Option<HwState>,
}

impl Differencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state the hardware is known to hold.
    pub fn hardware(&self) -> Option<&HwState> {
        self.hardware.as_ref()
    }

    /// What `current` needs emitted.
    pub fn dirty(&self, current: &HwState) -> Dirty {
        diff(self.hardware.as_ref(), current)
    }

    /// Forgets the hardware contents so that everything is re-emitted.
    pub fn lost_context(&mut self) {
        self.hardware = None;
    }

    /// Immediate-segment dwords and relocations needed for `current`.
    pub fn cost(&self, current: &HwState) -> (u32, u32) {
        let dirty = self.dirty(current);
        (
            immediate_packet_size(dirty.immediate) + indirect_packet_size(dirty.indirect),
            relocation_count(current, dirty),
        )
    }

    /// Emits the packets taking the hardware to `current`.
    ///
    /// Both packets share one reservation so that they cannot be split
    /// across a flush.
    pub fn emit(&mut self, batch: &mut BatchBuffer, current: &HwState) -> Result<Dirty, BatchError> {
        let dirty = self.dirty(current);
        if dirty.is_empty() {
            return Ok(dirty);
        }
        let size = immediate_packet_size(dirty.immediate) + indirect_packet_size(dirty.indirect);
        let mut packet = batch.reserve(
            Segment::Immediate,
            size,
            relocation_count(current, dirty),
        )?;
        emit_immediate(&mut packet, current, dirty.immediate);
        emit_indirect(&mut packet, current, dirty.indirect);
        drop(packet);
        log::trace!("emitted {size} state dwords for {dirty:?}");
        self.hardware = Some(*current);
        Ok(dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchSizes, BufferId, IndirectRef};

    struct Recorder(Vec<u32>, Vec<(BufferId, u32)>);

    impl CommandSink for Recorder {
        fn dword(&mut self, value: u32) {
            self.0.push(value);
        }

        fn reloc(&mut self, target: BufferId, _mask: u32, delta: u32) {
            self.1.push((target, self.0.len() as u32));
            self.0.push(delta);
        }
    }

    #[test]
    fn immediate_packet_lists_only_dirty_registers() {
        let mut state = HwState::new(0);
        state.immediate[2] = 0x22;
        state.immediate[6] = 0x66;
        let mut dirty = ImmediateDirty::default();
        dirty.insert(2);
        dirty.insert(6);
        let mut rec = Recorder(vec![], vec![]);
        emit_immediate(&mut rec, &state, dirty);
        assert_eq!(
            rec.0,
            [
                LOAD_STATE_IMMEDIATE_1 | i1_load_s(2) | i1_load_s(6) | 1,
                0x22,
                0x66
            ]
        );
        assert_eq!(immediate_packet_size(dirty), 3);
    }

    #[test]
    fn dynamic_bucket_has_no_size_dword() {
        let buffer = BufferId::next();
        let mut state = HwState::new(0);
        state.indirect[IndirectBucket::Dynamic as usize] = IndirectRef {
            buffer: Some(buffer),
            offset: 4,
            size: 6,
        };
        state.indirect[IndirectBucket::Program as usize] = IndirectRef {
            buffer: Some(buffer),
            offset: 10,
            size: 3,
        };
        let mut dirty = IndirectDirty::default();
        dirty.insert(IndirectBucket::Dynamic);
        dirty.insert(IndirectBucket::Program);
        let mut rec = Recorder(vec![], vec![]);
        emit_indirect(&mut rec, &state, dirty);
        assert_eq!(rec.0.len() as u32, indirect_packet_size(dirty));
        assert_eq!(rec.0.len(), 4);
        assert_eq!(rec.0[1], 16 | DIS0_BUFFER_VALID);
        assert_eq!(rec.0[2], 40 | SIS0_BUFFER_VALID);
        assert_eq!(rec.0[3], 2);
        assert_eq!(rec.1.len(), 2);
    }

    #[test]
    fn emit_is_minimal_after_first_upload() {
        let mut batch = BatchBuffer::new(BatchSizes::default());
        let mut differencer = Differencer::new();
        let mut state = HwState::new(1);
        state.immediate[4] = 7;
        let first = differencer.emit(&mut batch, &state).unwrap();
        assert_eq!(first.immediate, ImmediateDirty::ALL);
        assert_eq!(batch.used(Segment::Immediate), 9);

        assert!(differencer.emit(&mut batch, &state).unwrap().is_empty());
        assert_eq!(batch.used(Segment::Immediate), 9);

        state.immediate[4] = 8;
        let (dwords, relocs) = differencer.cost(&state);
        assert_eq!((dwords, relocs), (2, 0));
        differencer.emit(&mut batch, &state).unwrap();
        assert_eq!(batch.used(Segment::Immediate), 11);

        differencer.lost_context();
        assert_eq!(differencer.dirty(&state).immediate, ImmediateDirty::ALL);
    }
}
