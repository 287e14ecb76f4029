// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::BufferId;

/// Number of immediate state registers (S0..S7).
pub const MAX_IMMEDIATE: usize = 8;

/// Kinds of indirect state, each with its own packet cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndirectBucket {
    Static = 0,
    Dynamic = 1,
    Sampler = 2,
    Map = 3,
    Program = 4,
    Constants = 5,
}

impl IndirectBucket {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Static,
        Self::Dynamic,
        Self::Sampler,
        Self::Map,
        Self::Program,
        Self::Constants,
    ];

    /// Whether the indirect-load packet carries a length dword for this
    /// bucket. Dynamic state is delimited by an end pointer instead.
    pub const fn has_size_dword(self) -> bool {
        !matches!(self, Self::Dynamic)
    }
}

/// Location of an uploaded indirect state block.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IndirectRef {
    /// Buffer holding the block.
    pub buffer: Option<BufferId>,
    /// Dword offset within `buffer`.
    pub offset: u32,
    /// Size in dwords. Zero means the bucket is unused.
    pub size: u32,
}

/// Full register state for the next draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HwState {
    /// Generation id. A mismatch means the hardware contents are unknown.
    pub id: u32,
    pub immediate: [u32; MAX_IMMEDIATE],
    /// Buffer that S0 points into. S0 itself holds the byte offset.
    pub vertex_buffer: Option<BufferId>,
    pub indirect: [IndirectRef; IndirectBucket::COUNT],
}

impl HwState {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            immediate: [0; MAX_IMMEDIATE],
            vertex_buffer: None,
            indirect: [IndirectRef::default(); IndirectBucket::COUNT],
        }
    }
}

/// Set of dirty immediate registers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ImmediateDirty(pub u8);

/// Set of dirty indirect buckets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IndirectDirty(pub u8);

impl ImmediateDirty {
    pub const ALL: Self = Self(0xff);

    pub fn contains(self, reg: usize) -> bool {
        self.0 & (1 << reg) != 0
    }

    pub fn insert(&mut self, reg: usize) {
        self.0 |= 1 << reg;
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..MAX_IMMEDIATE).filter(move |&r| self.contains(r))
    }
}

impl IndirectDirty {
    pub fn contains(self, bucket: IndirectBucket) -> bool {
        self.0 & (1 << bucket as u8) != 0
    }

    pub fn insert(&mut self, bucket: IndirectBucket) {
        self.0 |= 1 << bucket as u8;
    }

    pub fn iter(self) -> impl Iterator<Item = IndirectBucket> {
        IndirectBucket::ALL
            .into_iter()
            .filter(move |&b| self.contains(b))
    }
}

/// Registers and buckets that must be re-emitted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Dirty {
    pub immediate: ImmediateDirty,
    pub indirect: IndirectDirty,
}

impl Dirty {
    /// Everything in `state` that can be emitted.
    pub fn all(state: &HwState) -> Self {
        let mut indirect = IndirectDirty::default();
        for bucket in IndirectBucket::ALL {
            if state.indirect[bucket as usize].size != 0 {
                indirect.insert(bucket);
            }
        }
        Self {
            immediate: ImmediateDirty::ALL,
            indirect,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.immediate.0 == 0 && self.indirect.0 == 0
    }

    pub fn union(&mut self, other: Self) {
        self.immediate.0 |= other.immediate.0;
        self.indirect.0 |= other.indirect.0;
    }
}

/// Computes what must be emitted to move the hardware from `hw` to `cur`.
///
/// Indirect buckets compare by upload location only: identical contents
/// always map to the same cached location.
pub fn diff(hw: Option<&HwState>, cur: &HwState) -> Dirty {
    let hw = match hw {
        Some(hw) if hw.id == cur.id => hw,
        _ => return Dirty::all(cur),
    };
    let mut dirty = Dirty::default();
    for reg in 0..MAX_IMMEDIATE {
        if hw.immediate[reg] != cur.immediate[reg] {
            dirty.immediate.insert(reg);
        }
    }
    if hw.vertex_buffer != cur.vertex_buffer {
        dirty.immediate.insert(0);
    }
    for bucket in IndirectBucket::ALL {
        let (old, new) = (
            &hw.indirect[bucket as usize],
            &cur.indirect[bucket as usize],
        );
        if new.size != 0 && (old.buffer, old.offset) != (new.buffer, new.offset) {
            dirty.indirect.insert(bucket);
        }
    }
    dirty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HwState {
        let mut state = HwState::new(3);
        state.immediate = [1, 2, 3, 4, 5, 6, 7, 8];
        state.indirect[IndirectBucket::Static as usize] = IndirectRef {
            buffer: Some(BufferId::next()),
            offset: 16,
            size: 4,
        };
        state
    }

    #[test]
    fn diff_against_self_is_clean() {
        let state = sample();
        assert!(diff(Some(&state), &state).is_empty());
    }

    #[test]
    fn generation_mismatch_marks_everything() {
        let old = sample();
        let mut new = old;
        new.id += 1;
        let dirty = diff(Some(&old), &new);
        assert_eq!(dirty.immediate, ImmediateDirty::ALL);
        assert!(dirty.indirect.contains(IndirectBucket::Static));
        assert_eq!(dirty, diff(None, &new));
    }

    #[test]
    fn zero_sized_buckets_never_dirty() {
        let state = sample();
        let dirty = diff(None, &state);
        assert_eq!(dirty.indirect.iter().count(), 1);
        assert!(!dirty.indirect.contains(IndirectBucket::Dynamic));

        let mut gone = state;
        gone.indirect[IndirectBucket::Static as usize] = IndirectRef::default();
        assert!(diff(Some(&state), &gone).is_empty());
    }

    #[test]
    fn single_register_change() {
        let old = sample();
        let mut new = old;
        new.immediate[4] ^= 0x100;
        new.indirect[IndirectBucket::Static as usize].offset = 32;
        let dirty = diff(Some(&old), &new);
        assert_eq!(dirty.immediate.iter().collect::<Vec<_>>(), [4]);
        assert_eq!(
            dirty.indirect.iter().collect::<Vec<_>>(),
            [IndirectBucket::Static]
        );
    }
}
