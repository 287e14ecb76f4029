// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Identifier of a buffer object referenced by the command stream.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BufferId(pub NonZeroU64);

impl BufferId {
    /// Returns a process-unique id.
    pub fn next() -> Self {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }
}

/// Logical region of the command buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Commands executed in order.
    Immediate,
    /// Dynamic indirect state, addressed by an end pointer.
    DynamicIndirect,
    /// Every other kind of indirect state.
    OtherIndirect,
}

impl Segment {
    pub const ALL: [Self; 3] = [Self::Immediate, Self::DynamicIndirect, Self::OtherIndirect];

    const fn index(self) -> usize {
        self as usize
    }
}

/// A dword to be patched with a buffer address at submission.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Relocation {
    /// Buffer containing the dword.
    pub source: BufferId,
    /// Dword offset within `source`.
    pub offset: u32,
    /// Buffer whose address is written.
    pub target: BufferId,
    /// Bits of the dword that receive the address.
    pub mask: u32,
    /// Byte offset added to the target address.
    pub delta: u32,
}

impl Relocation {
    /// Value of the patched dword once `target` lives at `address`.
    pub fn apply(&self, dword: u32, address: u32) -> u32 {
        (dword & !self.mask) | (address.wrapping_add(self.delta) & self.mask)
    }
}

/// Capacities of the command buffer, in dwords.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BatchSizes {
    pub immediate: u32,
    pub dynamic_indirect: u32,
    pub other_indirect: u32,
    pub relocations: u32,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            immediate: 4096,
            dynamic_indirect: 1024,
            other_indirect: 4096,
            relocations: 300,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("{segment:?} segment has no room for {dwords} dwords")]
    OutOfSpace { segment: Segment, dwords: u32 },
    #[error("relocation list is full")]
    RelocationsFull,
    #[error("relocation targets unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
}

/// Anything that accepts command dwords and relocations.
pub trait CommandSink {
    fn dword(&mut self, value: u32);

    /// Writes `delta` and records a relocation so that the address of
    /// `target` is merged into the `mask` bits at submission.
    fn reloc(&mut self, target: BufferId, mask: u32, delta: u32);

    fn float(&mut self, value: f32) {
        self.dword(value.to_bits());
    }
}

struct SegmentBuf {
    id: BufferId,
    data: Vec<u32>,
    max: u32,
}

impl SegmentBuf {
    fn new(max: u32) -> Self {
        Self {
            id: BufferId::next(),
            data: Vec::with_capacity(max as usize),
            max,
        }
    }

    fn space(&self) -> u32 {
        self.max - self.data.len() as u32
    }
}

/// The DMA command buffer.
///
/// Writers reserve an exact number of dwords in one segment and then fill
/// the reservation through a [`Packet`]. Segments and relocations are
/// reset by [`BatchBuffer::take`].
pub struct BatchBuffer {
    segments: [SegmentBuf; 3],
    relocs: Vec<Relocation>,
    sizes: BatchSizes,
}

impl BatchBuffer {
    pub fn new(sizes: BatchSizes) -> Self {
        Self {
            segments: [
                SegmentBuf::new(sizes.immediate),
                SegmentBuf::new(sizes.dynamic_indirect),
                SegmentBuf::new(sizes.other_indirect),
            ],
            relocs: Vec::with_capacity(sizes.relocations as usize),
            sizes,
        }
    }

    pub fn sizes(&self) -> BatchSizes {
        self.sizes
    }

    /// Remaining dwords in `segment`.
    pub fn space(&self, segment: Segment) -> u32 {
        self.segments[segment.index()].space()
    }

    /// Dwords written to `segment` so far.
    pub fn used(&self, segment: Segment) -> u32 {
        self.segments[segment.index()].data.len() as u32
    }

    /// Remaining relocation slots.
    pub fn reloc_space(&self) -> u32 {
        self.sizes.relocations - self.relocs.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.data.is_empty())
    }

    pub fn segment_buffer(&self, segment: Segment) -> BufferId {
        self.segments[segment.index()].id
    }

    pub fn data(&self, segment: Segment) -> &[u32] {
        &self.segments[segment.index()].data
    }

    pub fn relocations(&self) -> &[Relocation] {
        &self.relocs
    }

    /// Reserves `dwords` in `segment` together with room for `relocs`
    /// relocations.
    pub fn reserve(
        &mut self,
        segment: Segment,
        dwords: u32,
        relocs: u32,
    ) -> Result<Packet<'_>, BatchError> {
        if self.space(segment) < dwords {
            return Err(BatchError::OutOfSpace { segment, dwords });
        }
        if self.reloc_space() < relocs {
            return Err(BatchError::RelocationsFull);
        }
        let start = self.used(segment);
        Ok(Packet {
            batch: self,
            segment,
            start,
            len: dwords,
            written: 0,
        })
    }

    /// Appends relocations recorded against some other buffer that is
    /// submitted alongside this batch.
    pub fn add_relocs(&mut self, relocs: &[Relocation]) -> Result<(), BatchError> {
        if self.reloc_space() < relocs.len() as u32 {
            return Err(BatchError::RelocationsFull);
        }
        self.relocs.extend_from_slice(relocs);
        Ok(())
    }

    /// Takes the accumulated commands and resets every segment.
    ///
    /// Segment buffers are replaced with fresh ids, since the old ones
    /// now belong to the kernel.
    pub fn take(&mut self) -> Submission {
        let buffers = self
            .segments
            .iter_mut()
            .map(|s| {
                let data = std::mem::take(&mut s.data);
                let id = std::mem::replace(&mut s.id, BufferId::next());
                s.data.reserve(s.max as usize);
                BufferData { id, data }
            })
            .collect();
        Submission {
            buffers,
            relocs: std::mem::take(&mut self.relocs),
        }
    }
}

/// An exact-size reservation in one segment.
///
/// Dropping a packet that has not been completely written is a contract
/// violation.
pub struct Packet<'a> {
    batch: &'a mut BatchBuffer,
    segment: Segment,
    start: u32,
    len: u32,
    written: u32,
}

impl Packet<'_> {
    /// Dword offset of the reservation within its segment.
    pub fn offset(&self) -> u32 {
        self.start
    }

    /// Dword offset of the next write.
    pub fn position(&self) -> u32 {
        self.start + self.written
    }

    pub fn remaining(&self) -> u32 {
        self.len - self.written
    }

    /// Writes raw dwords.
    pub fn extend(&mut self, values: &[u32]) {
        for &v in values {
            self.dword(v);
        }
    }
}

impl CommandSink for Packet<'_> {
    fn dword(&mut self, value: u32) {
        assert!(self.written < self.len, "packet overflows its reservation");
        self.batch.segments[self.segment.index()].data.push(value);
        self.written += 1;
    }

    fn reloc(&mut self, target: BufferId, mask: u32, delta: u32) {
        let source = self.batch.segment_buffer(self.segment);
        let offset = self.position();
        self.batch.relocs.push(Relocation {
            source,
            offset,
            target,
            mask,
            delta,
        });
        self.dword(delta);
    }
}

impl Drop for Packet<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert_eq!(
                self.written, self.len,
                "packet committed {} of {} reserved dwords",
                self.written, self.len
            );
        }
    }
}

/// Contents of one buffer handed to the kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferData {
    pub id: BufferId,
    pub data: Vec<u32>,
}

/// A flushed command buffer.
///
/// The first buffer is the entry point (the immediate segment); the
/// others hold indirect state, vertices or zone command blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Submission {
    pub buffers: Vec<BufferData>,
    pub relocs: Vec<Relocation>,
}

impl Submission {
    pub fn buffer(&self, id: BufferId) -> Option<&[u32]> {
        self.buffers
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.data.as_slice())
    }

    /// The commands executed first.
    pub fn entry(&self) -> &[u32] {
        self.buffers.first().map_or(&[], |b| b.data.as_slice())
    }

    /// Total dwords across all buffers.
    pub fn dwords(&self) -> usize {
        self.buffers.iter().map(|b| b.data.len()).sum()
    }

    /// Patches every relocation with the address returned by `address`.
    pub fn resolve(
        &mut self,
        mut address: impl FnMut(BufferId) -> Option<u32>,
    ) -> Result<(), BatchError> {
        for reloc in &self.relocs {
            let target = address(reloc.target).ok_or(BatchError::UnknownBuffer(reloc.target))?;
            let buffer = self
                .buffers
                .iter_mut()
                .find(|b| b.id == reloc.source)
                .ok_or(BatchError::UnknownBuffer(reloc.source))?;
            let dword = buffer
                .data
                .get_mut(reloc.offset as usize)
                .ok_or(BatchError::UnknownBuffer(reloc.source))?;
            *dword = reloc.apply(*dword, target);
        }
        Ok(())
    }
}

/// Completion marker returned by the kernel for a submission.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fence(pub u64);
