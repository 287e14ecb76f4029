// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use smallvec::SmallVec;

use i915_encoding::cmd::{
    MI_BATCH_BUFFER_END, MI_NOOP, S0, S1, S2, S4, S4_CULLMODE_MASK, S4_CULLMODE_NONE,
    S4_VFMT_MASK,
};
use i915_encoding::{
    BatchBuffer, BatchError, BlobReloc, BufferData, CacheStats, CommandSink, Differencer,
    DrawRect, Fence, HwState, IndirectBucket, Packet, ReducedPrim, Relocation, Segment,
    StateCache, VertexLayout, MAX_IMMEDIATE,
};

use crate::{DrawOptions, HwLock, HwzParams, Kernel, Result, VertexAlloc, VertexPool};

/// Dwords kept free in the immediate segment for the end-of-batch marker.
const BATCH_RESERVED: u32 = 2;

/// How a flush reaches the kernel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmitMode {
    #[default]
    Classic,
    Hwz(HwzParams),
}

/// Values written by clear-rect commands.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClearValues {
    /// Packed ARGB8888 color.
    pub color: u32,
    pub depth: u32,
    pub stencil: u32,
}

#[derive(Default)]
struct Blob {
    dwords: Vec<u32>,
    relocs: SmallVec<[BlobReloc; 2]>,
}

/// The driver's desired register state and the machinery that gets it
/// onto the hardware.
struct StateTracker {
    immediate: [u32; MAX_IMMEDIATE],
    vertex_buffer: Option<i915_encoding::BufferId>,
    blobs: [Blob; IndirectBucket::COUNT],
    caches: [StateCache; IndirectBucket::COUNT],
    differencer: Differencer,
    generation: u32,
    cull: u32,
    reduced: ReducedPrim,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            immediate: [0; MAX_IMMEDIATE],
            vertex_buffer: None,
            blobs: Default::default(),
            caches: IndirectBucket::ALL.map(|bucket| {
                StateCache::new(match bucket {
                    IndirectBucket::Dynamic => Segment::DynamicIndirect,
                    _ => Segment::OtherIndirect,
                })
            }),
            differencer: Differencer::new(),
            generation: 0,
            cull: S4_CULLMODE_NONE,
            reduced: ReducedPrim::Tri,
        }
    }

    fn effective_immediate(&self) -> [u32; MAX_IMMEDIATE] {
        let mut immediate = self.immediate;
        let cull = if self.reduced == ReducedPrim::Tri {
            self.cull
        } else {
            S4_CULLMODE_NONE
        };
        immediate[S4] = (immediate[S4] & !S4_CULLMODE_MASK) | cull;
        immediate
    }

    /// The current state, uploading indirect blocks as needed.
    fn snapshot(&mut self, batch: &mut BatchBuffer) -> std::result::Result<HwState, BatchError> {
        let mut state = HwState::new(self.generation);
        state.immediate = self.effective_immediate();
        state.vertex_buffer = self.vertex_buffer;
        for bucket in IndirectBucket::ALL {
            let blob = &self.blobs[bucket as usize];
            state.indirect[bucket as usize] =
                self.caches[bucket as usize].upload(batch, &blob.dwords, &blob.relocs)?;
        }
        Ok(state)
    }

    fn lost_context(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        for cache in &mut self.caches {
            cache.clear();
        }
        self.differencer.lost_context();
        log::debug!("hardware context lost, generation {}", self.generation);
    }
}

/// Everything the render backends share: the command buffer, register
/// state, the vertex buffer and the route to the kernel.
pub struct Hardware {
    batch: BatchBuffer,
    state: StateTracker,
    vertices: VertexPool,
    layout: VertexLayout,
    lock: HwLock,
    kernel: Box<dyn Kernel>,
    submit_mode: SubmitMode,
    draw_rect: DrawRect,
    geometry_stamp: u32,
    flip_pending: bool,
    clear: ClearValues,
    last_fence: Option<Fence>,
    flushes: u64,
}

impl Hardware {
    pub fn new(options: &DrawOptions, kernel: Box<dyn Kernel>, lock: HwLock) -> Self {
        let draw_rect = lock.area().drawable();
        Self {
            batch: BatchBuffer::new(options.batch),
            state: StateTracker::new(),
            vertices: VertexPool::new(options.vertex_pool_dwords),
            layout: VertexLayout::new(),
            lock,
            kernel,
            submit_mode: SubmitMode::Classic,
            draw_rect,
            geometry_stamp: 0,
            flip_pending: false,
            clear: ClearValues::default(),
            last_fence: None,
            flushes: 0,
        }
    }

    /// Sets an immediate register. S0 is owned by the vertex buffer and the
    /// S4 cull bits by [`Hardware::set_cull`].
    pub fn set_immediate(&mut self, reg: usize, value: u32) {
        assert_ne!(reg, S0, "S0 follows the vertex allocation");
        self.state.immediate[reg] = value;
    }

    /// Effective value of an immediate register for the next draw.
    pub fn immediate(&self, reg: usize) -> u32 {
        self.state.effective_immediate()[reg]
    }

    /// Replaces the contents of an indirect state bucket. An empty block
    /// disables the bucket.
    pub fn set_indirect(&mut self, bucket: IndirectBucket, dwords: &[u32], relocs: &[BlobReloc]) {
        let blob = &mut self.state.blobs[bucket as usize];
        blob.dwords.clear();
        blob.dwords.extend_from_slice(dwords);
        blob.relocs = relocs.iter().copied().collect();
    }

    /// Points S0 at a vertex allocation.
    pub fn set_vertex_buffer(&mut self, alloc: &VertexAlloc) {
        self.state.vertex_buffer = Some(alloc.buffer);
        self.state.immediate[S0] = alloc.byte_offset();
    }

    /// Programs S1, S2 and the S4 vertex format for `layout`.
    pub fn set_vertex_layout(&mut self, layout: &VertexLayout) {
        let hw = layout.hw_only();
        let immediate = &mut self.state.immediate;
        immediate[S1] = hw.s1();
        immediate[S2] = hw.s2();
        immediate[S4] = (immediate[S4] & !S4_VFMT_MASK) | hw.s4_vfmt();
        self.layout = hw;
    }

    /// Hardware vertex layout last programmed.
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Sets the triangle cull mode (one of the `S4_CULLMODE_*` values).
    pub fn set_cull(&mut self, cull: u32) {
        self.state.cull = cull & S4_CULLMODE_MASK;
    }

    /// Records the primitive class being rasterized. Points and lines are
    /// never culled.
    pub fn set_reduced_prim(&mut self, reduced: ReducedPrim) {
        self.state.reduced = reduced;
    }

    pub fn generation(&self) -> u32 {
        self.state.generation
    }

    /// Forgets what the hardware holds; everything is re-emitted.
    pub fn lost_context(&mut self) {
        self.state.lost_context();
    }

    /// The state the next draw needs, with indirect blocks uploaded.
    pub fn snapshot(&mut self) -> std::result::Result<HwState, BatchError> {
        self.state.snapshot(&mut self.batch)
    }

    pub fn cache_stats(&self, bucket: IndirectBucket) -> CacheStats {
        self.state.caches[bucket as usize].stats()
    }

    pub fn batch(&self) -> &BatchBuffer {
        &self.batch
    }

    pub fn vertices(&self) -> &VertexPool {
        &self.vertices
    }

    pub fn vertices_mut(&mut self) -> &mut VertexPool {
        &mut self.vertices
    }

    pub fn draw_rect(&self) -> DrawRect {
        self.draw_rect
    }

    /// Bumped whenever the drawable geometry is re-read.
    pub fn geometry_stamp(&self) -> u32 {
        self.geometry_stamp
    }

    pub fn flip_pending(&self) -> bool {
        self.flip_pending
    }

    pub fn set_flip_pending(&mut self, pending: bool) {
        self.flip_pending = pending;
    }

    pub fn clear_values(&self) -> ClearValues {
        self.clear
    }

    pub fn set_clear_values(&mut self, clear: ClearValues) {
        self.clear = clear;
    }

    pub fn submit_mode(&self) -> SubmitMode {
        self.submit_mode
    }

    pub fn set_submit_mode(&mut self, mode: SubmitMode) {
        self.submit_mode = mode;
    }

    pub fn last_fence(&self) -> Option<Fence> {
        self.last_fence
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Takes the lock briefly to pick up drawable changes made by others.
    pub fn revalidate_drawable(&mut self) -> bool {
        let status = self.lock.lock();
        if status.needs_revalidate() {
            self.reread_drawable();
        }
        self.lock.unlock();
        status.needs_revalidate()
    }

    fn reread_drawable(&mut self) {
        let rect = self.lock.area().drawable();
        if rect != self.draw_rect {
            log::debug!("drawable changed to {rect:?}");
        }
        self.draw_rect = rect;
        self.geometry_stamp = self.geometry_stamp.wrapping_add(1);
    }

    /// Allocates vertices, flushing once if the vertex buffer is full.
    pub(crate) fn alloc_vertices(&mut self, vertex_dwords: u32, count: u32) -> Result<VertexAlloc> {
        if let Some(alloc) = self.vertices.alloc(vertex_dwords, count) {
            return Ok(alloc);
        }
        log::warn!("vertex buffer full, flushing");
        self.flush()?;
        self.vertices
            .alloc(vertex_dwords, count)
            .ok_or(crate::Error::VertexSpace {
                dwords: vertex_dwords,
                count,
            })
    }

    fn try_emit_state(&mut self, dwords: u32, relocs: u32) -> std::result::Result<(), BatchError> {
        let state = self.state.snapshot(&mut self.batch)?;
        let (state_dwords, state_relocs) = self.state.differencer.cost(&state);
        let need = state_dwords + dwords + BATCH_RESERVED;
        if self.batch.space(Segment::Immediate) < need {
            return Err(BatchError::OutOfSpace {
                segment: Segment::Immediate,
                dwords: need,
            });
        }
        if self.batch.reloc_space() < state_relocs + relocs {
            return Err(BatchError::RelocationsFull);
        }
        self.state.differencer.emit(&mut self.batch, &state)?;
        Ok(())
    }

    /// Emits any dirty state and reserves `dwords` for the primitive that
    /// depends on it, both in the same command buffer.
    pub(crate) fn begin_prim(&mut self, dwords: u32, relocs: u32) -> Result<Packet<'_>> {
        if let Err(err) = self.try_emit_state(dwords, relocs) {
            log::warn!("{err}, flushing");
            self.flush()?;
            self.try_emit_state(dwords, relocs)?;
        }
        Ok(self.batch.reserve(Segment::Immediate, dwords, relocs)?)
    }

    /// Reserves `dwords` of state-independent commands.
    pub(crate) fn reserve(&mut self, dwords: u32, relocs: u32) -> Result<Packet<'_>> {
        let fits = |batch: &BatchBuffer| {
            batch.space(Segment::Immediate) >= dwords + BATCH_RESERVED
                && batch.reloc_space() >= relocs
        };
        if !fits(&self.batch) {
            self.flush()?;
        }
        Ok(self.batch.reserve(Segment::Immediate, dwords, relocs)?)
    }

    pub(crate) fn segment_buffer(&self, segment: Segment) -> i915_encoding::BufferId {
        self.batch.segment_buffer(segment)
    }

    pub(crate) fn reloc_space(&self) -> u32 {
        self.batch.reloc_space()
    }

    /// Submits the command buffer.
    pub fn flush(&mut self) -> Result<Option<Fence>> {
        self.flush_with(Vec::new(), &[])
    }

    /// Submits the command buffer together with `extra` buffers and the
    /// relocations recorded against them.
    pub(crate) fn flush_with(
        &mut self,
        extra: Vec<BufferData>,
        relocs: &[Relocation],
    ) -> Result<Option<Fence>> {
        if self.batch.is_empty() && extra.is_empty() {
            return Ok(None);
        }
        self.batch.add_relocs(relocs)?;
        let pad = self.batch.used(Segment::Immediate) % 2 == 0;
        {
            let mut end = self
                .batch
                .reserve(Segment::Immediate, 1 + pad as u32, 0)?;
            end.dword(MI_BATCH_BUFFER_END);
            if pad {
                end.dword(MI_NOOP);
            }
        }

        let status = self.lock.lock();
        if status.needs_revalidate() {
            self.reread_drawable();
        }
        let mut submission = self.batch.take();
        submission.buffers.extend(self.vertices.retire());
        submission.buffers.extend(extra);
        log::debug!(
            "flush: {} dwords in {} buffers, {} relocations",
            submission.dwords(),
            submission.buffers.len(),
            submission.relocs.len()
        );
        let fence = match self.submit_mode {
            SubmitMode::Classic => self.kernel.submit(submission),
            SubmitMode::Hwz(params) => self.kernel.submit_hwz(submission, params),
        };
        self.lock.unlock();

        if self.state.vertex_buffer != Some(self.vertices.buffer()) {
            self.state.vertex_buffer = None;
            self.state.immediate[S0] = 0;
        }
        self.state.lost_context();
        self.flushes += 1;
        self.last_fence = Some(fence);
        Ok(Some(fence))
    }
}
