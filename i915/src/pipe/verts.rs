// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use i915_encoding::{Attrib, BufferId, VertexHeader, VertexLayout};

use crate::VertexAlloc;

/// Scratch vertices available to the stages at once.
///
/// Stages release what they allocate once the primitive has gone
/// downstream, so this bounds the temporaries live along one chain: two
/// per clip plane plus the duplicates of the other stages.
pub(super) const MAX_TEMP_VERTICES: u32 = 40;

/// Pipeline vertices: the block the draw context fetches into, followed
/// by a stack of scratch slots.
///
/// Vertices are referred to by slot number. Slots below the input count
/// are input vertices; the rest are temporaries.
pub(super) struct PipeVerts {
    buffer: BufferId,
    data: Vec<u32>,
    layout: VertexLayout,
    dwords: u32,
    inputs: u32,
    temps: u32,
    alloc: Option<VertexAlloc>,
}

impl PipeVerts {
    pub(super) fn new() -> Self {
        Self {
            buffer: BufferId::next(),
            data: Vec::new(),
            layout: VertexLayout::new(),
            dwords: 0,
            inputs: 0,
            temps: 0,
            alloc: None,
        }
    }

    pub(super) fn set_layout(&mut self, layout: VertexLayout) {
        assert!(self.alloc.is_none(), "layout change with vertices outstanding");
        self.layout = layout;
    }

    pub(super) fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub(super) fn alloc(&mut self, vertex_dwords: u32, count: u32) -> VertexAlloc {
        assert!(self.alloc.is_none(), "previous vertices not released");
        assert_eq!(
            vertex_dwords,
            self.layout.dwords(),
            "vertex size does not match the pipeline layout"
        );
        self.dwords = vertex_dwords;
        self.inputs = count;
        self.temps = 0;
        self.data.clear();
        self.data
            .resize(((count + MAX_TEMP_VERTICES) * vertex_dwords) as usize, 0);
        let alloc = VertexAlloc {
            buffer: self.buffer,
            offset: 0,
            vertex_dwords,
            count,
        };
        self.alloc = Some(alloc);
        alloc
    }

    pub(super) fn input_data(&mut self, alloc: &VertexAlloc) -> &mut [u32] {
        debug_assert_eq!(alloc.buffer, self.buffer);
        &mut self.data[..alloc.dwords() as usize]
    }

    pub(super) fn release(&mut self, alloc: &VertexAlloc) {
        debug_assert_eq!(alloc.buffer, self.buffer);
        self.alloc = None;
        self.temps = 0;
    }

    fn range(&self, v: u32) -> std::ops::Range<usize> {
        let start = (v * self.dwords) as usize;
        start..start + self.dwords as usize
    }

    pub(super) fn get(&self, v: u32) -> &[u32] {
        &self.data[self.range(v)]
    }

    pub(super) fn get_mut(&mut self, v: u32) -> &mut [u32] {
        let range = self.range(v);
        &mut self.data[range]
    }

    pub(super) fn header(&self, v: u32) -> VertexHeader {
        VertexHeader(self.data[self.range(v).start])
    }

    pub(super) fn set_header(&mut self, v: u32, header: VertexHeader) {
        let start = self.range(v).start;
        self.data[start] = header.0;
    }

    pub(super) fn edgeflag(&self, v: u32) -> bool {
        self.header(v).edgeflag()
    }

    pub(super) fn set_edgeflag(&mut self, v: u32, flag: bool) {
        let mut header = self.header(v);
        header.set_edgeflag(flag);
        self.set_header(v, header);
    }

    pub(super) fn clipmask(&self, v: u32) -> u16 {
        self.header(v).clipmask()
    }

    /// Clip-space position.
    pub(super) fn clip_pos(&self, v: u32) -> [f32; 4] {
        let vertex = self.get(v);
        let pos: &[f32] = bytemuck::cast_slice(&vertex[1..5]);
        [pos[0], pos[1], pos[2], pos[3]]
    }

    /// Window position, with 1/w in the last component.
    pub(super) fn window_pos(&self, v: u32) -> [f32; 4] {
        self.attr(v, Attrib::Pos).unwrap_or([0.0, 0.0, 0.0, 1.0])
    }

    pub(super) fn attr(&self, v: u32, attrib: Attrib) -> Option<[f32; 4]> {
        self.layout.slot(attrib).map(|slot| slot.read(self.get(v)))
    }

    pub(super) fn set_attr(&mut self, v: u32, attrib: Attrib, value: [f32; 4]) {
        if let Some(slot) = self.layout.slot(attrib) {
            slot.write(self.get_mut(v), value);
        }
    }

    /// Current top of the scratch stack.
    pub(super) fn mark(&self) -> u32 {
        self.temps
    }

    /// Frees every temporary allocated after `mark`.
    pub(super) fn release_to(&mut self, mark: u32) {
        debug_assert!(mark <= self.temps);
        self.temps = mark;
    }

    /// Drops every temporary.
    pub(super) fn reset_tmps(&mut self) {
        self.temps = 0;
    }

    fn new_temp(&mut self) -> u32 {
        assert!(
            self.temps < MAX_TEMP_VERTICES,
            "pipeline scratch vertices exhausted"
        );
        let v = self.inputs + self.temps;
        self.temps += 1;
        v
    }

    /// Copies `v` into a new temporary, ready to be emitted on its own.
    pub(super) fn dup(&mut self, v: u32) -> u32 {
        let new = self.new_temp();
        let src = self.range(v);
        let dst = self.range(new).start;
        self.data.copy_within(src, dst);
        let mut header = self.header(new);
        header.reset_index();
        self.set_header(new, header);
        new
    }

    /// Builds a new temporary from two existing vertices.
    pub(super) fn derive(&mut self, a: u32, b: u32, f: impl FnOnce(&mut [u32], &[u32], &[u32])) -> u32 {
        let new = self.new_temp();
        debug_assert!(a < new && b < new);
        let (ra, rb, dst) = (self.range(a), self.range(b), self.range(new));
        let (before, after) = self.data.split_at_mut(dst.start);
        f(&mut after[..dst.len()], &before[ra], &before[rb]);
        new
    }

    /// Forgets which vertices have been copied to the backend.
    pub(super) fn reset_indices(&mut self) {
        for v in 0..self.inputs + self.temps {
            let mut header = self.header(v);
            header.reset_index();
            self.set_header(v, header);
        }
    }

    pub(super) fn hw_part(&self, v: u32) -> &[u32] {
        &self.get(v)[self.layout.hw_range()]
    }
}
