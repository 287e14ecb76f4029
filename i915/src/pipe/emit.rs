// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The last stage: copies vertices to the backend and batches indices.

use i915_encoding::Prim;

use super::Pipeline;
use crate::render::{Render, VertexAlloc};
use crate::{Hardware, Result};

/// Vertices requested from the backend per block.
pub(super) const EMIT_MAX_VERTICES: u32 = 256;

/// Index and allocation state of the emit stage.
///
/// Each pipeline vertex is copied to the backend at most once per block;
/// its header remembers where it went, so later primitives can refer to
/// it by index.
pub(super) struct Emit {
    max_indices: usize,
    elts: Vec<u32>,
    /// Primitive kind of `elts`.
    pending: Prim,
    /// Primitive kind last declared to the backend.
    drawn: Option<Prim>,
    alloc: Option<VertexAlloc>,
    used: u32,
}

impl Emit {
    pub(super) fn new(max_indices: u32) -> Self {
        Self {
            max_indices: max_indices as usize,
            elts: Vec::with_capacity(max_indices as usize),
            pending: Prim::Triangles,
            drawn: None,
            alloc: None,
            used: 0,
        }
    }

    pub(super) fn begin(&mut self) {
        self.elts.clear();
        self.drawn = None;
        self.alloc = None;
        self.used = 0;
    }

    /// Returns the current block to `next`.
    pub(super) fn end(&mut self, hw: &mut Hardware, next: &mut dyn Render) {
        debug_assert!(self.elts.is_empty(), "indices left unflushed");
        if let Some(alloc) = self.alloc.take() {
            next.release_vertices(hw, alloc);
        }
    }
}

impl Pipeline {
    pub(super) fn emit_point(&mut self, hw: &mut Hardware, next: &mut dyn Render, v: u32) -> Result<()> {
        self.emit_prim(hw, next, Prim::Points, &[v])
    }

    pub(super) fn emit_line(&mut self, hw: &mut Hardware, next: &mut dyn Render, v: [u32; 2]) -> Result<()> {
        self.emit_prim(hw, next, Prim::Lines, &v)
    }

    pub(super) fn emit_tri(&mut self, hw: &mut Hardware, next: &mut dyn Render, v: [u32; 3]) -> Result<()> {
        self.emit_prim(hw, next, Prim::Triangles, &v)
    }

    fn emit_prim(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        prim: Prim,
        v: &[u32],
    ) -> Result<()> {
        if self.emit.pending != prim || self.emit.elts.len() + v.len() > self.emit.max_indices {
            self.flush_elts(hw, next)?;
            self.emit.pending = prim;
        }

        let fresh = v
            .iter()
            .filter(|&&v| !self.verts.header(v).is_emitted())
            .count() as u32;
        let alloc = match self.emit.alloc {
            Some(alloc) if self.emit.used + fresh <= alloc.count => alloc,
            _ => self.new_block(hw, next)?,
        };

        for &v in v {
            let mut header = self.verts.header(v);
            if !header.is_emitted() {
                let ix = self.emit.used;
                next.vertex_data(hw, &alloc)[alloc.vertex(ix)].copy_from_slice(self.verts.hw_part(v));
                header.set_index(ix as u16);
                self.verts.set_header(v, header);
                self.emit.used += 1;
                self.stats.emitted_vertices += 1;
            }
            self.emit.elts.push(header.index() as u32);
        }
        Ok(())
    }

    /// Swaps the backend block for an empty one. Indices into the old
    /// block are drawn first.
    fn new_block(&mut self, hw: &mut Hardware, next: &mut dyn Render) -> Result<VertexAlloc> {
        self.flush_elts(hw, next)?;
        if let Some(old) = self.emit.alloc.take() {
            next.release_vertices(hw, old);
        }
        let dwords = self.verts.layout().hw_dwords();
        let alloc = next.allocate_vertices(hw, dwords, EMIT_MAX_VERTICES)?;
        log::trace!("emit block of {} vertices at {}", alloc.count, alloc.offset);
        self.verts.reset_indices();
        self.emit.alloc = Some(alloc);
        self.emit.drawn = None;
        self.emit.used = 0;
        Ok(alloc)
    }

    /// Draws the batched indices.
    pub(super) fn flush_elts(&mut self, hw: &mut Hardware, next: &mut dyn Render) -> Result<()> {
        if self.emit.elts.is_empty() {
            return Ok(());
        }
        let prim = self.emit.pending;
        if self.emit.drawn != Some(prim) {
            next.set_prim(hw, prim)?;
            self.emit.drawn = Some(prim);
        }
        next.draw_indexed_prim(hw, &self.emit.elts)?;
        self.emit.elts.clear();
        Ok(())
    }
}
