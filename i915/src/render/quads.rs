// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use i915_encoding::{trim, DrawRect, Prim};

use super::{BackendKind, ClearMask, Render, VertexAlloc};
use crate::{Hardware, Result};

/// Decomposition state kept between draws.
///
/// Quads and quad strips are drawn as indexed triangles, line loops as a
/// line strip plus a closing segment. Runs longer than the index limit of
/// one hardware command are split.
pub struct Quads {
    prim: Option<Prim>,
    max_indices: u32,
    elts: Vec<u32>,
    chunk: Vec<u32>,
}

impl Quads {
    pub fn new(max_indices: u32) -> Self {
        assert!(max_indices >= 6, "index limit of {max_indices} is too small");
        Self {
            prim: None,
            max_indices,
            elts: Vec::new(),
            chunk: Vec::new(),
        }
    }

    pub fn max_indices(&self) -> u32 {
        self.max_indices
    }

    /// Wraps `next` for the duration of a draw.
    pub fn wrap<'a>(&'a mut self, next: &'a mut dyn Render) -> QuadsRender<'a> {
        QuadsRender { state: self, next }
    }
}

/// What a primitive kind is drawn as by the wrapped backend.
fn drawn_as(prim: Prim) -> Prim {
    match prim {
        Prim::LineLoop => Prim::LineStrip,
        Prim::Quads | Prim::QuadStrip => Prim::Triangles,
        _ => prim,
    }
}

/// Appends the triangles of `count` quad-list or quad-strip vertices,
/// mapping positions through `at`.
fn quad_triangles(prim: Prim, count: u32, at: impl Fn(u32) -> u32, out: &mut Vec<u32>) {
    match prim {
        Prim::Quads => {
            for i in (0..count).step_by(4) {
                out.extend([i, i + 1, i + 3, i + 1, i + 2, i + 3].map(&at));
            }
        }
        Prim::QuadStrip => {
            for i in (0..count.saturating_sub(2)).step_by(2) {
                out.extend([i, i + 1, i + 3, i + 2, i, i + 3].map(&at));
            }
        }
        _ => unreachable!("{prim:?} is not a quad primitive"),
    }
}

/// A [`Render`] that hands supported primitives to `next` and decomposes
/// the rest.
pub struct QuadsRender<'a> {
    state: &'a mut Quads,
    next: &'a mut dyn Render,
}

impl QuadsRender<'_> {
    fn prim(&self) -> Prim {
        match self.state.prim {
            Some(prim) => prim,
            None => panic!("draw without a primitive kind"),
        }
    }

    /// Largest run handed to `next` for `prim`. Triangle strips advance by
    /// an even count so later chunks keep the winding.
    fn limit(&self, prim: Prim) -> u32 {
        match prim {
            Prim::TriangleStrip => self.state.max_indices & !1,
            _ => self.state.max_indices,
        }
    }

    /// Splits a run of `len` vertices into chunks of at most
    /// [`Self::limit`] vertices.
    ///
    /// Chunks after the first repeat the vertices shared with the previous
    /// one; kinds that replay their first vertex put it at the front of
    /// every chunk. `draw` receives the pivot flag, the offset into the run
    /// and the number of run vertices in the chunk.
    fn split(
        &mut self,
        hw: &mut Hardware,
        prim: Prim,
        len: u32,
        mut draw: impl FnMut(&mut Self, &mut Hardware, bool, u32, u32) -> Result<()>,
    ) -> Result<()> {
        let info = prim.info();
        let max = self.limit(prim);
        let lead = info.replay as u32;
        let overlap = info.first - info.incr - lead;
        let body = len - lead;
        let mut pos = 0;
        loop {
            let chunk = trim(max.min(lead + body - pos), info.first, info.incr);
            if chunk == 0 {
                return Ok(());
            }
            let take = chunk - lead;
            draw(self, hw, info.replay, lead + pos, take)?;
            if pos + take >= body {
                return Ok(());
            }
            pos += take - overlap;
        }
    }

    fn draw_sequential(
        &mut self,
        hw: &mut Hardware,
        prim: Prim,
        start: u32,
        count: u32,
    ) -> Result<()> {
        if count <= self.limit(prim) {
            return self.next.draw_prim(hw, start, count);
        }
        if prim.info().replay {
            let mut elts = std::mem::take(&mut self.state.elts);
            elts.clear();
            elts.extend(start..start + count);
            let result = self.draw_elts(hw, prim, &elts);
            self.state.elts = elts;
            return result;
        }
        log::trace!("splitting {count} vertex {prim:?} run");
        self.split(hw, prim, count, |this, hw, _, offset, take| {
            this.next.draw_prim(hw, start + offset, take)
        })
    }

    fn draw_elts(&mut self, hw: &mut Hardware, prim: Prim, indices: &[u32]) -> Result<()> {
        let len = indices.len() as u32;
        if len <= self.limit(prim) {
            return self.next.draw_indexed_prim(hw, indices);
        }
        log::trace!("splitting {len} index {prim:?} run");
        self.split(hw, prim, len, |this, hw, pivot, offset, take| {
            let mut chunk = std::mem::take(&mut this.state.chunk);
            chunk.clear();
            if pivot {
                chunk.push(indices[0]);
            }
            chunk.extend_from_slice(&indices[offset as usize..(offset + take) as usize]);
            let result = this.next.draw_indexed_prim(hw, &chunk);
            this.state.chunk = chunk;
            result
        })
    }

    fn draw_quads(
        &mut self,
        hw: &mut Hardware,
        prim: Prim,
        count: u32,
        at: impl Fn(u32) -> u32,
    ) -> Result<()> {
        let mut elts = std::mem::take(&mut self.state.elts);
        elts.clear();
        quad_triangles(prim, count, at, &mut elts);
        let result = self.draw_elts(hw, Prim::Triangles, &elts);
        self.state.elts = elts;
        result
    }
}

impl Render for QuadsRender<'_> {
    fn kind(&self) -> BackendKind {
        self.next.kind()
    }

    fn start_render(&mut self, hw: &mut Hardware, start_of_frame: bool) -> Result<()> {
        self.next.start_render(hw, start_of_frame)
    }

    fn allocate_vertices(
        &mut self,
        hw: &mut Hardware,
        vertex_dwords: u32,
        count: u32,
    ) -> Result<VertexAlloc> {
        self.next.allocate_vertices(hw, vertex_dwords, count)
    }

    fn vertex_data<'a>(&'a mut self, hw: &'a mut Hardware, alloc: &VertexAlloc) -> &'a mut [u32] {
        self.next.vertex_data(hw, alloc)
    }

    fn set_prim(&mut self, hw: &mut Hardware, prim: Prim) -> Result<()> {
        self.state.prim = Some(prim);
        self.next.set_prim(hw, drawn_as(prim))
    }

    fn draw_prim(&mut self, hw: &mut Hardware, start: u32, count: u32) -> Result<()> {
        let prim = self.prim();
        let count = prim.trim(count);
        if count == 0 {
            return Ok(());
        }
        match prim {
            Prim::LineLoop => {
                self.draw_sequential(hw, Prim::LineStrip, start, count)?;
                self.next.draw_indexed_prim(hw, &[start + count - 1, start])
            }
            Prim::Quads | Prim::QuadStrip => self.draw_quads(hw, prim, count, |i| start + i),
            _ => self.draw_sequential(hw, prim, start, count),
        }
    }

    fn draw_indexed_prim(&mut self, hw: &mut Hardware, indices: &[u32]) -> Result<()> {
        let prim = self.prim();
        let count = prim.trim(indices.len() as u32);
        if count == 0 {
            return Ok(());
        }
        let indices = &indices[..count as usize];
        match prim {
            Prim::LineLoop => {
                self.draw_elts(hw, Prim::LineStrip, indices)?;
                let closing = [indices[count as usize - 1], indices[0]];
                self.next.draw_indexed_prim(hw, &closing)
            }
            Prim::Quads | Prim::QuadStrip => {
                self.draw_quads(hw, prim, count, |i| indices[i as usize])
            }
            _ => self.draw_elts(hw, prim, indices),
        }
    }

    fn release_vertices(&mut self, hw: &mut Hardware, alloc: VertexAlloc) {
        self.next.release_vertices(hw, alloc);
    }

    fn clear_rect(&mut self, hw: &mut Hardware, mask: ClearMask, rect: DrawRect) -> Result<()> {
        self.next.clear_rect(hw, mask, rect)
    }

    fn flush(&mut self, hw: &mut Hardware, end_of_frame: bool) -> Result<()> {
        self.next.flush(hw, end_of_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hardware, Call, RecordingRender};

    fn run(max: u32, prim: Prim, draw: impl FnOnce(&mut QuadsRender<'_>, &mut Hardware)) -> Vec<Call> {
        let (mut hw, _) = hardware();
        let mut next = RecordingRender::default();
        let mut quads = Quads::new(max);
        let mut render = quads.wrap(&mut next);
        render.set_prim(&mut hw, prim).unwrap();
        draw(&mut render, &mut hw);
        next.calls
    }

    #[test]
    fn quad_becomes_two_triangles() {
        let calls = run(1020, Prim::Quads, |r, hw| r.draw_prim(hw, 0, 4).unwrap());
        assert_eq!(
            calls,
            [
                Call::SetPrim(Prim::Triangles),
                Call::Indexed(vec![0, 1, 3, 1, 2, 3])
            ]
        );
    }

    #[test]
    fn quad_strip_keeps_winding() {
        let calls = run(1020, Prim::QuadStrip, |r, hw| r.draw_prim(hw, 0, 4).unwrap());
        assert_eq!(calls[1], Call::Indexed(vec![0, 1, 3, 2, 0, 3]));
        let calls = run(1020, Prim::QuadStrip, |r, hw| {
            r.draw_indexed_prim(hw, &[10, 11, 12, 13, 14, 15]).unwrap();
        });
        assert_eq!(
            calls[1],
            Call::Indexed(vec![10, 11, 13, 12, 10, 13, 12, 13, 15, 14, 12, 15])
        );
    }

    #[test]
    fn line_loop_is_strip_plus_closing_segment() {
        let calls = run(1020, Prim::LineLoop, |r, hw| r.draw_prim(hw, 2, 5).unwrap());
        assert_eq!(
            calls,
            [
                Call::SetPrim(Prim::LineStrip),
                Call::Sequential(2, 5),
                Call::Indexed(vec![6, 2])
            ]
        );
    }

    #[test]
    fn short_runs_are_dropped() {
        let calls = run(1020, Prim::Triangles, |r, hw| r.draw_prim(hw, 0, 2).unwrap());
        assert_eq!(calls, [Call::SetPrim(Prim::Triangles)]);
        let calls = run(1020, Prim::Quads, |r, hw| r.draw_prim(hw, 0, 7).unwrap());
        assert_eq!(calls[1], Call::Indexed(vec![0, 1, 3, 1, 2, 3]));
    }

    #[test]
    fn long_fans_repeat_their_pivot() {
        let calls = run(6, Prim::TriangleFan, |r, hw| r.draw_prim(hw, 0, 9).unwrap());
        assert_eq!(
            calls,
            [
                Call::SetPrim(Prim::TriangleFan),
                Call::Indexed(vec![0, 1, 2, 3, 4, 5]),
                Call::Indexed(vec![0, 5, 6, 7, 8]),
            ]
        );
    }

    #[test]
    fn long_strips_overlap_by_two() {
        let calls = run(7, Prim::TriangleStrip, |r, hw| r.draw_prim(hw, 0, 10).unwrap());
        assert_eq!(
            &calls[1..],
            [
                Call::Sequential(0, 6),
                Call::Sequential(4, 6)
            ]
        );
        let calls = run(6, Prim::Triangles, |r, hw| {
            r.draw_indexed_prim(hw, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        });
        assert_eq!(
            &calls[1..],
            [
                Call::Indexed(vec![0, 1, 2, 3, 4, 5]),
                Call::Indexed(vec![6, 7, 8])
            ]
        );
    }
}
