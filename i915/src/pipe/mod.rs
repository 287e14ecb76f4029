// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The software clip/setup pipeline.
//!
//! Primitives that the hardware cannot take as they are (because they
//! cross a clip plane, are drawn unfilled, need a depth offset or select
//! colors by facing) run through a chain of stages before the emit stage
//! hands them to the active backend as point, line and triangle lists.
//!
//! Stages operate on vertex slots in [`PipeVerts`]: the input vertices of
//! the current vertex buffer followed by a stack of temporaries. A stage
//! that rewrites a vertex duplicates it first and frees its duplicates
//! when the primitive has gone downstream.

mod clip;
mod emit;
mod flatshade;
mod offset;
mod twoside;
mod unfilled;
mod verts;

use smallvec::SmallVec;

use i915_encoding::{DrawRect, Prim};

use crate::render::{BackendKind, ClearMask, Render, VertexAlloc};
use crate::{DrawState, Hardware, Result, VbState, VertexFetch, MAX_USER_PLANES};

use emit::Emit;
use verts::PipeVerts;

pub use clip::MAX_CLIPPED_VERTICES;

/// Number of clip planes: the six view-volume planes, then the user
/// planes.
const CLIP_PLANES: usize = 6 + MAX_USER_PLANES;

/// The stages a pipeline can be built from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Unfilled,
    Offset,
    Twoside,
    Clip,
    Flatshade,
    Emit,
}

/// Counters of the work done by the pipeline since it was created.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PipeStats {
    /// Primitives entering the chain.
    pub points: u64,
    pub lines: u64,
    pub tris: u64,
    /// Primitives that went through the plane-by-plane clipper.
    pub clipped: u64,
    /// Primitives dropped entirely outside a clip plane.
    pub rejected: u64,
    pub culled: u64,
    /// Vertices copied to the backend.
    pub emitted_vertices: u64,
}

/// Whether a vertex buffer drawn with `state` has to go through the
/// pipeline.
pub(crate) fn needs_pipeline(state: &DrawState, vb: &VbState) -> bool {
    vb.needs_clip() || state.is_unfilled() || state.any_offset() || state.twoside
}

pub(crate) struct Pipeline {
    chain: SmallVec<[StageKind; 6]>,
    verts: PipeVerts,
    fetch: VertexFetch,
    state: DrawState,
    planes: [[f32; 4]; CLIP_PLANES],
    emit: Emit,
    prim: Option<Prim>,
    stats: PipeStats,
}

impl Pipeline {
    pub(crate) fn new(max_indices: u32) -> Self {
        Self {
            chain: SmallVec::new(),
            verts: PipeVerts::new(),
            fetch: VertexFetch::new(),
            state: DrawState::default(),
            planes: view_planes(),
            emit: Emit::new(max_indices),
            prim: None,
            stats: PipeStats::default(),
        }
    }

    /// Rebuilds the stage chain for `state`.
    ///
    /// Candidate stages are linked in front of the emit stage one by one,
    /// so the chain runs in the reverse of the order they are visited.
    pub(crate) fn validate(&mut self, state: &DrawState, fetch: &VertexFetch, clip: bool) {
        let unfilled = state.is_unfilled();
        let candidates = [
            (StageKind::Unfilled, unfilled),
            (StageKind::Offset, state.any_offset()),
            (StageKind::Twoside, state.twoside),
            (StageKind::Clip, clip),
            (StageKind::Flatshade, state.flatshade && (clip || unfilled)),
        ];
        self.chain.clear();
        self.chain.push(StageKind::Emit);
        for (kind, wanted) in candidates {
            if wanted {
                self.chain.insert(0, kind);
            }
        }
        log::debug!("pipeline validated: {:?}", self.chain);

        self.state = state.clone();
        self.fetch = fetch.clone();
        self.verts.set_layout(fetch.layout().clone());
        self.planes = view_planes();
        for (i, plane) in state.active_user_planes() {
            self.planes[6 + i] = plane;
        }
    }

    pub(crate) fn chain(&self) -> &[StageKind] {
        &self.chain
    }

    pub(crate) fn stats(&self) -> PipeStats {
        self.stats
    }

    /// Wraps `next` for the duration of a vertex buffer.
    pub(crate) fn wrap<'a>(&'a mut self, next: &'a mut dyn Render) -> PipeRender<'a> {
        PipeRender { pipe: self, next }
    }

    fn point(&mut self, hw: &mut Hardware, next: &mut dyn Render, stage: usize, v: u32) -> Result<()> {
        match self.chain[stage] {
            StageKind::Clip => self.clip_point(hw, next, stage, v),
            StageKind::Emit => self.emit_point(hw, next, v),
            _ => self.point(hw, next, stage + 1, v),
        }
    }

    fn line(&mut self, hw: &mut Hardware, next: &mut dyn Render, stage: usize, v: [u32; 2]) -> Result<()> {
        match self.chain[stage] {
            StageKind::Clip => self.clip_line(hw, next, stage, v),
            StageKind::Flatshade => self.flatshade_line(hw, next, stage, v),
            StageKind::Emit => self.emit_line(hw, next, v),
            _ => self.line(hw, next, stage + 1, v),
        }
    }

    fn tri(&mut self, hw: &mut Hardware, next: &mut dyn Render, stage: usize, v: [u32; 3]) -> Result<()> {
        match self.chain[stage] {
            StageKind::Unfilled => self.unfilled_tri(hw, next, stage, v),
            StageKind::Offset => self.offset_tri(hw, next, stage, v),
            StageKind::Twoside => self.twoside_tri(hw, next, stage, v),
            StageKind::Clip => self.clip_tri(hw, next, stage, v),
            StageKind::Flatshade => self.flatshade_tri(hw, next, stage, v),
            StageKind::Emit => self.emit_tri(hw, next, v),
        }
    }

    /// Signed area term of a triangle in window coordinates, positive for
    /// counter-clockwise order.
    fn det(&self, v: [u32; 3]) -> f32 {
        let [p0, p1, p2] = v.map(|v| self.verts.window_pos(v));
        let (ex, ey) = (p0[0] - p2[0], p0[1] - p2[1]);
        let (fx, fy) = (p1[0] - p2[0], p1[1] - p2[1]);
        ex * fy - ey * fx
    }

    fn input_line(&mut self, hw: &mut Hardware, next: &mut dyn Render, v: [u32; 2]) -> Result<()> {
        self.stats.lines += 1;
        self.line(hw, next, 0, v)
    }

    /// Sends a triangle down the chain with some edge flags overridden.
    fn tri_with_edges(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        v: [u32; 3],
        edges: [Option<bool>; 3],
    ) -> Result<()> {
        let saved = v.map(|v| self.verts.edgeflag(v));
        for (&v, edge) in v.iter().zip(edges) {
            if let Some(flag) = edge {
                self.verts.set_edgeflag(v, flag);
            }
        }
        self.stats.tris += 1;
        let result = self.tri(hw, next, 0, v);
        for (&v, flag) in v.iter().zip(saved) {
            self.verts.set_edgeflag(v, flag);
        }
        result
    }

    /// Runs `count` vertices of the current primitive kind through the
    /// chain. `at` maps a position in the run to a vertex slot.
    fn run(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        count: u32,
        at: impl Fn(u32) -> u32,
    ) -> Result<()> {
        let Some(prim) = self.prim else {
            panic!("draw without a primitive kind");
        };
        let count = prim.trim(count);
        let keep = None;
        let off = Some(false);
        let on = Some(true);
        match prim {
            Prim::Points => {
                for i in 0..count {
                    self.stats.points += 1;
                    self.point(hw, next, 0, at(i))?;
                }
            }
            Prim::Lines => {
                for i in (0..count).step_by(2) {
                    self.input_line(hw, next, [at(i), at(i + 1)])?;
                }
            }
            Prim::LineStrip | Prim::LineLoop => {
                for i in 1..count {
                    self.input_line(hw, next, [at(i - 1), at(i)])?;
                }
                if prim == Prim::LineLoop && count >= 2 {
                    self.input_line(hw, next, [at(count - 1), at(0)])?;
                }
            }
            Prim::Triangles => {
                for i in (0..count).step_by(3) {
                    let v = [at(i), at(i + 1), at(i + 2)];
                    self.tri_with_edges(hw, next, v, [keep; 3])?;
                }
            }
            // Edge flags only apply to independent polygons; strips and
            // fans draw every edge.
            Prim::TriangleStrip => {
                for j in 2..count {
                    let v = if j & 1 == 0 {
                        [at(j - 2), at(j - 1), at(j)]
                    } else {
                        [at(j - 1), at(j - 2), at(j)]
                    };
                    self.tri_with_edges(hw, next, v, [on; 3])?;
                }
            }
            Prim::TriangleFan => {
                for j in 2..count {
                    self.tri_with_edges(hw, next, [at(0), at(j - 1), at(j)], [on; 3])?;
                }
            }
            Prim::Polygon => {
                for j in 2..count {
                    let inner_next = if j + 1 != count { off } else { keep };
                    let inner_first = if j != 2 { off } else { keep };
                    let v = [at(j - 1), at(j), at(0)];
                    self.tri_with_edges(hw, next, v, [keep, inner_next, inner_first])?;
                }
            }
            Prim::Quads => {
                for i in (0..count).step_by(4) {
                    let v = [at(i), at(i + 1), at(i + 3)];
                    self.tri_with_edges(hw, next, v, [keep, off, keep])?;
                    let v = [at(i + 1), at(i + 2), at(i + 3)];
                    self.tri_with_edges(hw, next, v, [keep, keep, off])?;
                }
            }
            Prim::QuadStrip => {
                for i in (0..count.saturating_sub(2)).step_by(2) {
                    let v = [at(i), at(i + 1), at(i + 3)];
                    self.tri_with_edges(hw, next, v, [keep, keep, off])?;
                    let v = [at(i + 2), at(i), at(i + 3)];
                    self.tri_with_edges(hw, next, v, [keep, off, keep])?;
                }
            }
        }
        self.verts.reset_tmps();
        self.flush_elts(hw, next)
    }
}

fn view_planes() -> [[f32; 4]; CLIP_PLANES] {
    let mut planes = [[0.0; 4]; CLIP_PLANES];
    planes[..6].copy_from_slice(&[
        [-1.0, 0.0, 0.0, 1.0],
        [1.0, 0.0, 0.0, 1.0],
        [0.0, -1.0, 0.0, 1.0],
        [0.0, 1.0, 0.0, 1.0],
        [0.0, 0.0, 1.0, 1.0],
        [0.0, 0.0, -1.0, 1.0],
    ]);
    planes
}

/// A [`Render`] that feeds primitives through the pipeline into `next`.
pub(crate) struct PipeRender<'a> {
    pipe: &'a mut Pipeline,
    next: &'a mut dyn Render,
}

impl Render for PipeRender<'_> {
    fn kind(&self) -> BackendKind {
        self.next.kind()
    }

    fn start_render(&mut self, hw: &mut Hardware, start_of_frame: bool) -> Result<()> {
        self.next.start_render(hw, start_of_frame)
    }

    fn allocate_vertices(
        &mut self,
        _hw: &mut Hardware,
        vertex_dwords: u32,
        count: u32,
    ) -> Result<VertexAlloc> {
        self.pipe.emit.begin();
        Ok(self.pipe.verts.alloc(vertex_dwords, count))
    }

    fn vertex_data<'a>(&'a mut self, _hw: &'a mut Hardware, alloc: &VertexAlloc) -> &'a mut [u32] {
        self.pipe.verts.input_data(alloc)
    }

    fn set_prim(&mut self, _hw: &mut Hardware, prim: Prim) -> Result<()> {
        self.pipe.prim = Some(prim);
        Ok(())
    }

    fn draw_prim(&mut self, hw: &mut Hardware, start: u32, count: u32) -> Result<()> {
        self.pipe.run(hw, &mut *self.next, count, |i| start + i)
    }

    fn draw_indexed_prim(&mut self, hw: &mut Hardware, indices: &[u32]) -> Result<()> {
        self.pipe
            .run(hw, &mut *self.next, indices.len() as u32, |i| indices[i as usize])
    }

    fn release_vertices(&mut self, hw: &mut Hardware, alloc: VertexAlloc) {
        self.pipe.emit.end(hw, &mut *self.next);
        self.pipe.verts.release(&alloc);
    }

    fn clear_rect(&mut self, hw: &mut Hardware, mask: ClearMask, rect: DrawRect) -> Result<()> {
        self.next.clear_rect(hw, mask, rect)
    }

    fn flush(&mut self, hw: &mut Hardware, end_of_frame: bool) -> Result<()> {
        self.next.flush(hw, end_of_frame)
    }
}
