// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::{Arc, Mutex, PoisonError};

use bytemuck::{Pod, Zeroable};

use i915_encoding::{decompose, Attrib, BufferId, DrawRect, Prim, Primitive, VertexLayout};

use super::{BackendKind, ClearMask, Render, VertexAlloc};
use crate::hardware::ClearValues;
use crate::{Hardware, Result};

/// A vertex as seen by the software rasterizer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SwVertex {
    /// Window position; `w` holds 1/w.
    pub pos: [f32; 4],
    pub color: [f32; 4],
    pub specular: [f32; 4],
    pub fog: f32,
    pub tex: [[f32; 4]; 8],
}

impl SwVertex {
    /// Decodes a hardware vertex laid out as `layout`.
    pub fn from_hw(layout: &VertexLayout, vertex: &[u32]) -> Self {
        let read = |attrib, default| layout.slot(attrib).map_or(default, |s| s.read(vertex));
        let mut out = Self {
            pos: read(Attrib::Pos, [0.0, 0.0, 0.0, 1.0]),
            color: read(Attrib::Color0, [1.0; 4]),
            specular: read(Attrib::Color1, [0.0, 0.0, 0.0, 1.0]),
            fog: read(Attrib::Fog, [0.0; 4])[0],
            ..Self::default()
        };
        for (unit, attrib) in Attrib::TEX.into_iter().enumerate() {
            out.tex[unit] = read(attrib, [0.0, 0.0, 0.0, 1.0]);
        }
        out
    }
}

/// The CPU rasterizer behind the software fallback.
pub trait Rasterizer {
    fn point(&mut self, v: &SwVertex);
    fn line(&mut self, v0: &SwVertex, v1: &SwVertex);
    fn triangle(&mut self, v0: &SwVertex, v1: &SwVertex, v2: &SwVertex);
    fn clear(&mut self, mask: ClearMask, rect: DrawRect, values: ClearValues);
    /// Completes outstanding drawing.
    fn finish(&mut self) {}
}

/// One call received by a [`RecordingRasterizer`].
#[derive(Clone, Debug, PartialEq)]
pub enum SwCall {
    Point(SwVertex),
    Line([SwVertex; 2]),
    Triangle([SwVertex; 3]),
    Clear(ClearMask, DrawRect),
    Finish,
}

/// A rasterizer that only remembers what it was asked to draw.
#[derive(Default)]
pub struct RecordingRasterizer {
    calls: Arc<Mutex<Vec<SwCall>>>,
}

impl RecordingRasterizer {
    /// The rasterizer and a handle on its call log.
    pub fn new() -> (Self, Arc<Mutex<Vec<SwCall>>>) {
        let rasterizer = Self::default();
        let calls = rasterizer.calls.clone();
        (rasterizer, calls)
    }

    fn push(&self, call: SwCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl Rasterizer for RecordingRasterizer {
    fn point(&mut self, v: &SwVertex) {
        self.push(SwCall::Point(*v));
    }

    fn line(&mut self, v0: &SwVertex, v1: &SwVertex) {
        self.push(SwCall::Line([*v0, *v1]));
    }

    fn triangle(&mut self, v0: &SwVertex, v1: &SwVertex, v2: &SwVertex) {
        self.push(SwCall::Triangle([*v0, *v1, *v2]));
    }

    fn clear(&mut self, mask: ClearMask, rect: DrawRect, _values: ClearValues) {
        self.push(SwCall::Clear(mask, rect));
    }

    fn finish(&mut self) {
        self.push(SwCall::Finish);
    }
}

/// Software fallback: hardware vertices are decoded and handed to a
/// [`Rasterizer`].
pub struct SwrastRender {
    rasterizer: Box<dyn Rasterizer>,
    buffer: BufferId,
    vertices: Vec<u32>,
    decoded: Vec<SwVertex>,
    alloc: Option<VertexAlloc>,
    prim: Option<Prim>,
}

impl SwrastRender {
    pub fn new(rasterizer: Box<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            buffer: BufferId::next(),
            vertices: Vec::new(),
            decoded: Vec::new(),
            alloc: None,
            prim: None,
        }
    }

    /// Decodes the current allocation once per draw.
    fn decode(&mut self, layout: &VertexLayout) -> &[SwVertex] {
        let Some(alloc) = self.alloc else {
            panic!("draw without allocated vertices");
        };
        self.decoded.clear();
        self.decoded.extend(
            self.vertices
                .chunks_exact(alloc.vertex_dwords as usize)
                .map(|v| SwVertex::from_hw(layout, v)),
        );
        &self.decoded
    }

    fn draw(&mut self, hw: &Hardware, count: u32, at: impl Fn(u32) -> u32) {
        let Some(prim) = self.prim else {
            panic!("draw without a primitive kind");
        };
        self.decode(hw.vertex_layout());
        let v = &self.decoded;
        let rasterizer = &mut self.rasterizer;
        decompose(prim, count, |p| match p {
            Primitive::Point(a) => rasterizer.point(&v[at(a) as usize]),
            Primitive::Line(a, b) => rasterizer.line(&v[at(a) as usize], &v[at(b) as usize]),
            Primitive::Tri(a, b, c) => rasterizer.triangle(
                &v[at(a) as usize],
                &v[at(b) as usize],
                &v[at(c) as usize],
            ),
        });
    }
}

impl Render for SwrastRender {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn start_render(&mut self, _hw: &mut Hardware, _start_of_frame: bool) -> Result<()> {
        Ok(())
    }

    fn allocate_vertices(
        &mut self,
        hw: &mut Hardware,
        vertex_dwords: u32,
        count: u32,
    ) -> Result<VertexAlloc> {
        assert!(self.alloc.is_none(), "previous vertices not released");
        // Queued hardware commands must land before the CPU draws.
        if !hw.batch().is_empty() {
            hw.flush()?;
        }
        self.vertices.clear();
        self.vertices.resize((vertex_dwords * count) as usize, 0);
        let alloc = VertexAlloc {
            buffer: self.buffer,
            offset: 0,
            vertex_dwords,
            count,
        };
        self.alloc = Some(alloc);
        Ok(alloc)
    }

    fn vertex_data<'a>(&'a mut self, _hw: &'a mut Hardware, alloc: &VertexAlloc) -> &'a mut [u32] {
        debug_assert_eq!(alloc.buffer, self.buffer);
        &mut self.vertices
    }

    fn set_prim(&mut self, _hw: &mut Hardware, prim: Prim) -> Result<()> {
        self.prim = Some(prim);
        Ok(())
    }

    fn draw_prim(&mut self, hw: &mut Hardware, start: u32, count: u32) -> Result<()> {
        self.draw(hw, count, |i| start + i);
        Ok(())
    }

    fn draw_indexed_prim(&mut self, hw: &mut Hardware, indices: &[u32]) -> Result<()> {
        self.draw(hw, indices.len() as u32, |i| indices[i as usize]);
        Ok(())
    }

    fn release_vertices(&mut self, _hw: &mut Hardware, alloc: VertexAlloc) {
        debug_assert_eq!(alloc.buffer, self.buffer);
        self.alloc = None;
    }

    fn clear_rect(&mut self, hw: &mut Hardware, mask: ClearMask, rect: DrawRect) -> Result<()> {
        self.rasterizer.clear(mask, rect, hw.clear_values());
        Ok(())
    }

    fn flush(&mut self, _hw: &mut Hardware, _end_of_frame: bool) -> Result<()> {
        self.rasterizer.finish();
        Ok(())
    }
}
