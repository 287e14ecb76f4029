// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Helpers shared by the unit tests.

use i915_encoding::{BufferId, DrawRect, Prim};

use crate::render::{BackendKind, ClearMask, Render, VertexAlloc};
use crate::{DrawOptions, Hardware, HwLock, RecordingKernel, Result, SharedArea, SubmissionLog};

/// Hardware over a 256x128 drawable and a recording kernel.
pub(crate) fn hardware() -> (Hardware, SubmissionLog) {
    hardware_with(&DrawOptions::default())
}

pub(crate) fn hardware_with(options: &DrawOptions) -> (Hardware, SubmissionLog) {
    let (kernel, log) = RecordingKernel::new();
    let lock = HwLock::new(SharedArea::new(DrawRect::new(0, 0, 256, 128)));
    (Hardware::new(options, Box::new(kernel), lock), log)
}

/// One call received by a [`RecordingRender`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    Start(bool),
    Alloc(u32),
    SetPrim(Prim),
    Sequential(u32, u32),
    Indexed(Vec<u32>),
    Release,
    Clear(ClearMask),
    Flush(bool),
}

/// A backend that keeps its vertices in memory and logs every call.
///
/// Allocation and release are left out of `calls` unless `log_allocs` is
/// set, so decomposition tests only see the draws.
pub(crate) struct RecordingRender {
    pub(crate) calls: Vec<Call>,
    pub(crate) log_allocs: bool,
    pub(crate) vertices: Vec<u32>,
    buffer: BufferId,
}

impl Default for RecordingRender {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            log_allocs: false,
            vertices: Vec::new(),
            buffer: BufferId::next(),
        }
    }
}

impl RecordingRender {
    /// Every vertex drawn by index, in draw order, with sequential runs
    /// expanded.
    pub(crate) fn drawn_indices(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for call in &self.calls {
            match call {
                Call::Sequential(start, count) => out.extend(*start..start + count),
                Call::Indexed(indices) => out.extend_from_slice(indices),
                _ => {}
            }
        }
        out
    }
}

impl Render for RecordingRender {
    fn kind(&self) -> BackendKind {
        BackendKind::Classic
    }

    fn start_render(&mut self, _hw: &mut Hardware, start_of_frame: bool) -> Result<()> {
        if self.log_allocs {
            self.calls.push(Call::Start(start_of_frame));
        }
        Ok(())
    }

    fn allocate_vertices(
        &mut self,
        _hw: &mut Hardware,
        vertex_dwords: u32,
        count: u32,
    ) -> Result<VertexAlloc> {
        if self.log_allocs {
            self.calls.push(Call::Alloc(count));
        }
        self.vertices.clear();
        self.vertices.resize((vertex_dwords * count) as usize, 0);
        Ok(VertexAlloc {
            buffer: self.buffer,
            offset: 0,
            vertex_dwords,
            count,
        })
    }

    fn vertex_data<'a>(&'a mut self, _hw: &'a mut Hardware, _alloc: &VertexAlloc) -> &'a mut [u32] {
        &mut self.vertices
    }

    fn set_prim(&mut self, _hw: &mut Hardware, prim: Prim) -> Result<()> {
        self.calls.push(Call::SetPrim(prim));
        Ok(())
    }

    fn draw_prim(&mut self, _hw: &mut Hardware, start: u32, count: u32) -> Result<()> {
        self.calls.push(Call::Sequential(start, count));
        Ok(())
    }

    fn draw_indexed_prim(&mut self, _hw: &mut Hardware, indices: &[u32]) -> Result<()> {
        self.calls.push(Call::Indexed(indices.to_vec()));
        Ok(())
    }

    fn release_vertices(&mut self, _hw: &mut Hardware, _alloc: VertexAlloc) {
        if self.log_allocs {
            self.calls.push(Call::Release);
        }
    }

    fn clear_rect(&mut self, _hw: &mut Hardware, mask: ClearMask, _rect: DrawRect) -> Result<()> {
        self.calls.push(Call::Clear(mask));
        Ok(())
    }

    fn flush(&mut self, _hw: &mut Hardware, end_of_frame: bool) -> Result<()> {
        self.calls.push(Call::Flush(end_of_frame));
        Ok(())
    }
}
