// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render backends.
//!
//! Every backend turns primitive runs over an allocated block of vertices
//! into something the hardware (or a software rasterizer) can draw. The
//! draw context talks to exactly one backend at a time through the
//! [`Render`] trait, possibly through a wrapper that decomposes primitive
//! kinds the backend cannot draw ([`QuadsRender`]) or through the clip
//! pipeline.

mod classic;
mod hwz;
mod quads;
mod swrast;
mod zone;

use std::ops::{BitOr, BitOrAssign, Range};

use i915_encoding::cmd::{
    prim_inline, CLEARPARAM_CLEAR_RECT, CLEARPARAM_WRITE_COLOR, CLEARPARAM_WRITE_DEPTH,
    CLEARPARAM_WRITE_STENCIL, CLEAR_PARAMETERS, DRAW_RECT,
};
use i915_encoding::{BufferId, CommandSink, DrawRect, HwPrim, Prim};

use crate::hardware::ClearValues;
use crate::{DrawOptions, Hardware, Result};

pub use classic::Classic;
pub use hwz::HwzRender;
pub use quads::{Quads, QuadsRender};
pub use swrast::{Rasterizer, RecordingRasterizer, SwCall, SwVertex, SwrastRender};
pub use zone::{ZoneRender, ZONE_BLOCK_DWORDS};

/// A block of vertices reserved through [`Render::allocate_vertices`].
///
/// Vertices are addressed by their position within the block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexAlloc {
    pub buffer: BufferId,
    /// Dword offset of the first vertex within `buffer`.
    pub offset: u32,
    pub vertex_dwords: u32,
    pub count: u32,
}

impl VertexAlloc {
    pub fn dwords(&self) -> u32 {
        self.vertex_dwords * self.count
    }

    /// Dword range of the block within its buffer.
    pub fn range(&self) -> Range<usize> {
        self.offset as usize..(self.offset + self.dwords()) as usize
    }

    pub fn byte_offset(&self) -> u32 {
        self.offset * 4
    }

    /// Dword range of vertex `ix` relative to the start of the block.
    pub fn vertex(&self, ix: u32) -> Range<usize> {
        let start = (ix * self.vertex_dwords) as usize;
        start..start + self.vertex_dwords as usize
    }
}

/// Buffers touched by a clear.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClearMask(pub u8);

impl ClearMask {
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);
    pub const STENCIL: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ClearMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClearMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The concrete render backends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Classic,
    Zone,
    HardwareZone,
    Software,
}

/// A rasterization strategy.
///
/// Calls follow the pattern `allocate_vertices`, fill the block through
/// `vertex_data`, then any number of `set_prim` and `draw_*` calls, then
/// `release_vertices`. Only one allocation may be outstanding.
pub trait Render {
    fn kind(&self) -> BackendKind;

    /// Called before drawing starts, with `start_of_frame` set for the
    /// first draw of a frame.
    fn start_render(&mut self, hw: &mut Hardware, start_of_frame: bool) -> Result<()>;

    fn allocate_vertices(
        &mut self,
        hw: &mut Hardware,
        vertex_dwords: u32,
        count: u32,
    ) -> Result<VertexAlloc>;

    /// The storage of an outstanding allocation.
    fn vertex_data<'a>(&'a mut self, hw: &'a mut Hardware, alloc: &VertexAlloc) -> &'a mut [u32];

    /// Declares the primitive kind of the following draws.
    fn set_prim(&mut self, hw: &mut Hardware, prim: Prim) -> Result<()>;

    /// Draws `count` vertices of the current allocation from `start`.
    fn draw_prim(&mut self, hw: &mut Hardware, start: u32, count: u32) -> Result<()>;

    /// Draws vertices of the current allocation by index.
    fn draw_indexed_prim(&mut self, hw: &mut Hardware, indices: &[u32]) -> Result<()>;

    fn release_vertices(&mut self, hw: &mut Hardware, alloc: VertexAlloc);

    fn clear_rect(&mut self, hw: &mut Hardware, mask: ClearMask, rect: DrawRect) -> Result<()>;

    /// Pushes buffered work to the command stream. `end_of_frame` marks
    /// the last flush of a frame.
    fn flush(&mut self, hw: &mut Hardware, end_of_frame: bool) -> Result<()>;

    /// Releases backend resources.
    fn destroy(&mut self, hw: &mut Hardware) {
        let _ = hw;
    }
}

/// One instance of every backend, created with the context.
pub(crate) struct Backends {
    classic: Classic,
    zone: ZoneRender,
    hwz: HwzRender,
    swrast: SwrastRender,
}

impl Backends {
    pub(crate) fn new(options: &DrawOptions, rasterizer: Box<dyn Rasterizer>) -> Self {
        Self {
            classic: Classic::new(),
            zone: ZoneRender::new(options.zone_pool_blocks),
            hwz: HwzRender::new(),
            swrast: SwrastRender::new(rasterizer),
        }
    }

    pub(crate) fn get_mut(&mut self, kind: BackendKind) -> &mut dyn Render {
        match kind {
            BackendKind::Classic => &mut self.classic,
            BackendKind::Zone => &mut self.zone,
            BackendKind::HardwareZone => &mut self.hwz,
            BackendKind::Software => &mut self.swrast,
        }
    }

    pub(crate) fn destroy(&mut self, hw: &mut Hardware) {
        self.classic.destroy(hw);
        self.zone.destroy(hw);
        self.hwz.destroy(hw);
        self.swrast.destroy(hw);
    }
}

/// Writes a draw-rectangle command clipping rendering to `rect`.
pub(crate) fn emit_draw_rect(sink: &mut impl CommandSink, rect: DrawRect) {
    sink.dword(DRAW_RECT);
    sink.dword(0);
    sink.dword((rect.y1 << 16) | rect.x1);
    sink.dword(((rect.y2 - 1) << 16) | (rect.x2 - 1));
    sink.dword(0);
}

/// Writes clear parameters followed by a clear-rect primitive over `rect`.
pub(crate) fn emit_clear_rect(
    sink: &mut impl CommandSink,
    mask: ClearMask,
    rect: DrawRect,
    values: ClearValues,
) {
    let mut flags = CLEARPARAM_CLEAR_RECT;
    if mask.contains(ClearMask::COLOR) {
        flags |= CLEARPARAM_WRITE_COLOR;
    }
    if mask.contains(ClearMask::DEPTH) {
        flags |= CLEARPARAM_WRITE_DEPTH;
    }
    if mask.contains(ClearMask::STENCIL) {
        flags |= CLEARPARAM_WRITE_STENCIL;
    }
    sink.dword(CLEAR_PARAMETERS);
    sink.dword(flags);
    sink.dword(0);
    sink.dword(values.color);
    sink.dword(values.depth);
    sink.dword(0);
    sink.dword(values.stencil);

    let (x1, y1, x2, y2) = (rect.x1 as f32, rect.y1 as f32, rect.x2 as f32, rect.y2 as f32);
    sink.dword(prim_inline(HwPrim::CLEAR_RECT, 6));
    for [x, y] in [[x2, y2], [x1, y2], [x1, y1]] {
        sink.float(x);
        sink.float(y);
    }
}
