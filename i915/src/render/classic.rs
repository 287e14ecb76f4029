// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use i915_encoding::cmd::{
    elts_dwords, pack_elts, prim_elts, prim_sequential, CLEAR_RECT_DWORDS, MI_NOOP,
    MI_WAIT_FOR_EVENT, MI_WAIT_FOR_PLANE_A_FLIP, PRIM_MAX_COUNT,
};
use i915_encoding::{CommandSink, DrawRect, HwPrim, Prim};

use super::{emit_clear_rect, BackendKind, ClearMask, Render, VertexAlloc};
use crate::{Error, Hardware, Result};

/// Draws straight into the command buffer, with primitives indexing the
/// shared vertex buffer through S0.
#[derive(Default)]
pub struct Classic {
    prim: Option<(Prim, HwPrim)>,
    alloc: Option<VertexAlloc>,
}

impl Classic {
    pub fn new() -> Self {
        Self::default()
    }

    fn hw_prim(&self) -> HwPrim {
        match self.prim {
            Some((_, hw_prim)) => hw_prim,
            None => panic!("draw without a primitive kind"),
        }
    }

    /// Waits for a pending page flip before the first draw of a frame.
    pub(crate) fn wait_for_flip(hw: &mut Hardware) -> Result<()> {
        if hw.flip_pending() {
            let mut p = hw.reserve(2, 0)?;
            p.dword(MI_WAIT_FOR_EVENT | MI_WAIT_FOR_PLANE_A_FLIP);
            p.dword(MI_NOOP);
            drop(p);
            hw.set_flip_pending(false);
        }
        Ok(())
    }
}

impl Render for Classic {
    fn kind(&self) -> BackendKind {
        BackendKind::Classic
    }

    fn start_render(&mut self, hw: &mut Hardware, start_of_frame: bool) -> Result<()> {
        if start_of_frame {
            Self::wait_for_flip(hw)?;
        }
        Ok(())
    }

    fn allocate_vertices(
        &mut self,
        hw: &mut Hardware,
        vertex_dwords: u32,
        count: u32,
    ) -> Result<VertexAlloc> {
        assert!(self.alloc.is_none(), "previous vertices not released");
        if count > PRIM_MAX_COUNT {
            return Err(Error::VertexBufferTooLarge(count));
        }
        let alloc = hw.alloc_vertices(vertex_dwords, count)?;
        hw.set_vertex_buffer(&alloc);
        self.alloc = Some(alloc);
        Ok(alloc)
    }

    fn vertex_data<'a>(&'a mut self, hw: &'a mut Hardware, alloc: &VertexAlloc) -> &'a mut [u32] {
        hw.vertices_mut().data_mut(alloc)
    }

    fn set_prim(&mut self, hw: &mut Hardware, prim: Prim) -> Result<()> {
        let Some(hw_prim) = prim.hw_prim() else {
            panic!("{prim:?} must be decomposed before reaching the hardware");
        };
        hw.set_reduced_prim(prim.reduced());
        self.prim = Some((prim, hw_prim));
        Ok(())
    }

    fn draw_prim(&mut self, hw: &mut Hardware, start: u32, count: u32) -> Result<()> {
        let hw_prim = self.hw_prim();
        if count == 0 {
            return Ok(());
        }
        let mut p = hw.begin_prim(2, 0)?;
        p.dword(prim_sequential(hw_prim, count));
        p.dword(start);
        Ok(())
    }

    fn draw_indexed_prim(&mut self, hw: &mut Hardware, indices: &[u32]) -> Result<()> {
        let hw_prim = self.hw_prim();
        if indices.is_empty() {
            return Ok(());
        }
        let count = indices.len() as u32;
        assert!(count <= PRIM_MAX_COUNT, "index run of {count} not split");
        let mut p = hw.begin_prim(1 + elts_dwords(count), 0)?;
        p.dword(prim_elts(hw_prim, count));
        pack_elts(indices, |d| p.dword(d));
        Ok(())
    }

    fn release_vertices(&mut self, hw: &mut Hardware, alloc: VertexAlloc) {
        hw.vertices_mut().release(&alloc);
        self.alloc = None;
    }

    fn clear_rect(&mut self, hw: &mut Hardware, mask: ClearMask, rect: DrawRect) -> Result<()> {
        let values = hw.clear_values();
        let mut p = hw.reserve(CLEAR_RECT_DWORDS, 0)?;
        emit_clear_rect(&mut p, mask, rect, values);
        Ok(())
    }

    fn flush(&mut self, hw: &mut Hardware, _end_of_frame: bool) -> Result<()> {
        hw.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::hardware;
    use i915_encoding::cmd::{S0, S0_VB_OFFSET_MASK};

    #[test]
    fn sequential_and_indexed_runs_follow_the_state() {
        let (mut hw, log) = hardware();
        let mut classic = Classic::new();
        classic.start_render(&mut hw, true).unwrap();
        let alloc = classic.allocate_vertices(&mut hw, 4, 6).unwrap();
        classic.vertex_data(&mut hw, &alloc).fill(1);
        classic.set_prim(&mut hw, Prim::TriangleStrip).unwrap();
        classic.draw_prim(&mut hw, 0, 6).unwrap();
        classic.set_prim(&mut hw, Prim::Triangles).unwrap();
        classic.draw_indexed_prim(&mut hw, &[0, 1, 2]).unwrap();
        classic.release_vertices(&mut hw, alloc);
        classic.flush(&mut hw, true).unwrap();

        let sent = log.last().unwrap();
        let entry = sent.submission.entry();
        // Full immediate state first, then the two primitives.
        assert_eq!(
            &entry[9..14],
            [
                prim_sequential(HwPrim::TRISTRIP, 6),
                0,
                prim_elts(HwPrim::TRILIST, 3),
                0x0001_0000,
                2
            ]
        );
        let vb = sent.address(alloc.buffer).unwrap();
        assert_eq!(entry[1 + S0], vb & S0_VB_OFFSET_MASK);
        assert_eq!(sent.submission.buffer(alloc.buffer).unwrap().len(), 24);
    }

    #[test]
    #[should_panic]
    fn quads_never_reach_the_hardware() {
        let (mut hw, _) = hardware();
        let _ = Classic::new().set_prim(&mut hw, Prim::Quads);
    }

    #[test]
    fn pending_flip_is_waited_for_once() {
        let (mut hw, _) = hardware();
        hw.set_flip_pending(true);
        let mut classic = Classic::new();
        classic.start_render(&mut hw, true).unwrap();
        classic.start_render(&mut hw, true).unwrap();
        assert_eq!(
            hw.batch().data(i915_encoding::Segment::Immediate),
            [MI_WAIT_FOR_EVENT | MI_WAIT_FOR_PLANE_A_FLIP, MI_NOOP]
        );
    }
}
