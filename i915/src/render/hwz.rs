// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use i915_encoding::cmd::prim_inline;
use i915_encoding::{CommandSink, DrawRect, HwPrim, Prim, ZoneGrid};

use super::{BackendKind, Classic, ClearMask, Render, VertexAlloc};
use crate::{Hardware, HwzParams, Result, SubmitMode};

/// Hardware binning: commands are encoded as for [`Classic`], and the
/// kernel bins them into zones at submission.
#[derive(Default)]
pub struct HwzRender {
    inner: Classic,
}

impl HwzRender {
    pub fn new() -> Self {
        Self::default()
    }

    fn params(hw: &Hardware) -> HwzParams {
        let grid = ZoneGrid::new(hw.draw_rect());
        HwzParams {
            draw_rect: hw.draw_rect(),
            width_in_zones: grid.width_in_zones(),
            height_in_zones: grid.height_in_zones(),
        }
    }
}

impl Render for HwzRender {
    fn kind(&self) -> BackendKind {
        BackendKind::HardwareZone
    }

    fn start_render(&mut self, hw: &mut Hardware, start_of_frame: bool) -> Result<()> {
        hw.set_submit_mode(SubmitMode::Hwz(Self::params(hw)));
        if start_of_frame {
            Classic::wait_for_flip(hw)?;
            let mut p = hw.reserve(2, 0)?;
            p.dword(prim_inline(HwPrim::ZONE_INIT, 1));
            p.dword(0);
        }
        Ok(())
    }

    fn allocate_vertices(
        &mut self,
        hw: &mut Hardware,
        vertex_dwords: u32,
        count: u32,
    ) -> Result<VertexAlloc> {
        self.inner.allocate_vertices(hw, vertex_dwords, count)
    }

    fn vertex_data<'a>(&'a mut self, hw: &'a mut Hardware, alloc: &VertexAlloc) -> &'a mut [u32] {
        self.inner.vertex_data(hw, alloc)
    }

    fn set_prim(&mut self, hw: &mut Hardware, prim: Prim) -> Result<()> {
        self.inner.set_prim(hw, prim)
    }

    fn draw_prim(&mut self, hw: &mut Hardware, start: u32, count: u32) -> Result<()> {
        self.inner.draw_prim(hw, start, count)
    }

    fn draw_indexed_prim(&mut self, hw: &mut Hardware, indices: &[u32]) -> Result<()> {
        self.inner.draw_indexed_prim(hw, indices)
    }

    fn release_vertices(&mut self, hw: &mut Hardware, alloc: VertexAlloc) {
        self.inner.release_vertices(hw, alloc);
    }

    fn clear_rect(&mut self, hw: &mut Hardware, mask: ClearMask, rect: DrawRect) -> Result<()> {
        self.inner.clear_rect(hw, mask, rect)
    }

    fn flush(&mut self, hw: &mut Hardware, end_of_frame: bool) -> Result<()> {
        hw.set_submit_mode(SubmitMode::Hwz(Self::params(hw)));
        let result = hw.flush();
        if end_of_frame {
            hw.set_submit_mode(SubmitMode::Classic);
        }
        result.map(|_| ())
    }

    fn destroy(&mut self, hw: &mut Hardware) {
        if matches!(hw.submit_mode(), SubmitMode::Hwz(_)) {
            hw.set_submit_mode(SubmitMode::Classic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::hardware;

    #[test]
    fn frame_starts_with_zone_init_and_submits_binned() {
        let (mut hw, log) = hardware();
        let mut hwz = HwzRender::new();
        hwz.start_render(&mut hw, true).unwrap();
        let alloc = hwz.allocate_vertices(&mut hw, 3, 3).unwrap();
        hwz.set_prim(&mut hw, Prim::Triangles).unwrap();
        hwz.draw_prim(&mut hw, 0, 3).unwrap();
        hwz.release_vertices(&mut hw, alloc);
        hwz.flush(&mut hw, true).unwrap();

        let sent = log.last().unwrap();
        assert_eq!(sent.submission.entry()[0], prim_inline(HwPrim::ZONE_INIT, 1));
        let params = sent.hwz.unwrap();
        assert_eq!(params.draw_rect, hw.draw_rect());
        // 256x128 pixels
        assert_eq!((params.width_in_zones, params.height_in_zones), (4, 4));
        assert_eq!(hw.submit_mode(), SubmitMode::Classic);
    }
}
