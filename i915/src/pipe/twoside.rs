// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two-sided lighting: back-facing triangles take their back colors.

use i915_encoding::Attrib;

use super::Pipeline;
use crate::render::Render;
use crate::{Hardware, Result, Winding};

impl Pipeline {
    pub(super) fn twoside_tri(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        v: [u32; 3],
    ) -> Result<()> {
        let facing = match self.state.front_winding {
            Winding::Cw => -1.0,
            Winding::Ccw => 1.0,
        };
        if self.det(v) * facing >= 0.0 {
            return self.tri(hw, next, stage + 1, v);
        }

        let mark = self.verts.mark();
        let back = v.map(|v| self.verts.dup(v));
        for v in back {
            for (front, back) in [
                (Attrib::Color0, Attrib::BackColor0),
                (Attrib::Color1, Attrib::BackColor1),
            ] {
                if let Some(color) = self.verts.attr(v, back) {
                    self.verts.set_attr(v, front, color);
                }
            }
        }
        let result = self.tri(hw, next, stage + 1, back);
        self.verts.release_to(mark);
        result
    }
}
