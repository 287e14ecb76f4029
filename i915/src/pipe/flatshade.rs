// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copies the colors of the provoking vertex onto the others.
//!
//! Only needed ahead of stages that create vertices or split primitives,
//! where the hardware would otherwise pick a different provoking vertex.

use i915_encoding::Attrib;

use super::Pipeline;
use crate::render::Render;
use crate::{Hardware, Result};

impl Pipeline {
    fn copy_colors(&mut self, dst: u32, src: u32) {
        for attrib in Attrib::COLORS {
            if let Some(value) = self.verts.attr(src, attrib) {
                self.verts.set_attr(dst, attrib, value);
            }
        }
    }

    pub(super) fn flatshade_tri(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        [v0, v1, v2]: [u32; 3],
    ) -> Result<()> {
        let mark = self.verts.mark();
        let d0 = self.verts.dup(v0);
        let d1 = self.verts.dup(v1);
        self.copy_colors(d0, v2);
        self.copy_colors(d1, v2);
        let result = self.tri(hw, next, stage + 1, [d0, d1, v2]);
        self.verts.release_to(mark);
        result
    }

    pub(super) fn flatshade_line(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        [v0, v1]: [u32; 2],
    ) -> Result<()> {
        let mark = self.verts.mark();
        let d0 = self.verts.dup(v0);
        self.copy_colors(d0, v1);
        let result = self.line(hw, next, stage + 1, [d0, v1]);
        self.verts.release_to(mark);
        result
    }
}
