// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Polygon offset computed in software.
//!
//! Used whenever the offset has to agree between filled polygons and the
//! lines or points the unfilled stage draws for them.

use i915_encoding::{Attrib, EmitFormat};

use super::Pipeline;
use crate::render::Render;
use crate::{Hardware, Result};

impl Pipeline {
    /// Depth offset of a triangle from its slope in window space.
    fn zoffset(&self, v: [u32; 3], det: f32) -> f32 {
        let units = self.state.offset_units;
        if det == 0.0 {
            return units;
        }
        let [p0, p1, p2] = v.map(|v| self.verts.window_pos(v));
        let (ex, ey, ez) = (p0[0] - p2[0], p0[1] - p2[1], p0[2] - p2[2]);
        let (fx, fy, fz) = (p1[0] - p2[0], p1[1] - p2[1], p1[2] - p2[2]);
        let a = ey * fz - ez * fy;
        let b = ez * fx - ex * fz;
        let dzdx = (a / det).abs();
        let dzdy = (b / det).abs();
        units + dzdx.max(dzdy) * self.state.offset_scale
    }

    pub(super) fn offset_tri(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        v: [u32; 3],
    ) -> Result<()> {
        let det = self.det(v);
        let mode = if det >= 0.0 {
            self.state.fill_ccw()
        } else {
            self.state.fill_cw()
        };
        let has_depth = self
            .verts
            .layout()
            .slot(Attrib::Pos)
            .is_some_and(|slot| matches!(slot.format, EmitFormat::Float3 | EmitFormat::Float4));
        if !self.state.offset_for(mode) || !has_depth {
            return self.tri(hw, next, stage + 1, v);
        }

        let z = self.zoffset(v, det);
        let mark = self.verts.mark();
        let moved = v.map(|v| self.verts.dup(v));
        for v in moved {
            let mut pos = self.verts.window_pos(v);
            pos[2] += z;
            self.verts.set_attr(v, Attrib::Pos, pos);
        }
        let result = self.tri(hw, next, stage + 1, moved);
        self.verts.release_to(mark);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{draw, tri_vb};
    use crate::{DrawState, FillMode};
    use i915_encoding::Prim;

    fn window_z(state: &DrawState, positions: Vec<[f32; 4]>) -> Vec<f32> {
        let vb = tri_vb(positions, Prim::Triangles);
        let (_, _, emitted) = draw(state, &vb);
        emitted[..3].iter().map(|v| f32::from_bits(v[2])).collect()
    }

    #[test]
    fn flat_triangles_get_the_constant_bias() {
        let state = DrawState {
            offset_fill: true,
            offset_units: 0.25,
            offset_scale: 4.0,
            ..DrawState::default()
        };
        let z = window_z(
            &state,
            vec![
                [0.0, 0.0, 0.0, 1.0],
                [0.5, 0.0, 0.0, 1.0],
                [0.0, 0.5, 0.0, 1.0],
            ],
        );
        assert_eq!(z, [0.25; 3]);
    }

    #[test]
    fn sloped_triangles_add_the_steepest_gradient() {
        let state = DrawState {
            offset_fill: true,
            offset_scale: 1.0,
            ..DrawState::default()
        };
        // z rises by 0.5 per unit of x and 0.25 per unit of y.
        let z = window_z(
            &state,
            vec![
                [0.0, 0.0, 0.0, 1.0],
                [0.5, 0.0, 0.25, 1.0],
                [0.0, 0.5, 0.125, 1.0],
            ],
        );
        assert_eq!(z, [0.5, 0.75, 0.625]);
    }

    #[test]
    fn offset_follows_the_polygon_mode_of_the_face() {
        let state = DrawState {
            fill_back: FillMode::Line,
            offset_line: true,
            offset_units: 1.0,
            ..DrawState::default()
        };
        // Front facing and filled: no offset.
        let z = window_z(
            &state,
            vec![
                [0.0, 0.0, 0.0, 1.0],
                [0.5, 0.0, 0.0, 1.0],
                [0.0, 0.5, 0.0, 1.0],
            ],
        );
        assert_eq!(z, [0.0; 3]);
    }
}
