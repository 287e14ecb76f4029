// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Culling and point/line polygon modes.

use super::Pipeline;
use crate::render::Render;
use crate::{FillMode, Hardware, Result};

impl Pipeline {
    pub(super) fn unfilled_tri(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        v: [u32; 3],
    ) -> Result<()> {
        let (mode, culled) = if self.det(v) >= 0.0 {
            (self.state.fill_ccw(), self.state.culls_ccw())
        } else {
            (self.state.fill_cw(), self.state.culls_cw())
        };
        if culled {
            self.stats.culled += 1;
            return Ok(());
        }

        let [v0, v1, v2] = v;
        let flags = v.map(|v| self.verts.edgeflag(v));
        match mode {
            FillMode::Fill => self.tri(hw, next, stage + 1, v),
            FillMode::Line => {
                for (edge, draw) in [([v2, v0], flags[2]), ([v0, v1], flags[0]), ([v1, v2], flags[1])] {
                    if draw {
                        self.line(hw, next, stage + 1, edge)?;
                    }
                }
                Ok(())
            }
            FillMode::Point => {
                for (v, draw) in v.into_iter().zip(flags) {
                    if draw {
                        self.point(hw, next, stage + 1, v)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{draw, tri_vb};
    use crate::testing::Call;
    use crate::{CullMode, DrawState, FillMode};
    use i915_encoding::Prim;

    fn quad() -> Vec<[f32; 4]> {
        vec![
            [0.0, 0.0, 0.0, 1.0],
            [0.5, 0.0, 0.0, 1.0],
            [0.5, 0.5, 0.0, 1.0],
            [0.0, 0.5, 0.0, 1.0],
        ]
    }

    #[test]
    fn quads_in_line_mode_draw_only_the_outline() {
        let state = DrawState {
            fill_front: FillMode::Line,
            fill_back: FillMode::Line,
            ..DrawState::default()
        };
        let (next, _, emitted) = draw(&state, &tri_vb(quad(), Prim::Quads));
        assert_eq!(next.calls[0], Call::SetPrim(Prim::Lines));
        // Map emitted vertices back to the corners of the quad.
        let corner = |ix: u32| {
            let v = &emitted[ix as usize];
            let pos = [f32::from_bits(v[0]), f32::from_bits(v[1]), 0.0, 1.0];
            quad().iter().position(|&p| p == pos).unwrap() as u32
        };
        let mut edges: Vec<[u32; 2]> = next
            .drawn_indices()
            .chunks_exact(2)
            .map(|e| {
                let (a, b) = (corner(e[0]), corner(e[1]));
                [a.min(b), a.max(b)]
            })
            .collect();
        edges.sort_unstable();
        assert_eq!(edges, [[0, 1], [0, 3], [1, 2], [2, 3]]);
    }

    #[test]
    fn point_mode_draws_flagged_vertices() {
        let state = DrawState {
            fill_front: FillMode::Point,
            ..DrawState::default()
        };
        let vb = tri_vb(quad()[..3].to_vec(), Prim::Triangles).with_edgeflags(vec![true, false, true]);
        let (next, _, _) = draw(&state, &vb);
        assert_eq!(
            next.calls,
            [Call::SetPrim(Prim::Points), Call::Indexed(vec![0, 1])]
        );
    }

    #[test]
    fn culled_faces_are_dropped() {
        let state = DrawState {
            fill_front: FillMode::Line,
            cull: CullMode::Front,
            ..DrawState::default()
        };
        let (next, pipe, _) = draw(&state, &tri_vb(quad()[..3].to_vec(), Prim::Triangles));
        assert!(next.drawn_indices().is_empty());
        assert_eq!(pipe.stats().culled, 1);
    }
}
