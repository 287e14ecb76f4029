// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Populated vertex buffers as handed over by the transform stage.

use i915_encoding::{decompose, Attrib, Prim, ReducedPrim};

use crate::DrawState;

pub const CLIP_RIGHT_BIT: u8 = 0x01;
pub const CLIP_LEFT_BIT: u8 = 0x02;
pub const CLIP_TOP_BIT: u8 = 0x04;
pub const CLIP_BOTTOM_BIT: u8 = 0x08;
pub const CLIP_NEAR_BIT: u8 = 0x10;
pub const CLIP_FAR_BIT: u8 = 0x20;
/// Set when the vertex is outside at least one user plane. Which ones is
/// worked out again when the vertex is fetched.
pub const CLIP_USER_BIT: u8 = 0x40;

/// A run of vertices drawn as one primitive kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PrimRun {
    pub prim: Prim,
    /// First vertex, or first element when the buffer is indexed.
    pub start: u32,
    pub count: u32,
}

/// Per-vertex attribute arrays, indexed by [`Attrib`].
#[derive(Clone, Debug, Default)]
pub struct AttribArrays {
    arrays: [Option<Vec<[f32; 4]>>; Attrib::COUNT],
}

impl AttribArrays {
    pub fn set(&mut self, attrib: Attrib, values: Vec<[f32; 4]>) {
        self.arrays[attrib as usize] = Some(values);
    }

    pub fn get(&self, attrib: Attrib) -> Option<&[[f32; 4]]> {
        self.arrays[attrib as usize].as_deref()
    }
}

/// The vertices and primitives of one draw call.
///
/// Positions ([`Attrib::Pos`]) are in clip space.
#[derive(Clone, Debug, Default)]
pub struct VertexBuffer {
    pub count: u32,
    pub prims: Vec<PrimRun>,
    /// When present, runs address vertices through this array.
    pub elts: Option<Vec<u32>>,
    /// Legacy clip mask per vertex; empty when nothing is clipped.
    pub clipmask: Vec<u8>,
    pub clip_or: u8,
    pub clip_and: u8,
    /// Edge flag per vertex; all edges are drawn when absent.
    pub edgeflags: Option<Vec<bool>>,
    pub attribs: AttribArrays,
}

impl VertexBuffer {
    /// A buffer over clip-space `positions` with no primitives yet.
    pub fn new(positions: Vec<[f32; 4]>) -> Self {
        let mut vb = Self {
            count: positions.len() as u32,
            ..Self::default()
        };
        vb.attribs.set(Attrib::Pos, positions);
        vb
    }

    pub fn with_prim(mut self, prim: Prim, start: u32, count: u32) -> Self {
        self.prims.push(PrimRun { prim, start, count });
        self
    }

    pub fn with_attrib(mut self, attrib: Attrib, values: Vec<[f32; 4]>) -> Self {
        assert_eq!(values.len() as u32, self.count, "{attrib:?} array length");
        self.attribs.set(attrib, values);
        self
    }

    pub fn with_elts(mut self, elts: Vec<u32>) -> Self {
        self.elts = Some(elts);
        self
    }

    pub fn with_edgeflags(mut self, flags: Vec<bool>) -> Self {
        self.edgeflags = Some(flags);
        self
    }

    /// Computes the clip masks of every vertex against the view volume
    /// and the user planes enabled in `state`.
    pub fn with_clip_test(mut self, state: &DrawState) -> Self {
        let positions = self.attribs.get(Attrib::Pos).unwrap_or_default();
        let (masks, or, and) = clip_test(positions, state);
        self.clipmask = masks;
        self.clip_or = or;
        self.clip_and = and;
        self
    }

    pub fn clipmask(&self, vertex: u32) -> u8 {
        self.clipmask.get(vertex as usize).copied().unwrap_or(0)
    }

    pub fn edgeflag(&self, vertex: u32) -> bool {
        self.edgeflags
            .as_ref()
            .map_or(true, |flags| flags[vertex as usize])
    }

    /// The vertex at position `i` of `run`.
    pub fn vertex(&self, run: &PrimRun, i: u32) -> u32 {
        match &self.elts {
            Some(elts) => elts[(run.start + i) as usize],
            None => run.start + i,
        }
    }

    /// Number of points, lines and triangles the buffer rasterizes.
    pub fn primitive_count(&self) -> u32 {
        let mut count = 0;
        for run in &self.prims {
            decompose(run.prim, run.count, |_| count += 1);
        }
        count
    }
}

/// Classifies clip-space positions against the view volume and the user
/// planes of `state`, returning the per-vertex masks with their union and
/// intersection.
pub fn clip_test(positions: &[[f32; 4]], state: &DrawState) -> (Vec<u8>, u8, u8) {
    let mut or = 0;
    let mut and = !0;
    let masks: Vec<u8> = positions
        .iter()
        .map(|&[x, y, z, w]| {
            let mut mask = 0;
            if x > w {
                mask |= CLIP_RIGHT_BIT;
            }
            if x < -w {
                mask |= CLIP_LEFT_BIT;
            }
            if y > w {
                mask |= CLIP_TOP_BIT;
            }
            if y < -w {
                mask |= CLIP_BOTTOM_BIT;
            }
            if z < -w {
                mask |= CLIP_NEAR_BIT;
            }
            if z > w {
                mask |= CLIP_FAR_BIT;
            }
            let outside_user = state
                .active_user_planes()
                .any(|(_, p)| p[0] * x + p[1] * y + p[2] * z + p[3] * w < 0.0);
            if outside_user {
                mask |= CLIP_USER_BIT;
            }
            or |= mask;
            and &= mask;
            mask
        })
        .collect();
    if masks.is_empty() {
        and = 0;
    }
    (masks, or, and)
}

/// Bit of a reduced primitive class in [`VbState`] masks.
pub const fn reduced_bit(reduced: ReducedPrim) -> u8 {
    1 << reduced as u8
}

/// What a vertex buffer draws, as reported to the driver before it is
/// rendered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VbState {
    /// Reduced primitive classes drawn, one [`reduced_bit`] each.
    pub active_prims: u8,
    /// Classes with at least one primitive touching a clip plane.
    pub clipped_prims: u8,
}

impl VbState {
    pub fn of(vb: &VertexBuffer) -> Self {
        let mut out = Self::default();
        for run in &vb.prims {
            if run.prim.trim(run.count) == 0 {
                continue;
            }
            let bit = reduced_bit(run.prim.reduced());
            out.active_prims |= bit;
            if vb.clip_or != 0 {
                let clipped = (0..run.count).any(|i| vb.clipmask(vb.vertex(run, i)) != 0);
                if clipped {
                    out.clipped_prims |= bit;
                }
            }
        }
        out
    }

    pub fn needs_clip(&self) -> bool {
        self.clipped_prims != 0
    }

    pub fn draws(&self, reduced: ReducedPrim) -> bool {
        self.active_prims & reduced_bit(reduced) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_test_marks_each_plane() {
        let positions = vec![
            [0.0, 0.0, 0.0, 1.0],
            [2.0, 0.0, 0.0, 1.0],
            [0.0, -3.0, 2.0, 1.0],
        ];
        let (masks, or, and) = clip_test(&positions, &DrawState::default());
        assert_eq!(masks, [0, CLIP_RIGHT_BIT, CLIP_BOTTOM_BIT | CLIP_FAR_BIT]);
        assert_eq!(or, CLIP_RIGHT_BIT | CLIP_BOTTOM_BIT | CLIP_FAR_BIT);
        assert_eq!(and, 0);
    }

    #[test]
    fn user_planes_set_the_aggregate_bit() {
        let mut state = DrawState::default();
        state.user_planes[2] = [1.0, 0.0, 0.0, 0.0];
        state.user_plane_mask = 1 << 2;
        let (masks, ..) = clip_test(&[[-0.5, 0.0, 0.0, 1.0], [0.5, 0.0, 0.0, 1.0]], &state);
        assert_eq!(masks, [CLIP_USER_BIT, 0]);
    }

    #[test]
    fn vb_state_reports_clipped_classes() {
        let vb = VertexBuffer::new(vec![
            [0.0, 0.0, 0.0, 1.0],
            [0.5, 0.0, 0.0, 1.0],
            [0.0, 0.5, 0.0, 1.0],
            [5.0, 0.0, 0.0, 1.0],
        ])
        .with_prim(Prim::Triangles, 0, 3)
        .with_prim(Prim::Lines, 2, 2)
        .with_prim(Prim::Points, 0, 0)
        .with_clip_test(&DrawState::default());
        let state = VbState::of(&vb);
        assert!(state.draws(ReducedPrim::Tri));
        assert!(state.draws(ReducedPrim::Line));
        assert!(!state.draws(ReducedPrim::Point));
        assert_eq!(state.clipped_prims, reduced_bit(ReducedPrim::Line));
        assert_eq!(vb.primitive_count(), 2);
    }
}
