// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytemuck::cast_slice_mut;
use smallvec::SmallVec;

use i915_encoding::{Attrib, VertexHeader, VertexLayout};

use crate::vb::CLIP_USER_BIT;
use crate::{DrawState, VertexBuffer};

/// Clip-mask bits below the first user plane.
const VIEW_PLANE_BITS: u16 = 0x3f;
const FIRST_USER_PLANE_BIT: u32 = 6;

/// Maps normalized device coordinates to window coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub scale: [f32; 3],
    pub translate: [f32; 3],
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: [1.0; 3],
            translate: [0.0; 3],
        }
    }
}

impl Viewport {
    /// The usual GL viewport over a `width` by `height` window with the
    /// full depth range.
    pub fn window(width: f32, height: f32) -> Self {
        Self {
            scale: [width / 2.0, height / 2.0, 0.5],
            translate: [width / 2.0, height / 2.0, 0.5],
        }
    }

    /// Window position of a clip-space position; `w` holds 1/w.
    pub fn map(&self, [x, y, z, w]: [f32; 4]) -> [f32; 4] {
        let oow = if w == 0.0 { 1.0 } else { 1.0 / w };
        [
            x * oow * self.scale[0] + self.translate[0],
            y * oow * self.scale[1] + self.translate[1],
            z * oow * self.scale[2] + self.translate[2],
            oow,
        ]
    }
}

/// Builds vertices in the active layout from vertex-buffer arrays.
///
/// When the layout carries the clip-pipeline prefix, each vertex starts
/// with its [`VertexHeader`] and clip-space position.
#[derive(Clone, Debug, Default)]
pub struct VertexFetch {
    layout: VertexLayout,
    viewport: Viewport,
    user_planes: SmallVec<[(u32, [f32; 4]); 6]>,
}

impl VertexFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: VertexLayout) {
        self.layout = layout;
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_vp_scale_translate(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Takes the enabled user planes from `state`.
    pub fn set_user_planes(&mut self, state: &DrawState) {
        self.user_planes = state
            .active_user_planes()
            .map(|(i, plane)| (i as u32, plane))
            .collect();
    }

    /// The full clip mask of a vertex, with the legacy user bit replaced
    /// by one bit per user plane the vertex is outside of.
    fn expand_clipmask(&self, legacy: u8, [x, y, z, w]: [f32; 4]) -> u16 {
        let mut mask = legacy as u16 & VIEW_PLANE_BITS;
        if legacy & CLIP_USER_BIT != 0 {
            for &(i, p) in &self.user_planes {
                if p[0] * x + p[1] * y + p[2] * z + p[3] * w < 0.0 {
                    mask |= 1 << (FIRST_USER_PLANE_BIT + i);
                }
            }
        }
        mask
    }

    /// Writes `count` vertices starting at vertex `start` of `vb` into
    /// `dst`, which holds exactly those vertices.
    pub fn emit_vertices(&self, vb: &VertexBuffer, dst: &mut [u32], start: u32, count: u32) {
        let dwords = self.layout.dwords() as usize;
        assert!(dst.len() >= dwords * count as usize, "vertex destination too small");
        let positions = vb.attribs.get(Attrib::Pos).unwrap_or_default();
        for (vertex, i) in dst.chunks_exact_mut(dwords).zip(start..start + count) {
            let clip = positions
                .get(i as usize)
                .copied()
                .unwrap_or([0.0, 0.0, 0.0, 1.0]);
            if self.layout.has_pipe_prefix() {
                let mask = self.expand_clipmask(vb.clipmask(i), clip);
                vertex[0] = VertexHeader::new(mask, vb.edgeflag(i)).0;
                cast_slice_mut::<u32, f32>(&mut vertex[1..5]).copy_from_slice(&clip);
            }
            for slot in self.layout.slots() {
                let value = match slot.attrib {
                    Attrib::Pos => self.viewport.map(clip),
                    attrib => vb
                        .attribs
                        .get(attrib)
                        .and_then(|values| values.get(i as usize).copied())
                        .unwrap_or_else(|| default_value(attrib)),
                };
                slot.write(vertex, value);
            }
        }
    }

    /// Reads one attribute of a built vertex.
    pub fn get_attr(&self, vertex: &[u32], attrib: Attrib) -> Option<[f32; 4]> {
        self.layout.slot(attrib).map(|slot| slot.read(vertex))
    }

    /// Overwrites one attribute of a built vertex. Attributes absent from
    /// the layout are ignored.
    pub fn set_attr(&self, vertex: &mut [u32], attrib: Attrib, value: [f32; 4]) {
        if let Some(slot) = self.layout.slot(attrib) {
            slot.write(vertex, value);
        }
    }

    /// Writes the vertex `t` of the way from `out` to `inside` into `dst`.
    ///
    /// The clip position and every attribute are interpolated linearly;
    /// the window position is derived again from the new clip position.
    /// The result has an empty clip mask, no edge flag and no index.
    pub fn interp(&self, dst: &mut [u32], t: f32, out: &[u32], inside: &[u32]) {
        debug_assert!(self.layout.has_pipe_prefix());
        let a: &[f32] = bytemuck::cast_slice(&out[1..5]);
        let b: &[f32] = bytemuck::cast_slice(&inside[1..5]);
        let mut clip = [0.0; 4];
        for (i, c) in clip.iter_mut().enumerate() {
            *c = a[i] + t * (b[i] - a[i]);
        }
        dst[0] = VertexHeader::new(0, false).0;
        cast_slice_mut::<u32, f32>(&mut dst[1..5]).copy_from_slice(&clip);
        for slot in self.layout.slots() {
            match slot.attrib {
                Attrib::Pos => slot.write(dst, self.viewport.map(clip)),
                _ => slot.lerp(dst, t, out, inside),
            }
        }
    }
}

fn default_value(attrib: Attrib) -> [f32; 4] {
    match attrib {
        Attrib::Color0 | Attrib::BackColor0 => [1.0; 4],
        _ => [0.0, 0.0, 0.0, 1.0],
    }
}
