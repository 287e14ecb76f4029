// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clipping against the view volume and the user planes.

use smallvec::SmallVec;

use super::Pipeline;
use crate::render::Render;
use crate::{Hardware, Result, MAX_USER_PLANES};

/// Largest polygon the clipper produces: a triangle gains at most one
/// vertex per plane.
pub const MAX_CLIPPED_VERTICES: usize = 3 + 6 + MAX_USER_PLANES;

type Polygon = SmallVec<[u32; MAX_CLIPPED_VERTICES]>;

fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Plane indices of a clip mask, lowest first.
fn planes(mut mask: u16) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let bit = mask.trailing_zeros() as usize;
        mask &= mask - 1;
        Some(bit)
    })
}

impl Pipeline {
    fn plane_dist(&self, v: u32, plane: usize) -> f32 {
        dot4(self.verts.clip_pos(v), self.planes[plane])
    }

    /// A new vertex `t` of the way from `out` to `inside`.
    fn interp_new(&mut self, t: f32, out: u32, inside: u32) -> u32 {
        let fetch = &self.fetch;
        self.verts
            .derive(out, inside, |dst, out, inside| fetch.interp(dst, t, out, inside))
    }

    pub(super) fn clip_point(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        v: u32,
    ) -> Result<()> {
        if self.verts.clipmask(v) == 0 {
            self.point(hw, next, stage + 1, v)
        } else {
            self.stats.rejected += 1;
            Ok(())
        }
    }

    pub(super) fn clip_line(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        v: [u32; 2],
    ) -> Result<()> {
        let [m0, m1] = v.map(|v| self.verts.clipmask(v));
        if m0 | m1 == 0 {
            return self.line(hw, next, stage + 1, v);
        }
        if m0 & m1 != 0 {
            self.stats.rejected += 1;
            return Ok(());
        }
        self.stats.clipped += 1;

        let [v0, v1] = v;
        let mut t0: f32 = 0.0;
        let mut t1: f32 = 0.0;
        for plane in planes(m0 | m1) {
            let dp0 = self.plane_dist(v0, plane);
            let dp1 = self.plane_dist(v1, plane);
            if dp1 < 0.0 {
                t1 = t1.max(dp1 / (dp1 - dp0));
            }
            if dp0 < 0.0 {
                t0 = t0.max(dp0 / (dp0 - dp1));
            }
        }
        if t0 + t1 >= 1.0 {
            return Ok(());
        }

        let mark = self.verts.mark();
        let a = if m0 != 0 { self.interp_new(t0, v0, v1) } else { v0 };
        let b = if m1 != 0 { self.interp_new(t1, v1, v0) } else { v1 };
        let result = self.line(hw, next, stage + 1, [a, b]);
        self.verts.release_to(mark);
        result
    }

    pub(super) fn clip_tri(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        v: [u32; 3],
    ) -> Result<()> {
        let [m0, m1, m2] = v.map(|v| self.verts.clipmask(v));
        let or = m0 | m1 | m2;
        if or == 0 {
            return self.tri(hw, next, stage + 1, v);
        }
        if m0 & m1 & m2 != 0 {
            self.stats.rejected += 1;
            return Ok(());
        }
        self.stats.clipped += 1;
        let mark = self.verts.mark();
        let result = self.clip_polygon(hw, next, stage, v, or);
        self.verts.release_to(mark);
        result
    }

    /// Clips a triangle plane by plane and sends the remaining convex
    /// polygon on as a fan.
    fn clip_polygon(
        &mut self,
        hw: &mut Hardware,
        next: &mut dyn Render,
        stage: usize,
        v: [u32; 3],
        mask: u16,
    ) -> Result<()> {
        let mut inlist: Polygon = SmallVec::from_slice(&v);
        let mut outlist: Polygon = SmallVec::new();

        for plane in planes(mask) {
            outlist.clear();
            let n = inlist.len();
            let mut prev = inlist[0];
            let mut dp_prev = self.plane_dist(prev, plane);
            for i in 1..=n {
                let vert = inlist[i % n];
                let dp = self.plane_dist(vert, plane);
                if dp_prev >= 0.0 {
                    outlist.push(prev);
                }
                if (dp < 0.0) != (dp_prev < 0.0) {
                    let new = if dp < 0.0 {
                        // Leaving: the new vertex starts an edge along
                        // the plane.
                        let t = dp / (dp - dp_prev);
                        let new = self.interp_new(t, vert, prev);
                        self.verts.set_edgeflag(new, true);
                        new
                    } else {
                        let t = dp_prev / (dp_prev - dp);
                        let new = self.interp_new(t, prev, vert);
                        let flag = self.verts.edgeflag(prev);
                        self.verts.set_edgeflag(new, flag);
                        new
                    };
                    outlist.push(new);
                }
                prev = vert;
                dp_prev = dp;
            }
            std::mem::swap(&mut inlist, &mut outlist);
            if inlist.len() < 3 {
                return Ok(());
            }
        }

        let n = inlist.len();
        let v0 = inlist[0];
        for i in 2..n {
            let (a, b) = (inlist[i - 1], inlist[i]);
            let saved = (self.verts.edgeflag(v0), self.verts.edgeflag(b));
            if i != 2 {
                self.verts.set_edgeflag(v0, false);
            }
            if i != n - 1 {
                self.verts.set_edgeflag(b, false);
            }
            let result = self.tri(hw, next, stage + 1, [v0, a, b]);
            self.verts.set_edgeflag(v0, saved.0);
            self.verts.set_edgeflag(b, saved.1);
            result?;
        }
        Ok(())
    }
}
