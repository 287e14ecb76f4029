// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bytemuck::{Pod, Zeroable};

/// GL primitive kind, numbered as in the GL enumeration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Prim {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
    Quads = 7,
    QuadStrip = 8,
    Polygon = 9,
}

/// The rasterized primitive class a GL primitive reduces to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReducedPrim {
    Point,
    Line,
    Tri,
}

/// Natural vertex grouping of a primitive kind.
///
/// `first` is the number of vertices making up the first primitive, `incr`
/// the number each subsequent one adds. `replay` marks kinds whose first
/// vertex is shared by every primitive, so split runs must repeat it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PrimInfo {
    pub first: u32,
    pub incr: u32,
    pub replay: bool,
}

/// Hardware primitive type field of a `3DPRIMITIVE` command.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct HwPrim(pub u32);

impl HwPrim {
    pub const TRILIST: Self = Self(0x0 << 18);
    pub const TRISTRIP: Self = Self(0x1 << 18);
    pub const TRISTRIP_RVRSE: Self = Self(0x2 << 18);
    pub const TRIFAN: Self = Self(0x3 << 18);
    pub const POLY: Self = Self(0x4 << 18);
    pub const LINELIST: Self = Self(0x5 << 18);
    pub const LINESTRIP: Self = Self(0x6 << 18);
    pub const RECTLIST: Self = Self(0x7 << 18);
    pub const POINTLIST: Self = Self(0x8 << 18);
    pub const DIB: Self = Self(0x9 << 18);
    pub const CLEAR_RECT: Self = Self(0xa << 18);
    pub const ZONE_INIT: Self = Self(0xd << 18);

    /// The list primitive used to draw a reduced primitive class one
    /// element at a time.
    pub const fn list(reduced: ReducedPrim) -> Self {
        match reduced {
            ReducedPrim::Point => Self::POINTLIST,
            ReducedPrim::Line => Self::LINELIST,
            ReducedPrim::Tri => Self::TRILIST,
        }
    }
}

const REDUCED_PRIM: [ReducedPrim; 10] = [
    ReducedPrim::Point,
    ReducedPrim::Line,
    ReducedPrim::Line,
    ReducedPrim::Line,
    ReducedPrim::Tri,
    ReducedPrim::Tri,
    ReducedPrim::Tri,
    ReducedPrim::Tri,
    ReducedPrim::Tri,
    ReducedPrim::Tri,
];

// Quads, quad strips and line loops have no hardware equivalent and must
// be decomposed before they reach a backend.
const HW_PRIM: [Option<HwPrim>; 10] = [
    Some(HwPrim::POINTLIST),
    Some(HwPrim::LINELIST),
    None,
    Some(HwPrim::LINESTRIP),
    Some(HwPrim::TRILIST),
    Some(HwPrim::TRISTRIP),
    Some(HwPrim::TRIFAN),
    None,
    None,
    Some(HwPrim::POLY),
];

const PRIM_INFO: [PrimInfo; 10] = [
    PrimInfo::new(1, 1, false),
    PrimInfo::new(2, 2, false),
    PrimInfo::new(2, 1, true),
    PrimInfo::new(2, 1, false),
    PrimInfo::new(3, 3, false),
    PrimInfo::new(3, 1, false),
    PrimInfo::new(3, 1, true),
    PrimInfo::new(4, 4, false),
    PrimInfo::new(4, 2, false),
    PrimInfo::new(3, 1, true),
];

impl PrimInfo {
    const fn new(first: u32, incr: u32, replay: bool) -> Self {
        Self {
            first,
            incr,
            replay,
        }
    }
}

impl Prim {
    pub const ALL: [Self; 10] = [
        Self::Points,
        Self::Lines,
        Self::LineLoop,
        Self::LineStrip,
        Self::Triangles,
        Self::TriangleStrip,
        Self::TriangleFan,
        Self::Quads,
        Self::QuadStrip,
        Self::Polygon,
    ];

    /// Converts a GL primitive enumerant.
    pub fn from_gl(mode: u32) -> Option<Self> {
        Self::ALL.get(mode as usize).copied()
    }

    pub const fn reduced(self) -> ReducedPrim {
        REDUCED_PRIM[self as usize]
    }

    pub const fn info(self) -> PrimInfo {
        PRIM_INFO[self as usize]
    }

    /// The hardware primitive for this kind, if the hardware draws it
    /// natively.
    pub const fn hw_prim(self) -> Option<HwPrim> {
        HW_PRIM[self as usize]
    }

    /// Number of usable vertices in a run of `count`.
    pub const fn trim(self, count: u32) -> u32 {
        let info = self.info();
        trim(count, info.first, info.incr)
    }
}

/// Rounds `count` down to a legal vertex count for a primitive that needs
/// `first` vertices to start and `incr` per additional element.
pub const fn trim(count: u32, first: u32, incr: u32) -> u32 {
    if count < first {
        0
    } else {
        count - (count - first) % incr
    }
}

/// One rasterized element, as positions within a primitive run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    Point(u32),
    Line(u32, u32),
    Tri(u32, u32, u32),
}

/// Expands a run of `count` vertices of kind `prim` into points, lines
/// and triangles.
///
/// Triangle strips alternate orientation so every triangle keeps the
/// winding of the first; polygons put the first vertex last so it is the
/// provoking vertex.
pub fn decompose(prim: Prim, count: u32, mut f: impl FnMut(Primitive)) {
    let count = prim.trim(count);
    match prim {
        Prim::Points => (0..count).for_each(|i| f(Primitive::Point(i))),
        Prim::Lines => {
            for i in (0..count).step_by(2) {
                f(Primitive::Line(i, i + 1));
            }
        }
        Prim::LineStrip | Prim::LineLoop => {
            for i in 1..count {
                f(Primitive::Line(i - 1, i));
            }
            if prim == Prim::LineLoop && count >= 2 {
                f(Primitive::Line(count - 1, 0));
            }
        }
        Prim::Triangles => {
            for i in (0..count).step_by(3) {
                f(Primitive::Tri(i, i + 1, i + 2));
            }
        }
        Prim::TriangleStrip => {
            for j in 2..count {
                if j & 1 == 0 {
                    f(Primitive::Tri(j - 2, j - 1, j));
                } else {
                    f(Primitive::Tri(j - 1, j - 2, j));
                }
            }
        }
        Prim::TriangleFan => {
            for j in 2..count {
                f(Primitive::Tri(0, j - 1, j));
            }
        }
        Prim::Polygon => {
            for j in 2..count {
                f(Primitive::Tri(j - 1, j, 0));
            }
        }
        Prim::Quads => {
            for i in (0..count).step_by(4) {
                f(Primitive::Tri(i, i + 1, i + 3));
                f(Primitive::Tri(i + 1, i + 2, i + 3));
            }
        }
        Prim::QuadStrip => {
            for i in (0..count.saturating_sub(2)).step_by(2) {
                f(Primitive::Tri(i, i + 1, i + 3));
                f(Primitive::Tri(i + 2, i, i + 3));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(prim: Prim, count: u32) -> Vec<Primitive> {
        let mut out = vec![];
        decompose(prim, count, |p| out.push(p));
        out
    }

    #[test]
    fn trim_rounds_down_to_whole_primitives() {
        assert_eq!(trim(10, 3, 3), 9);
        assert_eq!(trim(2, 3, 3), 0);
        assert_eq!(trim(7, 3, 1), 7);
        assert_eq!(trim(9, 4, 2), 8);
        assert_eq!(Prim::Quads.trim(11), 8);
    }

    #[test]
    fn tables_cover_every_kind() {
        for prim in Prim::ALL {
            assert_eq!(Prim::from_gl(prim as u32), Some(prim));
            let info = prim.info();
            assert!(info.incr > 0 && info.incr <= info.first);
        }
        assert_eq!(Prim::from_gl(10), None);
        assert_eq!(Prim::Quads.hw_prim(), None);
        assert_eq!(Prim::LineLoop.reduced(), ReducedPrim::Line);
        assert_eq!(Prim::Polygon.hw_prim(), Some(HwPrim::POLY));
    }

    #[test]
    fn fan_expansion() {
        assert_eq!(
            collect(Prim::TriangleFan, 5),
            [
                Primitive::Tri(0, 1, 2),
                Primitive::Tri(0, 2, 3),
                Primitive::Tri(0, 3, 4)
            ]
        );
    }

    #[test]
    fn quad_and_quad_strip_expansion() {
        assert_eq!(
            collect(Prim::Quads, 4),
            [Primitive::Tri(0, 1, 3), Primitive::Tri(1, 2, 3)]
        );
        assert_eq!(
            collect(Prim::QuadStrip, 4),
            [Primitive::Tri(0, 1, 3), Primitive::Tri(2, 0, 3)]
        );
        assert_eq!(collect(Prim::QuadStrip, 6).len(), 4);
    }

    #[test]
    fn line_loop_closes() {
        let lines = collect(Prim::LineLoop, 4);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], Primitive::Line(3, 0));
    }

    #[test]
    fn strip_keeps_winding() {
        assert_eq!(
            collect(Prim::TriangleStrip, 4),
            [Primitive::Tri(0, 1, 2), Primitive::Tri(2, 1, 3)]
        );
    }

    #[test]
    fn short_runs_are_dropped() {
        assert!(collect(Prim::Triangles, 2).is_empty());
        assert!(collect(Prim::Lines, 1).is_empty());
    }
}
