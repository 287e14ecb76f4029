// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use smallvec::SmallVec;

use crate::cmd::{
    s2_texcoord_fmt, S1_VERTEX_PITCH_SHIFT, S1_VERTEX_WIDTH_SHIFT, S4_VFMT_COLOR,
    S4_VFMT_SPEC_FOG, S4_VFMT_XY, S4_VFMT_XYZ, S4_VFMT_XYZW, TEXCOORDFMT_1D, TEXCOORDFMT_2D,
    TEXCOORDFMT_3D, TEXCOORDFMT_4D, TEXCOORDFMT_NOT_PRESENT,
};

/// Value of the dedup index before a vertex has been emitted.
pub const UNDEFINED_INDEX: u16 = 0xffff;

/// Dwords in front of the hardware data of a clip-pipeline vertex: the
/// header and the clip-space position.
pub const PIPE_PREFIX_DWORDS: u32 = 5;

const CLIPMASK_BITS: u32 = 0xfff;
const EDGEFLAG_BIT: u32 = 1 << 12;
const INDEX_SHIFT: u32 = 16;

/// Per-vertex clip and emit metadata.
///
/// Bits 0..12 hold the clip mask (view planes in 0..6, user planes in
/// 6..12), bit 12 the edge flag, bits 16..32 the dedup index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(transparent)]
pub struct VertexHeader(pub u32);

static_assertions::const_assert_eq!(std::mem::size_of::<VertexHeader>(), 4);

impl VertexHeader {
    pub fn new(clipmask: u16, edgeflag: bool) -> Self {
        let mut header = Self((UNDEFINED_INDEX as u32) << INDEX_SHIFT);
        header.set_clipmask(clipmask);
        header.set_edgeflag(edgeflag);
        header
    }

    pub fn clipmask(self) -> u16 {
        (self.0 & CLIPMASK_BITS) as u16
    }

    pub fn set_clipmask(&mut self, mask: u16) {
        self.0 = (self.0 & !CLIPMASK_BITS) | (mask as u32 & CLIPMASK_BITS);
    }

    pub fn edgeflag(self) -> bool {
        self.0 & EDGEFLAG_BIT != 0
    }

    pub fn set_edgeflag(&mut self, flag: bool) {
        if flag {
            self.0 |= EDGEFLAG_BIT;
        } else {
            self.0 &= !EDGEFLAG_BIT;
        }
    }

    pub fn index(self) -> u16 {
        (self.0 >> INDEX_SHIFT) as u16
    }

    pub fn set_index(&mut self, index: u16) {
        self.0 = (self.0 & 0xffff) | ((index as u32) << INDEX_SHIFT);
    }

    pub fn reset_index(&mut self) {
        self.set_index(UNDEFINED_INDEX);
    }

    pub fn is_emitted(self) -> bool {
        self.index() != UNDEFINED_INDEX
    }
}

/// Vertex attributes, in the order of the upstream attribute table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attrib {
    Pos = 0,
    Color0,
    Color1,
    BackColor0,
    BackColor1,
    Fog,
    Tex0,
    Tex1,
    Tex2,
    Tex3,
    Tex4,
    Tex5,
    Tex6,
    Tex7,
    Generic,
}

impl Attrib {
    pub const COUNT: usize = 15;

    pub const TEX: [Self; 8] = [
        Self::Tex0,
        Self::Tex1,
        Self::Tex2,
        Self::Tex3,
        Self::Tex4,
        Self::Tex5,
        Self::Tex6,
        Self::Tex7,
    ];

    /// Color attributes that flat shading copies from the provoking vertex.
    pub const COLORS: [Self; 4] = [
        Self::Color0,
        Self::Color1,
        Self::BackColor0,
        Self::BackColor1,
    ];
}

/// Wire format of one attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EmitFormat {
    Float1,
    Float2,
    Float3,
    Float4,
    /// Four normalized bytes, blue in the low byte.
    UByte4Bgra,
    /// Four normalized bytes, red in the low byte.
    UByte4Rgba,
}

impl EmitFormat {
    pub const fn dwords(self) -> u32 {
        match self {
            Self::Float1 => 1,
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 => 4,
            Self::UByte4Bgra | Self::UByte4Rgba => 1,
        }
    }
}

fn unorm8(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u32
}

fn from_unorm8(b: u32) -> f32 {
    (b & 0xff) as f32 / 255.0
}

/// Position of one attribute within a vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AttrSlot {
    pub attrib: Attrib,
    pub format: EmitFormat,
    /// Offset in dwords from the start of the vertex.
    pub offset: u32,
}

impl AttrSlot {
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.format.dwords() as usize
    }

    /// Reads the attribute, filling absent components with `(0, 0, 0, 1)`.
    pub fn read(&self, vertex: &[u32]) -> [f32; 4] {
        let src = &vertex[self.range()];
        match self.format {
            EmitFormat::UByte4Bgra => {
                let d = src[0];
                [
                    from_unorm8(d >> 16),
                    from_unorm8(d >> 8),
                    from_unorm8(d),
                    from_unorm8(d >> 24),
                ]
            }
            EmitFormat::UByte4Rgba => {
                let d = src[0];
                [
                    from_unorm8(d),
                    from_unorm8(d >> 8),
                    from_unorm8(d >> 16),
                    from_unorm8(d >> 24),
                ]
            }
            _ => {
                let mut out = [0.0, 0.0, 0.0, 1.0];
                for (o, &d) in out.iter_mut().zip(src) {
                    *o = f32::from_bits(d);
                }
                out
            }
        }
    }

    pub fn write(&self, vertex: &mut [u32], value: [f32; 4]) {
        let dst = &mut vertex[self.range()];
        match self.format {
            EmitFormat::UByte4Bgra => {
                let [r, g, b, a] = value.map(unorm8);
                dst[0] = b | (g << 8) | (r << 16) | (a << 24);
            }
            EmitFormat::UByte4Rgba => {
                let [r, g, b, a] = value.map(unorm8);
                dst[0] = r | (g << 8) | (b << 16) | (a << 24);
            }
            _ => {
                for (d, v) in dst.iter_mut().zip(value) {
                    *d = v.to_bits();
                }
            }
        }
    }

    /// Writes `a + t * (b - a)` component-wise.
    pub fn lerp(&self, dst: &mut [u32], t: f32, a: &[u32], b: &[u32]) {
        let (a, b) = (self.read(a), self.read(b));
        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = a[i] + t * (b[i] - a[i]);
        }
        self.write(dst, out);
    }
}

/// Ordered attribute layout of a vertex.
///
/// A layout is made of the hardware attributes, optionally preceded by the
/// clip-pipeline prefix and followed by pipeline-only attributes (such as
/// back colors) that are never sent to the hardware.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexLayout {
    prefix: u32,
    slots: SmallVec<[AttrSlot; 16]>,
    hw_dwords: u32,
    extra_dwords: u32,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hardware attribute.
    pub fn push(&mut self, attrib: Attrib, format: EmitFormat) -> &mut Self {
        assert_eq!(
            self.extra_dwords, 0,
            "hardware attributes must precede pipeline-only ones"
        );
        self.slots.push(AttrSlot {
            attrib,
            format,
            offset: self.prefix + self.hw_dwords,
        });
        self.hw_dwords += format.dwords();
        self
    }

    /// Appends an attribute that only the clip pipeline sees.
    pub fn push_extra(&mut self, attrib: Attrib, format: EmitFormat) -> &mut Self {
        self.slots.push(AttrSlot {
            attrib,
            format,
            offset: self.prefix + self.hw_dwords + self.extra_dwords,
        });
        self.extra_dwords += format.dwords();
        self
    }

    /// This layout with the clip-pipeline prefix in front.
    pub fn with_pipe_prefix(&self) -> Self {
        let mut out = self.hw_only();
        out.prefix = PIPE_PREFIX_DWORDS;
        for slot in &mut out.slots {
            slot.offset += PIPE_PREFIX_DWORDS;
        }
        for slot in self.slots[out.slots.len()..].iter() {
            out.push_extra(slot.attrib, slot.format);
        }
        out
    }

    /// This layout without prefix or pipeline-only attributes.
    pub fn hw_only(&self) -> Self {
        let mut out = Self::new();
        for slot in self.hw_slots() {
            out.push(slot.attrib, slot.format);
        }
        out
    }

    pub fn has_pipe_prefix(&self) -> bool {
        self.prefix != 0
    }

    pub fn prefix_dwords(&self) -> u32 {
        self.prefix
    }

    pub fn hw_dwords(&self) -> u32 {
        self.hw_dwords
    }

    /// Total dwords per vertex.
    pub fn dwords(&self) -> u32 {
        self.prefix + self.hw_dwords + self.extra_dwords
    }

    /// Dword range of the hardware part of a vertex.
    pub fn hw_range(&self) -> Range<usize> {
        self.prefix as usize..(self.prefix + self.hw_dwords) as usize
    }

    pub fn slots(&self) -> &[AttrSlot] {
        &self.slots
    }

    fn hw_slots(&self) -> impl Iterator<Item = &AttrSlot> {
        let end = self.prefix + self.hw_dwords;
        self.slots.iter().filter(move |s| s.offset < end)
    }

    pub fn slot(&self, attrib: Attrib) -> Option<AttrSlot> {
        self.slots.iter().find(|s| s.attrib == attrib).copied()
    }

    /// Immediate S1: vertex width and pitch in dwords.
    pub fn s1(&self) -> u32 {
        (self.hw_dwords << S1_VERTEX_WIDTH_SHIFT) | (self.hw_dwords << S1_VERTEX_PITCH_SHIFT)
    }

    /// Immediate S2: texture coordinate formats.
    pub fn s2(&self) -> u32 {
        let mut s2 = 0;
        for (unit, attrib) in Attrib::TEX.into_iter().enumerate() {
            let fmt = match self.hw_slots().find(|s| s.attrib == attrib) {
                Some(slot) => match slot.format {
                    EmitFormat::Float1 => TEXCOORDFMT_1D,
                    EmitFormat::Float3 => TEXCOORDFMT_3D,
                    EmitFormat::Float4 => TEXCOORDFMT_4D,
                    _ => TEXCOORDFMT_2D,
                },
                None => TEXCOORDFMT_NOT_PRESENT,
            };
            s2 |= s2_texcoord_fmt(unit as u32, fmt);
        }
        s2
    }

    /// Vertex-format bits of immediate S4.
    pub fn s4_vfmt(&self) -> u32 {
        let mut vfmt = 0;
        for slot in self.hw_slots() {
            vfmt |= match (slot.attrib, slot.format) {
                (Attrib::Pos, EmitFormat::Float2) => S4_VFMT_XY,
                (Attrib::Pos, EmitFormat::Float3) => S4_VFMT_XYZ,
                (Attrib::Pos, _) => S4_VFMT_XYZW,
                (Attrib::Color0, _) => S4_VFMT_COLOR,
                (Attrib::Color1 | Attrib::Fog, _) => S4_VFMT_SPEC_FOG,
                _ => 0,
            };
        }
        vfmt
    }
}
