// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Opcode and register field layouts.

use crate::{HwPrim, IndirectBucket};

// Memory interface commands.
pub const MI_NOOP: u32 = 0;
pub const MI_FLUSH: u32 = 0x04 << 23;
pub const MI_WAIT_FOR_EVENT: u32 = 0x03 << 23;
pub const MI_WAIT_FOR_PLANE_A_FLIP: u32 = 1 << 2;
pub const MI_BATCH_BUFFER_START: u32 = (0x31 << 23) | 1;
pub const MI_BATCH_BUFFER_END: u32 = 0x0a << 23;

pub const CMD_3D: u32 = 0x3 << 29;

/// Loads a subset of the immediate registers S0..S7.
pub const LOAD_STATE_IMMEDIATE_1: u32 = CMD_3D | (0x1d << 24) | (0x04 << 16);

/// Selector bit for immediate register `n` in `LOAD_STATE_IMMEDIATE_1`.
pub const fn i1_load_s(n: usize) -> u32 {
    1 << (4 + n)
}

/// Loads state blocks from indirect buffers.
pub const LOAD_INDIRECT: u32 = CMD_3D | (0x1d << 24) | (0x07 << 16);

/// Selector bit for an indirect bucket in `LOAD_INDIRECT`.
pub const fn li0_state(bucket: IndirectBucket) -> u32 {
    1 << (8 + bucket as u32)
}

pub const SIS0_BUFFER_VALID: u32 = 1 << 0;
pub const SIS0_FORCE_LOAD: u32 = 1 << 1;
pub const DIS0_BUFFER_VALID: u32 = 1 << 0;
pub const DIS0_BUFFER_RESET: u32 = 1 << 1;
/// Address bits of an indirect state pointer.
pub const INDIRECT_ADDRESS_MASK: u32 = !0x3;

/// Length dword of an indirect state block, counted in dwords minus one.
pub const fn sis1_buffer_length(dwords: u32) -> u32 {
    (dwords - 1) & 0xff
}

pub const PRIMITIVE_3D: u32 = CMD_3D | (0x1f << 24);
pub const PRIM_INDIRECT: u32 = 1 << 23;
pub const PRIM_INDIRECT_SEQUENTIAL: u32 = 0;
pub const PRIM_INDIRECT_ELTS: u32 = 1 << 17;
/// Terminates an open-ended element list. An indexed primitive with a
/// zero count reads 16-bit elements until it meets this value.
pub const ELTS_TERMINATOR: u16 = 0xffff;
/// Largest count field of a single primitive command.
pub const PRIM_MAX_COUNT: u32 = 0xffff;

/// Header of a sequential primitive drawing `count` vertices. The start
/// index follows in the next dword.
pub const fn prim_sequential(prim: HwPrim, count: u32) -> u32 {
    PRIMITIVE_3D | PRIM_INDIRECT | PRIM_INDIRECT_SEQUENTIAL | prim.0 | (count & PRIM_MAX_COUNT)
}

/// Header of an indexed primitive with `count` packed 16-bit elements.
pub const fn prim_elts(prim: HwPrim, count: u32) -> u32 {
    PRIMITIVE_3D | PRIM_INDIRECT | PRIM_INDIRECT_ELTS | prim.0 | (count & PRIM_MAX_COUNT)
}

/// Header of an inline primitive followed by `dwords` of vertex data.
pub const fn prim_inline(prim: HwPrim, dwords: u32) -> u32 {
    PRIMITIVE_3D | prim.0 | (dwords - 1)
}

/// Number of dwords holding `count` packed 16-bit elements.
pub const fn elts_dwords(count: u32) -> u32 {
    count.div_ceil(2)
}

/// Packs 16-bit elements two per dword, low half first.
pub fn pack_elts(indices: &[u32], mut out: impl FnMut(u32)) {
    for pair in indices.chunks(2) {
        let lo = pair[0] & 0xffff;
        let hi = pair.get(1).map_or(0, |i| i & 0xffff);
        out(lo | (hi << 16));
    }
}

pub const DRAW_RECT: u32 = CMD_3D | (0x1d << 24) | (0x80 << 16) | 3;
pub const DRAW_RECT_DWORDS: u32 = 5;

pub const CLEAR_PARAMETERS: u32 = CMD_3D | (0x1d << 24) | (0x9c << 16) | 5;
pub const CLEAR_PARAMETERS_DWORDS: u32 = 7;
pub const CLEARPARAM_CLEAR_RECT: u32 = 1 << 16;
pub const CLEARPARAM_WRITE_COLOR: u32 = 1 << 2;
pub const CLEARPARAM_WRITE_DEPTH: u32 = 1 << 1;
pub const CLEARPARAM_WRITE_STENCIL: u32 = 1 << 0;
/// Clear-parameters packet plus a three-vertex clear-rect primitive.
pub const CLEAR_RECT_DWORDS: u32 = CLEAR_PARAMETERS_DWORDS + 7;

// Immediate register indices.
pub const S0: usize = 0;
pub const S1: usize = 1;
pub const S2: usize = 2;
pub const S3: usize = 3;
pub const S4: usize = 4;
pub const S5: usize = 5;
pub const S6: usize = 6;
pub const S7: usize = 7;

pub const S0_VB_OFFSET_MASK: u32 = !0x3;
pub const S1_VERTEX_WIDTH_SHIFT: u32 = 24;
pub const S1_VERTEX_PITCH_SHIFT: u32 = 16;

pub const TEXCOORDFMT_2D: u32 = 0x0;
pub const TEXCOORDFMT_3D: u32 = 0x1;
pub const TEXCOORDFMT_4D: u32 = 0x2;
pub const TEXCOORDFMT_1D: u32 = 0x3;
pub const TEXCOORDFMT_NOT_PRESENT: u32 = 0xf;

pub const fn s2_texcoord_fmt(unit: u32, fmt: u32) -> u32 {
    fmt << (unit * 4)
}

pub const S4_VFMT_FOG_PARAM: u32 = 1 << 0;
pub const S4_VFMT_COLOR: u32 = 1 << 2;
pub const S4_VFMT_SPEC_FOG: u32 = 1 << 3;
pub const S4_VFMT_XYZ: u32 = 1 << 6;
pub const S4_VFMT_XYZW: u32 = 2 << 6;
pub const S4_VFMT_XY: u32 = 3 << 6;
pub const S4_VFMT_MASK: u32 = 0xff;
pub const S4_CULLMODE_BOTH: u32 = 0;
pub const S4_CULLMODE_NONE: u32 = 1 << 13;
pub const S4_CULLMODE_CW: u32 = 2 << 13;
pub const S4_CULLMODE_CCW: u32 = 3 << 13;
pub const S4_CULLMODE_MASK: u32 = 3 << 13;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elts_pack_low_half_first() {
        let mut out = vec![];
        pack_elts(&[1, 2, 3], |d| out.push(d));
        assert_eq!(out, [1 | (2 << 16), 3]);
        assert_eq!(elts_dwords(3), 2);
        assert_eq!(elts_dwords(4), 2);
    }

    #[test]
    fn selector_bits() {
        assert_eq!(i1_load_s(0), 1 << 4);
        assert_eq!(i1_load_s(7), 1 << 11);
        assert_eq!(li0_state(IndirectBucket::Static), 1 << 8);
        assert_eq!(li0_state(IndirectBucket::Constants), 1 << 13);
    }
}
