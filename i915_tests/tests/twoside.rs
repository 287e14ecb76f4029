// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Back colors on back-facing triangles.

use anyhow::Result;
use i915::{DrawState, StageKind, Winding};
use i915_encoding::{Attrib, EmitFormat, Prim, VertexLayout};
use i915_tests::{tag, tagged, triangles, Harness};

#[test]
fn back_faces_use_back_colors() -> Result<()> {
    let mut harness = Harness::software(DrawState {
        twoside: true,
        front_winding: Winding::Cw,
        ..DrawState::default()
    });
    let mut layout = VertexLayout::new();
    layout
        .push(Attrib::Pos, EmitFormat::Float4)
        .push(Attrib::Color0, EmitFormat::UByte4Bgra)
        .push_extra(Attrib::BackColor0, EmitFormat::UByte4Bgra);
    harness.ctx.set_vertex_layout(layout);

    // Counter-clockwise first, then the same triangle clockwise.
    let positions = vec![
        [0.0, 0.0, 0.0, 1.0],
        [0.5, 0.0, 0.0, 1.0],
        [0.0, 0.5, 0.0, 1.0],
        [0.0, 0.0, 0.0, 1.0],
        [0.0, 0.5, 0.0, 1.0],
        [0.5, 0.0, 0.0, 1.0],
    ];
    let back = (10..16).map(tag).collect();
    let vb = tagged(positions)
        .with_attrib(Attrib::BackColor0, back)
        .with_prim(Prim::Triangles, 0, 6);
    harness.ctx.draw_vb(&vb)?;
    harness.ctx.flush()?;
    assert_eq!(harness.ctx.pipe_chain(), [StageKind::Twoside, StageKind::Emit]);

    // With clockwise front faces the first triangle faces away.
    assert_eq!(
        triangles(&harness.take_calls()?),
        [[10, 11, 12], [3, 4, 5]]
    );
    Ok(())
}
