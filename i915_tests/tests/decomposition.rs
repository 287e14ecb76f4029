// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive kinds the hardware lacks, as the backend receives them.

use anyhow::Result;
use i915::DrawState;
use i915_encoding::{trim, Prim};
use i915_tests::{lines, ring, tagged, triangles, Harness};

fn draw(prim: Prim, count: usize) -> Result<Harness> {
    let mut harness = Harness::software(DrawState::default());
    harness
        .ctx
        .draw_vb(&tagged(ring(count)).with_prim(prim, 0, count as u32))?;
    harness.ctx.flush()?;
    Ok(harness)
}

#[test]
fn quads_become_two_triangles() -> Result<()> {
    let harness = draw(Prim::Quads, 4)?;
    assert_eq!(triangles(&harness.take_calls()?), [[0, 1, 3], [1, 2, 3]]);
    Ok(())
}

#[test]
fn quad_strips_become_two_triangles_per_step() -> Result<()> {
    let harness = draw(Prim::QuadStrip, 4)?;
    assert_eq!(triangles(&harness.take_calls()?), [[0, 1, 3], [2, 0, 3]]);

    let harness = draw(Prim::QuadStrip, 7)?;
    // The odd trailing vertex is dropped.
    assert_eq!(
        triangles(&harness.take_calls()?),
        [[0, 1, 3], [2, 0, 3], [2, 3, 5], [4, 2, 5]]
    );
    Ok(())
}

#[test]
fn line_loops_are_closed_once() -> Result<()> {
    let harness = draw(Prim::LineLoop, 5)?;
    assert_eq!(
        lines(&harness.take_calls()?),
        [[0, 1], [1, 2], [2, 3], [3, 4], [4, 0]]
    );
    Ok(())
}

#[test]
fn incomplete_primitives_are_trimmed() {
    assert_eq!(trim(10, 3, 3), 9);
    assert_eq!(trim(2, 3, 3), 0);
    assert_eq!(Prim::Quads.trim(7), 4);
    assert_eq!(Prim::LineLoop.trim(1), 0);
}
