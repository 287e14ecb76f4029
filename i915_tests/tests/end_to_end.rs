// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A plain triangle fan from vertex buffer to rasterizer.

use anyhow::Result;
use i915::{BackendKind, DrawState, PipeStats, Route};
use i915_encoding::{decompose, Prim, Primitive};
use i915_tests::{ring, tagged, triangles, Harness};

#[test]
fn fan_reaches_the_backend_as_fan_triangles() -> Result<()> {
    let mut harness = Harness::software(DrawState::default());
    let vb = tagged(ring(5)).with_prim(Prim::TriangleFan, 0, 5);
    // Everything is inside the view volume, so nothing needs clipping.
    let vb = vb.with_clip_test(harness.ctx.state());
    assert_eq!(vb.clip_or, 0);

    harness.ctx.draw_vb(&vb)?;
    harness.ctx.flush()?;
    assert_eq!(harness.ctx.active_backend(), BackendKind::Software);
    assert_eq!(harness.ctx.route(), Route::Direct);
    assert_eq!(harness.ctx.pipe_stats(), PipeStats::default());

    let drawn = triangles(&harness.take_calls()?);
    assert_eq!(drawn, [[0, 1, 2], [0, 2, 3], [0, 3, 4]]);

    let mut expanded = Vec::new();
    decompose(Prim::TriangleFan, 5, |p| {
        if let Primitive::Tri(a, b, c) = p {
            expanded.push([a, b, c]);
        }
    });
    assert_eq!(drawn, expanded);
    Ok(())
}

#[test]
fn fan_through_the_hardware_is_one_command() -> Result<()> {
    let mut harness = Harness::new(Default::default());
    harness
        .ctx
        .draw_vb(&tagged(ring(5)).with_prim(Prim::TriangleFan, 0, 5))?;
    harness.ctx.flush()?;
    let sent = harness.log.last().expect("one submission");
    let fan = i915_encoding::cmd::prim_sequential(i915_encoding::HwPrim::TRIFAN, 5);
    assert_eq!(
        sent.submission.entry().iter().filter(|&&d| d == fan).count(),
        1
    );
    Ok(())
}
