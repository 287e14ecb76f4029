// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry crossing the view volume.

use anyhow::Result;
use i915::render::SwCall;
use i915::{DrawState, Route, StageKind};
use i915_encoding::Prim;
use i915_tests::{tagged, Harness, WIDTH};

fn draw(positions: Vec<[f32; 4]>) -> Result<(Harness, Vec<SwCall>)> {
    let mut harness = Harness::software(DrawState::default());
    let vb = tagged(positions)
        .with_prim(Prim::Triangles, 0, 3)
        .with_clip_test(harness.ctx.state());
    harness.ctx.draw_vb(&vb)?;
    harness.ctx.flush()?;
    assert_eq!(harness.ctx.route(), Route::Pipeline);
    assert_eq!(harness.ctx.pipe_chain(), [StageKind::Clip, StageKind::Emit]);
    let calls = harness.take_calls()?;
    Ok((harness, calls))
}

#[test]
fn triangles_outside_one_plane_are_rejected_whole() -> Result<()> {
    let (harness, calls) = draw(vec![
        [1.5, 0.0, 0.0, 1.0],
        [2.0, 0.0, 0.0, 1.0],
        [1.5, 0.5, 0.0, 1.0],
    ])?;
    let stats = harness.ctx.pipe_stats();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.clipped, 0);
    assert!(calls.is_empty());
    Ok(())
}

#[test]
fn one_vertex_outside_gives_a_quad() -> Result<()> {
    let (harness, calls) = draw(vec![
        [-0.5, -0.5, 0.0, 1.0],
        [1.5, -0.5, 0.0, 1.0],
        [-0.5, 0.5, 0.0, 1.0],
    ])?;
    let stats = harness.ctx.pipe_stats();
    assert_eq!(stats.clipped, 1);
    assert_eq!(stats.emitted_vertices, 4);

    let mut corners = Vec::new();
    for call in &calls {
        let SwCall::Triangle(v) = call else {
            panic!("expected triangles, got {call:?}");
        };
        corners.extend(v.iter().map(|v| [v.pos[0], v.pos[1]]));
    }
    // Emitted as a fan of two triangles over four distinct vertices.
    assert_eq!(corners.len(), 6);
    corners.sort_by(|a, b| a.partial_cmp(b).unwrap());
    corners.dedup();
    assert_eq!(corners.len(), 4);
    let on_edge = corners
        .iter()
        .filter(|p| (p[0] - WIDTH as f32).abs() < 1e-3)
        .count();
    assert_eq!(on_edge, 2);
    Ok(())
}
