// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Zones touched by binned triangles.

use anyhow::Result;
use i915::render::ZoneRender;
use i915::{DrawOptions, Hardware, HwLock, RecordingKernel, Render, SharedArea};
use i915_encoding::{bbox, Attrib, DrawRect, EmitFormat, Prim, VertexLayout, ZoneGrid};
use i915_tests::{HEIGHT, WIDTH};

/// Zones written when binning one triangle over a 4x4 zone grid.
fn touched(points: [[f32; 2]; 3]) -> Result<Vec<usize>> {
    let (kernel, _) = RecordingKernel::new();
    let lock = HwLock::new(SharedArea::new(DrawRect::new(0, 0, WIDTH, HEIGHT)));
    let mut hw = Hardware::new(&DrawOptions::default(), Box::new(kernel), lock);
    let mut layout = VertexLayout::new();
    layout.push(Attrib::Pos, EmitFormat::Float2);
    hw.set_vertex_layout(&layout);

    let mut zone = ZoneRender::new(64);
    zone.start_render(&mut hw, true)?;
    let alloc = zone.allocate_vertices(&mut hw, 2, 3)?;
    let data = zone.vertex_data(&mut hw, &alloc);
    for (v, p) in data.chunks_exact_mut(2).zip(points) {
        v[0] = p[0].to_bits();
        v[1] = p[1].to_bits();
    }
    zone.set_prim(&mut hw, Prim::Triangles)?;
    zone.draw_prim(&mut hw, 0, 3)?;
    Ok(zone.touched_zones().collect())
}

#[test]
fn triangle_inside_a_zone_touches_only_it() -> Result<()> {
    assert_eq!(touched([[70.0, 40.0], [100.0, 40.0], [80.0, 60.0]])?, [5]);
    // Edges on zone boundaries stay in the zone they close.
    assert_eq!(touched([[64.0, 32.0], [128.0, 32.0], [64.0, 64.0]])?, [5]);
    Ok(())
}

#[test]
fn spanning_triangle_touches_its_bounding_box() -> Result<()> {
    let points = [[60.0, 20.0], [130.0, 20.0], [60.0, 70.0]];
    let zones = touched(points)?;
    assert_eq!(zones, [0, 1, 2, 4, 5, 6, 8, 9, 10]);

    let grid = ZoneGrid::new(DrawRect::new(0, 0, WIDTH, HEIGHT));
    let range = grid.zones_for_bbox(bbox(&points, 0.0)).expect("on screen");
    assert_eq!(zones, grid.zones(range).collect::<Vec<_>>());
    Ok(())
}
