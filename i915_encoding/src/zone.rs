// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Pixels per zone
pub const ZONE_WIDTH: u32 = 64;
pub const ZONE_HEIGHT: u32 = 32;

/// Window-space rectangle, exclusive at `x2`/`y2`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DrawRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl DrawRect {
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        }
    }
}

/// Inclusive range of zone columns and rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ZoneRange {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl ZoneRange {
    pub fn len(&self) -> usize {
        ((self.x1 - self.x0 + 1) * (self.y1 - self.y0 + 1)) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The zones covering a draw rectangle.
///
/// Zone boundaries are aligned to multiples of the zone size in window
/// coordinates; edge zones are clipped to the rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ZoneGrid {
    rect: DrawRect,
    col0: u32,
    row0: u32,
    cols: u32,
    rows: u32,
}

impl ZoneGrid {
    pub fn new(rect: DrawRect) -> Self {
        let col0 = rect.x1 / ZONE_WIDTH;
        let row0 = rect.y1 / ZONE_HEIGHT;
        let (cols, rows) = if rect.is_empty() {
            (0, 0)
        } else {
            (
                rect.x2.div_ceil(ZONE_WIDTH) - col0,
                rect.y2.div_ceil(ZONE_HEIGHT) - row0,
            )
        };
        Self {
            rect,
            col0,
            row0,
            cols,
            rows,
        }
    }

    pub fn rect(&self) -> DrawRect {
        self.rect
    }

    pub fn width_in_zones(&self) -> u32 {
        self.cols
    }

    pub fn height_in_zones(&self) -> u32 {
        self.rows
    }

    pub fn len(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Window rectangle of zone `ix`, clipped to the draw rectangle.
    pub fn zone_rect(&self, ix: usize) -> DrawRect {
        let col = self.col0 + ix as u32 % self.cols;
        let row = self.row0 + ix as u32 / self.cols;
        let x = col * ZONE_WIDTH;
        let y = row * ZONE_HEIGHT;
        DrawRect::new(x, y, x + ZONE_WIDTH, y + ZONE_HEIGHT).intersect(&self.rect)
    }

    /// Zones overlapped by the bounding box `[min_x, min_y, max_x, max_y]`.
    ///
    /// The box covers the pixels from `floor(min)` up to `ceil(max) - 1`;
    /// a degenerate box still covers the pixel containing its minimum.
    pub fn zones_for_bbox(&self, bbox: [f32; 4]) -> Option<ZoneRange> {
        if self.is_empty() || bbox.iter().any(|v| v.is_nan()) {
            return None;
        }
        let [min_x, min_y, max_x, max_y] = bbox;
        let span = |min: f32, max: f32, lo: u32, hi: u32| -> Option<(u32, u32)> {
            let p0 = min.floor() as i64;
            let p1 = (max.ceil() as i64 - 1).max(p0);
            if p1 < lo as i64 || p0 >= hi as i64 {
                return None;
            }
            Some((p0.max(lo as i64) as u32, p1.min(hi as i64 - 1) as u32))
        };
        let (px0, px1) = span(min_x, max_x, self.rect.x1, self.rect.x2)?;
        let (py0, py1) = span(min_y, max_y, self.rect.y1, self.rect.y2)?;
        Some(ZoneRange {
            x0: px0 / ZONE_WIDTH - self.col0,
            y0: py0 / ZONE_HEIGHT - self.row0,
            x1: px1 / ZONE_WIDTH - self.col0,
            y1: py1 / ZONE_HEIGHT - self.row0,
        })
    }

    /// Zone indices in a range, row by row.
    pub fn zones(&self, range: ZoneRange) -> impl Iterator<Item = usize> {
        let cols = self.cols;
        (range.y0..=range.y1).flat_map(move |y| {
            (range.x0..=range.x1).map(move |x| (y * cols + x) as usize)
        })
    }
}

/// Bounding box of a set of window positions, grown by `dilate` pixels.
pub fn bbox(points: &[[f32; 2]], dilate: f32) -> [f32; 4] {
    let mut out = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
    for p in points {
        out[0] = out[0].min(p[0]);
        out[1] = out[1].min(p[1]);
        out[2] = out[2].max(p[0]);
        out[3] = out[3].max(p[1]);
    }
    [
        out[0] - dilate,
        out[1] - dilate,
        out[2] + dilate,
        out[3] + dilate,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ZoneGrid {
        ZoneGrid::new(DrawRect::new(0, 0, 640, 480))
    }

    #[test]
    fn grid_dimensions() {
        let g = grid();
        assert_eq!((g.width_in_zones(), g.height_in_zones()), (10, 15));
        assert_eq!(g.zone_rect(11), DrawRect::new(64, 32, 128, 64));
        let odd = ZoneGrid::new(DrawRect::new(10, 0, 100, 40));
        assert_eq!((odd.width_in_zones(), odd.height_in_zones()), (2, 2));
        assert_eq!(odd.zone_rect(0), DrawRect::new(10, 0, 64, 32));
        assert_eq!(odd.zone_rect(3), DrawRect::new(64, 32, 100, 40));
    }

    #[test]
    fn triangle_inside_one_zone() {
        let g = grid();
        let b = bbox(&[[70.0, 40.0], [120.0, 41.0], [100.0, 60.0]], 0.0);
        let range = g.zones_for_bbox(b).unwrap();
        assert_eq!(g.zones(range).collect::<Vec<_>>(), [11]);
    }

    #[test]
    fn edge_on_zone_boundary_stays_inside() {
        let g = grid();
        let range = g.zones_for_bbox([0.0, 0.0, 64.0, 32.0]).unwrap();
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn spanning_box_touches_exactly_overlapped_zones() {
        let g = grid();
        let range = g.zones_for_bbox([60.0, 30.0, 130.0, 34.0]).unwrap();
        assert_eq!(
            g.zones(range).collect::<Vec<_>>(),
            [0, 1, 2, 10, 11, 12]
        );
    }

    #[test]
    fn dilation_reaches_neighbour() {
        let g = grid();
        let line = bbox(&[[10.0, 10.0], [63.5, 10.0]], 1.0);
        assert_eq!(g.zones_for_bbox(line).unwrap().len(), 2);
    }

    #[test]
    fn offscreen_box_touches_nothing() {
        let g = grid();
        assert!(g.zones_for_bbox([-20.0, -20.0, -1.0, -1.0]).is_none());
        assert!(g.zones_for_bbox([700.0, 0.0, 710.0, 4.0]).is_none());
    }
}
