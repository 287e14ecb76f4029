// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rasterization state relevant to the drawing core.

use i915_encoding::cmd::{S4_CULLMODE_BOTH, S4_CULLMODE_CCW, S4_CULLMODE_CW, S4_CULLMODE_NONE};

/// Number of user clip planes.
pub const MAX_USER_PLANES: usize = 6;

/// How polygons facing one way are rasterized.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillMode {
    Point,
    Line,
    #[default]
    Fill,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

/// Orientation of front-facing polygons in window coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Winding {
    #[default]
    Ccw,
    Cw,
}

/// State set wholesale by the state tracker whenever it changes.
///
/// Any change invalidates the draw context, which reselects the render
/// path before the next vertex buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawState {
    pub fill_front: FillMode,
    pub fill_back: FillMode,
    pub cull: CullMode,
    pub front_winding: Winding,
    /// Polygon offset for filled, line and point polygon modes.
    pub offset_fill: bool,
    pub offset_line: bool,
    pub offset_point: bool,
    /// Depth slope factor.
    pub offset_scale: f32,
    /// Constant depth bias, already in window depth units.
    pub offset_units: f32,
    pub flatshade: bool,
    pub twoside: bool,
    /// Bit `i` enables `user_planes[i]`.
    pub user_plane_mask: u8,
    pub user_planes: [[f32; 4]; MAX_USER_PLANES],
    /// Route everything to the software rasterizer.
    pub fallback: bool,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            fill_front: FillMode::Fill,
            fill_back: FillMode::Fill,
            cull: CullMode::None,
            front_winding: Winding::Ccw,
            offset_fill: false,
            offset_line: false,
            offset_point: false,
            offset_scale: 0.0,
            offset_units: 0.0,
            flatshade: false,
            twoside: false,
            user_plane_mask: 0,
            user_planes: [[0.0; 4]; MAX_USER_PLANES],
            fallback: false,
        }
    }
}

impl DrawState {
    /// Fill mode of counter-clockwise polygons.
    pub fn fill_ccw(&self) -> FillMode {
        match self.front_winding {
            Winding::Ccw => self.fill_front,
            Winding::Cw => self.fill_back,
        }
    }

    pub fn fill_cw(&self) -> FillMode {
        match self.front_winding {
            Winding::Ccw => self.fill_back,
            Winding::Cw => self.fill_front,
        }
    }

    pub fn is_unfilled(&self) -> bool {
        self.fill_front != FillMode::Fill || self.fill_back != FillMode::Fill
    }

    /// Whether polygons drawn in `mode` get a depth offset.
    pub fn offset_for(&self, mode: FillMode) -> bool {
        match mode {
            FillMode::Fill => self.offset_fill,
            FillMode::Line => self.offset_line,
            FillMode::Point => self.offset_point,
        }
    }

    /// Whether any polygon mode in use has offset enabled.
    pub fn any_offset(&self) -> bool {
        self.offset_for(self.fill_front) || self.offset_for(self.fill_back)
    }

    pub fn culls_front(&self) -> bool {
        matches!(self.cull, CullMode::Front | CullMode::FrontAndBack)
    }

    pub fn culls_back(&self) -> bool {
        matches!(self.cull, CullMode::Back | CullMode::FrontAndBack)
    }

    /// Whether counter-clockwise polygons are culled.
    pub fn culls_ccw(&self) -> bool {
        match self.front_winding {
            Winding::Ccw => self.culls_front(),
            Winding::Cw => self.culls_back(),
        }
    }

    pub fn culls_cw(&self) -> bool {
        match self.front_winding {
            Winding::Ccw => self.culls_back(),
            Winding::Cw => self.culls_front(),
        }
    }

    /// Hardware cull mode bits of immediate S4.
    pub fn hw_cull(&self) -> u32 {
        match (self.culls_ccw(), self.culls_cw()) {
            (false, false) => S4_CULLMODE_NONE,
            (true, false) => S4_CULLMODE_CCW,
            (false, true) => S4_CULLMODE_CW,
            (true, true) => S4_CULLMODE_BOTH,
        }
    }

    /// Active user planes with their index.
    pub fn active_user_planes(&self) -> impl Iterator<Item = (usize, [f32; 4])> + '_ {
        self.user_planes
            .iter()
            .enumerate()
            .filter(|(i, _)| self.user_plane_mask & (1 << i) != 0)
            .map(|(i, p)| (i, *p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windings_follow_the_front_face() {
        let state = DrawState {
            fill_front: FillMode::Line,
            fill_back: FillMode::Point,
            cull: CullMode::Back,
            front_winding: Winding::Cw,
            ..DrawState::default()
        };
        assert_eq!(state.fill_cw(), FillMode::Line);
        assert_eq!(state.fill_ccw(), FillMode::Point);
        assert!(state.culls_ccw());
        assert!(!state.culls_cw());
        assert_eq!(state.hw_cull(), S4_CULLMODE_CCW);
        assert!(state.is_unfilled());
    }

    #[test]
    fn offset_applies_per_polygon_mode() {
        let state = DrawState {
            fill_back: FillMode::Line,
            offset_line: true,
            ..DrawState::default()
        };
        assert!(state.any_offset());
        assert!(!state.offset_for(FillMode::Fill));
        assert!(!DrawState::default().any_offset());
    }
}
