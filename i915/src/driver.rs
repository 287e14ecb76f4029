// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{BackendKind, DrawOptions, DrawState, Hardware, VbState};

/// The chip-specific half of the driver, consulted by the draw context.
pub trait Driver {
    /// New rasterization state from the state tracker.
    fn set_draw_state(&mut self, state: &DrawState) {
        let _ = state;
    }

    /// Announces the next vertex buffer and picks the backend that draws
    /// it.
    fn set_vb_state(&mut self, vb: &VbState) -> BackendKind;

    /// Resolves pending register state before the vertex buffer starts.
    fn validate_state(&mut self, hw: &mut Hardware);

    /// Called once per frame with the number of primitives it drew.
    fn end_of_frame(&mut self, prims: u32) {
        let _ = prims;
    }
}

/// Backend selection for i915-class chips.
///
/// The software rasterizer takes over while the state asks for a
/// fallback. Otherwise hardware binning is used when enabled, then zone
/// rendering for frames following a busy frame, then the classic path.
/// Zone rendering is only switched on or off at frame boundaries.
#[derive(Clone, Debug)]
pub struct I915Driver {
    zone_rendering: bool,
    zone_min_prims: u32,
    hardware_zone: bool,
    fallback: bool,
    cull: u32,
    zone_frame: bool,
}

impl I915Driver {
    pub fn new(options: &DrawOptions) -> Self {
        Self {
            zone_rendering: options.zone_rendering,
            zone_min_prims: options.zone_min_prims,
            hardware_zone: options.hardware_zone,
            fallback: false,
            cull: DrawState::default().hw_cull(),
            zone_frame: false,
        }
    }

    /// Whether the current frame is zone rendered.
    pub fn zone_frame(&self) -> bool {
        self.zone_frame
    }
}

impl Driver for I915Driver {
    fn set_draw_state(&mut self, state: &DrawState) {
        self.fallback = state.fallback;
        self.cull = state.hw_cull();
    }

    fn set_vb_state(&mut self, _vb: &VbState) -> BackendKind {
        if self.fallback {
            BackendKind::Software
        } else if self.hardware_zone {
            BackendKind::HardwareZone
        } else if self.zone_frame {
            BackendKind::Zone
        } else {
            BackendKind::Classic
        }
    }

    fn validate_state(&mut self, hw: &mut Hardware) {
        hw.set_cull(self.cull);
    }

    fn end_of_frame(&mut self, prims: u32) {
        let zone_frame = self.zone_rendering && prims >= self.zone_min_prims;
        if zone_frame != self.zone_frame {
            log::debug!("{prims} primitives last frame, zone rendering {zone_frame}");
        }
        self.zone_frame = zone_frame;
    }
}
