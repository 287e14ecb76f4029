// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The draw context: routes vertex buffers to the selected backend.

use i915_encoding::{DrawRect, VertexLayout};

use crate::pipe::{needs_pipeline, Pipeline};
use crate::render::{Backends, Quads, Rasterizer};
use crate::{
    BackendKind, ClearMask, DrawOptions, DrawState, Driver, Hardware, HwLock, Kernel, PipeStats,
    Render, Result, StageKind, VbState, VertexBuffer, VertexFetch, Viewport,
};

/// How the vertices of a buffer reach the backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Straight to the backend, with quads and line loops decomposed.
    Direct,
    /// Through the software clip/setup pipeline.
    Pipeline,
}

/// Everything a draw context talks to outside the drawing core.
pub struct Collaborators {
    pub kernel: Box<dyn Kernel>,
    pub lock: HwLock,
    pub rasterizer: Box<dyn Rasterizer>,
    pub driver: Box<dyn Driver>,
}

/// Turns vertex buffers into hardware commands for one GL context.
///
/// State changes invalidate the context; the next vertex buffer picks the
/// route and vertex layout again. Nothing may change while a vertex buffer
/// is being drawn.
pub struct DrawContext {
    hw: Hardware,
    driver: Box<dyn Driver>,
    backends: Backends,
    quads: Quads,
    pipe: Pipeline,
    fetch: VertexFetch,
    state: DrawState,
    layout: VertexLayout,
    active: BackendKind,
    route: Route,
    clipping: bool,
    validated: bool,
    in_vb: bool,
    start_of_frame: bool,
    frame_prims: u32,
    geometry_stamp: u32,
}

impl DrawContext {
    pub fn new(options: &DrawOptions, collaborators: Collaborators) -> Self {
        let Collaborators {
            kernel,
            lock,
            rasterizer,
            mut driver,
        } = collaborators;
        let state = DrawState::default();
        driver.set_draw_state(&state);
        let hw = Hardware::new(options, kernel, lock);
        let geometry_stamp = hw.geometry_stamp();
        Self {
            hw,
            driver,
            backends: Backends::new(options, rasterizer),
            quads: Quads::new(options.max_indices),
            pipe: Pipeline::new(options.max_indices),
            fetch: VertexFetch::new(),
            state,
            layout: VertexLayout::new(),
            active: BackendKind::Classic,
            route: Route::Direct,
            clipping: false,
            validated: false,
            in_vb: false,
            start_of_frame: true,
            frame_prims: 0,
            geometry_stamp,
        }
    }

    fn invalidate(&mut self) {
        assert!(!self.in_vb, "state changed while drawing a vertex buffer");
        self.validated = false;
    }

    /// Replaces the rasterization state.
    pub fn set_state(&mut self, state: DrawState) {
        self.invalidate();
        if state != self.state {
            self.driver.set_draw_state(&state);
            self.state = state;
        }
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.invalidate();
        self.fetch.set_vp_scale_translate(viewport);
    }

    /// Sets the attributes vertices are built with. Pipeline-only
    /// attributes ([`VertexLayout::push_extra`]) are dropped on the direct
    /// route.
    pub fn set_vertex_layout(&mut self, layout: VertexLayout) {
        self.invalidate();
        self.layout = layout;
    }

    /// Forgets all hardware state; the next draw re-emits everything.
    pub fn lost_context(&mut self) {
        self.invalidate();
        self.hw.lost_context();
    }

    pub fn active_backend(&self) -> BackendKind {
        self.active
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Stages of the clip pipeline as last validated.
    pub fn pipe_chain(&self) -> &[StageKind] {
        self.pipe.chain()
    }

    pub fn pipe_stats(&self) -> PipeStats {
        self.pipe.stats()
    }

    pub fn fetch(&self) -> &VertexFetch {
        &self.fetch
    }

    pub fn hardware(&self) -> &Hardware {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut Hardware {
        &mut self.hw
    }

    /// Switches to `kind`, flushing what the old backend holds.
    fn switch_backend(&mut self, kind: BackendKind) -> Result<()> {
        log::info!("render backend {:?} -> {:?}", self.active, kind);
        self.backends.get_mut(self.active).flush(&mut self.hw, true)?;
        self.active = kind;
        self.validated = false;
        Ok(())
    }

    fn validate(&mut self) {
        let layout = match self.route {
            Route::Direct => self.layout.hw_only(),
            Route::Pipeline => self.layout.with_pipe_prefix(),
        };
        self.fetch.set_layout(layout);
        self.fetch.set_user_planes(&self.state);
        self.hw.set_vertex_layout(self.fetch.layout());
        if self.route == Route::Pipeline {
            self.pipe.validate(&self.state, &self.fetch, self.clipping);
        }
        log::debug!(
            "validated {:?} route to {:?}, {} dwords per vertex",
            self.route,
            self.active,
            self.fetch.layout().dwords()
        );
        self.validated = true;
    }

    /// Draws every primitive run of `vb`.
    pub fn draw_vb(&mut self, vb: &VertexBuffer) -> Result<()> {
        assert!(!self.in_vb, "vertex buffers do not nest");
        if vb.count == 0 || vb.prims.is_empty() {
            return Ok(());
        }

        // A zone pass is laid out over the drawable it started with.
        self.hw.revalidate_drawable();
        if self.hw.geometry_stamp() != self.geometry_stamp {
            self.geometry_stamp = self.hw.geometry_stamp();
            self.backends.get_mut(self.active).flush(&mut self.hw, false)?;
        }

        let vb_state = VbState::of(vb);
        let kind = self.driver.set_vb_state(&vb_state);
        if kind != self.active {
            self.switch_backend(kind)?;
        }
        let route = if needs_pipeline(&self.state, &vb_state) {
            Route::Pipeline
        } else {
            Route::Direct
        };
        let clipping = vb_state.needs_clip();
        if route != self.route || clipping != self.clipping {
            self.route = route;
            self.clipping = clipping;
            self.validated = false;
        }
        if !self.validated {
            self.validate();
        }
        self.driver.validate_state(&mut self.hw);

        self.in_vb = true;
        let result = self.run_vb(vb);
        self.in_vb = false;
        result?;
        self.start_of_frame = false;
        self.frame_prims = self.frame_prims.saturating_add(vb.primitive_count());
        Ok(())
    }

    fn run_vb(&mut self, vb: &VertexBuffer) -> Result<()> {
        let backend = self.backends.get_mut(self.active);
        match self.route {
            Route::Direct => {
                let mut render = self.quads.wrap(backend);
                emit_vb(&mut self.hw, &mut render, &self.fetch, vb, self.start_of_frame)
            }
            Route::Pipeline => {
                let mut render = self.pipe.wrap(backend);
                emit_vb(&mut self.hw, &mut render, &self.fetch, vb, self.start_of_frame)
            }
        }
    }

    /// Clears `rect` of the buffers in `mask` with the hardware's clear
    /// values.
    pub fn clear(&mut self, mask: ClearMask, rect: DrawRect) -> Result<()> {
        assert!(!self.in_vb, "clear while drawing a vertex buffer");
        if mask.is_empty() || rect.is_empty() {
            return Ok(());
        }
        self.backends
            .get_mut(self.active)
            .clear_rect(&mut self.hw, mask, rect)
    }

    /// Sends everything queued so far to the kernel.
    pub fn flush(&mut self) -> Result<()> {
        assert!(!self.in_vb, "flush while drawing a vertex buffer");
        self.backends.get_mut(self.active).flush(&mut self.hw, false)
    }

    /// Finishes the frame. The backend for the next frame is chosen from
    /// what this one drew.
    pub fn end_frame(&mut self) -> Result<()> {
        assert!(!self.in_vb, "frame ended while drawing a vertex buffer");
        self.backends.get_mut(self.active).flush(&mut self.hw, true)?;
        self.driver.end_of_frame(self.frame_prims);
        self.frame_prims = 0;
        self.start_of_frame = true;
        Ok(())
    }

    /// Releases backend resources.
    pub fn destroy(mut self) {
        self.backends.destroy(&mut self.hw);
    }
}

/// Fetches `vb` into one allocation of `render` and draws its runs.
fn emit_vb(
    hw: &mut Hardware,
    render: &mut dyn Render,
    fetch: &VertexFetch,
    vb: &VertexBuffer,
    start_of_frame: bool,
) -> Result<()> {
    render.start_render(hw, start_of_frame)?;
    let alloc = render.allocate_vertices(hw, fetch.layout().dwords(), vb.count)?;
    fetch.emit_vertices(vb, render.vertex_data(hw, &alloc), 0, vb.count);
    let result = draw_runs(hw, render, vb);
    render.release_vertices(hw, alloc);
    result
}

fn draw_runs(hw: &mut Hardware, render: &mut dyn Render, vb: &VertexBuffer) -> Result<()> {
    for run in &vb.prims {
        if run.prim.trim(run.count) == 0 {
            continue;
        }
        render.set_prim(hw, run.prim)?;
        match &vb.elts {
            Some(elts) => {
                let range = run.start as usize..(run.start + run.count) as usize;
                render.draw_indexed_prim(hw, &elts[range])?;
            }
            None => render.draw_prim(hw, run.start, run.count)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RecordingRasterizer, SwCall};
    use crate::{I915Driver, RecordingKernel, SharedArea, SubmissionLog};
    use i915_encoding::{Attrib, EmitFormat, Prim};
    use std::sync::{Arc, Mutex};

    fn context(options: &DrawOptions) -> (DrawContext, SubmissionLog, Arc<Mutex<Vec<SwCall>>>) {
        let (kernel, log) = RecordingKernel::new();
        let (rasterizer, calls) = RecordingRasterizer::new();
        let lock = HwLock::new(SharedArea::new(DrawRect::new(0, 0, 256, 128)));
        let collaborators = Collaborators {
            kernel: Box::new(kernel),
            lock,
            rasterizer: Box::new(rasterizer),
            driver: Box::new(I915Driver::new(options)),
        };
        let mut ctx = DrawContext::new(options, collaborators);
        let mut layout = VertexLayout::new();
        layout
            .push(Attrib::Pos, EmitFormat::Float4)
            .push(Attrib::Color0, EmitFormat::UByte4Bgra);
        ctx.set_vertex_layout(layout);
        ctx.set_viewport(Viewport::window(256.0, 128.0));
        (ctx, log, calls)
    }

    fn triangle(x: f32) -> VertexBuffer {
        VertexBuffer::new(vec![
            [x, 0.0, 0.0, 1.0],
            [x + 0.5, 0.0, 0.0, 1.0],
            [x, 0.5, 0.0, 1.0],
        ])
        .with_prim(Prim::Triangles, 0, 3)
    }

    #[test]
    fn route_follows_the_state() {
        let (mut ctx, _, _) = context(&DrawOptions::default());
        ctx.draw_vb(&triangle(0.0)).unwrap();
        assert_eq!(ctx.route(), Route::Direct);
        assert!(ctx.is_validated());
        assert!(!ctx.fetch().layout().has_pipe_prefix());

        let clipped = triangle(0.8).with_clip_test(ctx.state());
        ctx.draw_vb(&clipped).unwrap();
        assert_eq!(ctx.route(), Route::Pipeline);
        assert_eq!(ctx.pipe_chain(), [StageKind::Clip, StageKind::Emit]);
        assert_eq!(ctx.pipe_stats().clipped, 1);
        assert!(ctx.fetch().layout().has_pipe_prefix());

        ctx.set_state(DrawState {
            twoside: true,
            ..DrawState::default()
        });
        assert!(!ctx.is_validated());
        ctx.draw_vb(&triangle(0.0)).unwrap();
        assert_eq!(ctx.pipe_chain(), [StageKind::Twoside, StageKind::Emit]);
    }

    #[test]
    fn fallback_switches_to_the_rasterizer() {
        let (mut ctx, log, calls) = context(&DrawOptions::default());
        ctx.draw_vb(&triangle(0.0)).unwrap();
        assert_eq!(ctx.active_backend(), BackendKind::Classic);
        ctx.set_state(DrawState {
            fallback: true,
            ..DrawState::default()
        });
        ctx.draw_vb(&triangle(0.0)).unwrap();
        assert_eq!(ctx.active_backend(), BackendKind::Software);
        // The classic commands were submitted before the switch.
        assert_eq!(log.len(), 1);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let SwCall::Triangle(v) = &calls[0] else {
            panic!("expected a triangle, got {:?}", calls[0]);
        };
        assert_eq!(v[1].pos, [192.0, 64.0, 0.5, 1.0]);
    }

    #[test]
    fn busy_frames_are_zone_rendered_next() {
        let options = DrawOptions {
            zone_rendering: true,
            zone_min_prims: 2,
            ..DrawOptions::default()
        };
        let (mut ctx, log, _) = context(&options);
        ctx.draw_vb(&triangle(0.0)).unwrap();
        ctx.draw_vb(&triangle(-0.5)).unwrap();
        ctx.end_frame().unwrap();
        assert_eq!(log.len(), 1);
        ctx.draw_vb(&triangle(0.0)).unwrap();
        assert_eq!(ctx.active_backend(), BackendKind::Zone);
        ctx.end_frame().unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    #[should_panic(expected = "state changed while drawing")]
    fn state_is_frozen_inside_a_vertex_buffer() {
        let (mut ctx, _, _) = context(&DrawOptions::default());
        ctx.in_vb = true;
        ctx.set_viewport(Viewport::default());
    }

    #[test]
    fn empty_buffers_draw_nothing() {
        let (mut ctx, log, _) = context(&DrawOptions::default());
        ctx.draw_vb(&VertexBuffer::new(Vec::new())).unwrap();
        ctx.draw_vb(&triangle(0.0).with_prim(Prim::Lines, 0, 1)).unwrap();
        ctx.flush().unwrap();
        // The single-vertex line run is trimmed away; the triangle is not.
        assert_eq!(log.len(), 1);
        assert_eq!(ctx.route(), Route::Direct);
    }
}
