// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! i915 tests.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    missing_debug_implementations,
    unreachable_pub,
    missing_docs,
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use i915::render::{RecordingRasterizer, SwCall, SwVertex};
use i915::{
    Collaborators, DrawContext, DrawOptions, DrawState, HwLock, I915Driver, RecordingKernel,
    SharedArea, SubmissionLog, VertexBuffer, Viewport,
};
use i915_encoding::{Attrib, DrawRect, EmitFormat, VertexLayout};

pub const WIDTH: u32 = 256;
pub const HEIGHT: u32 = 128;

/// A draw context wired to recording collaborators.
pub struct Harness {
    pub ctx: DrawContext,
    pub log: SubmissionLog,
    calls: Arc<Mutex<Vec<SwCall>>>,
}

impl Harness {
    /// A context over a `WIDTH` by `HEIGHT` window, with vertices carrying
    /// a position and one color.
    pub fn new(options: DrawOptions) -> Self {
        let (kernel, log) = RecordingKernel::new();
        let (rasterizer, calls) = RecordingRasterizer::new();
        let collaborators = Collaborators {
            kernel: Box::new(kernel),
            lock: HwLock::new(SharedArea::new(DrawRect::new(0, 0, WIDTH, HEIGHT))),
            rasterizer: Box::new(rasterizer),
            driver: Box::new(I915Driver::new(&options)),
        };
        let mut ctx = DrawContext::new(&options, collaborators);
        let mut layout = VertexLayout::new();
        layout
            .push(Attrib::Pos, EmitFormat::Float4)
            .push(Attrib::Color0, EmitFormat::UByte4Bgra);
        ctx.set_vertex_layout(layout);
        ctx.set_viewport(Viewport::window(WIDTH as f32, HEIGHT as f32));
        Self { ctx, log, calls }
    }

    /// A context that draws everything through the recording rasterizer.
    pub fn software(state: DrawState) -> Self {
        let mut harness = Self::new(DrawOptions::default());
        harness.ctx.set_state(DrawState {
            fallback: true,
            ..state
        });
        harness
    }

    /// Takes the calls the rasterizer received so far.
    pub fn take_calls(&self) -> Result<Vec<SwCall>> {
        let mut calls = self
            .calls
            .lock()
            .map_err(|_| anyhow!("rasterizer log poisoned"))?;
        Ok(std::mem::take(&mut *calls))
    }
}

/// Color tagging vertex `ix`, exact in an 8-bit channel.
pub fn tag(ix: usize) -> [f32; 4] {
    let c = ix as f32 / 255.0;
    [c, c, c, 1.0]
}

/// The vertex index a rasterized vertex was tagged with.
pub fn index_of(v: &SwVertex) -> u32 {
    (v.color[0] * 255.0).round() as u32
}

/// A buffer over `positions` with every vertex tagged by its index.
pub fn tagged(positions: Vec<[f32; 4]>) -> VertexBuffer {
    let colors = (0..positions.len()).map(tag).collect();
    VertexBuffer::new(positions).with_attrib(Attrib::Color0, colors)
}

/// Vertex indices of the triangles among `calls`.
pub fn triangles(calls: &[SwCall]) -> Vec<[u32; 3]> {
    calls
        .iter()
        .filter_map(|call| match call {
            SwCall::Triangle([a, b, c]) => Some([index_of(a), index_of(b), index_of(c)]),
            _ => None,
        })
        .collect()
}

/// Vertex indices of the lines among `calls`.
pub fn lines(calls: &[SwCall]) -> Vec<[u32; 2]> {
    calls
        .iter()
        .filter_map(|call| match call {
            SwCall::Line([a, b]) => Some([index_of(a), index_of(b)]),
            _ => None,
        })
        .collect()
}

/// `n` clip-space positions on a circle of radius 0.5.
pub fn ring(n: usize) -> Vec<[f32; 4]> {
    (0..n)
        .map(|i| {
            let a = i as f32 / n as f32 * std::f32::consts::TAU;
            [0.5 * a.cos(), 0.5 * a.sin(), 0.0, 1.0]
        })
        .collect()
}
