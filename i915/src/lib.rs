// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawing core for i915-class GPUs.
//!
//! A [`DrawContext`] takes populated vertex buffers and turns them into
//! hardware command streams. Each vertex buffer is routed either straight
//! to the active render backend (with quads, quad strips and line loops
//! decomposed on the way) or through the software clip/setup pipeline when
//! clipping, unfilled polygons, polygon offset, two-sided lighting or flat
//! shading of clipped geometry require it.
//!
//! Render backends implement the [`Render`] trait:
//!
//! - [`Classic`](render::Classic) writes primitives referencing a shared
//!   vertex buffer directly into the command stream.
//! - [`ZoneRender`](render::ZoneRender) bins primitives into 64×32 pixel
//!   zones, each with its own command blocks, chained together at flush.
//! - [`HwzRender`](render::HwzRender) encodes like the classic backend but
//!   submits through the kernel's hardware binning path.
//! - [`SwrastRender`](render::SwrastRender) converts hardware vertices back
//!   for a CPU [`Rasterizer`](render::Rasterizer).
//!
//! Hardware state is tracked by [`Hardware`], which diffs the desired
//! register state against what was last emitted and deduplicates indirect
//! state blocks through per-bucket packet caches.
//!
//! The wire-level encoding lives in the [`i915_encoding`] crate.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    missing_docs,
    missing_debug_implementations,
    elided_lifetimes_in_paths,
    single_use_lifetimes,
    unreachable_pub,
    clippy::return_self_not_must_use,
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::exhaustive_enums
)]

mod draw;
mod driver;
mod fetch;
mod hardware;
mod kernel;
mod lock;
mod pipe;
pub mod render;
mod state;
mod vb;
mod vertex_pool;

#[cfg(test)]
mod testing;

use thiserror::Error;

pub use i915_encoding;

pub use draw::{Collaborators, DrawContext, Route};
pub use driver::{Driver, I915Driver};
pub use fetch::{VertexFetch, Viewport};
pub use hardware::{ClearValues, Hardware, SubmitMode};
pub use kernel::{HwzParams, Kernel, RecordingKernel, SubmissionLog, Submitted};
pub use lock::{HwLock, LockStatus, SharedArea};
pub use pipe::{PipeStats, StageKind, MAX_CLIPPED_VERTICES};
pub use render::{BackendKind, ClearMask, Render, VertexAlloc};
pub use state::{CullMode, DrawState, FillMode, Winding, MAX_USER_PLANES};
pub use vb::{clip_test, AttribArrays, PrimRun, VbState, VertexBuffer, CLIP_USER_BIT};
pub use vertex_pool::VertexPool;

use i915_encoding::BatchSizes;

/// Errors that can occur in the drawing core.
///
/// Every variant reports a resource that was still exhausted after the
/// owning component flushed and retried once.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The command buffer could not hold a packet even when empty.
    #[error("command buffer exhausted: {0}")]
    Batch(#[from] i915_encoding::BatchError),
    /// The vertex pool could not hold an allocation even when empty.
    #[error("no room for {count} vertices of {dwords} dwords")]
    VertexSpace { dwords: u32, count: u32 },
    /// A vertex buffer had more vertices than one allocation can index.
    #[error("vertex buffer of {0} vertices exceeds the indexable range")]
    VertexBufferTooLarge(u32),
    /// The zone command pool could not hold a primitive after restarting
    /// the binning pass.
    #[error("zone command pool exhausted")]
    BinPoolExhausted,
    /// The draw rectangle needs more zones than the command pool has
    /// blocks.
    #[error("{zones} zones do not fit in a pool of {blocks} blocks")]
    ZoneGridTooLarge { zones: usize, blocks: u32 },
}

/// Specialization of `Result` for our catch-all error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Options which are set at context creation.
#[derive(Clone, Debug)]
pub struct DrawOptions {
    /// Capacities of the command-buffer segments and relocation list.
    pub batch: BatchSizes,
    /// Size in dwords of the shared vertex buffer.
    pub vertex_pool_dwords: u32,
    /// Largest index count of one hardware primitive command. Longer runs
    /// are split.
    pub max_indices: u32,
    /// Allow the zone renderer.
    pub zone_rendering: bool,
    /// Number of command blocks in the zone pool.
    pub zone_pool_blocks: u32,
    /// Primitive count of a frame above which the next frame is zone
    /// rendered.
    pub zone_min_prims: u32,
    /// Submit through the kernel's hardware binning path.
    pub hardware_zone: bool,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            batch: BatchSizes::default(),
            vertex_pool_dwords: 64 * 1024,
            max_indices: 1020,
            zone_rendering: false,
            zone_pool_blocks: 512,
            zone_min_prims: 64,
            hardware_zone: false,
        }
    }
}
