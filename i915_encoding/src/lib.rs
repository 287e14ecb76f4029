// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-stream encoding for i915-class GPUs.
//!
//! This crate holds the wire-level pieces of the drawing core: opcode and
//! register field constants, primitive tables, the vertex header and vertex
//! layout descriptions, the segmented command buffer with its relocations,
//! the hardware state snapshot and differencer, and the content-addressed
//! state packet cache. It carries no rendering policy.

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
    clippy::return_self_not_must_use,
    clippy::unseparated_literal_suffix,
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    clippy::missing_panics_doc,
    clippy::exhaustive_enums
)]

mod batch;
mod cache;
pub mod cmd;
mod differencer;
mod prim;
mod state;
mod vertex;
mod zone;

pub use batch::{
    BatchBuffer, BatchError, BatchSizes, BufferData, BufferId, CommandSink, Fence, Packet,
    Relocation, Segment, Submission,
};
pub use cache::{hash_dwords, BlobReloc, CacheStats, StateCache};
pub use differencer::{
    emit_immediate, emit_indirect, immediate_packet_size, indirect_packet_size, relocation_count,
    Differencer,
};
pub use prim::{decompose, trim, HwPrim, Prim, PrimInfo, Primitive, ReducedPrim};
pub use state::{
    diff, Dirty, HwState, ImmediateDirty, IndirectBucket, IndirectDirty, IndirectRef,
    MAX_IMMEDIATE,
};
pub use vertex::{
    AttrSlot, Attrib, EmitFormat, VertexHeader, VertexLayout, PIPE_PREFIX_DWORDS,
    UNDEFINED_INDEX,
};
pub use zone::{bbox, DrawRect, ZoneGrid, ZoneRange, ZONE_HEIGHT, ZONE_WIDTH};
