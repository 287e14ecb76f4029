// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Submission of command buffers to the kernel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use i915_encoding::{BufferId, DrawRect, Fence, Submission};

/// Zone grid handed to the kernel's hardware binning path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HwzParams {
    pub draw_rect: DrawRect,
    pub width_in_zones: u32,
    pub height_in_zones: u32,
}

/// The kernel side of command submission.
///
/// Implementations own buffer placement: they choose addresses for the
/// buffers in a submission and resolve its relocations.
pub trait Kernel {
    fn submit(&mut self, submission: Submission) -> Fence;

    /// Submits through the hardware binning path.
    fn submit_hwz(&mut self, submission: Submission, params: HwzParams) -> Fence {
        let _ = params;
        self.submit(submission)
    }
}

/// A submission as seen by [`RecordingKernel`], with relocations resolved.
#[derive(Clone, Debug)]
pub struct Submitted {
    pub submission: Submission,
    pub hwz: Option<HwzParams>,
    pub fence: Fence,
    pub addresses: HashMap<BufferId, u32>,
}

impl Submitted {
    pub fn address(&self, id: BufferId) -> Option<u32> {
        self.addresses.get(&id).copied()
    }
}

/// Shared view of everything a [`RecordingKernel`] received.
#[derive(Clone, Default)]
pub struct SubmissionLog(Arc<Mutex<Vec<Submitted>>>);

impl SubmissionLog {
    fn with<R>(&self, f: impl FnOnce(&mut Vec<Submitted>) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn len(&self) -> usize {
        self.with(|log| log.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<Submitted> {
        self.with(|log| log.last().cloned())
    }

    pub fn take(&self) -> Vec<Submitted> {
        self.with(std::mem::take)
    }
}

const BASE_ADDRESS: u32 = 0x0100_0000;
const ADDRESS_STRIDE: u32 = 0x0010_0000;

/// A kernel that places every buffer at a fixed fake address and keeps
/// the resolved submissions.
#[derive(Default)]
pub struct RecordingKernel {
    log: SubmissionLog,
    addresses: HashMap<BufferId, u32>,
    next_fence: u64,
}

impl RecordingKernel {
    pub fn new() -> (Self, SubmissionLog) {
        let kernel = Self::default();
        let log = kernel.log.clone();
        (kernel, log)
    }

    fn place(&mut self, id: BufferId) -> u32 {
        let next = BASE_ADDRESS + ADDRESS_STRIDE * self.addresses.len() as u32;
        *self.addresses.entry(id).or_insert(next)
    }

    fn record(&mut self, mut submission: Submission, hwz: Option<HwzParams>) -> Fence {
        for buffer in &submission.buffers {
            self.place(buffer.id);
        }
        for reloc in &submission.relocs {
            self.place(reloc.target);
        }
        if let Err(err) = submission.resolve(|id| self.addresses.get(&id).copied()) {
            log::warn!("unresolved submission: {err}");
        }
        self.next_fence += 1;
        let fence = Fence(self.next_fence);
        let addresses = self.addresses.clone();
        self.log.with(|log| {
            log.push(Submitted {
                submission,
                hwz,
                fence,
                addresses,
            });
        });
        fence
    }
}

impl Kernel for RecordingKernel {
    fn submit(&mut self, submission: Submission) -> Fence {
        self.record(submission, None)
    }

    fn submit_hwz(&mut self, submission: Submission, params: HwzParams) -> Fence {
        self.record(submission, Some(params))
    }
}
