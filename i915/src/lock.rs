// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The hardware lock shared between drawing contexts.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use i915_encoding::DrawRect;

#[derive(Default)]
struct Sarea {
    owner: Option<u32>,
    last_owner: Option<u32>,
    drawable: DrawRect,
    stamp: u32,
}

/// State shared by every context driving the same device: lock ownership
/// and the current drawable geometry.
#[derive(Clone, Default)]
pub struct SharedArea(Arc<Mutex<Sarea>>);

impl SharedArea {
    pub fn new(drawable: DrawRect) -> Self {
        Self(Arc::new(Mutex::new(Sarea {
            drawable,
            ..Sarea::default()
        })))
    }

    fn get(&self) -> MutexGuard<'_, Sarea> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves or resizes the drawable. Contexts notice at their next lock.
    pub fn set_drawable(&self, rect: DrawRect) {
        let mut sarea = self.get();
        sarea.drawable = rect;
        sarea.stamp = sarea.stamp.wrapping_add(1);
    }

    pub fn drawable(&self) -> DrawRect {
        self.get().drawable
    }
}

/// Outcome of acquiring the lock.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LockStatus {
    /// Another context held the lock since we last did.
    pub contended: bool,
    /// The drawable geometry changed since we last looked.
    pub drawable_changed: bool,
}

impl LockStatus {
    pub fn needs_revalidate(&self) -> bool {
        self.contended || self.drawable_changed
    }
}

/// One context's handle on the hardware lock.
pub struct HwLock {
    area: SharedArea,
    context: u32,
    held: bool,
    stamp: u32,
}

impl HwLock {
    pub fn new(area: SharedArea) -> Self {
        static CONTEXT_COUNTER: AtomicU32 = AtomicU32::new(1);
        let stamp = area.get().stamp;
        Self {
            area,
            context: CONTEXT_COUNTER.fetch_add(1, Ordering::Relaxed),
            held: false,
            stamp,
        }
    }

    pub fn area(&self) -> &SharedArea {
        &self.area
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn lock(&mut self) -> LockStatus {
        assert!(!self.held, "hardware lock is not recursive");
        let mut sarea = self.area.get();
        assert!(
            sarea.owner.is_none(),
            "hardware lock held by context {:?}",
            sarea.owner
        );
        let status = LockStatus {
            contended: sarea.last_owner.is_some_and(|c| c != self.context),
            drawable_changed: sarea.stamp != self.stamp,
        };
        sarea.owner = Some(self.context);
        sarea.last_owner = Some(self.context);
        self.stamp = sarea.stamp;
        self.held = true;
        status
    }

    pub fn unlock(&mut self) {
        assert!(self.held, "unlocking a lock that is not held");
        self.area.get().owner = None;
        self.held = false;
    }
}
