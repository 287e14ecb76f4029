// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use i915_encoding::{BufferData, BufferId};

use crate::VertexAlloc;

/// The shared vertex buffer object that hardware backends allocate from.
///
/// At most one allocation is outstanding at a time. Allocations are
/// appended until the buffer is retired by a flush.
pub struct VertexPool {
    id: BufferId,
    data: Vec<u32>,
    capacity: u32,
    outstanding: bool,
}

impl VertexPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            id: BufferId::next(),
            data: Vec::with_capacity(capacity as usize),
            capacity,
            outstanding: false,
        }
    }

    pub fn buffer(&self) -> BufferId {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn used(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    /// Reserves `count` vertices of `vertex_dwords` each, or `None` if the
    /// buffer is too full.
    pub fn alloc(&mut self, vertex_dwords: u32, count: u32) -> Option<VertexAlloc> {
        assert!(
            !self.outstanding,
            "vertex allocation requested before the previous one was released"
        );
        let need = vertex_dwords.checked_mul(count)?;
        if need > self.capacity - self.used() {
            return None;
        }
        let offset = self.used();
        self.data.resize((offset + need) as usize, 0);
        self.outstanding = true;
        Some(VertexAlloc {
            buffer: self.id,
            offset,
            vertex_dwords,
            count,
        })
    }

    pub fn data(&self, alloc: &VertexAlloc) -> &[u32] {
        debug_assert_eq!(alloc.buffer, self.id);
        &self.data[alloc.range()]
    }

    pub fn data_mut(&mut self, alloc: &VertexAlloc) -> &mut [u32] {
        debug_assert_eq!(alloc.buffer, self.id);
        &mut self.data[alloc.range()]
    }

    pub fn release(&mut self, alloc: &VertexAlloc) {
        debug_assert_eq!(alloc.buffer, self.id);
        self.outstanding = false;
    }

    /// Hands the current contents to a submission.
    ///
    /// Without an outstanding allocation the pool starts over in a new
    /// buffer; otherwise it keeps filling the same one, which is then
    /// submitted again with the next flush.
    pub fn retire(&mut self) -> Option<BufferData> {
        if self.data.is_empty() {
            return None;
        }
        let snapshot = BufferData {
            id: self.id,
            data: self.data.clone(),
        };
        if !self.outstanding {
            self.data.clear();
            self.id = BufferId::next();
        }
        Some(snapshot)
    }
}
