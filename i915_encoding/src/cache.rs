// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::{BatchBuffer, BatchError, BufferId, CommandSink, IndirectRef, Segment};

/// A buffer reference embedded in a state block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobReloc {
    /// Dword index within the block.
    pub dword: u32,
    pub target: BufferId,
    pub mask: u32,
    pub delta: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct CacheEntry {
    data: Box<[u32]>,
    relocs: SmallVec<[BlobReloc; 2]>,
    location: IndirectRef,
}

/// Sum of all dwords.
pub fn hash_dwords(data: &[u32]) -> u32 {
    data.iter().fold(0, |acc, &d| acc.wrapping_add(d))
}

/// Content-addressed store of state blocks already uploaded to one
/// command-buffer segment.
///
/// Entries are keyed by (hash, length); a hit additionally requires the
/// full contents and embedded relocations to match.
pub struct StateCache {
    segment: Segment,
    map: HashMap<(u32, u32), SmallVec<[CacheEntry; 1]>>,
    stats: CacheStats,
}

impl StateCache {
    pub fn new(segment: Segment) -> Self {
        Self {
            segment,
            map: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.map.values().map(|chain| chain.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drops every entry. Called when uploaded offsets become invalid.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Returns the location of `blob`, uploading it on first use.
    ///
    /// Empty blocks are never uploaded and yield a zero-sized reference.
    pub fn upload(
        &mut self,
        batch: &mut BatchBuffer,
        blob: &[u32],
        relocs: &[BlobReloc],
    ) -> Result<IndirectRef, BatchError> {
        if blob.is_empty() {
            return Ok(IndirectRef::default());
        }
        let key = (hash_dwords(blob), blob.len() as u32);
        if let Some(chain) = self.map.get(&key) {
            if let Some(entry) = chain
                .iter()
                .find(|e| *e.data == *blob && *e.relocs == *relocs)
            {
                self.stats.hits += 1;
                log::trace!("state cache hit at {}", entry.location.offset);
                return Ok(entry.location);
            }
        }

        let mut packet = batch.reserve(self.segment, blob.len() as u32, relocs.len() as u32)?;
        let offset = packet.offset();
        for (i, &d) in blob.iter().enumerate() {
            match relocs.iter().find(|r| r.dword as usize == i) {
                Some(r) => packet.reloc(r.target, r.mask, r.delta),
                None => packet.dword(d),
            }
        }
        drop(packet);
        let location = IndirectRef {
            buffer: Some(batch.segment_buffer(self.segment)),
            offset,
            size: blob.len() as u32,
        };
        self.stats.misses += 1;
        log::trace!("state cache miss, uploaded {} dwords at {offset}", blob.len());
        self.map.entry(key).or_default().push(CacheEntry {
            data: blob.into(),
            relocs: relocs.iter().copied().collect(),
            location,
        });
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BatchSizes;

    #[test]
    fn identical_blob_uploads_once() {
        let mut batch = BatchBuffer::new(BatchSizes::default());
        let mut cache = StateCache::new(Segment::OtherIndirect);
        let blob = [0x1000, 0x2000, 0x3000];
        let a = cache.upload(&mut batch, &blob, &[]).unwrap();
        let b = cache.upload(&mut batch, &blob, &[]).unwrap();
        assert_eq!(a, b);
        assert_eq!(batch.used(Segment::OtherIndirect), 3);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn equal_hash_different_content_is_a_miss() {
        let mut batch = BatchBuffer::new(BatchSizes::default());
        let mut cache = StateCache::new(Segment::OtherIndirect);
        let a = cache.upload(&mut batch, &[1, 2], &[]).unwrap();
        let b = cache.upload(&mut batch, &[2, 1], &[]).unwrap();
        assert_eq!(hash_dwords(&[1, 2]), hash_dwords(&[2, 1]));
        assert_ne!(a.offset, b.offset);
        assert_eq!(cache.len(), 2);
        assert_eq!(batch.data(Segment::OtherIndirect), [1, 2, 2, 1]);
    }

    #[test]
    fn relocations_take_part_in_identity() {
        let mut batch = BatchBuffer::new(BatchSizes::default());
        let mut cache = StateCache::new(Segment::OtherIndirect);
        let (t0, t1) = (BufferId::next(), BufferId::next());
        let reloc = |target| BlobReloc {
            dword: 1,
            target,
            mask: !0,
            delta: 0,
        };
        let a = cache.upload(&mut batch, &[5, 0], &[reloc(t0)]).unwrap();
        let b = cache.upload(&mut batch, &[5, 0], &[reloc(t1)]).unwrap();
        assert_ne!(a.offset, b.offset);
        assert_eq!(batch.relocations().len(), 2);
        assert_eq!(batch.relocations()[1].offset, 3);
    }

    #[test]
    fn clear_forces_reupload() {
        let mut batch = BatchBuffer::new(BatchSizes::default());
        let mut cache = StateCache::new(Segment::DynamicIndirect);
        cache.upload(&mut batch, &[9], &[]).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        cache.upload(&mut batch, &[9], &[]).unwrap();
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(batch.used(Segment::DynamicIndirect), 2);
    }

    #[test]
    fn empty_blob_is_not_uploaded() {
        let mut batch = BatchBuffer::new(BatchSizes::default());
        let mut cache = StateCache::new(Segment::OtherIndirect);
        let r = cache.upload(&mut batch, &[], &[]).unwrap();
        assert_eq!(r.size, 0);
        assert!(batch.is_empty());
    }
}
