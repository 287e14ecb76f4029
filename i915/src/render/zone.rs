// Copyright 2026 the i915 Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Software binning into 64×32 pixel zones.
//!
//! Each zone owns a chain of command blocks in a shared pool. A primitive
//! is appended to every zone its bounding box overlaps, preceded by the
//! state that zone has not seen yet. At flush the zones are linked into a
//! single traversal that the main command buffer jumps into.

use i915_encoding::cmd::{
    elts_dwords, prim_elts, CLEAR_RECT_DWORDS, INDIRECT_ADDRESS_MASK,
    MI_BATCH_BUFFER_END, MI_BATCH_BUFFER_START, MI_NOOP, PRIM_MAX_COUNT,
};
use i915_encoding::{
    bbox, decompose, diff, emit_immediate, emit_indirect, immediate_packet_size,
    indirect_packet_size, relocation_count, Attrib, BatchError, BufferData, BufferId,
    CommandSink, Dirty, DrawRect, HwPrim, HwState, Prim, Primitive, ReducedPrim, Relocation,
    ZoneGrid,
};

use super::{emit_clear_rect, emit_draw_rect, BackendKind, Classic, ClearMask, Render, VertexAlloc};
use crate::{Error, Hardware, Result};

/// Size of one zone command block.
pub const ZONE_BLOCK_DWORDS: u32 = 1024;

/// Space kept at the end of every block for an element terminator and a
/// jump to the next block.
const BLOCK_RESERVE: u32 = 3;

/// Packed element pair holding only a terminator.
const TERMINATOR_DWORD: u32 = 0xffff_ffff;

#[derive(Clone, Debug, Default)]
struct Zone {
    /// First dword of the zone's first block.
    start: u32,
    /// Next write position.
    pos: u32,
    /// Writes must stay below this.
    limit: u32,
    /// State the zone has not seen.
    dirty: Dirty,
    /// Primitive of the open element run.
    run: Option<HwPrim>,
    /// The last element dword has only its low half filled.
    half: bool,
    touched: bool,
}

impl Zone {
    fn state_dwords(&self) -> u32 {
        if self.dirty.is_empty() {
            0
        } else {
            immediate_packet_size(self.dirty.immediate) + indirect_packet_size(self.dirty.indirect)
        }
    }
}

struct ZonePool {
    id: BufferId,
    data: Vec<u32>,
    blocks: u32,
    next_block: u32,
    relocs: Vec<Relocation>,
}

impl ZonePool {
    fn new(blocks: u32) -> Self {
        Self {
            id: BufferId::next(),
            data: Vec::new(),
            blocks,
            next_block: 0,
            relocs: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.id = BufferId::next();
        self.data.clear();
        self.next_block = 0;
        self.relocs.clear();
    }

    fn free_blocks(&self) -> u32 {
        self.blocks - self.next_block
    }

    /// Returns the first dword of a fresh block.
    fn alloc_block(&mut self) -> Option<u32> {
        if self.free_blocks() == 0 {
            return None;
        }
        let start = self.next_block * ZONE_BLOCK_DWORDS;
        self.next_block += 1;
        self.data
            .resize((start + ZONE_BLOCK_DWORDS) as usize, MI_NOOP);
        Some(start)
    }
}

/// Writes into one zone's current block.
struct ZoneSink<'a> {
    pool: &'a mut ZonePool,
    zone: &'a mut Zone,
}

impl ZoneSink<'_> {
    fn terminate(&mut self) {
        if self.zone.run.take().is_some() {
            if !self.zone.half {
                self.dword(TERMINATOR_DWORD);
            }
            self.zone.half = false;
        }
    }

    fn element(&mut self, index: u32) {
        let index = index & 0xffff;
        if self.zone.half {
            let last = &mut self.pool.data[self.zone.pos as usize - 1];
            *last = (*last & 0xffff) | (index << 16);
            self.zone.half = false;
        } else {
            self.dword(index | (TERMINATOR_DWORD << 16));
            self.zone.half = true;
        }
    }

    /// Closes the run and continues in a new block.
    fn chain(&mut self) -> Result<()> {
        self.terminate();
        let block = self.pool.alloc_block().ok_or(Error::BinPoolExhausted)?;
        let id = self.pool.id;
        self.dword(MI_BATCH_BUFFER_START);
        self.reloc(id, INDIRECT_ADDRESS_MASK, block * 4);
        log::trace!("zone chained to block at {block}");
        self.zone.pos = block;
        self.zone.limit = block + ZONE_BLOCK_DWORDS - BLOCK_RESERVE;
        Ok(())
    }

    /// Makes room for `dwords` in the current block.
    fn ensure(&mut self, dwords: u32) -> Result<()> {
        if self.zone.pos + dwords > self.zone.limit {
            self.chain()?;
        }
        Ok(())
    }
}

impl CommandSink for ZoneSink<'_> {
    fn dword(&mut self, value: u32) {
        self.pool.data[self.zone.pos as usize] = value;
        self.zone.pos += 1;
    }

    fn reloc(&mut self, target: BufferId, mask: u32, delta: u32) {
        self.pool.relocs.push(Relocation {
            source: self.pool.id,
            offset: self.zone.pos,
            target,
            mask,
            delta,
        });
        self.dword(delta);
    }
}

/// Bins primitives into zones and replays them zone by zone.
pub struct ZoneRender {
    pool: ZonePool,
    grid: ZoneGrid,
    zones: Vec<Zone>,
    /// State already folded into the zones' dirty bits.
    global: Option<HwState>,
    active: bool,
    prim: Option<Prim>,
    alloc: Option<VertexAlloc>,
    scratch: Vec<usize>,
}

impl ZoneRender {
    pub fn new(pool_blocks: u32) -> Self {
        Self {
            pool: ZonePool::new(pool_blocks),
            grid: ZoneGrid::new(DrawRect::default()),
            zones: Vec::new(),
            global: None,
            active: false,
            prim: None,
            alloc: None,
            scratch: Vec::new(),
        }
    }

    pub fn grid(&self) -> &ZoneGrid {
        &self.grid
    }

    /// Zones written to since the pass started, in replay order.
    pub fn touched_zones(&self) -> impl Iterator<Item = usize> + '_ {
        self.zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.touched)
            .map(|(ix, _)| ix)
    }

    fn sink(&mut self, ix: usize) -> ZoneSink<'_> {
        ZoneSink {
            pool: &mut self.pool,
            zone: &mut self.zones[ix],
        }
    }

    /// Starts a binning pass over the current drawable: one block per
    /// zone, each opened with the zone's draw rectangle.
    fn start_pass(&mut self, hw: &Hardware) -> Result<()> {
        let grid = ZoneGrid::new(hw.draw_rect());
        if grid.len() > self.pool.blocks as usize {
            return Err(Error::ZoneGridTooLarge {
                zones: grid.len(),
                blocks: self.pool.blocks,
            });
        }
        self.pool.reset();
        self.grid = grid;
        self.zones.clear();
        for ix in 0..grid.len() {
            let Some(block) = self.pool.alloc_block() else {
                return Err(Error::BinPoolExhausted);
            };
            self.zones.push(Zone {
                start: block,
                pos: block,
                limit: block + ZONE_BLOCK_DWORDS - BLOCK_RESERVE,
                ..Zone::default()
            });
            emit_draw_rect(&mut self.sink(ix), grid.zone_rect(ix));
        }
        self.global = None;
        self.active = true;
        log::debug!(
            "zone pass started: {}x{} zones",
            grid.width_in_zones(),
            grid.height_in_zones()
        );
        Ok(())
    }

    /// Links the touched zones and submits them with the main buffer.
    ///
    /// Fails without touching the pass when the command buffer cannot take
    /// its relocations.
    fn flush_pass(&mut self, hw: &mut Hardware) -> Result<()> {
        if !self.active {
            hw.flush()?;
            return Ok(());
        }
        let touched: Vec<usize> = self.touched_zones().collect();
        let Some((&first, &last)) = touched.first().zip(touched.last()) else {
            self.active = false;
            hw.flush()?;
            return Ok(());
        };
        // One link per touched zone after the first, plus the entry jump.
        let relocs = self.pool.relocs.len() as u32 + touched.len() as u32;
        if relocs > hw.reloc_space() {
            return Err(BatchError::RelocationsFull.into());
        }
        self.active = false;
        for ix in 0..self.zones.len() {
            self.sink(ix).terminate();
        }
        let id = self.pool.id;
        for pair in touched.windows(2) {
            let next = self.zones[pair[1]].start;
            let mut sink = self.sink(pair[0]);
            sink.dword(MI_BATCH_BUFFER_START);
            sink.reloc(id, INDIRECT_ADDRESS_MASK, next * 4);
        }
        let mut sink = self.sink(last);
        sink.dword(MI_BATCH_BUFFER_END);
        sink.dword(MI_NOOP);

        let entry = self.zones[first].start;
        {
            let mut p = hw.reserve(2, 1)?;
            p.dword(MI_BATCH_BUFFER_START);
            p.reloc(id, INDIRECT_ADDRESS_MASK, entry * 4);
        }
        log::debug!(
            "zone pass flushed: {} of {} zones touched, {} blocks",
            touched.len(),
            self.zones.len(),
            self.pool.next_block
        );
        let blocks = BufferData {
            id,
            data: std::mem::take(&mut self.pool.data),
        };
        let relocs = std::mem::take(&mut self.pool.relocs);
        hw.flush_with(vec![blocks], &relocs)?;
        Ok(())
    }

    /// Submits everything binned so far and starts over.
    fn restart(&mut self, hw: &mut Hardware) -> Result<()> {
        log::warn!("zone pool exhausted, restarting binning pass");
        self.flush_pass(hw)?;
        self.start_pass(hw)
    }

    /// Folds state changes since the last primitive into every zone.
    fn sync_state(&mut self, hw: &mut Hardware) -> Result<HwState> {
        let state = match hw.snapshot() {
            Ok(state) => state,
            Err(err) => {
                log::warn!("{err}, restarting binning pass");
                self.restart(hw)?;
                hw.snapshot()?
            }
        };
        let delta = diff(self.global.as_ref(), &state);
        if !delta.is_empty() {
            for zone in &mut self.zones {
                zone.dirty.union(delta);
            }
        }
        self.global = Some(state);
        Ok(state)
    }

    /// Whether every zone in `zones` can take a command of `need(zone)`
    /// dwords and relocations. Counts the chain and link relocations the
    /// pass adds before it is submitted.
    fn fits(&self, zones: &[usize], reloc_space: u32, need: impl Fn(&Zone) -> (u32, u32)) -> bool {
        let mut blocks = 0;
        let mut relocs = self.pool.relocs.len() as u32;
        let mut touched = self.zones.iter().filter(|z| z.touched).count() as u32;
        for &ix in zones {
            let zone = &self.zones[ix];
            let (dwords, zone_relocs) = need(zone);
            if zone.pos + dwords > zone.limit {
                blocks += 1;
                relocs += 1;
            }
            relocs += zone_relocs;
            touched += !zone.touched as u32;
        }
        // Flushing links each touched zone to the next and jumps into the
        // first from the main buffer.
        blocks <= self.pool.free_blocks() && relocs + touched <= reloc_space
    }

    fn write_prim(&mut self, ix: usize, state: &HwState, hw_prim: HwPrim, elts: &[u32]) -> Result<()> {
        let mut sink = self.sink(ix);
        let need = sink.zone.state_dwords() + 2 + elts_dwords(elts.len() as u32);
        sink.ensure(need)?;
        if !sink.zone.dirty.is_empty() {
            sink.terminate();
            let dirty = std::mem::take(&mut sink.zone.dirty);
            emit_immediate(&mut sink, state, dirty.immediate);
            emit_indirect(&mut sink, state, dirty.indirect);
        }
        if sink.zone.run != Some(hw_prim) {
            sink.terminate();
            sink.dword(prim_elts(hw_prim, 0));
            sink.zone.run = Some(hw_prim);
        }
        for &e in elts {
            sink.element(e);
        }
        sink.zone.touched = true;
        Ok(())
    }

    /// Bins one primitive given as vertex positions within the current
    /// allocation.
    fn bin(&mut self, hw: &mut Hardware, state: &mut HwState, elts: &[u32]) -> Result<()> {
        let Some(alloc) = self.alloc else {
            panic!("draw without allocated vertices");
        };
        let (reduced, dilate) = match elts.len() {
            1 => (ReducedPrim::Point, 1.0),
            2 => (ReducedPrim::Line, 1.0),
            _ => (ReducedPrim::Tri, 0.0),
        };
        let Some(pos) = hw.vertex_layout().slot(Attrib::Pos) else {
            panic!("vertex layout has no position");
        };
        let data = hw.vertices().data(&alloc);
        let mut points = [[0.0; 2]; 3];
        for (p, &e) in points.iter_mut().zip(elts) {
            let [x, y, ..] = pos.read(&data[alloc.vertex(e)]);
            *p = [x, y];
        }
        let area = bbox(&points[..elts.len()], dilate);

        let mut zones = std::mem::take(&mut self.scratch);
        let result = self.bin_into(hw, state, &mut zones, area, HwPrim::list(reduced), elts);
        self.scratch = zones;
        result
    }

    /// Writes `elts` to every zone `area` overlaps, restarting the pass
    /// once if they do not fit.
    fn bin_into(
        &mut self,
        hw: &mut Hardware,
        state: &mut HwState,
        zones: &mut Vec<usize>,
        area: [f32; 4],
        hw_prim: HwPrim,
        elts: &[u32],
    ) -> Result<()> {
        let elts_len = elts.len() as u32;
        let mut retried = false;
        loop {
            zones.clear();
            if let Some(range) = self.grid.zones_for_bbox(area) {
                zones.extend(self.grid.zones(range));
            }
            let fits = self.fits(zones, hw.reloc_space(), |zone| {
                let dwords = zone.state_dwords() + 2 + elts_dwords(elts_len);
                (dwords, relocation_count(state, zone.dirty))
            });
            if fits {
                break;
            }
            if retried {
                return Err(Error::BinPoolExhausted);
            }
            self.restart(hw)?;
            *state = self.sync_state(hw)?;
            retried = true;
        }
        for &ix in zones.iter() {
            self.write_prim(ix, state, hw_prim, elts)?;
        }
        Ok(())
    }

    fn draw(&mut self, hw: &mut Hardware, count: u32, at: impl Fn(u32) -> u32) -> Result<()> {
        let Some(prim) = self.prim else {
            panic!("draw without a primitive kind");
        };
        let mut state = self.sync_state(hw)?;
        let mut primitives = Vec::new();
        decompose(prim, count, |p| primitives.push(p));
        for p in primitives {
            match p {
                Primitive::Point(a) => self.bin(hw, &mut state, &[at(a)])?,
                Primitive::Line(a, b) => self.bin(hw, &mut state, &[at(a), at(b)])?,
                Primitive::Tri(a, b, c) => self.bin(hw, &mut state, &[at(a), at(b), at(c)])?,
            }
        }
        Ok(())
    }

    fn ensure_pass(&mut self, hw: &Hardware) -> Result<()> {
        if !self.active {
            self.start_pass(hw)?;
        }
        Ok(())
    }
}

impl Render for ZoneRender {
    fn kind(&self) -> BackendKind {
        BackendKind::Zone
    }

    fn start_render(&mut self, hw: &mut Hardware, start_of_frame: bool) -> Result<()> {
        if start_of_frame {
            Classic::wait_for_flip(hw)?;
        }
        self.ensure_pass(hw)
    }

    fn allocate_vertices(
        &mut self,
        hw: &mut Hardware,
        vertex_dwords: u32,
        count: u32,
    ) -> Result<VertexAlloc> {
        assert!(self.alloc.is_none(), "previous vertices not released");
        if count > PRIM_MAX_COUNT {
            return Err(Error::VertexBufferTooLarge(count));
        }
        self.ensure_pass(hw)?;
        let alloc = match hw.vertices_mut().alloc(vertex_dwords, count) {
            Some(alloc) => alloc,
            None => {
                self.restart(hw)?;
                hw.vertices_mut()
                    .alloc(vertex_dwords, count)
                    .ok_or(Error::VertexSpace {
                        dwords: vertex_dwords,
                        count,
                    })?
            }
        };
        hw.set_vertex_buffer(&alloc);
        self.alloc = Some(alloc);
        Ok(alloc)
    }

    fn vertex_data<'a>(&'a mut self, hw: &'a mut Hardware, alloc: &VertexAlloc) -> &'a mut [u32] {
        hw.vertices_mut().data_mut(alloc)
    }

    fn set_prim(&mut self, hw: &mut Hardware, prim: Prim) -> Result<()> {
        hw.set_reduced_prim(prim.reduced());
        self.prim = Some(prim);
        Ok(())
    }

    fn draw_prim(&mut self, hw: &mut Hardware, start: u32, count: u32) -> Result<()> {
        self.draw(hw, count, |i| start + i)
    }

    fn draw_indexed_prim(&mut self, hw: &mut Hardware, indices: &[u32]) -> Result<()> {
        self.draw(hw, indices.len() as u32, |i| indices[i as usize])
    }

    fn release_vertices(&mut self, hw: &mut Hardware, alloc: VertexAlloc) {
        hw.vertices_mut().release(&alloc);
        self.alloc = None;
    }

    fn clear_rect(&mut self, hw: &mut Hardware, mask: ClearMask, rect: DrawRect) -> Result<()> {
        self.ensure_pass(hw)?;
        let values = hw.clear_values();
        let area = [rect.x1 as f32, rect.y1 as f32, rect.x2 as f32, rect.y2 as f32];
        let Some(range) = self.grid.zones_for_bbox(area) else {
            return Ok(());
        };
        let need = 1 + CLEAR_RECT_DWORDS;
        let zones: Vec<usize> = self.grid.zones(range).collect();
        if !self.fits(&zones, hw.reloc_space(), |_| (need, 0)) {
            self.restart(hw)?;
        }
        let Some(range) = self.grid.zones_for_bbox(area) else {
            return Ok(());
        };
        let zones: Vec<usize> = self.grid.zones(range).collect();
        for ix in zones {
            let clip = self.grid.zone_rect(ix).intersect(&rect);
            if clip.is_empty() {
                continue;
            }
            let mut sink = self.sink(ix);
            sink.ensure(need)?;
            sink.terminate();
            emit_clear_rect(&mut sink, mask, clip, values);
            sink.zone.touched = true;
        }
        Ok(())
    }

    fn flush(&mut self, hw: &mut Hardware, _end_of_frame: bool) -> Result<()> {
        self.flush_pass(hw)
    }
}
