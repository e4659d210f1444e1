//! One level of indirection in a file header.
//!
//! An `IndexBlock` at depth 0 holds pointers to data sectors; at depth `d > 0` it holds pointers to index sectors,
//! each of which is loaded into an owned child `IndexBlock` of depth `d - 1`. Only the raw pointer table ever reaches
//! the disk, in a sector of its own. How many bytes a block is responsible for is never stored; the parent hands it
//! down on every allocation and every load.
//!
//! The root of a file header is an `IndexBlock` too, just with a smaller pointer table; see
//! [`IndexedNode`](../indexed_node/struct.IndexedNode.html).

use super::error_fs::{IndexError, Result};
use super::geometry::{Geometry, LEVELS};
use ixfs_api::fs::{FreeMap, SectorDevice};
use ixfs_api::types::{Sector, SectorId};
use log::trace;

/// A node of the index tree, together with the subtree it owns
#[derive(Debug, PartialEq, Eq)]
pub struct IndexBlock {
    /// Indirection depth of this block's own pointers
    level: usize,
    /// Bytes of the file this subtree covers
    total_bytes: u64,
    /// Number of leading pointers in `table` that are in use
    active: usize,
    /// Pointer table, exactly as it is (or will be) on disk. Only the first `active` entries mean anything.
    table: Vec<SectorId>,
    /// One child per active pointer when `level > 0`, in pointer order; empty at depth 0
    children: Vec<IndexBlock>,
}

impl IndexBlock {
    pub(crate) fn empty(level: usize, fanout: usize) -> IndexBlock {
        assert!(level < LEVELS, "Indirection depth {} not supported", level);
        IndexBlock {
            level,
            total_bytes: 0,
            active: 0,
            table: vec![0; fanout],
            children: Vec::new(),
        }
    }

    /// Claim the sectors for a fresh subtree of depth `level` covering `bytes` bytes.
    ///
    /// Claims one sector per pointer of this block, and recursively allocates a child per pointer when `level > 0`.
    /// If the free map runs dry halfway through, everything claimed so far is released again before the error is
    /// returned.
    pub fn allocate<F: FreeMap>(
        free_map: &mut F,
        geometry: &Geometry,
        level: usize,
        bytes: u64,
    ) -> Result<IndexBlock> {
        assert!(bytes > 0, "Index blocks always cover at least one byte");
        let mut node = IndexBlock::empty(level, geometry.fanout() as usize);
        if let Err(e) = node.claim(free_map, geometry, bytes) {
            node.release(free_map);
            return Err(e);
        }
        Ok(node)
    }

    /// Claim this node's own pointers and allocate its children.
    /// On error the node is left partially claimed; `release` undoes exactly what was done.
    pub(crate) fn claim<F: FreeMap>(
        &mut self,
        free_map: &mut F,
        geometry: &Geometry,
        bytes: u64,
    ) -> Result<()> {
        let entries = geometry.entries_for(self.level, bytes) as usize;
        assert!(
            entries <= self.table.len(),
            "{} bytes do not fit in an index block of depth {}",
            bytes,
            self.level
        );
        trace!(
            "IndexBlock::claim(level: {}, bytes: {}, entries: {})",
            self.level,
            bytes,
            entries
        );
        self.total_bytes = bytes;

        for i in 0..entries {
            let sector = free_map.find_and_set().ok_or(IndexError::NoSpace {
                needed: (entries - i) as u64,
                available: 0,
            })?;
            self.table[i] = sector;
            self.active = i + 1;
        }

        if self.level > 0 {
            for i in 0..entries {
                let share = geometry.share_of(self.level, bytes, i as u64);
                let child = IndexBlock::allocate(free_map, geometry, self.level - 1, share)?;
                self.children.push(child);
            }
        }
        Ok(())
    }

    /// Return every sector of this subtree to `free_map`, children first.
    pub fn deallocate<F: FreeMap>(mut self, free_map: &mut F) {
        self.release(free_map);
    }

    pub(crate) fn release<F: FreeMap>(&mut self, free_map: &mut F) {
        for child in self.children.iter_mut() {
            child.release(free_map);
        }
        for &sector in &self.table[..self.active] {
            assert!(
                free_map.test(sector),
                "Sector {} of a file header is not marked as used",
                sector
            );
            free_map.clear(sector);
        }
        self.children.clear();
        self.active = 0;
        self.total_bytes = 0;
    }

    /// Load the subtree of depth `level` covering `bytes` bytes whose pointer table is stored in `sector`.
    pub fn fetch_from<D: SectorDevice>(
        device: &D,
        geometry: &Geometry,
        level: usize,
        sector: SectorId,
        bytes: u64,
    ) -> Result<IndexBlock> {
        trace!(
            "IndexBlock::fetch_from({}, level: {}, bytes: {})",
            sector,
            level,
            bytes
        );
        let mut node = IndexBlock::empty(level, geometry.fanout() as usize);
        let s = device.read_sector(sector)?;
        node.decode_table(&s, 0, geometry)?;
        node.load(device, geometry, bytes)?;
        Ok(node)
    }

    /// Rebuild the in-memory part of this node from an already decoded pointer table
    pub(crate) fn load<D: SectorDevice>(
        &mut self,
        device: &D,
        geometry: &Geometry,
        bytes: u64,
    ) -> Result<()> {
        let entries = geometry.entries_for(self.level, bytes) as usize;
        if entries > self.table.len() {
            return Err(IndexError::Corrupt(
                "Index block covers more bytes than its pointers can address",
            ));
        }
        self.total_bytes = bytes;
        self.active = entries;
        self.children.clear();

        if self.level > 0 {
            for i in 0..entries {
                let share = geometry.share_of(self.level, bytes, i as u64);
                let child =
                    IndexBlock::fetch_from(device, geometry, self.level - 1, self.table[i], share)?;
                self.children.push(child);
            }
        }
        Ok(())
    }

    /// Write this node's pointer table to `sector`, then every child to the sector named by its pointer.
    pub fn write_back<D: SectorDevice>(
        &self,
        device: &mut D,
        geometry: &Geometry,
        sector: SectorId,
    ) -> Result<()> {
        trace!("IndexBlock::write_back({}), level: {}", sector, self.level);
        let mut s = Sector::new_zero(sector, geometry.sector_size());
        self.encode_table(&mut s, 0, geometry)?;
        device.write_sector(&s)?;
        self.write_children(device, geometry)
    }

    pub(crate) fn write_children<D: SectorDevice>(
        &self,
        device: &mut D,
        geometry: &Geometry,
    ) -> Result<()> {
        for (child, &sector) in self.children.iter().zip(self.table.iter()) {
            child.write_back(device, geometry, sector)?;
        }
        Ok(())
    }

    /// Read the whole pointer table, tail included, from `s` starting at byte `offset`
    pub(crate) fn decode_table(&mut self, s: &Sector, offset: u64, geometry: &Geometry) -> Result<()> {
        let w = geometry.word_size();
        for (i, slot) in self.table.iter_mut().enumerate() {
            *slot = s.read_word(offset + i as u64 * w.bytes(), w)?;
        }
        Ok(())
    }

    /// Write the whole pointer table, tail included, into `s` starting at byte `offset`
    pub(crate) fn encode_table(&self, s: &mut Sector, offset: u64, geometry: &Geometry) -> Result<()> {
        let w = geometry.word_size();
        for (i, &sector) in self.table.iter().enumerate() {
            s.write_word(sector, offset + i as u64 * w.bytes(), w)?;
        }
        Ok(())
    }

    /// Translate a byte `offset` within this subtree to the data sector holding it.
    ///
    /// Panics if `offset` lies past the last pointer of this block.
    pub fn byte_to_sector(&self, geometry: &Geometry, offset: u64) -> SectorId {
        let cap = geometry.capacity(self.level);
        assert!(
            offset < self.active as u64 * cap,
            "Offset {} outside of an index block covering {} bytes",
            offset,
            self.total_bytes
        );
        let branch = (offset / cap) as usize;
        if self.level == 0 {
            self.table[branch]
        } else {
            self.children[branch].byte_to_sector(geometry, offset - branch as u64 * cap)
        }
    }

    /// Indirection depth of this block's pointers
    pub fn level(&self) -> usize {
        self.level
    }

    /// Bytes of the file covered by this subtree
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of pointers in use
    pub fn active_entries(&self) -> usize {
        self.active
    }

    /// The pointers in use
    pub fn entries(&self) -> &[SectorId] {
        &self.table[..self.active]
    }

    /// Every sector claimed by this subtree: this node's pointers first, then each child's, recursively
    pub fn sectors(&self) -> Vec<SectorId> {
        let mut out = Vec::new();
        self.collect_sectors(&mut out);
        out
    }

    fn collect_sectors(&self, out: &mut Vec<SectorId>) {
        out.extend_from_slice(self.entries());
        for child in &self.children {
            child.collect_sectors(out);
        }
    }

    /// The data sectors of this subtree, in file order
    pub fn data_sectors(&self) -> Vec<SectorId> {
        if self.level == 0 {
            self.entries().to_vec()
        } else {
            self.children.iter().flat_map(|c| c.data_sectors()).collect()
        }
    }

    /// Append the contents of every data sector to `out`, one line per sector, cut off at the end of this subtree
    pub(crate) fn dump_contents<D: SectorDevice>(
        &self,
        device: &D,
        geometry: &Geometry,
        out: &mut String,
    ) -> Result<()> {
        if self.level > 0 {
            for child in &self.children {
                child.dump_contents(device, geometry, out)?;
            }
            return Ok(());
        }
        for (i, &sector) in self.entries().iter().enumerate() {
            let len = geometry.share_of(0, self.total_bytes, i as u64) as usize;
            let s = device.read_sector(sector)?;
            for &b in &s.contents_as_ref()[..len] {
                if (0x20..=0x7e).contains(&b) {
                    out.push(b as char);
                } else {
                    out.push_str(&format!("\\{:x}", b));
                }
            }
            out.push('\n');
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/index_block_test.rs"]
mod tests;
