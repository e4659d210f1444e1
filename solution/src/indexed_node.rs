//! The file header (in UNIX terms, the i-node), describing where on disk to find all of the data in a file.
//!
//! A header occupies exactly one sector on disk:
//!
//! `[ file length: word ][ sector count: word ][ root pointers: root_fanout words ]`
//!
//! packed without padding. Depending on the file length, the root pointers name data sectors directly, or name index
//! sectors one, two or three levels above the data (see [`IndexBlock`](../index_block/struct.IndexBlock.html)).
//! The level is never stored: it is recomputed from the file length whenever a header is loaded.
//!
//! A header comes to life in one of two ways:
//! - for a new file, by claiming sectors for it from a free map with [`allocate`](struct.IndexedNode.html#method.allocate)
//! - for a file already on disk, by reading it with [`fetch_from`](struct.IndexedNode.html#method.fetch_from)
//!
//! The sector holding the header itself is not part of the tree; whoever creates the file claims it separately.

use super::error_fs::{IndexError, Result};
use super::geometry::{Geometry, Level};
use super::index_block::IndexBlock;
use ixfs_api::fs::{FreeMap, SectorDevice};
use ixfs_api::types::{Sector, SectorId};
use log::{debug, trace, warn};

/// In-memory file header, owning the whole index tree below it
#[derive(Debug, PartialEq, Eq)]
pub struct IndexedNode {
    geometry: Geometry,
    /// Number of data sectors of the file
    total_sectors: u64,
    level: Level,
    /// Root pointer table and the subtrees hanging off it. Its depth is `level.depth()`.
    root: IndexBlock,
}

impl IndexedNode {
    /// Initialize a fresh file header for a newly created file of `file_size` bytes, claiming data (and index) sectors
    /// out of `free_map`.
    ///
    /// Fails without touching `free_map` if the file is too large for `geometry`, or if `free_map` has fewer free
    /// sectors than the file has data sectors. Should the index sectors on top of that exhaust the map, whatever was
    /// claimed is released again, so `free_map` is left as it was on every error.
    pub fn allocate<F: FreeMap>(
        free_map: &mut F,
        geometry: &Geometry,
        file_size: u64,
    ) -> Result<IndexedNode> {
        debug!("IndexedNode::allocate({})", file_size);
        let level = Level::for_length(geometry, file_size)?;
        let total_sectors = geometry.sectors_for(file_size);
        let available = free_map.num_clear();
        if available < total_sectors {
            return Err(IndexError::NoSpace {
                needed: total_sectors,
                available,
            });
        }

        let mut root = IndexBlock::empty(level.depth(), geometry.root_fanout() as usize);
        if let Err(e) = root.claim(free_map, geometry, file_size) {
            warn!(
                "Allocation of {} bytes ran out of sectors, rolling back",
                file_size
            );
            root.release(free_map);
            return Err(e);
        }
        trace!(
            "IndexedNode::allocate: level {:?}, {} root entries",
            level,
            root.active_entries()
        );

        Ok(IndexedNode {
            geometry: *geometry,
            total_sectors,
            level,
            root,
        })
    }

    /// De-allocate all the space claimed for this file: every index sector and every data sector.
    /// The header's own sector is left alone.
    pub fn deallocate<F: FreeMap>(mut self, free_map: &mut F) {
        debug!("IndexedNode::deallocate(), {} bytes", self.file_length());
        self.root.release(free_map);
    }

    /// Fetch a file header, and the index tree below it, from the header stored in `sector`.
    ///
    /// Fails if the stored length is larger than `geometry` allows, or does not agree with the stored sector count.
    pub fn fetch_from<D: SectorDevice>(
        device: &D,
        geometry: &Geometry,
        sector: SectorId,
    ) -> Result<IndexedNode> {
        debug!("IndexedNode::fetch_from({})", sector);
        check_device(device, geometry)?;
        let w = geometry.word_size();
        let s = device.read_sector(sector)?;
        let total_bytes = s.read_word(0, w)?;
        let total_sectors = s.read_word(w.bytes(), w)?;

        let level = Level::for_length(geometry, total_bytes).map_err(|_| {
            IndexError::Corrupt("Stored file length exceeds the maximum file size")
        })?;
        if total_sectors != geometry.sectors_for(total_bytes) {
            return Err(IndexError::Corrupt(
                "Stored sector count does not match the file length",
            ));
        }

        let mut root = IndexBlock::empty(level.depth(), geometry.root_fanout() as usize);
        root.decode_table(&s, 2 * w.bytes(), geometry)?;
        root.load(device, geometry, total_bytes)?;

        Ok(IndexedNode {
            geometry: *geometry,
            total_sectors,
            level,
            root,
        })
    }

    /// Write this file header to `sector`, then every index sector below it to where the tree says it lives.
    /// Data sectors are not touched.
    pub fn write_back<D: SectorDevice>(&self, device: &mut D, sector: SectorId) -> Result<()> {
        debug!("IndexedNode::write_back({})", sector);
        check_device(device, &self.geometry)?;
        let w = self.geometry.word_size();
        let mut s = Sector::new_zero(sector, self.geometry.sector_size());
        s.write_word(self.file_length(), 0, w)?;
        s.write_word(self.total_sectors, w.bytes(), w)?;
        self.root.encode_table(&mut s, 2 * w.bytes(), &self.geometry)?;
        device.write_sector(&s)?;
        self.root.write_children(device, &self.geometry)
    }

    /// Return which disk sector is storing a particular byte within the file.
    /// This is essentially a translation from a virtual address (the offset in the file) to a physical address (the
    /// sector where the data at the offset is stored).
    ///
    /// Panics if `offset` lies past the last sector of the file.
    pub fn byte_to_sector(&self, offset: u64) -> SectorId {
        let sector = self.root.byte_to_sector(&self.geometry, offset);
        trace!("IndexedNode::byte_to_sector({}) = {}", offset, sector);
        sector
    }

    /// Length of the file in bytes
    pub fn file_length(&self) -> u64 {
        self.root.total_bytes()
    }

    /// Number of data sectors of the file
    pub fn num_sectors(&self) -> u64 {
        self.total_sectors
    }

    /// Indirection level of the root pointers
    pub fn level(&self) -> Level {
        self.level
    }

    /// Number of root pointers in use
    pub fn active_entries(&self) -> usize {
        self.root.active_entries()
    }

    /// Layout this header was allocated or loaded with
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Every sector claimed by this file, index sectors and data sectors alike.
    /// Root pointers come first, then the subtree below each of them in turn.
    pub fn sectors(&self) -> Vec<SectorId> {
        self.root.sectors()
    }

    /// The data sectors of this file, in file order
    pub fn data_sectors(&self) -> Vec<SectorId> {
        self.root.data_sectors()
    }

    /// Render the contents of this header and of every data block of the file.
    /// Printable ASCII is shown as is; any other byte as a backslash followed by its hex value.
    pub fn dump<D: SectorDevice>(&self, device: &D) -> Result<String> {
        let mut out = format!(
            "FileHeader contents.  File size: {}.  File blocks:\n",
            self.file_length()
        );
        let sectors: Vec<String> = self.sectors().iter().map(|s| s.to_string()).collect();
        out.push_str(&sectors.join(" "));
        out.push_str("\nFile contents:\n");
        self.root.dump_contents(device, &self.geometry, &mut out)?;
        Ok(out)
    }
}

fn check_device<D: SectorDevice>(device: &D, geometry: &Geometry) -> Result<()> {
    if device.sector_size() != geometry.sector_size() {
        return Err(IndexError::Geometry(
            "Device sector size does not match the header geometry",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../api/fs-tests/indexed_node_test.rs"]
mod tests;
