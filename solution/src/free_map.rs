//! Bitmap-backed free-sector allocator.
//!
//! One bit per device sector, set while the sector is in use. The bitmap lives in memory while a file system is
//! mounted, and is persisted as a run of consecutive sectors on the device it describes: byte `i` of the map goes to
//! sector `first_sector + i / S`, at offset `i % S`. Bit `j` of a byte tracks sector `8 * i + j`.

use super::error_fs::{IndexError, Result};
use bit_field::BitField;
use ixfs_api::fs::{FreeMap, SectorDevice};
use ixfs_api::types::{Sector, SectorId};
use log::trace;

const BITS_PER_BYTE: u64 = 8;

/// In-memory free-sector map that can be loaded from and written back to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentBitmap {
    /// Number of sectors tracked
    nbits: u64,
    /// The bits themselves; trailing bits of the last byte are never set
    map: Vec<u8>,
}

impl PersistentBitmap {
    /// A map of `nbits` sectors, all free
    pub fn new(nbits: u64) -> PersistentBitmap {
        PersistentBitmap {
            nbits,
            map: vec![0; Self::bytes_for(nbits) as usize],
        }
    }

    fn bytes_for(nbits: u64) -> u64 {
        (nbits + BITS_PER_BYTE - 1) / BITS_PER_BYTE
    }

    /// Number of sectors a map of `nbits` bits takes up on a device with `sector_size`-byte sectors
    pub fn sectors_needed(nbits: u64, sector_size: u64) -> u64 {
        (Self::bytes_for(nbits) + sector_size - 1) / sector_size
    }

    /// Load a map of `nbits` sectors from `device`, starting at `first_sector`
    pub fn fetch_from<D: SectorDevice>(
        device: &D,
        first_sector: SectorId,
        nbits: u64,
    ) -> Result<PersistentBitmap> {
        let ss = device.sector_size();
        let mut bm = PersistentBitmap::new(nbits);
        for (i, chunk) in bm.map.chunks_mut(ss as usize).enumerate() {
            let s = device.read_sector(first_sector + i as u64)?;
            s.read_data(chunk, 0)?;
        }
        //Whatever lies past the last tracked sector is not ours to trust
        for b in nbits..Self::bytes_for(nbits) * BITS_PER_BYTE {
            if bm.get(b) {
                return Err(IndexError::Corrupt(
                    "Free map marks sectors past its end as used",
                ));
            }
        }
        trace!(
            "PersistentBitmap::fetch_from({}), {} of {} free",
            first_sector,
            bm.num_clear(),
            nbits
        );
        Ok(bm)
    }

    /// Persist this map to `device`, starting at `first_sector`.
    /// The unused tail of the last sector is written as zeroes.
    pub fn write_back<D: SectorDevice>(&self, device: &mut D, first_sector: SectorId) -> Result<()> {
        let ss = device.sector_size();
        for (i, chunk) in self.map.chunks(ss as usize).enumerate() {
            let mut s = Sector::new_zero(first_sector + i as u64, ss);
            s.write_data(chunk, 0)?;
            device.write_sector(&s)?;
        }
        trace!("PersistentBitmap::write_back({})", first_sector);
        Ok(())
    }

    fn get(&self, bit: u64) -> bool {
        self.map[(bit / BITS_PER_BYTE) as usize].get_bit((bit % BITS_PER_BYTE) as usize)
    }

    fn set(&mut self, bit: u64, value: bool) {
        self.map[(bit / BITS_PER_BYTE) as usize].set_bit((bit % BITS_PER_BYTE) as usize, value);
    }

    fn check_bounds(&self, id: SectorId) {
        assert!(
            id < self.nbits,
            "Sector {} outside of a free map of {} sectors",
            id,
            self.nbits
        );
    }
}

impl FreeMap for PersistentBitmap {
    fn num_sectors(&self) -> u64 {
        self.nbits
    }

    fn find_and_set(&mut self) -> Option<SectorId> {
        for (by, byte) in self.map.iter().enumerate() {
            if *byte == 0b1111_1111 {
                continue;
            }
            for i in 0..BITS_PER_BYTE {
                let bit = by as u64 * BITS_PER_BYTE + i;
                //the last byte may have padding bits past the end of the map
                if bit >= self.nbits {
                    return None;
                }
                if !self.get(bit) {
                    self.set(bit, true);
                    return Some(bit);
                }
            }
        }
        None
    }

    fn test(&self, id: SectorId) -> bool {
        self.check_bounds(id);
        self.get(id)
    }

    fn mark(&mut self, id: SectorId) {
        self.check_bounds(id);
        assert!(!self.get(id), "Sector {} is already in use", id);
        self.set(id, true);
    }

    fn clear(&mut self, id: SectorId) {
        self.check_bounds(id);
        self.set(id, false);
    }

    fn num_clear(&self) -> u64 {
        let used: u64 = self.map.iter().map(|b| b.count_ones() as u64).sum();
        self.nbits - used
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/free_map_test.rs"]
mod tests;
