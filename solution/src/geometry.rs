//! Sizing arithmetic shared by every node of a file header.
//!
//! All constants of the on-disk layout derive from two numbers: the sector size `S` of the device, and the width `W`
//! of a sector pointer. One sector holds `fanout = S / W` pointers. The root sector loses two of those words to the
//! file length and sector count, so it holds `root_fanout = (S - 2W) / W` pointers.
//!
//! A pointer at depth 0 names a data sector and hence covers `S` bytes; a pointer at depth `d` names an index sector
//! whose `fanout` pointers each cover the capacity of depth `d - 1`, i.e. `S * fanout^d` bytes.

use super::error_fs::{IndexError, Result};
use ixfs_api::types::WordSize;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Number of indirection depths a header supports: direct, single, double and triple indirect
pub const LEVELS: usize = 4;

/// Validated layout parameters of a file header.
/// Only the sector size and word size are stored when serializing; the rest is recomputed (and revalidated) on load.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "GeometryParams", into = "GeometryParams")]
pub struct Geometry {
    sector_size: u64,
    word_size: WordSize,
    fanout: u64,
    root_fanout: u64,
    capacity: [u64; LEVELS],
    max_file_size: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy)]
struct GeometryParams {
    sector_size: u64,
    word_size: WordSize,
}

impl TryFrom<GeometryParams> for Geometry {
    type Error = IndexError;

    fn try_from(p: GeometryParams) -> Result<Geometry> {
        Geometry::new(p.sector_size, p.word_size)
    }
}

impl From<Geometry> for GeometryParams {
    fn from(g: Geometry) -> GeometryParams {
        GeometryParams {
            sector_size: g.sector_size,
            word_size: g.word_size,
        }
    }
}

lazy_static! {
    /// 128-byte sectors with 4-byte pointers: 32 pointers per index sector, 30 in the root.
    pub static ref DEFAULT_GEOMETRY: Geometry = Geometry::new(128, WordSize::Four).unwrap();
}

impl Geometry {
    /// Derive all layout constants from the sector size and the pointer width.
    ///
    /// Fails if the sector size is not a whole number of words, if the root sector has no room left for a single
    /// pointer, or if the capacity of a triple-indirect pointer does not fit in 64 bits.
    pub fn new(sector_size: u64, word_size: WordSize) -> Result<Geometry> {
        let w = word_size.bytes();
        if sector_size == 0 || sector_size % w != 0 {
            return Err(IndexError::Geometry(
                "Sector size must be a positive multiple of the word size",
            ));
        }
        if sector_size < 3 * w {
            return Err(IndexError::Geometry(
                "Sector too small to hold a file header with at least one pointer",
            ));
        }

        let fanout = sector_size / w;
        let root_fanout = (sector_size - 2 * w) / w;

        let mut capacity = [sector_size; LEVELS];
        for d in 1..LEVELS {
            capacity[d] = capacity[d - 1]
                .checked_mul(fanout)
                .ok_or(IndexError::Geometry("Indirect capacity overflows 64 bits"))?;
        }
        let addressable = capacity[LEVELS - 1]
            .checked_mul(root_fanout)
            .ok_or(IndexError::Geometry("Maximum file size overflows 64 bits"))?;
        // The file length itself is stored in a single word
        let max_file_size = match word_size {
            WordSize::Four => addressable.min(u32::MAX as u64),
            WordSize::Eight => addressable,
        };

        Ok(Geometry {
            sector_size,
            word_size,
            fanout,
            root_fanout,
            capacity,
            max_file_size,
        })
    }

    /// Size of a device sector, in bytes
    pub fn sector_size(&self) -> u64 {
        self.sector_size
    }

    /// Width of a stored pointer
    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    /// Number of pointers in an index sector
    pub fn fanout(&self) -> u64 {
        self.fanout
    }

    /// Number of pointers in the root sector, after the two length words
    pub fn root_fanout(&self) -> u64 {
        self.root_fanout
    }

    /// Bytes covered by one pointer at indirection depth `depth`
    pub fn capacity(&self, depth: usize) -> u64 {
        self.capacity[depth]
    }

    /// Largest file length a header can describe
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Bytes the root header occupies on disk: the length, the sector count and the root pointer table, unpadded
    pub fn header_disk_size(&self) -> u64 {
        (2 + self.root_fanout) * self.word_size.bytes()
    }

    /// Number of data sectors needed for `bytes` bytes
    pub fn sectors_for(&self, bytes: u64) -> u64 {
        div_round_up(bytes, self.sector_size)
    }

    /// Number of pointers at depth `depth` needed to cover `bytes` bytes
    pub fn entries_for(&self, depth: usize, bytes: u64) -> u64 {
        div_round_up(bytes, self.capacity[depth])
    }

    /// Bytes the `index`th pointer at depth `depth` is responsible for, in a node covering `total` bytes.
    /// Every pointer covers a full capacity, except the last one, which covers whatever remains.
    pub fn share_of(&self, depth: usize, total: u64, index: u64) -> u64 {
        let cap = self.capacity[depth];
        let entries = self.entries_for(depth, total);
        assert!(index < entries, "Pointer index past the active entries");
        if index == entries - 1 {
            total - cap * (entries - 1)
        } else {
            cap
        }
    }
}

/// Indirection level of a file header, picked from the file length alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Root pointers name data sectors
    Direct,
    /// Root pointers name index sectors that name data sectors
    Single,
    /// Two index sectors between the root and the data
    Double,
    /// Three index sectors between the root and the data
    Triple,
}

impl Level {
    const ALL: [Level; LEVELS] = [Level::Direct, Level::Single, Level::Double, Level::Triple];

    /// Indirection depth of the root pointers at this level, 0 for `Direct`
    pub fn depth(self) -> usize {
        self as usize
    }

    /// The lowest level whose root table can address `bytes` bytes.
    /// A length exactly on a threshold stays at the lower level.
    pub fn for_length(geometry: &Geometry, bytes: u64) -> Result<Level> {
        if bytes <= geometry.max_file_size() {
            for &level in Level::ALL.iter() {
                if bytes <= geometry.root_fanout() * geometry.capacity(level.depth()) {
                    return Ok(level);
                }
            }
        }
        Err(IndexError::FileTooLarge {
            requested: bytes,
            max: geometry.max_file_size(),
        })
    }
}

fn div_round_up(n: u64, d: u64) -> u64 {
    n / d + if n % d != 0 { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::{Geometry, Level, DEFAULT_GEOMETRY};
    use crate::error_fs::IndexError;
    use ixfs_api::types::{Sector, WordSize};

    #[test]
    fn default_constants() {
        let g = *DEFAULT_GEOMETRY;
        assert_eq!(g.sector_size(), 128);
        assert_eq!(g.fanout(), 32);
        assert_eq!(g.root_fanout(), 30);
        assert_eq!(g.capacity(0), 128);
        assert_eq!(g.capacity(1), 128 * 32);
        assert_eq!(g.capacity(2), 128 * 32 * 32);
        assert_eq!(g.capacity(3), 128 * 32 * 32 * 32);
        assert_eq!(g.max_file_size(), 30 * 128 * 32 * 32 * 32);
        assert_eq!(g.header_disk_size(), 128);
    }

    #[test]
    fn eight_byte_words() {
        let g = Geometry::new(64, WordSize::Eight).unwrap();
        assert_eq!(g.fanout(), 8);
        assert_eq!(g.root_fanout(), 6);
        assert_eq!(g.capacity(3), 64 * 8 * 8 * 8);
        assert_eq!(g.max_file_size(), 6 * 32768);
        assert_eq!(g.header_disk_size(), 64);
    }

    #[test]
    fn bad_geometries() {
        let is_geometry_err = |r: Result<Geometry, IndexError>| matches!(r, Err(IndexError::Geometry(_)));
        assert!(is_geometry_err(Geometry::new(0, WordSize::Four)));
        assert!(is_geometry_err(Geometry::new(130, WordSize::Four)));
        assert!(is_geometry_err(Geometry::new(8, WordSize::Four)));
        assert!(is_geometry_err(Geometry::new(16, WordSize::Eight)));
        assert!(Geometry::new(12, WordSize::Four).is_ok());
        //(2^20 / 8)^3 * 2^20 does not fit in 64 bits
        assert!(is_geometry_err(Geometry::new(1 << 20, WordSize::Eight)));
    }

    #[test]
    fn four_byte_lengths_are_capped() {
        let g = Geometry::new(512, WordSize::Four).unwrap();
        assert_eq!(g.max_file_size(), u32::MAX as u64);
        assert!(Level::for_length(&g, u32::MAX as u64).is_ok());
        assert!(Level::for_length(&g, u32::MAX as u64 + 1).is_err());
    }

    #[test]
    fn level_thresholds() {
        let g = *DEFAULT_GEOMETRY;
        let level = |n| Level::for_length(&g, n).unwrap();
        let direct = g.root_fanout() * g.capacity(0);
        let single = g.root_fanout() * g.capacity(1);
        let double = g.root_fanout() * g.capacity(2);

        assert_eq!(level(0), Level::Direct);
        assert_eq!(level(200), Level::Direct);
        assert_eq!(level(g.capacity(0)), Level::Direct);
        assert_eq!(level(direct), Level::Direct);
        assert_eq!(level(direct + 1), Level::Single);
        assert_eq!(level(single), Level::Single);
        assert_eq!(level(single + 1), Level::Double);
        assert_eq!(level(double), Level::Double);
        assert_eq!(level(double + 1), Level::Triple);
        assert_eq!(level(g.max_file_size()), Level::Triple);

        match Level::for_length(&g, g.max_file_size() + 1) {
            Err(IndexError::FileTooLarge { requested, max }) => {
                assert_eq!(requested, g.max_file_size() + 1);
                assert_eq!(max, g.max_file_size());
            }
            other => panic!("expected FileTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn shares() {
        let g = *DEFAULT_GEOMETRY;
        assert_eq!(g.sectors_for(0), 0);
        assert_eq!(g.sectors_for(200), 2);
        assert_eq!(g.entries_for(0, 200), 2);
        assert_eq!(g.share_of(0, 200, 0), 128);
        assert_eq!(g.share_of(0, 200, 1), 72);
        //An exact multiple leaves a full last share
        assert_eq!(g.share_of(1, 2 * 4096, 1), 4096);
        assert_eq!(g.share_of(1, 2 * 4096 + 1, 2), 1);
    }

    #[test]
    #[should_panic]
    fn share_past_the_end() {
        DEFAULT_GEOMETRY.share_of(0, 200, 2);
    }

    #[test]
    fn stored_with_an_image() {
        let g = Geometry::new(256, WordSize::Eight).unwrap();
        let mut s = Sector::new_zero(0, 64);
        s.serialize_into(&g, 0).unwrap();
        assert_eq!(s.deserialize_from::<Geometry>(0).unwrap(), g);

        //A stored geometry that does not validate is rejected on load
        s.serialize_into(&(100u64, WordSize::Eight), 0).unwrap();
        assert!(s.deserialize_from::<Geometry>(0).is_err());
    }
}
