//! Module containing the types shared between the device layer and the file header layer.

use super::error_given;
use super::error_given::APIError;
use lazy_static::lazy_static;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::convert::TryFrom;
use std::io::prelude::*;
use std::io::{Cursor, SeekFrom};

/// Index of a sector on the device.
/// Also the type of every pointer stored in a file header or an index sector.
pub type SectorId = u64;

/// Width of a sector pointer, as stored on disk.
/// The in-memory representation is always a `SectorId`; the width only matters when reading and writing sectors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSize {
    /// Pointers are stored as 4-byte little-endian integers
    Four,
    /// Pointers are stored as 8-byte little-endian integers
    Eight,
}

lazy_static! {
    /// Number of bytes a 4-byte word takes up once serialized.
    /// Only known at runtime, since it is whatever `bincode` emits, hence the `lazy_static`.
    pub static ref WORD4_SIZE : u64 = bincode::serialize(&0u32).unwrap().len() as u64;
    /// Number of bytes an 8-byte word takes up once serialized.
    pub static ref WORD8_SIZE : u64 = bincode::serialize(&0u64).unwrap().len() as u64;
}

impl WordSize {
    /// Number of bytes a single word occupies in a sector
    pub fn bytes(self) -> u64 {
        match self {
            WordSize::Four => *WORD4_SIZE,
            WordSize::Eight => *WORD8_SIZE,
        }
    }
}

/// Sector abstraction, representing one sector of data read from the device.
/// The basic unit read and written by the device controller.
/// Provides basic methods to read and write raw data, words and serializable values at a byte offset.
#[derive(Debug, PartialEq, Eq)]
pub struct Sector {
    ///Index of this sector on the device
    pub sector_no: SectorId,
    ///Contents of the sector.
    /// A boxed slice, since a sector never changes size once it has been read.
    contents: Box<[u8]>,
}

impl Sector {
    /// Create a new sector, corresponding to sector `sector_no` on disk, having the given `data` slice as its data
    pub fn new(sector_no: SectorId, data: Box<[u8]>) -> Sector {
        Sector {
            sector_no,
            contents: data,
        }
    }

    /// Create an all-zero sector, with contents length of `len`
    pub fn new_zero(sector_no: SectorId, len: u64) -> Sector {
        Sector {
            sector_no,
            contents: vec![0; len as usize].into_boxed_slice(),
        }
    }

    /// Size of the underlying sector data
    pub fn len(&self) -> u64 {
        self.contents.len() as u64
    }

    /// Return a reference to this sector's contents
    pub fn contents_as_ref(&self) -> &[u8] {
        &self.contents
    }

    /// Reads data from this sector into the `data` buffer, starting at the given `offset`.
    /// If the function does not return an error, exactly `data.len()` bytes were read.
    pub fn read_data(&self, data: &mut [u8], offset: u64) -> error_given::Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(APIError::SectorInput(
                "Trying to read beyond the bounds of the sector",
            ));
        }

        let mut c = Cursor::new(&self.contents);
        c.seek(SeekFrom::Start(offset))?;
        c.read_exact(data).map_err(|e| e.into())
    }

    /// Writes data from the given slice into this sector, starting at the given `offset`.
    /// If the function does not return an error, exactly `data.len()` bytes were written.
    pub fn write_data(&mut self, data: &[u8], offset: u64) -> error_given::Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(APIError::SectorInput(
                "Trying to write beyond the bounds of the sector",
            ));
        }

        let mut c = Cursor::new(&mut self.contents[..]);
        c.seek(SeekFrom::Start(offset))?;
        c.write_all(data).map_err(|e| e.into())
    }

    /// Read any object that implements the DeserializeOwned trait from this sector
    pub fn deserialize_from<S>(&self, offset: u64) -> error_given::Result<S>
    where
        S: DeserializeOwned,
    {
        let mut c = Cursor::new(&self.contents);
        c.seek(SeekFrom::Start(offset))?;
        Ok((bincode::deserialize_from(c))?)
    }

    /// Write any object that implements the Serialize trait into this sector
    /// Goes through `write_data`, because `bincode::serialize_into` would happily run past the end of the sector.
    pub fn serialize_into<S>(&mut self, stru: &S, offset: u64) -> error_given::Result<()>
    where
        S: Serialize,
    {
        let stru_bin = bincode::serialize(stru)?;
        self.write_data(&stru_bin, offset)
    }

    /// Read a single word of the given width at `offset`
    pub fn read_word(&self, offset: u64, width: WordSize) -> error_given::Result<u64> {
        if offset + width.bytes() > self.len() {
            return Err(APIError::SectorInput(
                "Trying to read a word beyond the bounds of the sector",
            ));
        }
        match width {
            WordSize::Four => Ok(self.deserialize_from::<u32>(offset)? as u64),
            WordSize::Eight => self.deserialize_from::<u64>(offset),
        }
    }

    /// Write a single word of the given width at `offset`
    /// Fails if `word` does not fit in `width`
    pub fn write_word(&mut self, word: u64, offset: u64, width: WordSize) -> error_given::Result<()> {
        match width {
            WordSize::Four => {
                let narrow = u32::try_from(word)
                    .map_err(|_| APIError::SectorInput("Word does not fit in four bytes"))?;
                self.serialize_into(&narrow, offset)
            }
            WordSize::Eight => self.serialize_into(&word, offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Sector, WordSize};

    #[test]
    fn word_sizes() {
        assert_eq!(WordSize::Four.bytes(), 4);
        assert_eq!(WordSize::Eight.bytes(), 8);
    }

    #[test]
    fn words_are_little_endian() {
        let mut s = Sector::new_zero(3, 16);
        s.write_word(0x0102_0304, 0, WordSize::Four).unwrap();
        s.write_word(0x0a0b, 8, WordSize::Eight).unwrap();
        assert_eq!(
            s.contents_as_ref(),
            &[4, 3, 2, 1, 0, 0, 0, 0, 0x0b, 0x0a, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(s.read_word(0, WordSize::Four).unwrap(), 0x0102_0304);
        assert_eq!(s.read_word(8, WordSize::Eight).unwrap(), 0x0a0b);
    }

    #[test]
    fn word_bounds() {
        let mut s = Sector::new_zero(0, 10);
        assert!(s.write_word(1, 7, WordSize::Four).is_err());
        assert!(s.write_word(1, 3, WordSize::Eight).is_err());
        assert!(s.read_word(8, WordSize::Four).is_err());
        //A value that only fits in eight bytes
        assert!(s.write_word(1 << 40, 0, WordSize::Four).is_err());
        assert!(s.write_word(1 << 40, 0, WordSize::Eight).is_ok());
        //Nothing of the failed writes leaked into the buffer
        assert_eq!(s.read_word(0, WordSize::Eight).unwrap(), 1 << 40);
    }

    #[test]
    fn raw_data() {
        let mut s = Sector::new_zero(0, 4);
        s.write_data(&[9, 8], 2).unwrap();
        let mut out = [0; 3];
        s.read_data(&mut out, 1).unwrap();
        assert_eq!(out, [0, 9, 8]);
        assert!(s.read_data(&mut out, 2).is_err());
        assert!(s.write_data(&out, 2).is_err());
    }
}
