//! Implementation of a physical disk and a very simple sector controller for it.
//! The disk and its contents are represented by an image file that is memory mapped and stored in a `Device` struct.
//! When initializing the controller, you have to provide it with either a path to a non-existing file, which will then be created and used as the contents of the disk, or to an existing file, the size of which will be checked.
//! Provides sector-granular reads and writes, exposed through the [`SectorDevice`](../fs/trait.SectorDevice.html) trait.
//!
//! No provisions have been made to lock the image file, so do not fiddle with it while a device is open on it.

use super::error_given;
use super::error_given::APIError;
use super::fs::SectorDevice;
use super::types::{Sector, SectorId};
use memmap::MmapMut;
use std::{
    fs::{remove_file, OpenOptions},
    path::{Path, PathBuf},
};

/// State of a disk whose sectors can be read and written.
/// Every transfer moves exactly one sector, as a [`Sector`](../types/struct.Sector.html).
#[derive(Debug)]
pub struct Device {
    /// Size of the sectors that this disk reads and writes
    pub sector_size: u64,
    /// Total number of sectors this disk consists of
    pub nsectors: u64,
    /// Path to the image file that emulates the disk
    path: PathBuf,
    /// Memory-mapped contents of the above file. This is what is manipulated in the read and write functions.
    contents: MmapMut,
}

/// Small enum, used to specify whether we expect to open an existing image
#[derive(PartialEq, Eq, Copy, Clone)]
pub enum DiskState {
    /// Creating a new disk image
    New,
    /// Loading an old disk image
    Load,
}

use self::DiskState::*;
impl DiskState {
    /// Convert a boolean to a `DiskState`
    pub fn new(ex: bool) -> DiskState {
        match ex {
            true => Load,
            false => New,
        }
    }
}

impl Drop for Device {
    /// Persist all writes before the device goes away, as long as its image still exists
    fn drop(&mut self) {
        if self.path.exists() {
            self.contents.flush().unwrap();
        }
    }
}

impl Device {
    /// Core function that handles both `new` and `load`, based on the value of the switch `ds`
    pub fn create_device<P: AsRef<Path>>(
        path: P,
        sector_size: u64,
        nsectors: u64,
        ds: DiskState,
    ) -> error_given::Result<Device> {
        if sector_size == 0 {
            return Err(APIError::ControllerInput("Sector size must be positive"));
        }
        let path_buf = path.as_ref().to_path_buf();
        let mmapf = mmap_path(path, sector_size * nsectors, ds)?;
        Ok(Device {
            sector_size,
            nsectors,
            path: path_buf,
            contents: mmapf,
        })
    }

    /// Create a *new* disk device, given:
    /// - A `path` to store its image
    /// - A `sector_size` to define the size of each unit to be read or written, in bytes
    /// - The total number of sectors on the disk
    /// This new device will have contents 0 at each address.
    /// This function will return an error, if the file represented by `path` already exists.
    pub fn new<P: AsRef<Path>>(
        path: P,
        sector_size: u64,
        nsectors: u64,
    ) -> error_given::Result<Device> {
        Device::create_device(path, sector_size, nsectors, New)
    }

    /// Load an *existing* disk device, given its `sector_size` and number of sectors.
    /// This function will return an error, if the file represented by `path` does not yet exist or has the wrong size.
    pub fn load<P: AsRef<Path>>(
        path: P,
        sector_size: u64,
        nsectors: u64,
    ) -> error_given::Result<Device> {
        Device::create_device(path, sector_size, nsectors, Load)
    }

    /// End the lifetime of this disk, and remove the file backing it
    /// Panics if removing the file fails
    pub fn destruct(self) {
        remove_file(&self.path).unwrap();
    }

    /// Size of this device in bytes
    pub fn device_size(&self) -> u64 {
        self.sector_size * self.nsectors
    }

    /// Path of the file backing this device
    pub fn device_path(&self) -> &Path {
        &self.path
    }

    fn index_to_addr(&self, index: SectorId) -> error_given::Result<u64> {
        if index >= self.nsectors {
            return Err(APIError::ControllerInput(
                "Sector index past the end of the device",
            ));
        }
        Ok(self.sector_size * index)
    }
}

impl SectorDevice for Device {
    fn sector_size(&self) -> u64 {
        self.sector_size
    }

    fn num_sectors(&self) -> u64 {
        self.nsectors
    }

    fn read_sector(&self, id: SectorId) -> error_given::Result<Sector> {
        let start = self.index_to_addr(id)? as usize;
        let end = start + self.sector_size as usize;
        Ok(Sector::new(id, self.contents[start..end].into()))
    }

    fn write_sector(&mut self, s: &Sector) -> error_given::Result<()> {
        if s.len() != self.sector_size {
            return Err(APIError::ControllerInput(
                "Trying to write a non-sector-sized sector",
            ));
        }
        let start = self.index_to_addr(s.sector_no)? as usize;
        let end = start + self.sector_size as usize;
        self.contents[start..end].copy_from_slice(s.contents_as_ref());
        Ok(())
    }
}

/// Either open or create the specified file path.
/// If the path already exists, check that the image has the correct size
fn mmap_path<P: AsRef<Path>>(path: P, dsize: u64, ex: DiskState) -> error_given::Result<MmapMut> {
    let exists = DiskState::new(path.as_ref().exists());
    if exists != ex {
        if ex == Load {
            return Err(APIError::ControllerInput(
                "Tried to load a non-existing file path",
            ));
        } else {
            return Err(APIError::ControllerInput(
                "Tried to create a pre-existing file path",
            ));
        }
    }

    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    if ex == Load {
        if f.metadata()?.len() != dsize {
            return Err(APIError::ControllerInput(
                "Device size does not match provided size",
            ));
        }
    } else {
        f.set_len(dsize)?; // zero-filled
    }

    let data = unsafe { memmap::MmapOptions::new().map_mut(&f)? };
    Ok(data)
}

// Rust runs tests in parallel by default, so every test below is backed by its own image directory.
#[cfg(test)]
mod tests {

    use super::Device;
    use crate::fs::SectorDevice;
    use crate::types::Sector;
    use std::fs::{create_dir_all, remove_dir, remove_file};
    use std::path::{Path, PathBuf};

    // A toy disk with 10 sectors of 10 bytes each
    static SECTOR_SIZE: u64 = 10;
    static NSECTORS: u64 = 10;

    //Path to the image of the test called `name`, with any missing directories created and any stale image removed
    fn disk_prep_path(name: &str) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("fs-images-controller-".to_string() + name);
        path.push("img");

        if path.exists() {
            remove_file(&path).unwrap();
        }
        {
            let prefix = path.parent().unwrap();
            create_dir_all(prefix).unwrap();
        }

        path
    }

    fn disk_setup(path: &Path) -> Device {
        Device::new(path, SECTOR_SIZE, NSECTORS).unwrap()
    }

    fn disk_open(path: &Path) -> Device {
        Device::load(path, SECTOR_SIZE, NSECTORS).unwrap()
    }

    //Destruct the given device and remove the parent directory that is was located in
    fn disk_destruct(dev: Device) {
        let path = dev.path.to_owned();
        dev.destruct();
        remove_dir(path.parent().unwrap()).unwrap(); //Will only delete an empty directory
    }

    #[test]
    fn create_disk_test() {
        let path = disk_prep_path("create");
        let mut dev = disk_setup(&path);
        assert_eq!(dev.sector_size(), SECTOR_SIZE);
        assert_eq!(dev.num_sectors(), NSECTORS);

        //Fresh sectors are zero
        let zero_sector = |i| Sector::new_zero(i, SECTOR_SIZE);
        assert_eq!(dev.read_sector(3).unwrap(), zero_sector(3));
        assert_eq!(dev.read_sector(9).unwrap(), zero_sector(9));

        //Sector 10 does not exist
        assert!(dev.read_sector(NSECTORS).is_err());
        assert!(dev.write_sector(&zero_sector(NSECTORS)).is_err());

        //Sectors of the wrong size
        assert!(dev.write_sector(&Sector::new_zero(3, SECTOR_SIZE + 1)).is_err());
        assert!(dev.write_sector(&Sector::new_zero(3, SECTOR_SIZE - 1)).is_err());

        //Do we read what we wrote, and only there?
        let sw = Sector::new(3, (0..10).collect());
        dev.write_sector(&sw).unwrap();
        assert_eq!(dev.read_sector(3).unwrap(), sw);
        assert_eq!(dev.read_sector(2).unwrap(), zero_sector(2));
        assert_eq!(dev.read_sector(4).unwrap(), zero_sector(4));

        disk_destruct(dev);
        assert!(!path.exists());
    }

    #[test]
    fn load_existing_disk_test() {
        let path = disk_prep_path("load");
        let mut dev = disk_setup(&path);

        let sw1 = Sector::new(0, (0..10).collect());
        let sw2 = Sector::new(8, (0..10).rev().collect());
        dev.write_sector(&sw1).unwrap();
        dev.write_sector(&sw2).unwrap();
        drop(dev);

        //Wrong geometry, or creating over an existing image
        assert!(Device::load(&path, SECTOR_SIZE, NSECTORS + 1).is_err());
        assert!(Device::new(&path, SECTOR_SIZE, NSECTORS).is_err());

        let dev = disk_open(&path);
        assert_eq!(dev.read_sector(0).unwrap(), sw1);
        assert_eq!(dev.read_sector(8).unwrap(), sw2);

        disk_destruct(dev);
        assert!(!path.exists());
    }
}
