#![allow(dead_code)]

//Some more general testing utilities
use crate::free_map::PersistentBitmap;
use ixfs_api::controller::Device;
use ixfs_api::fs::FreeMap;
use ixfs_api::types::SectorId;
use std::fs::{create_dir_all, remove_dir, remove_file};
use std::path::{Path, PathBuf};

//Create the necessary folders 'name' leading up to 'img_name', starting from the crate root
//Additionally, remove 'img_name' if it already exists in the file system, to make sure we can start from a fresh disk
pub fn disk_prep_path(name: &str, img_name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push(name);
    path.push(img_name);

    if path.exists() {
        //Remove the file in case it already exists
        remove_file(&path).unwrap();
    }
    {
        //Create any missing directories first, if applicable
        let prefix = path.parent().unwrap();
        create_dir_all(prefix).unwrap();
    }

    path
}

//Undo folder creation, including removing the parent
pub fn disk_unprep_path(path: &Path) {
    //Ensure that the file has been deleted before going on
    remove_file(path).unwrap();

    let parent = path.parent().unwrap();
    remove_dir(parent).unwrap(); //Safety; only remove if empty
}

//Create a fresh device
pub fn disk_setup(path: &Path, sector_size: u64, nsectors: u64) -> Device {
    Device::new(path, sector_size, nsectors).unwrap()
}

//Open an existing device
pub fn disk_open(path: &Path, sector_size: u64, nsectors: u64) -> Device {
    Device::load(path, sector_size, nsectors).unwrap()
}

//Destruct the given device and remove the parent directory that is was located in
pub fn disk_destruct(dev: Device) {
    let path = dev.device_path().to_owned();
    drop(dev); //Avoid the device holding a lock over this file
    disk_unprep_path(&path);
}

//A free map of `nsectors` sectors with the sectors in `reserved` already in use
pub fn map_with(nsectors: u64, reserved: &[SectorId]) -> PersistentBitmap {
    let mut map = PersistentBitmap::new(nsectors);
    for &s in reserved {
        map.mark(s);
    }
    map
}

//All sectors currently marked as used
pub fn used_sectors(map: &PersistentBitmap) -> Vec<SectorId> {
    (0..map.num_sectors()).filter(|&s| map.test(s)).collect()
}
