//! The two services the file header layer is built on top of.
//! Neither is implemented by the file header itself; it only talks to them through these traits, so that
//! tests and callers can swap in whichever device or allocator they like.

use super::{
    error_given,
    types::{Sector, SectorId},
};

/// A device that reads and writes fixed-size sectors.
/// Both transfers move exactly one sector's worth of bytes and block until done.
pub trait SectorDevice {
    /// Size of every sector on this device, in bytes
    fn sector_size(&self) -> u64;

    /// Total number of sectors on this device
    fn num_sectors(&self) -> u64;

    /// Read the sector with index `id`.
    /// Fails if `id` lies past the end of the device.
    fn read_sector(&self, id: SectorId) -> error_given::Result<Sector>;

    /// Write `s` to the sector with index `s.sector_no`.
    /// Fails if `s` is not exactly sector-sized, or if its index lies past the end of the device.
    fn write_sector(&mut self, s: &Sector) -> error_given::Result<()>;
}

/// Bookkeeping of which sectors on a device are in use.
///
/// The file header layer always checks `num_clear` before it starts claiming sectors, so running out halfway through
/// is the exception rather than the rule; it is nevertheless reported as `None` rather than as a crash.
pub trait FreeMap {
    /// Total number of sectors tracked by this map
    fn num_sectors(&self) -> u64;

    /// Claim a free sector, mark it as used and return it.
    /// Returns `None` if every sector is in use.
    fn find_and_set(&mut self) -> Option<SectorId>;

    /// Is sector `id` currently marked as used?
    fn test(&self, id: SectorId) -> bool;

    /// Mark sector `id` as used.
    fn mark(&mut self, id: SectorId);

    /// Mark sector `id` as free again.
    fn clear(&mut self, id: SectorId);

    /// Number of sectors that are currently free
    fn num_clear(&self) -> u64;
}
