//! Errors of the file header layer.
//!
//! Only two of these are meant to reach an ordinary caller: [`FileTooLarge`] and [`NoSpace`], the two ways in which a
//! file of a given size cannot be allocated. Broken invariants of the tree (clearing a sector that was never claimed,
//! translating an offset past the end of a file) are programming errors and panic instead.
//!
//! [`FileTooLarge`]: enum.IndexError.html#variant.FileTooLarge
//! [`NoSpace`]: enum.IndexError.html#variant.NoSpace

use ixfs_api::error_given::APIError;
use thiserror::Error;

/// Error type of the file header layer
#[derive(Error, Debug)]
pub enum IndexError {
    /// Error raised by the device underneath, e.g. a sector index past the end of the disk
    #[error("Issue in the device layer")]
    Device(#[from] APIError),
    /// The requested file is larger than the largest file a triple-indirect header can address
    #[error("File of {requested} bytes exceeds the maximum file size of {max} bytes")]
    FileTooLarge {
        /// Requested file size, in bytes
        requested: u64,
        /// Largest supported file size, in bytes
        max: u64,
    },
    /// Not enough free sectors left to hold the file
    #[error("Not enough free sectors: {needed} needed, {available} available")]
    NoSpace {
        /// Number of sectors the allocation needed
        needed: u64,
        /// Number of free sectors at the time of the failed claim
        available: u64,
    },
    /// The sector size and word size do not describe a usable header layout
    #[error("Invalid geometry: {0}")]
    Geometry(&'static str),
    /// A header read from disk does not describe a valid file
    #[error("Corrupt file header: {0}")]
    Corrupt(&'static str),
}

/// Define a generic alias for a `Result` with the error type `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
