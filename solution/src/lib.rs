//! Multi-level indexed file headers
//!
//! # This crate
//!
//! A file header maps the byte range of a file to the sectors of a device, much like a UNIX inode with direct and
//! indirect blocks. The header itself fits in a single sector; files too large for its pointer table get one, two or
//! three levels of index sectors in between.
//!
//! The modules, bottom-up:
//!
//! 1. [`geometry`](geometry/index.html): the constants of the layout, all derived from the sector size and the width
//!    of a pointer, and the choice of indirection level for a given file length.
//! 2. [`free_map`](free_map/index.html): a persistent bitmap of free sectors, which is where every sector of a header
//!    tree comes from.
//! 3. [`index_block`](index_block/index.html): one recursive level of indirection.
//! 4. [`indexed_node`](indexed_node/index.html): the header proper, which is the root of the tree and the only part
//!    that knows the file length.
//!
//! The device and the free-map contract come from the `ixfs_api` crate.
//!
//! The library logs through the [`log`](https://docs.rs/log) facade and installs no logger itself.

// This line forces you to write documentation for all important things.
#![deny(missing_docs)]

pub mod error_fs;
pub mod free_map;
pub mod geometry;
pub mod index_block;
pub mod indexed_node;

pub use error_fs::{IndexError, Result};
pub use free_map::PersistentBitmap;
pub use geometry::{Geometry, Level, DEFAULT_GEOMETRY};
pub use index_block::IndexBlock;
pub use indexed_node::IndexedNode;
