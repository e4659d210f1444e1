//! Collaborators of the indexed file header
//!
//! This crate contains the services the file header layer relies on, but does not implement itself:
//! a raw sector device, the contract of a free-sector allocator, and some basic types.
//! The file header itself lives in the solution crate.
//!
//! Placing the modules here ensures that Cargo notices them as part of the build process.

#![deny(missing_docs)]

//Implementation of the controller layer
pub mod controller;
pub mod error_given;

//Basic modules for types
pub mod types;

//Traits the upper layer talks to
pub mod fs;
