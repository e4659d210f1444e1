//! The errors of the device layer.
//!
//! Every fallible operation on a [`Device`](../controller/struct.Device.html) or a
//! [`Sector`](../types/struct.Sector.html) returns one of the variants below.
//! Upper layers embed this type in their own error enum with a `#[from]` variant, so the `?` operator
//! carries device errors upwards without any explicit mapping:
//! ```ignore
//! #[error("Issue in the device layer")]
//! Device(#[from] error_given::APIError),
//! ```
//!
//! The [`thiserror`](https://docs.rs/thiserror/1.0.21/thiserror/) package derives the `Display` and
//! `Error` implementations from the `#[error]` tags.

use std::io;
use thiserror::Error;

/// Error type of the device layer
/// The `#[from]` tag generates a `From` implementation, allowing conversion from `io::Error`s to `APIO`-errors when using the `?` operator, as you can see in the code of e.g. [`controller.rs`](../controller/index.html)
#[derive(Error, Debug)]
pub enum APIError {
    /// Error caused when performing IO in the API
    #[error("Issue using IO in the controller layer")]
    APIO(#[from] io::Error),
    /// Error caused when (de)serializing a value into a sector
    #[error("Issue with serialization in the controller layer")]
    APISerialize(#[from] bincode::Error),
    /// Invalid input to the controller layer
    #[error("Invalid controller input: {0}")]
    ControllerInput(&'static str),
    /// Invalid input to a sector buffer
    #[error("Invalid sector input: {0}")]
    SectorInput(&'static str),
    /// Catch-all for client code that drafts quickly with `anyhow!`; not produced by this crate itself
    #[error(transparent)]
    Other(#[from] anyhow::Error), // source and Display delegate to anyhow::Error
}

/// Define a generic alias for a `Result` with the error type `APIError`.
pub type Result<T> = std::result::Result<T, APIError>;
