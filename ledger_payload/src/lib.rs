//! The ledger payloads
//!
//! This library supports payment record generation for the ledger load
//! tool. Nothing here performs I/O against the stream, callers take the
//! batches produced and ship them wherever they like.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

use std::io::{self, Write};

use rand::Rng;

pub mod batch;
pub mod payment;

pub use batch::{Batch, Record};
pub use payment::{Entry, EntryKind, Payment, Payments};

/// Errors related to serialization
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Json payload could not be encoded
    #[error("Json payload could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
    /// IO operation failed
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    /// Requested batch size is outside of what a single put accepts
    #[error("Batch size must be between 1 and {maximum} records, got {requested}")]
    BatchSize {
        /// The number of records requested
        requested: usize,
        /// The largest number of records a batch may hold
        maximum: usize,
    },
}

/// To serialize a single record into bytes
pub trait Serialize {
    /// Write exactly one record into `writer`.
    ///
    /// # Errors
    ///
    /// Implementations are serializing data in some way. The errors that
    /// result come from serialization crackups or a failing writer.
    fn to_bytes<W, R>(&self, rng: &mut R, writer: &mut W) -> Result<(), Error>
    where
        R: Rng + ?Sized,
        W: Write;
}

/// Generate instances of `Self::Output` from source of randomness.
pub trait Generator<'a> {
    /// The type produced by this generator
    type Output: 'a;
    /// The error produced when generation fails
    type Error: 'a;

    /// Generate a new instance of `Self::Output`.
    ///
    /// # Errors
    ///
    /// Implementations signal an error if an instance cannot be built.
    fn generate<R>(&'a self, rng: &mut R) -> Result<Self::Output, Self::Error>
    where
        R: Rng + ?Sized;
}
