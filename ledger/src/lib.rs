//! The ledger Kinesis load generation tool.
//!
//! This library supports the ledger binary found elsewhere in this project. It
//! loads connection settings, verifies the target stream and pushes batches of
//! synthetic payments into it, timing the whole affair.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod publisher;
pub mod stream;
