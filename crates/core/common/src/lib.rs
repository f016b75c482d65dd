//! Common building blocks for gateway monitor files
//!
//! Widths, alignment arithmetic and the fixed-width string codec shared by
//! every structure that lives inside a memory-mapped monitor file.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod bits;
pub mod fixed_str;

pub use bits::*;
pub use fixed_str::{Encoded, FixedStrError};
