//! Pipeline stages
//!
//! `SingleHash -> MultiHash -> Combine` together turn a list of integers into
//! one combined signature.

mod combine;
mod multi_hash;
mod single_hash;

pub use combine::*;
pub use multi_hash::*;
pub use single_hash::*;
