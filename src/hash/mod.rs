//! Hash function boundary
//!
//! Defines the checksum/content-digest pair the pipeline consumes, the
//! XXH64 + SHA-256 and CRC32 + MD5 implementations, and the lock that serializes
//! content digest calls.

mod signer;

pub use signer::*;
