//! memlimit: memory-limit guard for archive and decompression readers.
//!
//! Thin facade over `memlimit-guard`; see that crate for the details.

pub use memlimit_guard::*;
