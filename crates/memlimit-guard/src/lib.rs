#![forbid(unsafe_code)]
//! memlimit-guard: the error archive readers raise when an operation would
//! need more memory than the operator allows.
//!
//! Decompression readers and format parsers compute how much memory a step
//! needs (usually from a size field in the input), compare it against a
//! [`MemoryLimit`], and bail out with a [`MemoryLimitError`] before asking the
//! allocator for it. The error converts into `std::io::Error` so generic I/O
//! handling catches it too.
//!
//! ```
//! use memlimit_guard::{MemoryLimit, MemoryLimitError};
//!
//! let limit = MemoryLimit::from_kb(65_536);
//! let err: MemoryLimitError = limit.check(1_048_576).unwrap_err();
//! assert_eq!(err.memory_needed(), 1_048_576);
//! assert_eq!(err.memory_limit(), 65_536);
//! ```
//!
//! Codecs, format parsing and memory estimation live in the readers, not here.

pub mod alloc;
pub mod error;
pub mod limit;


pub use alloc::{try_alloc_zeroed, try_with_capacity};
pub use error::{BoxedCause, Error, MemoryLimitError, Result};
pub use limit::{kb_from_bytes, MemoryLimit, ENV_MEMORY_LIMIT_KB};
