//! Fallible buffer allocation behind a [`MemoryLimit`].
//!
//! Sizes handed to these functions usually come from a header field, so they
//! are checked against the limit before any memory is requested. If the
//! allocator itself refuses a size that passed the check, that failure is
//! re-signalled as a [`MemoryLimitError`] carrying the allocator error as
//! cause. With no ceiling configured there is no limit to report, so the
//! refusal comes back as [`Error::AllocFailed`] instead.

use crate::error::{BoxedCause, Error, MemoryLimitError, Result};
use crate::limit::{kb_from_bytes, MemoryLimit};

/// Allocate `len_bytes` zeroed bytes, or refuse.
pub fn try_alloc_zeroed(limit: &MemoryLimit, len_bytes: u64) -> Result<Vec<u8>> {
    let (mut buf, len) = reserve(limit, len_bytes)?;
    buf.resize(len, 0u8);
    Ok(buf)
}

/// Empty buffer with at least `cap_bytes` reserved, or a refusal.
pub fn try_with_capacity(limit: &MemoryLimit, cap_bytes: u64) -> Result<Vec<u8>> {
    reserve(limit, cap_bytes).map(|(buf, _)| buf)
}

fn reserve(limit: &MemoryLimit, bytes: u64) -> Result<(Vec<u8>, usize)> {
    limit.check_bytes(bytes)?;

    let len = usize::try_from(bytes).map_err(|e| refused(limit, bytes, Box::new(e)))?;

    let mut buf = Vec::new();
    if let Err(e) = buf.try_reserve_exact(len) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            requested_bytes = bytes,
            memory_limit_kb = limit.kb(),
            "allocator refused reservation within memory limit"
        );
        return Err(refused(limit, bytes, Box::new(e)));
    }
    Ok((buf, len))
}

fn refused(limit: &MemoryLimit, bytes: u64, cause: BoxedCause) -> Error {
    match limit.kb() {
        Some(kb) => MemoryLimitError::with_cause(kb_from_bytes(bytes), kb, cause).into(),
        None => Error::AllocFailed {
            bytes,
            source: cause,
        },
    }
}
