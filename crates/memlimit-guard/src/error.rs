use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Result type local to memlimit-guard.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed lower-level failure carried as the cause of a guard error.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    MemoryLimitExceeded(#[from] MemoryLimitError),

    #[error("allocation of {bytes} bytes failed with no memory limit configured")]
    AllocFailed {
        bytes: u64,
        #[source]
        source: BoxedCause,
    },

    #[error("invalid memory limit: {0}")]
    InvalidLimit(String),
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::MemoryLimitExceeded(guard) => guard.into(),
            e @ Error::AllocFailed { .. } => io::Error::new(io::ErrorKind::OutOfMemory, e),
            Error::InvalidLimit(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, Error::InvalidLimit(msg))
            }
        }
    }
}

/// An operation was refused because it needs more memory than the configured limit.
///
/// Both figures are in kilobytes. `memory_needed` is 64-bit because it usually
/// comes straight from a size field of the input, which may be corrupt or
/// hostile. The message is rendered once, at construction.
///
/// The type trusts its inputs: it does not check that `memory_needed` is
/// actually above `memory_limit`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MemoryLimitError {
    memory_needed: u64,
    memory_limit: u32,
    message: String,
    #[source]
    cause: Option<BoxedCause>,
}

impl MemoryLimitError {
    pub fn new(memory_needed: u64, memory_limit: u32) -> Self {
        Self {
            memory_needed,
            memory_limit,
            message: build_message(memory_needed, memory_limit),
            cause: None,
        }
    }

    /// Build the error around the lower-level failure that triggered it,
    /// e.g. a refused allocation. The cause is kept as-is and exposed through
    /// [`std::error::Error::source`].
    pub fn with_cause(
        memory_needed: u64,
        memory_limit: u32,
        cause: impl Into<BoxedCause>,
    ) -> Self {
        Self {
            cause: Some(cause.into()),
            ..Self::new(memory_needed, memory_limit)
        }
    }

    /// Memory the operation would have needed, in kilobytes.
    pub fn memory_needed(&self) -> u64 {
        self.memory_needed
    }

    /// Configured ceiling, in kilobytes.
    pub fn memory_limit(&self) -> u32 {
        self.memory_limit
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn into_cause(self) -> Option<BoxedCause> {
        self.cause
    }

    /// Find a guard error carried inside an `io::Error`, if any.
    pub fn from_io(err: &io::Error) -> Option<&MemoryLimitError> {
        err.get_ref()?.downcast_ref::<MemoryLimitError>()
    }

    /// Whether `err` is a memory-limit refusal raised through the I/O channel.
    pub fn is_memory_limit(err: &io::Error) -> bool {
        Self::from_io(err).is_some()
    }
}

// The wording is matched on by downstream tooling; keep it stable.
fn build_message(memory_needed: u64, memory_limit: u32) -> String {
    format!(
        "{memory_needed} kb of memory would be needed; limit was {memory_limit} kb. \
         If the file is not corrupt, consider increasing the memory limit."
    )
}

impl From<MemoryLimitError> for io::Error {
    fn from(e: MemoryLimitError) -> Self {
        io::Error::new(io::ErrorKind::OutOfMemory, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("allocator refused {0} bytes")]
    struct Refused(usize);

    #[test]
    fn test_message_format() {
        let e = MemoryLimitError::new(1_048_576, 65_536);
        assert_eq!(
            e.message(),
            "1048576 kb of memory would be needed; limit was 65536 kb. \
             If the file is not corrupt, consider increasing the memory limit."
        );
        assert_eq!(e.to_string(), e.message());
    }

    #[test]
    fn test_degenerate_zero() {
        let e = MemoryLimitError::new(0, 0);
        assert_eq!(
            e.message(),
            "0 kb of memory would be needed; limit was 0 kb. \
             If the file is not corrupt, consider increasing the memory limit."
        );
    }

    #[test]
    fn test_wide_needed_does_not_wrap() {
        let needed = (1u64 << 32) + 7;
        let e = MemoryLimitError::new(needed, 1024);
        assert_eq!(e.memory_needed(), needed);
        assert!(e.message().starts_with("4294967303 kb of memory"));

        let e = MemoryLimitError::new(u64::MAX, u32::MAX);
        assert!(e.message().contains("18446744073709551615 kb"));
        assert!(e.message().contains("limit was 4294967295 kb"));
    }

    #[test]
    fn test_no_cause() {
        let e = MemoryLimitError::new(10, 5);
        assert!(e.cause().is_none());
        assert!(e.source().is_none());
        assert!(e.into_cause().is_none());
    }

    #[test]
    fn test_cause_is_chained_not_summarized() {
        let e = MemoryLimitError::with_cause(10, 5, Refused(10 * 1024));
        let src = e.source().expect("cause should be exposed as source");
        assert_eq!(src.downcast_ref::<Refused>(), Some(&Refused(10 * 1024)));
        assert!(!e.to_string().contains("allocator refused"));
    }

    #[test]
    fn test_crate_error_is_transparent() {
        let guard = MemoryLimitError::with_cause(10, 5, Refused(1));
        let expected = guard.message().to_string();
        let e: Error = guard.into();
        assert_eq!(e.to_string(), expected);
        assert!(e.source().is_some());
        assert!(matches!(e, Error::MemoryLimitExceeded(ref g) if g.memory_limit() == 5));
    }

    #[test]
    fn test_io_bridge() {
        let io_err: io::Error = MemoryLimitError::new(2048, 1024).into();
        assert_eq!(io_err.kind(), io::ErrorKind::OutOfMemory);
        assert!(MemoryLimitError::is_memory_limit(&io_err));
        let guard = MemoryLimitError::from_io(&io_err).expect("downcast");
        assert_eq!(guard.memory_needed(), 2048);

        let plain = io::Error::new(io::ErrorKind::OutOfMemory, "oom");
        assert!(!MemoryLimitError::is_memory_limit(&plain));
        let bare = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert!(MemoryLimitError::from_io(&bare).is_none());
    }

    #[test]
    fn test_invalid_limit_maps_to_invalid_input() {
        let io_err: io::Error = Error::InvalidLimit("abc".into()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_alloc_failed_is_out_of_memory_but_not_a_guard() {
        let e = Error::AllocFailed {
            bytes: 1 << 40,
            source: Box::new(Refused(1)),
        };
        assert!(e.source().is_some());
        let io_err: io::Error = e.into();
        assert_eq!(io_err.kind(), io::ErrorKind::OutOfMemory);
        assert!(!MemoryLimitError::is_memory_limit(&io_err));
    }
}
