//! Configured memory ceiling and the check readers run before allocating.
//!
//! Readers must call [`MemoryLimit::check`] (or `check_bytes`) with the size
//! they are about to allocate *before* asking the allocator for it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, MemoryLimitError, Result};

/// Environment variable read by [`MemoryLimit::from_env`].
pub const ENV_MEMORY_LIMIT_KB: &str = "MEMLIMIT_KB";

/// Round a byte count up to whole kilobytes.
pub fn kb_from_bytes(bytes: u64) -> u64 {
    bytes / 1024 + u64::from(bytes % 1024 != 0)
}

/// Memory ceiling for a single guarded operation, in kilobytes.
///
/// Every finite value, including `u32::MAX` kb, is a real ceiling. "No
/// ceiling" is a separate state, serialized as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryLimit {
    kb: Option<u32>,
}

impl MemoryLimit {
    /// No ceiling; `check` always passes.
    pub const UNLIMITED: MemoryLimit = MemoryLimit { kb: None };

    pub const fn from_kb(kb: u32) -> Self {
        Self { kb: Some(kb) }
    }

    /// Saturates at the largest finite ceiling, `u32::MAX` kb.
    pub const fn from_mb(mb: u32) -> Self {
        Self {
            kb: Some(mb.saturating_mul(1024)),
        }
    }

    /// The ceiling in kilobytes, `None` when unlimited.
    pub fn kb(&self) -> Option<u32> {
        self.kb
    }

    pub fn is_unlimited(&self) -> bool {
        self.kb.is_none()
    }

    /// Refuse `needed_kb` if it is above the ceiling.
    pub fn check(&self, needed_kb: u64) -> std::result::Result<(), MemoryLimitError> {
        let Some(limit_kb) = self.kb else {
            return Ok(());
        };
        if needed_kb <= u64::from(limit_kb) {
            return Ok(());
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            memory_needed_kb = needed_kb,
            memory_limit_kb = limit_kb,
            "memory limit exceeded"
        );
        Err(MemoryLimitError::new(needed_kb, limit_kb))
    }

    /// Same as [`check`](Self::check) for a byte count, rounded up to kilobytes.
    pub fn check_bytes(&self, needed_bytes: u64) -> std::result::Result<(), MemoryLimitError> {
        self.check(kb_from_bytes(needed_bytes))
    }

    /// Parse a limit string.
    ///
    /// Accepted: a plain kilobyte count (`"65536"`), a count with a binary
    /// suffix (`"512K"`, `"64M"`, `"64MB"`, `"1G"`, `"1GB"`), or `"unlimited"`.
    /// Case-insensitive; surrounding whitespace is ignored. The number is
    /// plain ASCII digits: no sign, no separators.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidLimit("empty memory limit".into()));
        }
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::UNLIMITED);
        }

        let upper = s.to_ascii_uppercase();
        let (num_str, multiplier): (&str, u64) = if upper.ends_with("GB") {
            (&s[..s.len() - 2], 1024 * 1024)
        } else if upper.ends_with('G') {
            (&s[..s.len() - 1], 1024 * 1024)
        } else if upper.ends_with("MB") {
            (&s[..s.len() - 2], 1024)
        } else if upper.ends_with('M') {
            (&s[..s.len() - 1], 1024)
        } else if upper.ends_with("KB") {
            (&s[..s.len() - 2], 1)
        } else if upper.ends_with('K') {
            (&s[..s.len() - 1], 1)
        } else {
            // Bare number is already kilobytes.
            (s, 1)
        };

        let num_str = num_str.trim();
        let invalid = || {
            Error::InvalidLimit(format!(
                "'{s}': expected a kilobyte count or a number followed by K, M or G"
            ))
        };
        if num_str.is_empty() || !num_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u64 = num_str.parse().map_err(|_| invalid())?;

        let kb = value
            .checked_mul(multiplier)
            .and_then(|kb| u32::try_from(kb).ok())
            .ok_or_else(|| Error::InvalidLimit(format!("'{s}' does not fit in {} kb", u32::MAX)))?;

        Ok(Self::from_kb(kb))
    }

    /// Read the limit from `MEMLIMIT_KB`.
    ///
    /// Returns `Ok(None)` when the variable is unset; a set but malformed value
    /// is an error rather than being silently ignored.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(ENV_MEMORY_LIMIT_KB) {
            Ok(s) => Self::parse(&s).map(Some),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(Error::InvalidLimit(format!("{ENV_MEMORY_LIMIT_KB}: {e}"))),
        }
    }

    pub fn from_env_or(default: MemoryLimit) -> Result<Self> {
        Ok(Self::from_env()?.unwrap_or(default))
    }
}

impl Default for MemoryLimit {
    fn default() -> Self {
        Self::UNLIMITED
    }
}

impl FromStr for MemoryLimit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kb {
            Some(kb) => write!(f, "{kb} kb"),
            None => write!(f, "unlimited"),
        }
    }
}
