//! Error type for the low-level bolts. Kept separate from
//! `libafl::Error` since these crates can be used independently; the
//! fuzzer core wraps this one in its own error type.

use core::fmt;
use std::borrow::Cow;

/// Something went wrong below the fuzzer core: a failed shared-memory
/// acquisition, a malformed id, or similar.
#[derive(Debug)]
pub enum Error {
    /// Acquiring or mapping a shared memory region failed.
    ShMem(Cow<'static, str>),
}

impl Error {
    /// A shared-memory acquisition failure.
    #[must_use]
    pub fn shmem<S: Into<Cow<'static, str>>>(msg: S) -> Self {
        Self::ShMem(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShMem(msg) => write!(f, "shared memory error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
