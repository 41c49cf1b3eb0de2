//! Low-level bolts shared by the fuzzer core: shared memory, a small
//! pluggable RNG, and the identifiers used to address fuzzer clients on
//! the broadcast channel.

pub mod error;
pub mod rands;
pub mod shmem;

pub use error::Error;

use core::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one client (fuzzer process) on the broadcast channel.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a shared memory region across processes.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ShMemId(pub String);

impl fmt::Display for ShMemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ShMemId {
    /// Builds an id from a POSIX shm name, e.g. `/libafl_1234_0`.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}
