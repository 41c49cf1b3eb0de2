//! The raw test case bytes a [`crate::corpus::QueueEntry`] wraps.

use serde::{Deserialize, Serialize};

/// An opaque, immutable-after-construction byte buffer representing a
/// test case. `RawInput` never exposes a setter: once built, the bytes
/// inside a queue entry never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    bytes: Vec<u8>,
}

impl RawInput {
    /// Constructs a raw input from its bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrows the input's bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The number of bytes in the input.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` if the input is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&[u8]> for RawInput {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl From<Vec<u8>> for RawInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_matches_bytes() {
        let input = RawInput::new(vec![1, 2, 3]);
        assert_eq!(input.len(), 3);
        assert_eq!(input.bytes(), &[1, 2, 3]);
    }

    #[test]
    fn empty_input() {
        let input = RawInput::new(Vec::new());
        assert!(input.is_empty());
    }
}
