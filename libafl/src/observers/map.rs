//! The coverage-bitmap observation channel: a fixed-size shared memory
//! region the target writes into and the parent reads back.

use libafl_bolts::shmem::{ShMem, ShMemProvider};

use crate::{observers::ObservationChannel, Error};

/// Default size of a coverage map when nothing more specific is
/// requested. Kept separate from [`crate::corpus::QUEUE_MAP_SIZE`] —
/// the two constants were historically the same `MAP_SIZE` define and
/// are split here on purpose (see the design notes).
pub const DEFAULT_MAP_SIZE: usize = 1 << 16;

/// An [`ObservationChannel`] backed by shared memory, exposing the
/// trace bits directly. The pointer and size are stable across resets
/// and invalidated only when the channel itself is dropped.
pub struct MapObservationChannel<SM: ShMem> {
    shared_map: SM,
}

impl<SM: ShMem> MapObservationChannel<SM> {
    /// Allocates a map channel of `map_size` bytes.
    pub fn new<SP: ShMemProvider<ShMem = SM>>(
        provider: &mut SP,
        map_size: usize,
    ) -> Result<Self, Error> {
        let shared_map = provider.new_map(map_size)?;
        Ok(Self { shared_map })
    }

    /// The raw trace bits. Valid to read for exactly
    /// [`Self::get_map_size`] bytes at any time between a `reset` and
    /// the next one.
    #[must_use]
    pub fn get_trace_bits(&self) -> &[u8] {
        self.shared_map.as_slice()
    }

    /// A mutable view of the trace bits, for the target side of the
    /// fork to write into.
    #[must_use]
    pub fn get_trace_bits_mut(&mut self) -> &mut [u8] {
        self.shared_map.as_slice_mut()
    }

    /// The fixed size this channel was constructed with.
    #[must_use]
    pub fn get_map_size(&self) -> usize {
        self.shared_map.len()
    }
}

impl<SM: ShMem> ObservationChannel for MapObservationChannel<SM> {
    fn reset(&mut self) -> Result<(), Error> {
        self.shared_map.as_slice_mut().fill(0);
        Ok(())
    }

    fn flush(&mut self) {
        self.shared_map.as_slice_mut().fill(0);
    }

    fn post_exec(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use libafl_bolts::shmem::UnixShMemProvider;

    #[test]
    fn map_size_is_stable_across_resets() {
        let mut provider = UnixShMemProvider;
        let mut channel = MapObservationChannel::new(&mut provider, 65536).unwrap();
        assert_eq!(channel.get_map_size(), 65536);
        channel.get_trace_bits_mut().fill(0xAA);
        channel.reset().unwrap();
        assert_eq!(channel.get_map_size(), 65536);
        assert!(channel.get_trace_bits().iter().all(|&b| b == 0));
    }
}
