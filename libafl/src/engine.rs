//! The back-references queues and feedbacks hold onto their owning
//! engine. The core never introspects the engine beyond what these
//! traits expose: its id, its RNG, the `fuzz_one` driver (for the
//! new-entry mutator hook), and the broadcast channel (for the
//! new-entry message).

use libafl_bolts::shmem::ShMem;
use serde::{Deserialize, Serialize};

use crate::{corpus::QueueEntry, Error};

/// Identifies one engine instance. Copied into a queue's `engine_id`
/// by `set_engine`, and used by `get_next_in_queue` to distinguish a
/// "native" caller (rotates the cursor) from a foreign peek.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct EngineId(pub i64);

/// The stable, pointer-free header broadcast whenever a new entry is
/// added to a queue, and the layout backing the queue's shared-memory
/// entry-table export. Consumers must treat this as the only contract:
/// the `QueueEntry` itself is never sent across the wire.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntryHeader {
    /// Position of the entry within its owning queue at the time it
    /// was broadcast.
    pub index: usize,
    /// Position of the parent entry, if this entry was produced by
    /// mutating another one.
    pub parent_index: Option<usize>,
    /// Length, in bytes, of the entry's input.
    pub input_len: usize,
}

impl QueueEntryHeader {
    /// Builds a header describing `entry` at the given `index`.
    #[must_use]
    pub fn from_entry<SM: ShMem>(entry: &QueueEntry<SM>, index: usize) -> Self {
        Self {
            index,
            parent_index: entry.parent_index(),
            input_len: entry.input().map_or(0, |i| i.len()),
        }
    }
}

/// A mutator optionally interested in learning about every new queue
/// entry as soon as it is accepted, before it is physically appended.
/// Generic over the same shared-memory backend as the entry it's
/// handed, for the same reason [`QueueEntry`] itself is.
pub trait Mutator<SM: ShMem> {
    /// Called for every stage/mutator pair ahead of `add` appending
    /// `entry`. Implementations that don't care override nothing.
    fn custom_queue_new_entry(&mut self, _entry: &QueueEntry<SM>) {}
}

/// One stage of the `fuzz_one` driver: an ordered set of mutators.
pub trait Stage<SM: ShMem> {
    /// The mutators that make up this stage, in application order.
    fn mutators(&mut self) -> &mut [Box<dyn Mutator<SM>>];
}

/// The engine's single-iteration driver: `add` walks every stage's
/// mutators to give them a look at brand new entries.
pub trait FuzzOneDriver<SM: ShMem> {
    /// The stages that make up one fuzzing iteration.
    fn stages(&mut self) -> &mut [Box<dyn Stage<SM>>];
}

/// The engine's cross-process broadcast client.
pub trait EntryBroadcast {
    /// Sends a `NEW_QUEUE_ENTRY`-tagged message carrying `header`.
    /// Must only be called once `header`'s entry is already visible in
    /// the queue's shared-memory export (see the core's ordering
    /// guarantee).
    fn send_new_entry(&mut self, header: QueueEntryHeader) -> Result<(), Error>;
}

/// What a queue or feedback needs from the engine that owns it.
/// Deliberately minimal: the core treats everything else about the
/// engine as opaque. Generic over the shared-memory backend only
/// because the `fuzz_one` driver eventually hands mutators a
/// [`QueueEntry<SM>`] — the id, RNG, and broadcast client underneath
/// are all backend-independent.
pub trait EngineHandle<SM: ShMem> {
    /// This engine's id.
    fn id(&self) -> EngineId;

    /// Draws a value in `[0, upper_bound)` from the engine's RNG.
    fn rand_below(&mut self, upper_bound: usize) -> usize;

    /// The engine's `fuzz_one` driver, if it has one installed yet.
    fn fuzz_one(&mut self) -> Option<&mut dyn FuzzOneDriver<SM>>;

    /// The engine's broadcast client, if connected.
    fn broadcast(&mut self) -> Option<&mut dyn EntryBroadcast>;
}
