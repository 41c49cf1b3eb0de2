//! The unnamed, round-robin corpus queue every other queue shape in
//! this crate composes.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use libafl_bolts::shmem::{ShMem, ShMemProvider};

use crate::{
    corpus::entry::{EntryHandle, QueueEntry},
    engine::{EngineHandle, EngineId, QueueEntryHeader},
    Error,
};

/// Size, in bytes, of the queue's exported entry-table shared memory
/// region. Deliberately a constant distinct from any coverage map's
/// size (see the observation channel module) — the original C source
/// shared one `MAP_SIZE` constant for both, which this core avoids.
pub const QUEUE_MAP_SIZE: usize = 1 << 16;

/// On-the-wire width of one [`QueueEntryHeader`] inside the shared
/// entry table: index (8) + has-parent flag (1) + parent index (8) +
/// input length (8).
const HEADER_WIDTH: usize = 25;

fn encode_header(header: QueueEntryHeader, out: &mut [u8]) {
    out[0..8].copy_from_slice(&(header.index as u64).to_le_bytes());
    match header.parent_index {
        Some(p) => {
            out[8] = 1;
            out[9..17].copy_from_slice(&(p as u64).to_le_bytes());
        }
        None => {
            out[8] = 0;
            out[9..17].fill(0);
        }
    }
    out[17..25].copy_from_slice(&(header.input_len as u64).to_le_bytes());
}

/// Decodes a [`QueueEntryHeader`] previously written by
/// [`encode_header`] — exposed for peers reading the shared table.
#[must_use]
pub fn decode_header(bytes: &[u8]) -> QueueEntryHeader {
    let index = u64::from_le_bytes(bytes[0..8].try_into().unwrap()) as usize;
    let parent_index = if bytes[8] == 1 {
        Some(u64::from_le_bytes(bytes[9..17].try_into().unwrap()) as usize)
    } else {
        None
    };
    let input_len = u64::from_le_bytes(bytes[17..25].try_into().unwrap()) as usize;
    QueueEntryHeader {
        index,
        parent_index,
        input_len,
    }
}

/// An ordered sequence of entries with round-robin rotation, bound to
/// an engine, and mirrored into shared memory for cross-process peers.
pub struct BaseQueue<SM: ShMem> {
    entries: Vec<EntryHandle<SM>>,
    current: usize,
    dirpath: String,
    save_to_files: bool,
    names_id: usize,
    engine_id: EngineId,
    engine: Option<Rc<RefCell<dyn EngineHandle<SM>>>>,
    shared_mem: SM,
    self_ref: Weak<RefCell<BaseQueue<SM>>>,
}

impl<SM: ShMem> BaseQueue<SM> {
    /// Builds a new, empty queue, allocating its shared-memory entry
    /// table. The only failure mode is the shared-memory acquisition
    /// itself (`Error::Alloc`); callers must not use the queue if this
    /// returns an error.
    pub fn init<SP: ShMemProvider<ShMem = SM>>(
        provider: &mut SP,
    ) -> Result<Rc<RefCell<Self>>, Error> {
        let shared_mem = provider.new_map(QUEUE_MAP_SIZE)?;
        Ok(Rc::new_cyclic(|self_ref| {
            RefCell::new(Self {
                entries: Vec::new(),
                current: 0,
                dirpath: String::new(),
                save_to_files: false,
                names_id: 0,
                engine_id: EngineId::default(),
                engine: None,
                shared_mem,
                self_ref: self_ref.clone(),
            })
        }))
    }

    /// Rejects entries with no input (a warning, not an error);
    /// otherwise runs the `custom_queue_new_entry` hook of every
    /// mutator in every stage of the bound engine's `fuzz_one` driver,
    /// appends the entry, mirrors its header into shared memory, and
    /// finally broadcasts a `NEW_QUEUE_ENTRY` message — strictly after
    /// the shared-memory write, so a peer woken by the message already
    /// sees the entry if it reads the table.
    pub fn add(queue: &Rc<RefCell<Self>>, entry: EntryHandle<SM>) {
        if entry.borrow().input().is_none() {
            log::warn!("queue entry with no input, dropping add()");
            return;
        }

        {
            let engine = queue.borrow().engine.clone();
            if let Some(engine) = engine {
                let mut engine = engine.borrow_mut();
                if let Some(fuzz_one) = engine.fuzz_one() {
                    for stage in fuzz_one.stages() {
                        for mutator in stage.mutators() {
                            mutator.custom_queue_new_entry(&entry.borrow());
                        }
                    }
                }
            }
        }

        let header = {
            let mut this = queue.borrow_mut();
            let index = this.entries.len();
            entry.borrow_mut().set_queue(this.self_ref.clone());
            if let Some(prev) = this.entries.last() {
                QueueEntry::link_after(&entry, prev);
            }
            this.entries.push(Rc::clone(&entry));
            let header = QueueEntryHeader::from_entry(&entry.borrow(), index);
            let offset = index * HEADER_WIDTH;
            if offset + HEADER_WIDTH <= this.shared_mem.len() {
                encode_header(header, &mut this.shared_mem.as_slice_mut()[offset..offset + HEADER_WIDTH]);
            }
            header
        };

        let engine = queue.borrow().engine.clone();
        if let Some(engine) = engine {
            if let Some(broadcast) = engine.borrow_mut().broadcast() {
                // Best-effort: a failed broadcast doesn't unwind the add.
                let _ = broadcast.send_new_entry(header);
            }
        }
    }

    /// The first entry in the queue, in insertion order.
    #[must_use]
    pub fn get_queue_base(&self) -> Option<EntryHandle<SM>> {
        self.entries.first().cloned()
    }

    /// The number of entries currently in the queue.
    #[must_use]
    pub fn get_size(&self) -> usize {
        self.entries.len()
    }

    /// The queue's on-disk corpus directory, or `""` if unset.
    #[must_use]
    pub fn get_dirpath(&self) -> &str {
        &self.dirpath
    }

    /// The monotonically increasing counter used to mint per-entry
    /// filenames.
    #[must_use]
    pub fn get_names_id(&self) -> usize {
        self.names_id
    }

    /// Mints the next on-disk name id.
    pub fn next_names_id(&mut self) -> usize {
        let id = self.names_id;
        self.names_id += 1;
        id
    }

    /// Whether entries should be persisted to `dirpath`.
    #[must_use]
    pub fn get_save_to_files(&self) -> bool {
        self.save_to_files
    }

    /// Sets the corpus directory. `None` unsets it (stored as `""`);
    /// `save_to_files` tracks whether the resulting path is non-empty.
    pub fn set_directory(&mut self, path: Option<String>) {
        self.dirpath = path.unwrap_or_default();
        self.save_to_files = !self.dirpath.is_empty();
    }

    /// Binds the owning engine and copies its id.
    pub fn set_engine(&mut self, engine: Option<Rc<RefCell<dyn EngineHandle<SM>>>>) {
        if let Some(engine) = &engine {
            self.engine_id = engine.borrow().id();
        }
        self.engine = engine;
    }

    /// The engine id this queue is currently bound to.
    #[must_use]
    pub fn engine_id(&self) -> EngineId {
        self.engine_id
    }

    /// The bound engine itself, if any.
    #[must_use]
    pub fn engine_handle(&self) -> Option<Rc<RefCell<dyn EngineHandle<SM>>>> {
        self.engine.clone()
    }

    /// Returns the entry at the round-robin cursor. A foreign
    /// `engine_id` (one that doesn't match the queue's bound engine)
    /// may peek without consuming rotation; the queue's own engine
    /// advances the cursor with wrap-around.
    pub fn get_next_in_queue(&mut self, engine_id: EngineId) -> Option<EntryHandle<SM>> {
        if self.entries.is_empty() {
            return None;
        }
        let current = self.entries[self.current].clone();
        if engine_id != self.engine_id {
            return Some(current);
        }
        self.current = (self.current + 1) % self.entries.len();
        Some(current)
    }

    /// Reads back a header from the queue's shared-memory export, for
    /// peers or tests that want to confirm round-trip behaviour.
    #[must_use]
    pub fn read_exported_header(&self, index: usize) -> Option<QueueEntryHeader> {
        let offset = index * HEADER_WIDTH;
        if offset + HEADER_WIDTH > self.shared_mem.len() {
            return None;
        }
        Some(decode_header(&self.shared_mem.as_slice()[offset..offset + HEADER_WIDTH]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::RawInput;
    use libafl_bolts::shmem::{UnixShMem, UnixShMemProvider};

    fn entry(bytes: &[u8]) -> EntryHandle<UnixShMem> {
        QueueEntry::new(RawInput::new(bytes.to_vec()))
    }

    #[test]
    fn enqueue_and_rotate() {
        let mut provider = UnixShMemProvider;
        let queue = BaseQueue::init(&mut provider).unwrap();
        queue.borrow_mut().engine_id = EngineId(7);

        BaseQueue::add(&queue, entry(b"a"));
        BaseQueue::add(&queue, entry(b"b"));
        BaseQueue::add(&queue, entry(b"c"));

        let mut seen = Vec::new();
        for _ in 0..4 {
            let e = queue.borrow_mut().get_next_in_queue(EngineId(7)).unwrap();
            seen.push(e.borrow().input().unwrap().bytes().to_vec());
        }
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn foreign_engine_peeks_without_consuming() {
        let mut provider = UnixShMemProvider;
        let queue = BaseQueue::init(&mut provider).unwrap();
        queue.borrow_mut().engine_id = EngineId(7);
        BaseQueue::add(&queue, entry(b"a"));
        BaseQueue::add(&queue, entry(b"b"));
        BaseQueue::add(&queue, entry(b"c"));

        for _ in 0..2 {
            let e = queue.borrow_mut().get_next_in_queue(EngineId(99)).unwrap();
            assert_eq!(e.borrow().input().unwrap().bytes(), b"a");
        }
        let e = queue.borrow_mut().get_next_in_queue(EngineId(7)).unwrap();
        assert_eq!(e.borrow().input().unwrap().bytes(), b"a");
        let e = queue.borrow_mut().get_next_in_queue(EngineId(7)).unwrap();
        assert_eq!(e.borrow().input().unwrap().bytes(), b"b");
    }

    #[test]
    fn empty_queue_returns_none() {
        let mut provider = UnixShMemProvider;
        let queue = BaseQueue::init(&mut provider).unwrap();
        assert!(queue.borrow_mut().get_next_in_queue(EngineId(0)).is_none());
    }

    #[test]
    fn add_with_no_input_is_a_noop() {
        let mut provider = UnixShMemProvider;
        let queue = BaseQueue::init(&mut provider).unwrap();
        let empty = entry(b"x");
        QueueEntry::remove(&empty); // drains the input, leaving it null
        BaseQueue::add(&queue, empty);
        assert_eq!(queue.borrow().get_size(), 0);
    }

    #[test]
    fn set_directory_round_trips() {
        let mut provider = UnixShMemProvider;
        let queue = BaseQueue::init(&mut provider).unwrap();
        queue.borrow_mut().set_directory(Some("/tmp/corpus".into()));
        assert_eq!(queue.borrow().get_dirpath(), "/tmp/corpus");
        assert!(queue.borrow().get_save_to_files());

        queue.borrow_mut().set_directory(None);
        assert_eq!(queue.borrow().get_dirpath(), "");
        assert!(!queue.borrow().get_save_to_files());
    }

    #[test]
    fn shared_memory_mirrors_last_entry() {
        let mut provider = UnixShMemProvider;
        let queue = BaseQueue::init(&mut provider).unwrap();
        BaseQueue::add(&queue, entry(b"a"));
        BaseQueue::add(&queue, entry(b"bb"));

        let header = queue.borrow().read_exported_header(1).unwrap();
        assert_eq!(header.index, 1);
        assert_eq!(header.input_len, 2);
    }
}
