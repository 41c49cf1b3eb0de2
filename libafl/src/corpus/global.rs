//! Composition of feedback queues under a scheduling policy.

use std::{cell::RefCell, rc::Rc};

use libafl_bolts::shmem::{ShMem, ShMemProvider};

use crate::{
    corpus::{base::BaseQueue, entry::EntryHandle, feedback_queue::FeedbackQueue},
    engine::EngineHandle,
    Error,
};

/// Picks which feedback queue (by index into `GlobalQueue`'s list) to
/// serve an entry from next. Returning `-1` (or an out-of-range index,
/// or an index whose feedback queue is currently empty) falls back to
/// the global queue's own base rotation.
pub type Scheduler<SM> = fn(&GlobalQueue<SM>) -> i64;

fn uniform_random_scheduler<SM: ShMem>(queue: &GlobalQueue<SM>) -> i64 {
    let count = queue.feedback_queues.len();
    if count == 0 {
        return -1;
    }
    match queue.base.borrow().engine_handle() {
        Some(engine) => engine.borrow_mut().rand_below(count) as i64,
        None => -1,
    }
}

/// Composes N feedback queues plus a base queue used as the fallback.
/// Does not own the feedback queues — they are owned by the
/// [`crate::feedbacks::Feedback`] objects that created them — but it
/// does own the scheduling decision.
pub struct GlobalQueue<SM: ShMem> {
    base: Rc<RefCell<BaseQueue<SM>>>,
    feedback_queues: Vec<Rc<RefCell<FeedbackQueue<SM>>>>,
    scheduler: Scheduler<SM>,
}

impl<SM: ShMem> GlobalQueue<SM> {
    /// Builds an empty global queue with the default uniform-random
    /// scheduler.
    pub fn init<SP: ShMemProvider<ShMem = SM>>(provider: &mut SP) -> Result<Self, Error> {
        Ok(Self {
            base: BaseQueue::init(provider)?,
            feedback_queues: Vec::new(),
            scheduler: uniform_random_scheduler,
        })
    }

    /// The fallback base queue.
    #[must_use]
    pub fn base(&self) -> &Rc<RefCell<BaseQueue<SM>>> {
        &self.base
    }

    /// Registers a feedback queue, binding it to this queue's current
    /// engine (if any).
    pub fn add_feedback_queue(&mut self, feedback_queue: Rc<RefCell<FeedbackQueue<SM>>>) {
        if let Some(engine) = self.base.borrow().engine_handle() {
            feedback_queue.borrow().set_engine(Some(engine));
        }
        self.feedback_queues.push(feedback_queue);
    }

    /// Replaces the scheduling policy.
    pub fn set_scheduler(&mut self, scheduler: Scheduler<SM>) {
        self.scheduler = scheduler;
    }

    /// Binds the engine to the base queue and fans it out to every
    /// contained feedback queue.
    pub fn set_engine(&mut self, engine: Option<Rc<RefCell<dyn EngineHandle<SM>>>>) {
        self.base.borrow_mut().set_engine(engine.clone());
        for feedback_queue in &self.feedback_queues {
            feedback_queue.borrow().set_engine(engine.clone());
        }
    }

    /// Asks the scheduler which feedback queue to serve next; falls
    /// back to base-queue rotation when the scheduler returns `-1`, an
    /// out-of-range index, or an index whose queue is currently empty.
    pub fn get_next_in_queue(
        &mut self,
        engine_id: crate::engine::EngineId,
    ) -> Option<EntryHandle<SM>> {
        let fbck_idx = (self.scheduler)(self);
        if fbck_idx >= 0 {
            if let Some(feedback_queue) = self.feedback_queues.get(fbck_idx as usize) {
                let next = feedback_queue.borrow().base().borrow_mut().get_next_in_queue(engine_id);
                if next.is_some() {
                    return next;
                }
            }
        }
        self.base.borrow_mut().get_next_in_queue(engine_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        corpus::entry::QueueEntry,
        engine::EngineId,
        inputs::RawInput,
    };
    use libafl_bolts::shmem::UnixShMemProvider;

    #[test]
    fn falls_back_to_base_when_feedback_queues_empty() {
        let mut provider = UnixShMemProvider;
        let mut global = GlobalQueue::init(&mut provider).unwrap();
        let fq1 = Rc::new(RefCell::new(FeedbackQueue::init(&mut provider, None).unwrap()));
        let fq2 = Rc::new(RefCell::new(FeedbackQueue::init(&mut provider, None).unwrap()));
        global.add_feedback_queue(fq1);
        global.add_feedback_queue(fq2);

        BaseQueue::add(
            global.base(),
            QueueEntry::new(RawInput::new(b"x".to_vec())),
        );

        for _ in 0..5 {
            let entry = global.get_next_in_queue(EngineId(0)).unwrap();
            assert_eq!(entry.borrow().input().unwrap().bytes(), b"x");
        }
    }

    #[test]
    fn negative_one_scheduler_uses_base_rotation() {
        let mut provider = UnixShMemProvider;
        let mut global = GlobalQueue::init(&mut provider).unwrap();
        global.set_scheduler(|_| -1);
        BaseQueue::add(
            global.base(),
            QueueEntry::new(RawInput::new(b"only".to_vec())),
        );
        let entry = global.get_next_in_queue(EngineId(0)).unwrap();
        assert_eq!(entry.borrow().input().unwrap().bytes(), b"only");
    }
}
