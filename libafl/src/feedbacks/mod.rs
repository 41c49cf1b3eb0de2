//! The feedback decision point: "is this execution interesting?",
//! linking observation channels to queues.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use libafl_bolts::shmem::ShMem;

use crate::{corpus::FeedbackQueue, observers::MapObservationChannel};

/// What a feedback needs from the thing that ran the target. Opaque
/// beyond what a given feedback actually uses — the coverage-map
/// feedback below only needs the map channel.
pub trait Executor<SM: ShMem> {
    /// The executor's coverage-map observation channel, if it has one.
    fn map_observation_channel(&self) -> Option<&MapObservationChannel<SM>>;
}

/// A policy deciding whether an execution's observations merit saving.
/// `is_interesting` returns a score in `[0, 1]`: `0` means
/// uninteresting; any positive value means the caller should wrap the
/// originating input into a new [`crate::corpus::QueueEntry`] and add
/// it to [`Feedback::get_feedback_queue`]. The numeric value beyond
/// "positive" is advisory, for downstream ranking.
pub trait Feedback<SM: ShMem> {
    /// Scores the most recent execution.
    fn is_interesting(&mut self, executor: &mut dyn Executor<SM>) -> f32;

    /// The queue this feedback saves interesting inputs into.
    fn get_feedback_queue(&self) -> &Rc<RefCell<FeedbackQueue<SM>>>;

    /// Rebinds this feedback's queue. The natural choice — and the one
    /// implemented here — is symmetric: the queue's back-pointer to
    /// this feedback is updated too.
    fn set_feedback_queue(&mut self, queue: Rc<RefCell<FeedbackQueue<SM>>>);
}

/// A feedback that finds any execution whose coverage map has at least
/// one non-zero byte interesting, scoring the fraction of the map that
/// was hit. The only feedback the core itself defines; anything more
/// elaborate is a plug-in, per scope.
pub struct MapFeedback<SM: ShMem> {
    queue: Rc<RefCell<FeedbackQueue<SM>>>,
}

impl<SM: ShMem + 'static> MapFeedback<SM> {
    /// Builds a feedback bound to `queue`, wiring the queue's
    /// back-pointer to this feedback symmetrically.
    #[must_use]
    pub fn new(queue: Rc<RefCell<FeedbackQueue<SM>>>) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let weak_dyn: Weak<RefCell<dyn Feedback<SM>>> = weak.clone();
            queue.borrow_mut().set_feedback(Some(weak_dyn));
            RefCell::new(Self { queue })
        })
    }
}

impl<SM: ShMem> Feedback<SM> for MapFeedback<SM> {
    fn is_interesting(&mut self, executor: &mut dyn Executor<SM>) -> f32 {
        let Some(channel) = executor.map_observation_channel() else {
            return 0.0;
        };
        let bits = channel.get_trace_bits();
        if bits.is_empty() {
            return 0.0;
        }
        let hit = bits.iter().filter(|&&b| b != 0).count();
        hit as f32 / bits.len() as f32
    }

    fn get_feedback_queue(&self) -> &Rc<RefCell<FeedbackQueue<SM>>> {
        &self.queue
    }

    fn set_feedback_queue(&mut self, queue: Rc<RefCell<FeedbackQueue<SM>>>) {
        queue.borrow_mut().set_feedback(None);
        self.queue = queue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libafl_bolts::shmem::UnixShMemProvider;

    struct StubExecutor<SM: ShMem> {
        channel: MapObservationChannel<SM>,
    }

    impl<SM: ShMem> Executor<SM> for StubExecutor<SM> {
        fn map_observation_channel(&self) -> Option<&MapObservationChannel<SM>> {
            Some(&self.channel)
        }
    }

    #[test]
    fn zero_map_is_uninteresting() {
        let mut provider = UnixShMemProvider;
        let queue = Rc::new(RefCell::new(
            FeedbackQueue::init(&mut provider, Some("cov".into())).unwrap(),
        ));
        let feedback = MapFeedback::new(queue);
        let channel = MapObservationChannel::new(&mut provider, 64).unwrap();
        let mut executor = StubExecutor { channel };

        let score = feedback.borrow_mut().is_interesting(&mut executor);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn hit_map_is_interesting() {
        let mut provider = UnixShMemProvider;
        let queue = Rc::new(RefCell::new(
            FeedbackQueue::init(&mut provider, Some("cov".into())).unwrap(),
        ));
        let feedback = MapFeedback::new(queue);
        let mut channel = MapObservationChannel::new(&mut provider, 64).unwrap();
        channel.get_trace_bits_mut()[3] = 1;
        let mut executor = StubExecutor { channel };

        let score = feedback.borrow_mut().is_interesting(&mut executor);
        assert!(score > 0.0);
    }
}
