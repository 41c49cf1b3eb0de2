//! A [`BaseQueue`] tied to a single feedback policy.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use libafl_bolts::shmem::{ShMem, ShMemProvider};

use crate::{
    corpus::base::BaseQueue,
    engine::EngineHandle,
    feedbacks::Feedback,
    Error,
};

/// A [`BaseQueue`] specialised by a display name and a back-pointer to
/// the [`Feedback`] that logically owns it. The feedback owns the
/// queue (it holds an `Rc` to it); this back-pointer is a [`Weak`] so
/// the two don't form an ownership cycle.
pub struct FeedbackQueue<SM: ShMem> {
    base: Rc<RefCell<BaseQueue<SM>>>,
    name: String,
    feedback: Option<Weak<RefCell<dyn Feedback<SM>>>>,
}

impl<SM: ShMem> FeedbackQueue<SM> {
    /// Builds a new feedback queue, defaulting `name` to `""` when
    /// `None`.
    pub fn init<SP: ShMemProvider<ShMem = SM>>(
        provider: &mut SP,
        name: Option<String>,
    ) -> Result<Self, Error> {
        Ok(Self {
            base: BaseQueue::init(provider)?,
            name: name.unwrap_or_default(),
            feedback: None,
        })
    }

    /// The underlying [`BaseQueue`].
    #[must_use]
    pub fn base(&self) -> &Rc<RefCell<BaseQueue<SM>>> {
        &self.base
    }

    /// This queue's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wires this queue to the feedback that owns it. Symmetric: also
    /// resolved from the feedback side when the feedback is
    /// constructed (see [`Feedback::set_feedback_queue`]'s default
    /// behaviour).
    pub fn set_feedback(&mut self, feedback: Option<Weak<RefCell<dyn Feedback<SM>>>>) {
        self.feedback = feedback;
    }

    /// Binds the engine to the underlying base queue.
    pub fn set_engine(&self, engine: Option<Rc<RefCell<dyn EngineHandle<SM>>>>) {
        self.base.borrow_mut().set_engine(engine);
    }
}
