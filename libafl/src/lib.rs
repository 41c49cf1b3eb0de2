//! The fuzzer core: corpus queues, observation channels, feedbacks, and
//! target process control. Deliberately stops short of a runnable
//! fuzzer — no CLI, no mutators beyond the `Mutator` hook point, no
//! concrete `EngineHandle`. Those live one layer up, wired together out
//! of the traits this crate defines.

pub mod corpus;
pub mod crash;
pub mod engine;
pub mod error;
pub mod executors;
pub mod feedbacks;
pub mod inputs;
pub mod observers;

pub use error::Error;
