//! The fuzzer core's error type. A closed, small taxonomy: the core
//! either succeeds, or hits one of the few failure modes its
//! constructors and process layer can actually produce.

use core::fmt;
use std::borrow::Cow;

/// Errors produced by the corpus, observation-channel, and process
/// layers.
#[derive(Debug)]
pub enum Error {
    /// Memory or shared-memory acquisition failed. Constructors that
    /// return this must not have their object used further.
    Alloc(Cow<'static, str>),
    /// An observation channel failed to set itself up.
    Initialize(Cow<'static, str>),
    /// `fork()` itself failed (resource exhaustion).
    ForkFailed(Cow<'static, str>),
    /// Something the process layer cannot recover from: a lost child,
    /// or a wait() call that returned a status this core doesn't
    /// classify.
    Fatal(Cow<'static, str>),
    /// A lookup by id/index found nothing.
    KeyNotFound(Cow<'static, str>),
    /// An operation was attempted against an object in a state that
    /// makes it illegal (e.g. double-disable of a corpus entry).
    IllegalState(Cow<'static, str>),
}

impl Error {
    /// Builds an [`Error::Alloc`].
    pub fn alloc<S: Into<Cow<'static, str>>>(msg: S) -> Self {
        Self::Alloc(msg.into())
    }

    /// Builds an [`Error::Initialize`].
    pub fn initialize<S: Into<Cow<'static, str>>>(msg: S) -> Self {
        Self::Initialize(msg.into())
    }

    /// Builds an [`Error::ForkFailed`].
    pub fn fork_failed<S: Into<Cow<'static, str>>>(msg: S) -> Self {
        Self::ForkFailed(msg.into())
    }

    /// Builds an [`Error::Fatal`].
    pub fn fatal<S: Into<Cow<'static, str>>>(msg: S) -> Self {
        Self::Fatal(msg.into())
    }

    /// Builds an [`Error::KeyNotFound`].
    pub fn key_not_found<S: Into<Cow<'static, str>>>(msg: S) -> Self {
        Self::KeyNotFound(msg.into())
    }

    /// Builds an [`Error::IllegalState`].
    pub fn illegal_state<S: Into<Cow<'static, str>>>(msg: S) -> Self {
        Self::IllegalState(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc(msg) => write!(f, "allocation error: {msg}"),
            Self::Initialize(msg) => write!(f, "initialization error: {msg}"),
            Self::ForkFailed(msg) => write!(f, "fork failed: {msg}"),
            Self::Fatal(msg) => write!(f, "fatal error: {msg}"),
            Self::KeyNotFound(msg) => write!(f, "key not found: {msg}"),
            Self::IllegalState(msg) => write!(f, "illegal state: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<libafl_bolts::Error> for Error {
    fn from(err: libafl_bolts::Error) -> Self {
        match err {
            libafl_bolts::Error::ShMem(msg) => Self::Alloc(msg),
        }
    }
}
