use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Advisory progress and cancellation context, passed explicitly through the
/// extract/merge/workflow call chain.
///
/// Progress is reported at file granularity. Cancellation is cooperative:
/// implementations flip a flag, operations check it at each file boundary and
/// stop before the next file, never mid-file. The signal is advisory only
/// and never gates data correctness.
pub trait Progress: Send + Sync {
    fn report(&self, _current: usize, _total: usize, _message: &str) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// No-op context for callers that do not track progress.
pub struct NoProgress;

impl Progress for NoProgress {}

/// Shared cancellation flag usable as a `Progress` context on its own or
/// alongside a reporting wrapper.
#[derive(Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

impl Progress for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Outcome of a cancellable operation: finished with a result, or stopped at
/// a file boundary. Distinct from an error on purpose: a cancelled run is
/// neither a success nor a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    Finished(T),
    Cancelled,
}

impl<T> Completion<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }

    /// The finished value, if the operation ran to completion.
    pub fn finished(self) -> Option<T> {
        match self {
            Completion::Finished(value) => Some(value),
            Completion::Cancelled => None,
        }
    }
}
