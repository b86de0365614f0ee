use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation cancelled at stage={stage}")]
pub struct Cancelled {
    pub stage: &'static str,
}

/// Shared shutdown flag, e.g. set from a signal handler and polled by the
/// host loop driving playback.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled { stage });
        }
        Ok(())
    }
}
