/// Bridge between application completion signals and platform presentation

use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::error::Result;
use crate::sync::{deadline_after, PastPresentationTiming, PresentTimingQueue, Signal};

/// Waits on signals before a buffer reaches the platform and fires the
/// completion signals once it has been handed over.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SyncBridge {
    signal_timeout: Duration,
}

impl SyncBridge {
    pub(crate) fn new(signal_timeout: Duration) -> Self {
        Self { signal_timeout }
    }

    /// Wait on every signal under one shared deadline
    pub(crate) fn wait_for_signals(&self, signals: &[Arc<dyn Signal>]) -> Result<()> {
        let deadline = deadline_after(self.signal_timeout);
        for signal in signals {
            let remaining = match deadline {
                None => Duration::MAX,
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            };
            signal.wait(remaining)?;
        }
        Ok(())
    }

    /// Fire the signal supplied with an acquire, if any
    pub(crate) fn signal_acquired(&self, signal: Option<&Arc<dyn Signal>>) -> Result<()> {
        match signal {
            Some(signal) => signal.signal(),
            None => Ok(()),
        }
    }

    /// Fire the per-present fence, if any
    pub(crate) fn signal_complete(&self, fence: Option<&Arc<dyn Signal>>) -> Result<()> {
        match fence {
            Some(fence) => fence.signal(),
            None => Ok(()),
        }
    }

    /// Record a timing sample for a tagged present
    pub(crate) fn record_timing(
        &self,
        timing: &mut PresentTimingQueue,
        present_id: Option<u64>,
        image_index: u32,
        queued_at: Instant,
        discarded: bool,
    ) {
        if let Some(present_id) = present_id {
            timing.push(PastPresentationTiming {
                present_id,
                image_index,
                queued_at,
                completed_at: Instant::now(),
                discarded,
            });
        }
    }
}
