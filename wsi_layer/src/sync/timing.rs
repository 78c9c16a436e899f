/// Presentation timing samples kept for later queries
///
/// Samples go into a bounded ring buffer. When it is full the oldest sample
/// is dropped to make room, so a caller that never queries timing costs a
/// fixed amount of memory.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use crate::error::{ConfigError, Error, Result};

/// Default ring buffer capacity
pub const DEFAULT_TIMING_QUEUE_SIZE: usize = 64;

/// Timing of one completed present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PastPresentationTiming {
    /// Present id supplied with the present
    pub present_id: u64,
    /// Image that was presented
    pub image_index: u32,
    /// When `queue_present` accepted the request
    pub queued_at: Instant,
    /// When the platform acknowledged it (or the request was discarded)
    pub completed_at: Instant,
    /// The present was replaced in mailbox mode and never shown
    pub discarded: bool,
}

impl PastPresentationTiming {
    /// Time from queueing to acknowledgement
    pub fn latency(&self) -> Duration {
        self.completed_at.saturating_duration_since(self.queued_at)
    }
}

/// Bounded ring buffer of timing samples (drop-oldest on overflow)
#[derive(Debug)]
pub struct PresentTimingQueue {
    samples: VecDeque<PastPresentationTiming>,
    capacity: usize,
    dropped: u64,
}

impl PresentTimingQueue {
    /// Create an empty queue holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Record a sample, evicting the oldest one when full
    pub fn push(&mut self, sample: PastPresentationTiming) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
            self.dropped += 1;
        }
        self.samples.push_back(sample);
    }

    /// Remove and return every sample, oldest first
    pub fn drain(&mut self) -> Vec<PastPresentationTiming> {
        self.samples.drain(..).collect()
    }

    /// Change the capacity
    ///
    /// Fails with `Error::NotReady` if more samples than `capacity` are
    /// currently held; the caller must drain them first.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(ConfigError::InvalidParameter(
                "timing queue size must be non-zero".to_string(),
            )
            .into());
        }
        if self.samples.len() > capacity {
            return Err(Error::NotReady);
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are held
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples evicted because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for PresentTimingQueue {
    fn default() -> Self {
        Self::new(DEFAULT_TIMING_QUEUE_SIZE)
    }
}
