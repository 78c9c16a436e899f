/// Layer configuration

use std::time::Duration;
use crate::sync::DEFAULT_TIMING_QUEUE_SIZE;

/// How queued presents are drained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentStrategy {
    /// `queue_present` blocks until the platform has taken the buffer
    Synchronous,
    /// A background worker per swapchain drains the queue in order
    Threaded,
}

/// Device-wide defaults applied to every swapchain
#[derive(Debug, Clone)]
pub struct LayerConfig {
    /// Strategy used when a swapchain does not ask for one
    pub present_strategy: PresentStrategy,
    /// Capacity of each swapchain's timing ring buffer
    pub timing_queue_size: usize,
    /// Upper bound on waiting for application signals before a present
    /// (`Duration::MAX` = unbounded)
    pub signal_timeout: Duration,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            present_strategy: PresentStrategy::Threaded,
            timing_queue_size: DEFAULT_TIMING_QUEUE_SIZE,
            signal_timeout: Duration::from_secs(5),
        }
    }
}
