//! Monotonic nanosecond clock shared by the engine, feed, and analytics.

use std::sync::Arc;
use std::time::Instant;

use crate::Timestamp;

/// A monotonic clock producing nanosecond timestamps relative to its epoch.
///
/// All components of one engine share a single clock, so timestamps are
/// comparable across orders, executions, and analytics records. Cloning is
/// cheap (shared epoch).
#[derive(Clone, Debug)]
pub struct Clock {
    epoch: Arc<Instant>,
}

impl Clock {
    /// Create a clock whose epoch is now.
    pub fn new() -> Self {
        Self {
            epoch: Arc::new(Instant::now()),
        }
    }

    /// Nanoseconds elapsed since the clock's epoch.
    #[inline]
    pub fn now(&self) -> Timestamp {
        self.epoch.elapsed().as_nanos() as Timestamp
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
