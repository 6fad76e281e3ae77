use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Millisecond clock that never hands out the same value twice.
///
/// Each call to [`MillisClock::tick`] returns `max(wall_clock, last + 1)`,
/// so stamps are strictly increasing even when many mutations land in the
/// same wall-clock millisecond. Under bursts the clock runs slightly ahead of
/// wall time and converges once the burst ends.
pub struct MillisClock {
    last: Mutex<i64>,
}

impl MillisClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(0),
        }
    }

    /// Produce the next stamp, strictly greater than every previous one.
    pub fn tick(&self) -> i64 {
        let wall = now_millis();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = wall.max(*last + 1);
        *last = next;
        next
    }

    /// The most recently issued stamp (0 before the first tick).
    pub fn last(&self) -> i64 {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MillisClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MillisClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MillisClock")
            .field("last", &self.last())
            .finish()
    }
}
