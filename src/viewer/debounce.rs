use std::time::{Duration, Instant};

/// Single-shot restartable timer driven by explicit `now` values.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)starts the timer.
    pub(crate) fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub(crate) fn cancel(&mut self) {
        self.deadline = None;
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true exactly once after the deadline has passed.
    pub(crate) fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
