use std::time::Duration;

/// Counters describing render scheduler activity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderStats {
    pub render_ms: f64,
    pub render_samples: u64,
    pub completed: u64,
    pub stale_discarded: u64,
    pub failed: u64,
    pub canceled_tasks: usize,
    pub evicted: u64,
    pub queue_depth: usize,
}

impl RenderStats {
    pub fn record_render(&mut self, elapsed: Duration) {
        self.render_ms = elapsed.as_secs_f64() * 1000.0;
        self.render_samples += 1;
    }

    pub fn record_completed(&mut self) {
        self.completed += 1;
    }

    pub fn record_stale(&mut self) {
        self.stale_discarded += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub fn record_evicted(&mut self, evicted: usize) {
        self.evicted += evicted as u64;
    }

    pub fn set_queue_depth(&mut self, depth: usize) {
        self.queue_depth = depth;
    }

    pub fn add_canceled_tasks(&mut self, canceled: usize) {
        self.canceled_tasks += canceled;
    }
}
