use std::time::{Duration, Instant};

/// Debounced save deadline. Each mark pushes the deadline out by `delay`, so a
/// burst of mutations ends in a single write.
#[derive(Debug, Clone)]
pub struct SaveSchedule {
    delay: Duration,
    due: Option<Instant>,
}

impl SaveSchedule {
    pub fn new(delay: Duration) -> Self {
        Self { delay, due: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn mark(&mut self, now: Instant) {
        self.due = Some(now + self.delay);
    }

    pub fn is_dirty(&self) -> bool {
        self.due.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.due.is_some_and(|due| now >= due)
    }

    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    pub fn clear(&mut self) {
        self.due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_schedule_is_never_due() {
        let schedule = SaveSchedule::new(Duration::ZERO);
        assert!(!schedule.is_dirty());
        assert!(!schedule.is_due(Instant::now()));
    }

    #[test]
    fn marks_coalesce() {
        let start = Instant::now();
        let mut schedule = SaveSchedule::new(Duration::from_millis(100));
        schedule.mark(start);
        schedule.mark(start + Duration::from_millis(80));

        assert!(!schedule.is_due(start + Duration::from_millis(120)));
        assert!(schedule.is_due(start + Duration::from_millis(180)));

        schedule.clear();
        assert!(!schedule.is_dirty());
    }
}
