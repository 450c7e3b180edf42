//! Event coalescing with a fixed quiet period

use std::time::{Duration, Instant};

/// Holds the latest scheduled value until no new value has arrived for
/// `quiet`. Scheduling again replaces the pending value and restarts the
/// period.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Yields the pending value once its quiet period has elapsed
    pub fn take_ready(&mut self, now: Instant) -> Option<T> {
        let (_, queued_at) = self.pending.as_ref()?;
        if now.saturating_duration_since(*queued_at) >= self.quiet {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value becomes ready
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(300);

    #[test]
    fn fires_only_after_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(QUIET);
        debouncer.schedule("rev", start);

        assert_eq!(debouncer.take_ready(start + Duration::from_millis(299)), None);
        assert_eq!(debouncer.take_ready(start + QUIET), Some("rev"));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn rescheduling_restarts_the_period_and_keeps_latest() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(QUIET);
        debouncer.schedule("r", start);
        debouncer.schedule("re", start + Duration::from_millis(200));
        debouncer.schedule("rev", start + Duration::from_millis(400));

        assert_eq!(debouncer.take_ready(start + Duration::from_millis(650)), None);
        assert_eq!(
            debouncer.deadline(),
            Some(start + Duration::from_millis(700))
        );
        assert_eq!(
            debouncer.take_ready(start + Duration::from_millis(700)),
            Some("rev")
        );
    }

    #[test]
    fn cancel_drops_pending_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(QUIET);
        debouncer.schedule(1, start);
        assert_eq!(debouncer.cancel(), Some(1));
        assert_eq!(debouncer.take_ready(start + QUIET), None);
    }
}
