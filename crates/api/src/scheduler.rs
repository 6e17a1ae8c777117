use std::time::Duration;
use tokio::time::Instant;

/// Trailing-edge debounce. Each `touch` pushes the deadline to `window` after
/// that touch; there is only a pending flag, never a queue of past changes.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    changed_at: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self { Self { window, changed_at: None } }

    pub fn window(&self) -> Duration { self.window }

    pub fn touch(&mut self, now: Instant) { self.changed_at = Some(now); }

    pub fn is_pending(&self) -> bool { self.changed_at.is_some() }

    pub fn deadline(&self) -> Option<Instant> { self.changed_at.map(|t| t + self.window) }

    /// True exactly once per quiet period, when `now` has reached the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(d) if now >= d => {
                self.changed_at = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn idle_never_fires() {
        let mut d = Debouncer::new(50 * MS);
        assert!(!d.is_pending());
        assert!(d.deadline().is_none());
        assert!(!d.fire(Instant::now() + 1000 * MS));
    }

    #[test]
    fn burst_collapses_to_one_fire_after_last_touch() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(50 * MS);
        for i in 0..5 {
            d.touch(t0 + i * 2 * MS);
        }
        assert_eq!(d.deadline(), Some(t0 + 58 * MS));
        assert!(!d.fire(t0 + 57 * MS));
        assert!(d.fire(t0 + 58 * MS));
        assert!(!d.fire(t0 + 200 * MS));
    }

    #[test]
    fn touch_after_fire_rearms() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(10 * MS);
        d.touch(t0);
        assert!(d.fire(t0 + 10 * MS));
        d.touch(t0 + 11 * MS);
        assert!(d.is_pending());
        assert!(d.fire(t0 + 30 * MS));
    }
}
