//! Edge-detecting debounce for momentary buttons.

use std::time::{Duration, Instant};

/// Default settle window for tactile switches.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(30);

#[derive(Debug)]
pub struct Debounce {
    settle: Duration,
    stable: bool,
    candidate: bool,
    candidate_since: Option<Instant>,
}

impl Debounce {
    pub fn new(settle: Duration, initial: bool) -> Self {
        Self {
            settle,
            stable: initial,
            candidate: initial,
            candidate_since: None,
        }
    }

    /// Feed one sample. Returns `Some(level)` when the debounced level
    /// changes, `None` otherwise.
    pub fn update(&mut self, raw: bool, now: Instant) -> Option<bool> {
        if raw == self.stable {
            self.candidate = raw;
            self.candidate_since = None;
            return None;
        }
        if raw != self.candidate {
            self.candidate = raw;
            self.candidate_since = Some(now);
            return None;
        }
        let since = self.candidate_since.get_or_insert(now);
        if now.duration_since(*since) >= self.settle {
            self.stable = raw;
            self.candidate_since = None;
            return Some(raw);
        }
        None
    }

    pub fn level(&self) -> bool {
        self.stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_glitches_are_swallowed() {
        let start = Instant::now();
        let mut d = Debounce::new(Duration::from_millis(30), false);
        assert_eq!(d.update(true, start), None);
        // released before the settle window elapsed
        assert_eq!(d.update(false, start + Duration::from_millis(10)), None);
        assert_eq!(d.update(false, start + Duration::from_millis(50)), None);
        assert!(!d.level());
    }

    #[test]
    fn sustained_press_emits_one_edge() {
        let start = Instant::now();
        let mut d = Debounce::new(Duration::from_millis(30), false);
        assert_eq!(d.update(true, start), None);
        assert_eq!(d.update(true, start + Duration::from_millis(10)), None);
        assert_eq!(
            d.update(true, start + Duration::from_millis(35)),
            Some(true)
        );
        // holding produces no further edges
        assert_eq!(d.update(true, start + Duration::from_millis(100)), None);
        assert!(d.level());
    }

    #[test]
    fn release_emits_falling_edge() {
        let start = Instant::now();
        let mut d = Debounce::new(Duration::from_millis(30), true);
        assert_eq!(d.update(false, start), None);
        assert_eq!(
            d.update(false, start + Duration::from_millis(40)),
            Some(false)
        );
    }
}
