//! Emission gate
//!
//! Lossy rate limiter between the aggregator and the consumer. Normal and
//! fallback vectors are throttled to the target cadence (newest wins, nothing
//! is queued). Special signals skip the throttle but are delivered only once
//! per run of identical signals.

use std::time::Duration;

use crate::clock::SharedClock;

use super::types::{BandVector, SignalTag};

pub struct EmissionGate {
    clock: SharedClock,
    min_interval: Duration,
    last_delivered_at: Option<Duration>,
    active_special: Option<SignalTag>,
    suppressed: u64,
}

impl EmissionGate {
    pub fn new(clock: SharedClock, min_interval: Duration) -> Self {
        Self {
            clock,
            min_interval,
            last_delivered_at: None,
            active_special: None,
            suppressed: 0,
        }
    }

    /// Returns the vector to deliver now, or `None` if it was suppressed
    pub fn submit(&mut self, vector: BandVector) -> Option<BandVector> {
        if vector.is_special() {
            if self.active_special == Some(vector.tag) {
                self.suppressed += 1;
                return None;
            }
            self.active_special = Some(vector.tag);
            return Some(vector);
        }

        // Any regular vector ends the current special-signal run
        self.active_special = None;

        let now = self.clock.now();
        if let Some(last) = self.last_delivered_at {
            if now.saturating_sub(last) < self.min_interval {
                self.suppressed += 1;
                return None;
            }
        }
        self.last_delivered_at = Some(now);
        Some(vector)
    }

    /// Forget the current special-signal run so the next special signal is
    /// delivered even if it repeats the previous one
    pub fn clear_special(&mut self) {
        self.active_special = None;
    }

    /// Return to the freshly constructed state
    pub fn reset(&mut self) {
        self.last_delivered_at = None;
        self.active_special = None;
    }

    /// Number of vectors dropped since construction
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn gate() -> (EmissionGate, ManualClock) {
        let clock = ManualClock::new();
        (
            EmissionGate::new(Arc::new(clock.clone()), Duration::from_millis(16)),
            clock,
        )
    }

    fn normal(x: f64) -> BandVector {
        BandVector::new([x; 5], SignalTag::Normal)
    }

    // --- Rate limiting ---

    #[test]
    fn first_vector_is_delivered() {
        let (mut gate, _) = gate();
        assert_eq!(gate.submit(normal(0.1)), Some(normal(0.1)));
    }

    #[test]
    fn second_vector_within_interval_is_dropped() {
        let (mut gate, clock) = gate();
        assert_eq!(gate.submit(normal(0.1)), Some(normal(0.1)));
        clock.advance(Duration::from_millis(5));
        assert_eq!(gate.submit(normal(0.2)), None);
        assert_eq!(gate.suppressed_count(), 1);
    }

    #[test]
    fn vector_after_interval_is_delivered() {
        let (mut gate, clock) = gate();
        gate.submit(normal(0.1));
        clock.advance(Duration::from_millis(16));
        assert_eq!(gate.submit(normal(0.2)), Some(normal(0.2)));
    }

    #[test]
    fn dropped_vectors_do_not_extend_the_window() {
        let (mut gate, clock) = gate();
        gate.submit(normal(0.1));
        for _ in 0..3 {
            clock.advance(Duration::from_millis(5));
            assert!(gate.submit(normal(0.2)).is_none());
        }
        clock.advance(Duration::from_millis(1)); // 16ms after the delivered one
        assert!(gate.submit(normal(0.3)).is_some());
    }

    #[test]
    fn fallback_vectors_are_rate_limited_too() {
        let (mut gate, _) = gate();
        let fb = BandVector::new([0.4; 5], SignalTag::NoSignalFallback);
        assert!(gate.submit(fb).is_some());
        assert!(gate.submit(fb).is_none());
    }

    #[test]
    fn steady_cadence_delivers_about_sixty_per_second() {
        let (mut gate, clock) = gate();
        let mut delivered = 0;
        for _ in 0..1000 {
            if gate.submit(normal(0.5)).is_some() {
                delivered += 1;
            }
            clock.advance(Duration::from_millis(1));
        }
        // 1000ms at one delivery per 16ms
        assert_eq!(delivered, 63);
    }

    // --- Special signals ---

    #[test]
    fn capture_error_bypasses_rate_limit() {
        let (mut gate, _) = gate();
        assert!(gate.submit(normal(0.1)).is_some());
        let err = BandVector::signal(SignalTag::CaptureError);
        assert_eq!(gate.submit(err), Some(err));
    }

    #[test]
    fn repeated_special_signal_is_delivered_once() {
        let (mut gate, clock) = gate();
        let err = BandVector::signal(SignalTag::CaptureError);
        assert!(gate.submit(err).is_some());
        clock.advance(Duration::from_secs(1));
        assert!(gate.submit(err).is_none());
        assert!(gate.submit(err).is_none());
    }

    #[test]
    fn different_special_signal_is_delivered() {
        let (mut gate, _) = gate();
        assert!(gate
            .submit(BandVector::signal(SignalTag::PermissionDenied))
            .is_some());
        assert!(gate
            .submit(BandVector::signal(SignalTag::CaptureError))
            .is_some());
    }

    #[test]
    fn special_signal_repeats_after_normal_data() {
        let (mut gate, _) = gate();
        let err = BandVector::signal(SignalTag::CaptureError);
        assert!(gate.submit(err).is_some());
        gate.submit(normal(0.3));
        assert!(gate.submit(err).is_some());
    }

    #[test]
    fn special_signal_does_not_consume_the_normal_window() {
        let (mut gate, clock) = gate();
        assert!(gate.submit(normal(0.1)).is_some());
        clock.advance(Duration::from_millis(16));
        assert!(gate
            .submit(BandVector::signal(SignalTag::CaptureError))
            .is_some());
        assert!(gate.submit(normal(0.2)).is_some());
    }

    #[test]
    fn clear_special_allows_repeat() {
        let (mut gate, _) = gate();
        let denied = BandVector::signal(SignalTag::PermissionDenied);
        assert!(gate.submit(denied).is_some());
        gate.clear_special();
        assert!(gate.submit(denied).is_some());
    }

    #[test]
    fn reset_forgets_last_delivery() {
        let (mut gate, _) = gate();
        gate.submit(normal(0.1));
        gate.reset();
        assert!(gate.submit(normal(0.2)).is_some());
    }
}
