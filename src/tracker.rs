use tracing::debug;

pub const DEFAULT_EAR_THRESHOLD: f32 = 0.3;
pub const DEFAULT_CONSEC_FRAMES: u32 = 3;

/// Counts blinks from a per-frame EAR signal.
///
/// A blink is counted on the frame the eyes reopen, and only if they stayed below the threshold
/// for at least `min_consecutive` frames. A closure still in progress when the stream ends is
/// never counted; [`BlinkTracker::pending_closed_frames`] exposes it.
#[derive(Debug, Clone)]
pub struct BlinkTracker {
    threshold: f32,
    min_consecutive: u32,
    consecutive_closed: u32,
    total: u32,
}

impl Default for BlinkTracker {
    fn default() -> Self {
        Self::new(DEFAULT_EAR_THRESHOLD, DEFAULT_CONSEC_FRAMES)
    }
}

impl BlinkTracker {
    pub fn new(threshold: f32, min_consecutive: u32) -> Self {
        Self {
            threshold,
            min_consecutive,
            consecutive_closed: 0,
            total: 0,
        }
    }

    /// Feed one frame's EAR. Returns `true` if this frame completed a blink.
    pub fn update(&mut self, ear: f32) -> bool {
        self.observe(ear < self.threshold)
    }

    /// Feed one frame's closed/open decision. Returns `true` if this frame completed a blink.
    pub fn observe(&mut self, closed: bool) -> bool {
        if closed {
            self.consecutive_closed += 1;
            return false;
        }

        let blinked = self.consecutive_closed >= self.min_consecutive;
        if blinked {
            self.total += 1;
            debug!(closed_frames = self.consecutive_closed, total = self.total, "blink");
        }
        self.consecutive_closed = 0;
        blinked
    }

    pub fn total_blinks(&self) -> u32 {
        self.total
    }

    pub fn pending_closed_frames(&self) -> u32 {
        self.consecutive_closed
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.consecutive_closed = 0;
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(signal: &[bool], min: u32) -> BlinkTracker {
        let mut tracker = BlinkTracker::new(DEFAULT_EAR_THRESHOLD, min);
        for &closed in signal {
            tracker.observe(closed);
        }
        tracker
    }

    #[test]
    fn three_closed_then_open_is_one_blink() {
        assert_eq!(run(&[true, true, true, false], 3).total_blinks(), 1);
    }

    #[test]
    fn short_closure_is_not_a_blink() {
        assert_eq!(run(&[true, true, false], 3).total_blinks(), 0);
    }

    #[test]
    fn closure_at_end_of_stream_is_not_counted() {
        let tracker = run(&[true; 10], 3);
        assert_eq!(tracker.total_blinks(), 0);
        assert_eq!(tracker.pending_closed_frames(), 10);
    }

    #[test]
    fn blink_is_reported_on_reopening_frame() {
        let mut tracker = BlinkTracker::new(0.2, 2);
        assert!(!tracker.update(0.1));
        assert!(!tracker.update(0.15));
        assert!(tracker.update(0.3));
        assert!(!tracker.update(0.3));
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut tracker = BlinkTracker::new(0.2, 1);
        tracker.update(0.2);
        assert_eq!(tracker.pending_closed_frames(), 0);
    }

    #[test]
    fn reset_clears_counters() {
        let mut tracker = run(&[true, true, true, false, true], 3);
        tracker.reset();
        assert_eq!(tracker.total_blinks(), 0);
        assert_eq!(tracker.pending_closed_frames(), 0);
    }

    proptest! {
        #[test]
        fn blinks_equal_qualifying_runs_followed_by_open(
            signal in proptest::collection::vec(any::<bool>(), 0..200),
            min in 1u32..6,
        ) {
            let mut expected = 0;
            let mut run_len = 0;
            for &closed in &signal {
                if closed {
                    run_len += 1;
                } else {
                    if run_len >= min {
                        expected += 1;
                    }
                    run_len = 0;
                }
            }

            prop_assert_eq!(run(&signal, min).total_blinks(), expected);
        }
    }
}
