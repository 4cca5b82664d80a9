//! Render callback timing.

use std::time::Duration;

/// Duration of the latest render callback plus the worst one since the last query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderTiming {
    current: Duration,
    max: Duration,
}

impl RenderTiming {
    pub fn record(&mut self, elapsed: Duration) {
        self.current = elapsed;
        if elapsed > self.max {
            self.max = elapsed;
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return the running maximum and reset it. The current sample is kept.
    pub fn take_max(&mut self) -> Duration {
        std::mem::take(&mut self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_tracks_the_worst_sample() {
        let mut timing = RenderTiming::default();
        timing.record(Duration::from_micros(300));
        timing.record(Duration::from_micros(100));
        assert_eq!(timing.current(), Duration::from_micros(100));
        assert_eq!(timing.take_max(), Duration::from_micros(300));
    }

    #[test]
    fn take_max_resets_only_the_maximum() {
        let mut timing = RenderTiming::default();
        timing.record(Duration::from_micros(250));
        timing.take_max();
        assert_eq!(timing.take_max(), Duration::ZERO);
        assert_eq!(timing.current(), Duration::from_micros(250));
    }
}
