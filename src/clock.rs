use bevy::prelude::*;

/// Monotonic seconds source for shrink timing and red-dot stamps.
pub trait WallClock {
    fn now_secs(&self) -> f64;
}

impl<T: Default> WallClock for Time<T> {
    fn now_secs(&self) -> f64 {
        self.elapsed_secs_f64()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualClock {
    seconds: f64,
}

impl ManualClock {
    pub fn new(seconds: f64) -> Self {
        Self { seconds }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.seconds += seconds.max(0.0);
    }
}

impl WallClock for ManualClock {
    fn now_secs(&self) -> f64 {
        self.seconds
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn manual_clock_never_goes_back() {
        let mut clock = ManualClock::new(5.0);
        clock.advance(2.5);
        clock.advance(-10.0);
        assert_eq!(clock.now_secs(), 7.5);
    }

    #[test]
    fn bevy_time_reports_elapsed() {
        let mut time = Time::<()>::default();
        time.advance_by(Duration::from_millis(1500));
        assert_eq!(time.now_secs(), 1.5);
    }
}
