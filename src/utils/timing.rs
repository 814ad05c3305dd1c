use std::time::{Duration, Instant};

/// Measures wall-clock time between frames.
///
/// The first tick after construction or [`FrameClock::reset`] reports a zero delta,
/// so a paused loop never produces one huge step when it resumes.
#[derive(Debug, Default)]
pub struct FrameClock {
    last: Option<Instant>,
    max_delta: Option<Duration>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp every reported delta to `max_delta`
    pub fn with_max_delta(max_delta: Duration) -> Self {
        Self {
            last: None,
            max_delta: Some(max_delta),
        }
    }

    /// Seconds elapsed since the previous tick
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = match self.last {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        match self.max_delta {
            Some(max) => delta.min(max).as_secs_f32(),
            None => delta.as_secs_f32(),
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
