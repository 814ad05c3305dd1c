use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::ParameterBuffer;

const BLINK_INTERVAL_SECONDS: f32 = 4.0;
const CLOSING_SECONDS: f32 = 0.1;
const CLOSED_SECONDS: f32 = 0.05;
const OPENING_SECONDS: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkState {
    First,
    Interval,
    Closing,
    Closed,
    Opening,
}

/// Periodic eye blink over the eye-openness parameters (1 open, 0 closed)
#[derive(Debug)]
pub struct EyeBlink {
    parameter_ids: Vec<String>,
    state: BlinkState,
    user_time: f32,
    state_start: f32,
    next_blink: f32,
    rng: StdRng,
}

impl EyeBlink {
    pub fn new(parameter_ids: Vec<String>) -> Self {
        Self::with_rng(parameter_ids, StdRng::from_os_rng())
    }

    pub fn with_rng(parameter_ids: Vec<String>, rng: StdRng) -> Self {
        Self {
            parameter_ids,
            state: BlinkState::First,
            user_time: 0.0,
            state_start: 0.0,
            next_blink: 0.0,
            rng,
        }
    }

    pub fn state(&self) -> BlinkState {
        self.state
    }

    pub fn parameter_ids(&self) -> &[String] {
        &self.parameter_ids
    }

    fn schedule_next(&mut self) -> f32 {
        let r: f32 = self.rng.random();
        self.user_time + r * (2.0 * BLINK_INTERVAL_SECONDS - 1.0)
    }

    fn enter(&mut self, state: BlinkState) {
        self.state = state;
        self.state_start = self.user_time;
    }

    pub fn update(&mut self, params: &mut ParameterBuffer, delta: f32) {
        self.user_time += delta.max(0.0);
        let elapsed = self.user_time - self.state_start;

        let value = match self.state {
            BlinkState::First => {
                self.state = BlinkState::Interval;
                self.next_blink = self.schedule_next();
                1.0
            }
            BlinkState::Interval => {
                if self.next_blink < self.user_time {
                    self.enter(BlinkState::Closing);
                }
                1.0
            }
            BlinkState::Closing => {
                let t = elapsed / CLOSING_SECONDS;
                if t >= 1.0 {
                    self.enter(BlinkState::Closed);
                    0.0
                } else {
                    1.0 - t
                }
            }
            BlinkState::Closed => {
                if elapsed / CLOSED_SECONDS >= 1.0 {
                    self.enter(BlinkState::Opening);
                }
                0.0
            }
            BlinkState::Opening => {
                let t = elapsed / OPENING_SECONDS;
                if t >= 1.0 {
                    self.state = BlinkState::Interval;
                    self.next_blink = self.schedule_next();
                    1.0
                } else {
                    t
                }
            }
        };

        for id in &self.parameter_ids {
            params.set(id, value, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterSpec;

    fn buffer() -> ParameterBuffer {
        ParameterBuffer::new(vec![
            ParameterSpec::new("ParamEyeLOpen", 0.0, 1.0, 1.0),
            ParameterSpec::new("ParamEyeROpen", 0.0, 1.0, 1.0),
        ])
    }

    #[test]
    fn test_blink_cycle_closes_and_reopens() {
        let ids = vec!["ParamEyeLOpen".to_string(), "ParamEyeROpen".to_string()];
        let mut blink = EyeBlink::with_rng(ids, StdRng::seed_from_u64(7));
        let mut params = buffer();

        blink.update(&mut params, 0.0);
        assert_eq!(blink.state(), BlinkState::Interval);

        let mut saw_closed = false;
        let mut reopened = false;
        for _ in 0..(10.0 / 0.01) as usize {
            blink.update(&mut params, 0.01);
            let value = params.get("ParamEyeLOpen").unwrap();
            assert!((0.0..=1.0).contains(&value));
            if blink.state() == BlinkState::Closed {
                saw_closed = true;
            }
            if saw_closed && blink.state() == BlinkState::Interval {
                reopened = true;
                assert_eq!(value, 1.0);
                break;
            }
        }
        assert!(saw_closed && reopened);
        assert_eq!(params.get("ParamEyeROpen"), params.get("ParamEyeLOpen"));
    }
}
