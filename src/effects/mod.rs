//! Secondary parameter effects evaluated by the compositor after the motion layer

pub mod blink;
pub mod breath;
pub mod drag;

pub use blink::{BlinkState, EyeBlink};
pub use breath::{Breath, BreathParameter};
pub use drag::DragFollower;

use crate::model::ParameterBuffer;

/// An effect with its own internal state, stepped once per frame over the whole buffer.
/// Physics and pose evaluators produced by the animation runtime implement this.
pub trait Effect: Send {
    fn name(&self) -> &str;

    fn evaluate(&mut self, params: &mut ParameterBuffer, delta: f32);
}
