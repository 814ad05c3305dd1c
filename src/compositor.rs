//! Per-frame parameter composition
//!
//! Layers are applied in a fixed order every tick; later layers add onto or
//! override earlier ones on the same parameters.

use glam::Mat4;
use tracing::trace;

use crate::assets::TextureId;
use crate::model::Model;

/// Parameter ids the compositor writes directly
pub mod param_ids {
    pub const ANGLE_X: &str = "ParamAngleX";
    pub const ANGLE_Y: &str = "ParamAngleY";
    pub const ANGLE_Z: &str = "ParamAngleZ";
    pub const BODY_ANGLE_X: &str = "ParamBodyAngleX";
    pub const EYE_BALL_X: &str = "ParamEyeBallX";
    pub const EYE_BALL_Y: &str = "ParamEyeBallY";
}

const DRAG_HEAD_SCALE: f32 = 30.0;
const DRAG_BODY_SCALE: f32 = 10.0;

/// External values sampled once per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub delta_seconds: f32,
    /// Pointer-drag target in normalized view space, [-1, 1] on both axes
    pub drag_x: f32,
    pub drag_y: f32,
    pub lip_sync_value: f32,
    pub lip_sync_weight: f32,
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            delta_seconds: 0.0,
            drag_x: 0.0,
            drag_y: 0.0,
            lip_sync_value: 0.0,
            lip_sync_weight: 0.8,
        }
    }
}

impl FrameInputs {
    pub fn with_delta(delta_seconds: f32) -> Self {
        Self {
            delta_seconds,
            ..Default::default()
        }
    }
}

/// Everything the renderer needs to draw one frame
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub parameters: Vec<(String, f32)>,
    pub texture_bindings: Vec<Option<TextureId>>,
    pub premultiplied_alpha: bool,
    pub model_matrix: Mat4,
}

impl Model {
    /// Compose one frame. Returns false, doing nothing, until the model is drawable.
    pub fn update(&self, inputs: &FrameInputs) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.stage.is_drawable() || state.geometry.is_none() {
            return false;
        }
        let delta = inputs.delta_seconds.max(0.0);

        state.drag.set_target(inputs.drag_x, inputs.drag_y);
        state.drag.update(delta);
        let (drag_x, drag_y) = state.drag.position();

        // 1. restore the baseline
        state.parameters.load();

        // 2. motion layer, or the idle fallback when nothing plays
        let mut motion_updated = false;
        if state.motion_manager.is_finished() {
            if let Some((group, index)) = self.config().default_motion() {
                self.request_idle_motion(state, group, index);
            }
        } else {
            motion_updated = state.motion_manager.update(&mut state.parameters, delta);
        }
        state.parameters.save();

        // 3. blink only when no motion drove the eyes
        if !motion_updated {
            if let Some(eye_blink) = state.eye_blink.as_mut() {
                eye_blink.update(&mut state.parameters, delta);
            }
        }

        // 4. expression track
        state.expression_queue.update(&mut state.parameters, delta);

        // 5. pointer drag
        let params = &mut state.parameters;
        params.add(param_ids::ANGLE_X, drag_x * DRAG_HEAD_SCALE, 1.0);
        params.add(param_ids::ANGLE_Y, drag_y * DRAG_HEAD_SCALE, 1.0);
        params.add(param_ids::ANGLE_Z, drag_x * drag_y * -DRAG_HEAD_SCALE, 1.0);
        params.add(param_ids::BODY_ANGLE_X, drag_x * DRAG_BODY_SCALE, 1.0);
        params.add(param_ids::EYE_BALL_X, drag_x, 1.0);
        params.add(param_ids::EYE_BALL_Y, drag_y, 1.0);

        // 6. breath
        if let Some(breath) = state.breath.as_mut() {
            breath.update(&mut state.parameters, delta);
        }

        // 7. physics
        if let Some(physics) = state.physics.as_mut() {
            physics.evaluate(&mut state.parameters, delta);
        }

        // 8. lip sync
        if self.config().lip_sync_enabled {
            for id in &state.lip_sync_ids {
                state
                    .parameters
                    .add(id, inputs.lip_sync_value, inputs.lip_sync_weight);
            }
        }

        // 9. pose
        if let Some(pose) = state.pose.as_mut() {
            pose.evaluate(&mut state.parameters, delta);
        }

        // 10. commit
        if let Some(geometry) = state.geometry.as_mut() {
            geometry.update(&state.parameters);
        }
        state.ready = true;
        trace!("Composed frame (dt {:.4}s, motion {})", delta, motion_updated);
        true
    }

    /// The last committed frame, or `None` before the first one
    pub fn snapshot(&self) -> Option<FrameSnapshot> {
        let state = self.lock();
        if !state.ready {
            return None;
        }
        Some(FrameSnapshot {
            parameters: state
                .parameters
                .iter()
                .map(|(id, value)| (id.to_string(), value))
                .collect(),
            texture_bindings: state.texture_bindings.clone(),
            premultiplied_alpha: state.premultiplied_alpha,
            model_matrix: state.matrix.to_mat4(),
        })
    }
}
