//! Animation runtime seam
//!
//! Everything that turns fetched bytes into live animation objects goes through
//! [`AnimationRuntime`]. The loader and compositor only see the traits here,
//! so a native Cubism binding and the bundled [`HeadlessRuntime`] are interchangeable.

pub mod headless;
pub mod motion3;

pub use headless::{HeadlessGeometry, HeadlessRuntime};

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::effects::Effect;
use crate::model::{ParameterBuffer, ParameterSpec};

/// Result type for runtime parsing
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Empty {kind} data")]
    Empty { kind: &'static str },

    #[error("Malformed {kind} data: {reason}")]
    Malformed { kind: &'static str, reason: String },

    #[error("Inconsistent {kind} data: {reason}")]
    Inconsistent { kind: &'static str, reason: String },
}

impl RuntimeError {
    pub fn malformed(kind: &'static str, reason: impl fmt::Display) -> Self {
        RuntimeError::Malformed {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Axis-aligned bounds of a drawable in model space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let (min_x, max_x) = (self.left.min(self.right), self.left.max(self.right));
        let (min_y, max_y) = (self.top.min(self.bottom), self.top.max(self.bottom));
        (min_x..=max_x).contains(&x) && (min_y..=max_y).contains(&y)
    }
}

/// Loaded model geometry: the parameter layout it exposes and the drawables it owns
pub trait ModelGeometry: Send {
    fn parameters(&self) -> Vec<ParameterSpec>;

    /// Canvas width and height in model units
    fn canvas_size(&self) -> (f32, f32);

    fn drawable_bounds(&self, drawable_id: &str) -> Option<Rect>;

    fn opacity(&self) -> f32 {
        1.0
    }

    /// Apply a composed parameter set
    fn update(&mut self, parameters: &ParameterBuffer);
}

/// A timed track that writes into the parameter buffer
pub trait AnimationClip: Send + Sync + fmt::Debug {
    /// `None` for looping or open-ended clips
    fn duration(&self) -> Option<f32>;

    fn fade_in_seconds(&self) -> f32;

    fn fade_out_seconds(&self) -> f32;

    /// Write the clip's values at `time` seconds into `params`, blended by `weight`
    fn apply(&self, params: &mut ParameterBuffer, time: f32, weight: f32);

    /// Names of user events whose timestamps fall in `(from, to]`
    fn events_between(&self, _from: f32, _to: f32) -> Vec<String> {
        Vec::new()
    }
}

/// Parse-time options for a motion clip
#[derive(Debug, Clone, Default)]
pub struct MotionOptions {
    /// Overrides the clip's own fade-in when set and non-negative
    pub fade_in: Option<f32>,
    pub fade_out: Option<f32>,
    pub eye_blink_ids: Vec<String>,
    pub lip_sync_ids: Vec<String>,
    pub check_consistency: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDataEntry {
    pub target: String,
    pub id: String,
    pub value: String,
}

/// Factory for every runtime-side object the loading pipeline produces
pub trait AnimationRuntime: Send + Sync {
    fn load_geometry(&self, bytes: &[u8], check_consistency: bool) -> RuntimeResult<Box<dyn ModelGeometry>>;

    fn has_moc_consistency(&self, bytes: &[u8]) -> bool;

    fn load_expression(&self, bytes: &[u8], name: &str) -> RuntimeResult<Arc<dyn AnimationClip>>;

    fn load_motion(&self, bytes: &[u8], options: &MotionOptions) -> RuntimeResult<Arc<dyn AnimationClip>>;

    fn load_physics(&self, bytes: &[u8]) -> RuntimeResult<Box<dyn Effect>>;

    fn load_pose(&self, bytes: &[u8]) -> RuntimeResult<Box<dyn Effect>>;

    fn load_user_data(&self, bytes: &[u8]) -> RuntimeResult<Vec<UserDataEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains_regardless_of_axis_direction() {
        let rect = Rect { left: -1.0, top: 1.0, right: 1.0, bottom: -1.0 };
        assert!(rect.contains(0.0, 0.0));
        assert!(rect.contains(1.0, -1.0));
        assert!(!rect.contains(1.5, 0.0));
    }
}
