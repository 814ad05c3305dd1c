use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::motion3::{Expression, KeyframeMotion};
use super::{
    AnimationClip, AnimationRuntime, ModelGeometry, MotionOptions, Rect, RuntimeError, RuntimeResult,
    UserDataEntry,
};
use crate::effects::Effect;
use crate::model::{ParameterBuffer, ParameterSpec};

const MOC3_MAGIC: &[u8; 4] = b"MOC3";

/// The standard parameter set every Cubism model ships with
fn standard_parameters() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::new("ParamAngleX", -30.0, 30.0, 0.0),
        ParameterSpec::new("ParamAngleY", -30.0, 30.0, 0.0),
        ParameterSpec::new("ParamAngleZ", -30.0, 30.0, 0.0),
        ParameterSpec::new("ParamEyeLOpen", 0.0, 1.0, 1.0),
        ParameterSpec::new("ParamEyeROpen", 0.0, 1.0, 1.0),
        ParameterSpec::new("ParamEyeBallX", -1.0, 1.0, 0.0),
        ParameterSpec::new("ParamEyeBallY", -1.0, 1.0, 0.0),
        ParameterSpec::new("ParamBrowLY", -1.0, 1.0, 0.0),
        ParameterSpec::new("ParamBrowRY", -1.0, 1.0, 0.0),
        ParameterSpec::new("ParamMouthForm", -1.0, 1.0, 0.0),
        ParameterSpec::new("ParamMouthOpenY", 0.0, 1.0, 0.0),
        ParameterSpec::new("ParamCheek", 0.0, 1.0, 0.0),
        ParameterSpec::new("ParamBodyAngleX", -10.0, 10.0, 0.0),
        ParameterSpec::new("ParamBodyAngleY", -10.0, 10.0, 0.0),
        ParameterSpec::new("ParamBodyAngleZ", -10.0, 10.0, 0.0),
        ParameterSpec::new("ParamBreath", 0.0, 1.0, 0.0),
    ]
}

/// Runtime that understands the JSON documents but does no mesh deformation.
///
/// Geometry is accepted when it carries the `MOC3` magic; drawables and their
/// bounds are whatever the runtime was configured with. Physics and pose
/// documents are validated and then evaluated as no-ops.
#[derive(Debug, Clone)]
pub struct HeadlessRuntime {
    canvas: (f32, f32),
    drawables: Vec<(String, Rect)>,
}

impl HeadlessRuntime {
    pub fn new() -> Self {
        Self {
            canvas: (1.0, 1.0),
            drawables: Vec::new(),
        }
    }

    pub fn with_canvas(mut self, width: f32, height: f32) -> Self {
        self.canvas = (width, height);
        self
    }

    pub fn with_drawable(mut self, id: impl Into<String>, bounds: Rect) -> Self {
        self.drawables.push((id.into(), bounds));
        self
    }
}

impl Default for HeadlessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationRuntime for HeadlessRuntime {
    fn load_geometry(&self, bytes: &[u8], check_consistency: bool) -> RuntimeResult<Box<dyn ModelGeometry>> {
        if bytes.is_empty() {
            return Err(RuntimeError::Empty { kind: "moc" });
        }
        if check_consistency && !self.has_moc_consistency(bytes) {
            return Err(RuntimeError::Inconsistent {
                kind: "moc",
                reason: "missing MOC3 header".to_string(),
            });
        }
        debug!("Loaded {} bytes of model geometry", bytes.len());
        Ok(Box::new(HeadlessGeometry {
            parameters: standard_parameters(),
            canvas: self.canvas,
            drawables: self.drawables.clone(),
            opacity: 1.0,
            updates: 0,
            last_values: Vec::new(),
        }))
    }

    fn has_moc_consistency(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(MOC3_MAGIC)
    }

    fn load_expression(&self, bytes: &[u8], name: &str) -> RuntimeResult<Arc<dyn AnimationClip>> {
        Ok(Arc::new(Expression::parse(bytes, name)?))
    }

    fn load_motion(&self, bytes: &[u8], options: &MotionOptions) -> RuntimeResult<Arc<dyn AnimationClip>> {
        Ok(Arc::new(KeyframeMotion::parse(bytes, options)?))
    }

    fn load_physics(&self, bytes: &[u8]) -> RuntimeResult<Box<dyn Effect>> {
        Ok(Box::new(PassiveEffect::parse(bytes, "physics")?))
    }

    fn load_pose(&self, bytes: &[u8]) -> RuntimeResult<Box<dyn Effect>> {
        Ok(Box::new(PassiveEffect::parse(bytes, "pose")?))
    }

    fn load_user_data(&self, bytes: &[u8]) -> RuntimeResult<Vec<UserDataEntry>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct UserDataDocument {
            #[serde(default)]
            user_data: Vec<UserDataEntry>,
        }

        if bytes.is_empty() {
            return Err(RuntimeError::Empty { kind: "user data" });
        }
        let document: UserDataDocument =
            serde_json::from_slice(bytes).map_err(|e| RuntimeError::malformed("user data", e))?;
        Ok(document.user_data)
    }
}

/// Geometry without meshes; records the last committed parameter set
#[derive(Debug)]
pub struct HeadlessGeometry {
    parameters: Vec<ParameterSpec>,
    canvas: (f32, f32),
    drawables: Vec<(String, Rect)>,
    opacity: f32,
    updates: u64,
    last_values: Vec<f32>,
}

impl HeadlessGeometry {
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    pub fn last_values(&self) -> &[f32] {
        &self.last_values
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
    }
}

impl ModelGeometry for HeadlessGeometry {
    fn parameters(&self) -> Vec<ParameterSpec> {
        self.parameters.clone()
    }

    fn canvas_size(&self) -> (f32, f32) {
        self.canvas
    }

    fn drawable_bounds(&self, drawable_id: &str) -> Option<Rect> {
        self.drawables
            .iter()
            .find(|(id, _)| id == drawable_id)
            .map(|(_, rect)| *rect)
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }

    fn update(&mut self, parameters: &ParameterBuffer) {
        self.updates += 1;
        self.last_values.clear();
        self.last_values.extend_from_slice(parameters.values());
    }
}

/// A validated physics or pose document with no evaluator behind it
#[derive(Debug)]
struct PassiveEffect {
    kind: &'static str,
}

impl PassiveEffect {
    fn parse(bytes: &[u8], kind: &'static str) -> RuntimeResult<Self> {
        if bytes.is_empty() {
            return Err(RuntimeError::Empty { kind });
        }
        let document: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| RuntimeError::malformed(kind, e))?;
        if !document.is_object() {
            return Err(RuntimeError::malformed(kind, "expected a JSON object"));
        }
        Ok(Self { kind })
    }
}

impl Effect for PassiveEffect {
    fn name(&self) -> &str {
        self.kind
    }

    fn evaluate(&mut self, _params: &mut ParameterBuffer, _delta: f32) {}
}
