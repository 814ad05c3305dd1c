//! The loaded character
//!
//! [`Model`] is a cheap, clonable handle. The loading pipeline (`pipeline.rs`),
//! playback requests (`playback.rs`) and the per-frame compositor all work on
//! the same [`ModelState`] behind a mutex that is never held across an `.await`.

pub mod layout;
pub mod parameters;
pub mod pipeline;
pub mod playback;
pub mod setting;
pub mod stage;

pub use layout::ModelMatrix;
pub use parameters::{ParameterBuffer, ParameterSpec};
pub use setting::{motion_display_name, ModelSetting};
pub use stage::{LoadStage, StageGate};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::assets::{FetchError, ResourceFetcher, TextureCache, TextureId};
use crate::config::MascotConfig;
use crate::effects::{Breath, DragFollower, Effect, EyeBlink};
use crate::motion::{MotionManager, MotionQueue};
use crate::runtime::{AnimationClip, AnimationRuntime, ModelGeometry, RuntimeError, UserDataEntry};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to fetch {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("Settings document {path} is unusable: {reason}")]
    Settings { path: String, reason: String },

    #[error("Model geometry {path} is unusable: {source}")]
    Geometry {
        path: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to set up layout: model geometry is not loaded")]
    Layout,

    #[error("Model loading failed")]
    Failed,

    #[error("Model was released")]
    Released,
}

/// Expected and resolved sub-resource counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    pub expressions_total: usize,
    pub expressions_loaded: usize,
    pub motions_total: usize,
    pub motions_loaded: usize,
    pub textures_total: usize,
    pub textures_loaded: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct LoadedExpression {
    /// Position in the settings document
    pub index: usize,
    pub name: String,
    pub clip: Arc<dyn AnimationClip>,
}

/// Services a model is built from
pub(crate) struct ModelContext {
    pub config: Arc<MascotConfig>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub runtime: Arc<dyn AnimationRuntime>,
    pub textures: Arc<TextureCache>,
    pub home_dir: String,
}

pub(crate) struct ModelState {
    pub stage: LoadStage,
    pub setting: Option<Arc<ModelSetting>>,
    pub geometry: Option<Box<dyn ModelGeometry>>,
    pub parameters: ParameterBuffer,
    pub matrix: ModelMatrix,
    pub motions: HashMap<String, Arc<dyn AnimationClip>>,
    pub expressions: Vec<LoadedExpression>,
    pub motion_manager: MotionManager,
    pub expression_queue: MotionQueue,
    pub physics: Option<Box<dyn Effect>>,
    pub pose: Option<Box<dyn Effect>>,
    pub eye_blink: Option<EyeBlink>,
    pub breath: Option<Breath>,
    pub user_data: Vec<UserDataEntry>,
    pub eye_blink_ids: Vec<String>,
    pub lip_sync_ids: Vec<String>,
    pub drag: DragFollower,
    pub counts: LoadCounts,
    pub consistent: bool,
    pub texture_bindings: Vec<Option<TextureId>>,
    pub premultiplied_alpha: bool,
    pub ready: bool,
    pub rng: StdRng,
}

impl ModelState {
    fn new(rng: StdRng) -> Self {
        Self {
            stage: LoadStage::LoadSettings,
            setting: None,
            geometry: None,
            parameters: ParameterBuffer::default(),
            matrix: ModelMatrix::default(),
            motions: HashMap::new(),
            expressions: Vec::new(),
            motion_manager: MotionManager::new(),
            expression_queue: MotionQueue::new(),
            physics: None,
            pose: None,
            eye_blink: None,
            breath: None,
            user_data: Vec::new(),
            eye_blink_ids: Vec::new(),
            lip_sync_ids: Vec::new(),
            drag: DragFollower::new(),
            counts: LoadCounts::default(),
            consistent: false,
            texture_bindings: Vec::new(),
            premultiplied_alpha: false,
            ready: false,
            rng,
        }
    }
}

/// Handle to one character instance
#[derive(Clone)]
pub struct Model {
    state: Arc<Mutex<ModelState>>,
    ctx: Arc<ModelContext>,
    stage_tx: Arc<watch::Sender<LoadStage>>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("home_dir", &self.ctx.home_dir)
            .field("stage", &self.stage())
            .finish()
    }
}

impl Model {
    pub fn new(
        config: Arc<MascotConfig>,
        fetcher: Arc<dyn ResourceFetcher>,
        runtime: Arc<dyn AnimationRuntime>,
        textures: Arc<TextureCache>,
    ) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (stage_tx, _) = watch::channel(LoadStage::LoadSettings);
        let home_dir = config.home_dir();

        info!("🎭 Creating model for {}", home_dir);

        Self {
            state: Arc::new(Mutex::new(ModelState::new(rng))),
            ctx: Arc::new(ModelContext {
                config,
                fetcher,
                runtime,
                textures,
                home_dir,
            }),
            stage_tx: Arc::new(stage_tx),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn context(&self) -> &ModelContext {
        &self.ctx
    }

    pub(crate) fn resource_path(&self, file: &str) -> String {
        format!("{}{}", self.ctx.home_dir, file)
    }

    pub(crate) fn enter_stage(&self, stage: LoadStage) {
        self.lock().stage = stage;
        self.stage_tx.send_replace(stage);
        if self.ctx.config.debug_log {
            info!("🔄 Load stage -> {}", stage);
        } else {
            debug!("🔄 Load stage -> {}", stage);
        }
    }

    pub fn config(&self) -> &MascotConfig {
        &self.ctx.config
    }

    pub fn home_dir(&self) -> &str {
        &self.ctx.home_dir
    }

    pub fn stage(&self) -> LoadStage {
        self.lock().stage
    }

    pub fn is_drawable(&self) -> bool {
        self.stage().is_drawable()
    }

    /// True once a frame has been composed and committed
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadStage> {
        self.stage_tx.subscribe()
    }

    /// Resolves when loading reaches a terminal stage
    pub async fn wait_until_loaded(&self) -> Result<(), LoadError> {
        let mut receiver = self.subscribe();
        let stage = *receiver
            .wait_for(|stage| stage.is_terminal())
            .await
            .map_err(|_| LoadError::Released)?;
        if stage.is_drawable() {
            Ok(())
        } else {
            Err(LoadError::Failed)
        }
    }

    pub fn counts(&self) -> LoadCounts {
        self.lock().counts
    }

    pub fn is_consistent(&self) -> bool {
        self.lock().consistent
    }

    pub fn setting(&self) -> Option<Arc<ModelSetting>> {
        self.lock().setting.clone()
    }

    pub fn parameter(&self, id: &str) -> Option<f32> {
        self.lock().parameters.get(id)
    }

    pub fn parameter_ids(&self) -> Vec<String> {
        self.lock().parameters.specs().iter().map(|spec| spec.id.clone()).collect()
    }

    pub fn texture_bindings(&self) -> Vec<Option<TextureId>> {
        self.lock().texture_bindings.clone()
    }

    pub fn model_matrix(&self) -> ModelMatrix {
        self.lock().matrix
    }

    pub fn user_data(&self) -> Vec<UserDataEntry> {
        self.lock().user_data.clone()
    }

    /// Smoothed pointer offset the compositor is currently applying
    pub fn drag_position(&self) -> (f32, f32) {
        self.lock().drag.position()
    }

    pub fn is_motion_cached(&self, group: &str, index: usize) -> bool {
        self.lock().motions.contains_key(&format!("{group}_{index}"))
    }

    /// Whether the view-space point lies on the named hit area
    pub fn hit_test(&self, area_name: &str, x: f32, y: f32) -> bool {
        let state = self.lock();
        if !state.stage.is_drawable() {
            return false;
        }
        let (Some(geometry), Some(setting)) = (state.geometry.as_ref(), state.setting.as_ref()) else {
            return false;
        };
        if geometry.opacity() < 1.0 {
            return false;
        }
        let Some(drawable_id) = setting.hit_area_id(area_name) else {
            return false;
        };
        let Some(bounds) = geometry.drawable_bounds(drawable_id) else {
            return false;
        };

        let model_x = state.matrix.invert_transform_x(x);
        let model_y = state.matrix.invert_transform_y(y);
        bounds.contains(model_x, model_y)
    }

    /// Clip names per motion group, in declaration order; `None` until drawable
    pub fn motions_info(&self) -> Option<Vec<(String, Vec<String>)>> {
        let state = self.lock();
        if !state.stage.is_drawable() {
            return None;
        }
        let setting = state.setting.as_ref()?;
        Some(
            setting
                .motion_groups()
                .map(|(group, motions)| {
                    let names = motions
                        .iter()
                        .map(|motion| motion_display_name(&motion.file))
                        .collect();
                    (group.to_string(), names)
                })
                .collect(),
        )
    }

    /// Loaded expression names in declaration order; `None` until drawable
    pub fn expressions_info(&self) -> Option<Vec<String>> {
        let state = self.lock();
        if !state.stage.is_drawable() {
            return None;
        }
        Some(state.expressions.iter().map(|e| e.name.clone()).collect())
    }

    /// Re-fetch the geometry and record whether the runtime considers it consistent
    pub async fn check_moc_consistency(&self) -> bool {
        let Some(file) = self
            .setting()
            .and_then(|setting| setting.model_file_name().map(str::to_string))
        else {
            return false;
        };

        let path = self.resource_path(&file);
        let consistent = match crate::assets::fetch_bytes(self.ctx.fetcher.as_ref(), &path).await {
            Ok(bytes) => !bytes.is_empty() && self.ctx.runtime.has_moc_consistency(&bytes),
            Err(e) => {
                tracing::warn!("⚠️ Consistency check could not fetch {}: {}", path, e);
                false
            }
        };

        self.lock().consistent = consistent;
        info!("Model geometry consistency for {}: {}", path, consistent);
        consistent
    }

    /// Drop every cache and parameter buffer and free this model's textures
    pub async fn release(&self) {
        let bindings = {
            let mut state = self.lock();
            state.motion_manager.stop_all();
            state.expression_queue.stop_all();
            state.motions.clear();
            state.expressions.clear();
            state.physics = None;
            state.pose = None;
            state.eye_blink = None;
            state.breath = None;
            state.geometry = None;
            state.parameters = ParameterBuffer::default();
            state.ready = false;
            std::mem::take(&mut state.texture_bindings)
        };

        for id in bindings.into_iter().flatten() {
            self.ctx.textures.release_handle(id).await;
        }
        info!("🧹 Released model {}", self.ctx.home_dir);
    }
}
