//! Ordered asset loading
//!
//! One async task walks the stage sequence. Fan-out stages spawn one fetch per
//! item into a `JoinSet` and only advance when their [`StageGate`] opens.

use std::sync::Arc;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::setting::ModelSetting;
use super::stage::{LoadStage, StageGate};
use super::{LoadError, LoadedExpression, Model, ModelMatrix, ParameterBuffer};
use crate::assets::{fetch_bytes, ResourceFetcher};
use crate::effects::{Breath, EyeBlink};
use crate::runtime::MotionOptions;

/// Textures are always uploaded with premultiplied alpha
const PREMULTIPLIED_ALPHA: bool = true;

/// Fetch for a degradable resource: transport failures become an empty buffer
async fn fetch_or_absent(fetcher: Arc<dyn ResourceFetcher>, path: String) -> Bytes {
    match fetch_bytes(fetcher.as_ref(), &path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("⚠️ {}; treating it as absent", e);
            Bytes::new()
        }
    }
}

impl Model {
    /// Run the pipeline on its own task
    pub fn spawn_load(&self) -> JoinHandle<Result<(), LoadError>> {
        let model = self.clone();
        tokio::spawn(async move { model.load_assets().await })
    }

    /// Run the pipeline to a terminal stage
    pub async fn load_assets(&self) -> Result<(), LoadError> {
        info!("🚀 Loading model from {}", self.home_dir());
        let result = self.run_pipeline().await;
        match &result {
            Ok(()) => info!("✅ Model {} is ready", self.home_dir()),
            Err(e) => {
                error!("❌ Model loading failed: {}", e);
                self.enter_stage(LoadStage::Failed);
            }
        }
        result
    }

    async fn run_pipeline(&self) -> Result<(), LoadError> {
        self.enter_stage(LoadStage::LoadSettings);
        let setting = Arc::new(self.load_settings().await?);
        self.lock().setting = Some(setting.clone());

        let mut stage = LoadStage::LoadSettings.next(&setting);
        while !stage.is_terminal() {
            self.enter_stage(stage);
            self.run_stage(stage, &setting).await?;
            stage = stage.next(&setting);
        }
        self.enter_stage(stage);
        Ok(())
    }

    async fn run_stage(&self, stage: LoadStage, setting: &Arc<ModelSetting>) -> Result<(), LoadError> {
        match stage {
            LoadStage::LoadModelGeometry => self.load_geometry(setting).await?,
            LoadStage::LoadExpressions => self.load_expressions(setting).await,
            LoadStage::LoadPhysics => self.load_physics(setting).await,
            LoadStage::LoadPose => self.load_pose(setting).await,
            LoadStage::SetupEyeBlink => self.setup_eye_blink(setting),
            LoadStage::SetupBreath => {
                self.lock().breath = Some(Breath::default());
            }
            LoadStage::LoadUserData => self.load_user_data(setting).await,
            LoadStage::SetupEyeBlinkIds => {
                self.lock().eye_blink_ids = setting.eye_blink_parameter_ids();
            }
            LoadStage::SetupLipSyncIds => {
                self.lock().lip_sync_ids = setting.lip_sync_parameter_ids();
            }
            LoadStage::SetupLayout => self.setup_layout(setting)?,
            LoadStage::LoadMotions => self.load_motions(setting).await,
            LoadStage::LoadTextures => self.load_textures(setting).await,
            LoadStage::LoadSettings | LoadStage::CompleteSetup | LoadStage::Failed => {}
        }
        Ok(())
    }

    async fn load_settings(&self) -> Result<ModelSetting, LoadError> {
        let path = self.resource_path(&self.config().settings_file_name());
        let bytes = fetch_bytes(self.context().fetcher.as_ref(), &path)
            .await
            .map_err(|source| LoadError::Fetch {
                path: path.clone(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(LoadError::Settings {
                path,
                reason: "empty document".to_string(),
            });
        }
        ModelSetting::from_bytes(&bytes).map_err(|e| LoadError::Settings {
            path,
            reason: e.to_string(),
        })
    }

    async fn load_geometry(&self, setting: &ModelSetting) -> Result<(), LoadError> {
        let Some(file) = setting.model_file_name() else {
            error!("❌ Model data does not exist");
            return Err(LoadError::Settings {
                path: self.resource_path(&self.config().settings_file_name()),
                reason: "no model geometry declared".to_string(),
            });
        };
        let path = self.resource_path(file);
        let ctx = self.context();

        let bytes = fetch_bytes(ctx.fetcher.as_ref(), &path)
            .await
            .map_err(|source| LoadError::Fetch {
                path: path.clone(),
                source,
            })?;
        let consistent = !bytes.is_empty() && ctx.runtime.has_moc_consistency(&bytes);
        let geometry = ctx
            .runtime
            .load_geometry(&bytes, ctx.config.moc_consistency_validation)
            .map_err(|source| LoadError::Geometry { path, source })?;

        let (width, height) = geometry.canvas_size();
        let mut state = self.lock();
        state.parameters = ParameterBuffer::new(geometry.parameters());
        state.matrix = ModelMatrix::new(width, height);
        state.geometry = Some(geometry);
        state.consistent = consistent;
        Ok(())
    }

    async fn load_expressions(&self, setting: &ModelSetting) {
        let expressions = setting.expressions();
        self.lock().counts.expressions_total = expressions.len();

        let mut gate = StageGate::new(expressions.len());
        let mut fetches = JoinSet::new();
        for (index, expression) in expressions.iter().enumerate() {
            let fetcher = self.context().fetcher.clone();
            let path = self.resource_path(&expression.file);
            fetches.spawn(async move { (index, fetch_or_absent(fetcher, path).await) });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, bytes)) => {
                    let name = &expressions[index].name;
                    match self.context().runtime.load_expression(&bytes, name) {
                        Ok(clip) => {
                            let mut state = self.lock();
                            let position = state.expressions.partition_point(|e| e.index < index);
                            state.expressions.insert(
                                position,
                                LoadedExpression {
                                    index,
                                    name: name.clone(),
                                    clip,
                                },
                            );
                            state.counts.expressions_loaded += 1;
                        }
                        Err(e) => warn!("⚠️ Expression {} unavailable: {}", name, e),
                    }
                }
                Err(e) => error!("❌ Expression fetch task failed: {}", e),
            }
            if gate.resolve(true) {
                break;
            }
        }
        debug!("Loaded {}/{} expressions", gate.completed(), gate.total());
    }

    async fn load_physics(&self, setting: &ModelSetting) {
        let Some(file) = setting.physics_file_name() else {
            return;
        };
        let bytes = fetch_or_absent(self.context().fetcher.clone(), self.resource_path(file)).await;
        match self.context().runtime.load_physics(&bytes) {
            Ok(physics) => self.lock().physics = Some(physics),
            Err(e) => warn!("⚠️ Physics disabled: {}", e),
        }
    }

    async fn load_pose(&self, setting: &ModelSetting) {
        let Some(file) = setting.pose_file_name() else {
            return;
        };
        let bytes = fetch_or_absent(self.context().fetcher.clone(), self.resource_path(file)).await;
        match self.context().runtime.load_pose(&bytes) {
            Ok(pose) => self.lock().pose = Some(pose),
            Err(e) => warn!("⚠️ Pose disabled: {}", e),
        }
    }

    fn setup_eye_blink(&self, setting: &ModelSetting) {
        let ids = setting.eye_blink_parameter_ids();
        if ids.is_empty() {
            return;
        }
        let mut state = self.lock();
        let blink = match self.config().random_seed {
            Some(seed) => EyeBlink::with_rng(ids, StdRng::seed_from_u64(seed)),
            None => EyeBlink::new(ids),
        };
        state.eye_blink = Some(blink);
    }

    async fn load_user_data(&self, setting: &ModelSetting) {
        let Some(file) = setting.user_data_file_name() else {
            return;
        };
        let bytes = fetch_or_absent(self.context().fetcher.clone(), self.resource_path(file)).await;
        match self.context().runtime.load_user_data(&bytes) {
            Ok(entries) => self.lock().user_data = entries,
            Err(e) => warn!("⚠️ User data unavailable: {}", e),
        }
    }

    fn setup_layout(&self, setting: &ModelSetting) -> Result<(), LoadError> {
        let mut state = self.lock();
        if state.geometry.is_none() {
            error!("❌ Failed to setupLayout()");
            return Err(LoadError::Layout);
        }
        state.matrix.setup_from_layout(setting.layout());
        Ok(())
    }

    pub(crate) fn motion_options(&self, setting: &ModelSetting, group: &str, index: usize) -> MotionOptions {
        let motion = setting.motion(group, index);
        MotionOptions {
            fade_in: motion.and_then(|m| m.fade_in_time),
            fade_out: motion.and_then(|m| m.fade_out_time),
            eye_blink_ids: setting.eye_blink_parameter_ids(),
            lip_sync_ids: setting.lip_sync_parameter_ids(),
            check_consistency: self.config().motion_consistency_validation,
        }
    }

    async fn load_motions(&self, setting: &ModelSetting) {
        let mut items = Vec::new();
        for (group, motions) in setting.motion_groups() {
            for (index, motion) in motions.iter().enumerate() {
                items.push((group.to_string(), index, motion.file.clone()));
            }
        }

        {
            let mut state = self.lock();
            state.parameters.save();
            state.counts.motions_total = items.len();
        }

        let mut gate = StageGate::new(items.len());
        if gate.try_open() {
            return;
        }

        let mut fetches = JoinSet::new();
        for (group, index, file) in items {
            let fetcher = self.context().fetcher.clone();
            let path = self.resource_path(&file);
            fetches.spawn(async move { (group, index, fetch_or_absent(fetcher, path).await) });
        }

        while let Some(joined) = fetches.join_next().await {
            let parsed = match joined {
                Ok((group, index, bytes)) => {
                    let options = self.motion_options(setting, &group, index);
                    let key = format!("{group}_{index}");
                    match self.context().runtime.load_motion(&bytes, &options) {
                        Ok(clip) => {
                            let mut state = self.lock();
                            state.motions.insert(key, clip);
                            state.counts.motions_loaded += 1;
                            true
                        }
                        Err(e) => {
                            warn!("⚠️ Motion {} unavailable: {}", key, e);
                            self.drop_motion_from_total();
                            false
                        }
                    }
                }
                Err(e) => {
                    error!("❌ Motion fetch task failed: {}", e);
                    self.drop_motion_from_total();
                    false
                }
            };
            if gate.resolve(parsed) {
                break;
            }
        }
        debug!("Pre-loaded {} motions", gate.completed());
    }

    fn drop_motion_from_total(&self) {
        let mut state = self.lock();
        state.counts.motions_total = state.counts.motions_total.saturating_sub(1);
    }

    async fn load_textures(&self, setting: &ModelSetting) {
        let declared = setting.textures();
        let textures: Vec<(usize, String)> = declared
            .iter()
            .enumerate()
            .filter(|(_, file)| !file.is_empty())
            .map(|(index, file)| (index, self.resource_path(file)))
            .collect();

        {
            let mut state = self.lock();
            state.motion_manager.stop_all();
            state.parameters.save();
            state.texture_bindings = vec![None; declared.len()];
            state.premultiplied_alpha = PREMULTIPLIED_ALPHA;
            state.counts.textures_total = textures.len();
        }

        let mut gate = StageGate::new(textures.len());
        if gate.try_open() {
            return;
        }

        let mut loads = JoinSet::new();
        for (index, path) in textures {
            let cache = self.context().textures.clone();
            loads.spawn(async move {
                let result = cache.get(&path, PREMULTIPLIED_ALPHA).await;
                (index, path, result)
            });
        }

        while let Some(joined) = loads.join_next().await {
            match joined {
                Ok((index, _, Ok(texture))) => {
                    let mut state = self.lock();
                    state.texture_bindings[index] = Some(texture.id);
                    state.counts.textures_loaded += 1;
                }
                Ok((index, path, Err(e))) => {
                    error!("❌ Texture {} ({}) unavailable: {}", index, path, e);
                }
                Err(e) => error!("❌ Texture load task failed: {}", e),
            }
            if gate.resolve(true) {
                break;
            }
        }
    }
}
