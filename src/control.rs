//! Embedding-facing control surface
//!
//! [`Mascot`] routes pointer input through hit areas, exposes named playback,
//! and drives the frame loop that ticks the compositor and triggers drawing.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::compositor::{FrameInputs, FrameSnapshot};
use crate::model::{LoadError, Model};
use crate::motion::{MotionCallbacks, MotionHandle, Priority};
use crate::utils::timing::FrameClock;

/// Longest step a single frame may advance the animation by
const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// The rendering collaborator. Called once per composed frame.
pub trait Renderer: Send + Sync {
    fn draw(&self, frame: &FrameSnapshot);
}

/// What a click ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    Expression(MotionHandle),
    Motion(MotionHandle),
}

#[derive(Debug)]
struct InputState {
    drag_x: f32,
    drag_y: f32,
    lip_sync_value: f32,
    lip_sync_weight: f32,
    /// Bumped on every look change so a stale look-at timeout does nothing
    look_generation: u64,
    clock: FrameClock,
}

impl InputState {
    fn frame_inputs(&mut self) -> FrameInputs {
        FrameInputs {
            delta_seconds: self.clock.tick(),
            drag_x: self.drag_x,
            drag_y: self.drag_y,
            lip_sync_value: self.lip_sync_value,
            lip_sync_weight: self.lip_sync_weight,
        }
    }
}

fn lock_input(input: &Mutex<InputState>) -> MutexGuard<'_, InputState> {
    input.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct FrameLoop {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Mascot {
    model: Model,
    input: Arc<Mutex<InputState>>,
    frame_loop: Mutex<Option<FrameLoop>>,
}

impl std::fmt::Debug for Mascot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mascot")
            .field("model", &self.model)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Mascot {
    pub fn new(model: Model) -> Self {
        let lip_sync_weight = model.config().lip_sync_weight;
        Self {
            model,
            input: Arc::new(Mutex::new(InputState {
                drag_x: 0.0,
                drag_y: 0.0,
                lip_sync_value: 0.0,
                lip_sync_weight,
                look_generation: 0,
                clock: FrameClock::with_max_delta(MAX_FRAME_DELTA),
            })),
            frame_loop: Mutex::new(None),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Start loading the model in the background
    pub fn spawn_load(&self) -> JoinHandle<Result<(), LoadError>> {
        self.model.spawn_load()
    }

    pub async fn wait_until_loaded(&self) -> Result<(), LoadError> {
        self.model.wait_until_loaded().await
    }

    fn set_drag(&self, x: f32, y: f32) -> u64 {
        let mut input = lock_input(&self.input);
        input.drag_x = x.clamp(-1.0, 1.0);
        input.drag_y = y.clamp(-1.0, 1.0);
        input.look_generation += 1;
        input.look_generation
    }

    /// Pointer moved to a view-space position
    pub fn on_pointer_moved(&self, x: f32, y: f32) {
        self.set_drag(x, y);
    }

    /// Route a click: head plays a random expression, body a random tap motion,
    /// anywhere else a random expression.
    pub async fn on_click(&self, x: f32, y: f32) -> ClickAction {
        self.set_drag(0.0, 0.0);
        let config = self.model.config();
        if config.debug_touch_log {
            info!("👆 Click at ({:.2}, {:.2})", x, y);
        }

        if self.model.hit_test(&config.hit_area_name_head, x, y) {
            debug!("Hit area {}", config.hit_area_name_head);
            return ClickAction::Expression(self.model.set_random_expression());
        }
        if self.model.hit_test(&config.hit_area_name_body, x, y) {
            debug!("Hit area {}", config.hit_area_name_body);
            let handle = self
                .model
                .start_random_motion(&config.motion_group_tap_body, Priority::Normal, MotionCallbacks::none())
                .await;
            return ClickAction::Motion(handle);
        }
        ClickAction::Expression(self.model.set_random_expression())
    }

    /// Turn towards `(x, y)`; with a duration, return to centre afterwards
    pub fn look_at(&self, x: f32, y: f32, duration: Option<Duration>) {
        let generation = self.set_drag(x, y);
        let Some(duration) = duration else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("⚠️ No async runtime; look_at timeout ignored");
            return;
        };
        let input = self.input.clone();
        runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            let mut input = lock_input(&input);
            if input.look_generation == generation {
                input.drag_x = 0.0;
                input.drag_y = 0.0;
            }
        });
    }

    pub fn reset_angle(&self) {
        self.set_drag(0.0, 0.0);
    }

    pub fn drag_target(&self) -> (f32, f32) {
        let input = lock_input(&self.input);
        (input.drag_x, input.drag_y)
    }

    pub async fn play_motion(&self, group: &str, index: usize, priority: Priority) -> MotionHandle {
        self.model
            .start_motion(group, index, priority, MotionCallbacks::none())
            .await
    }

    /// Play a motion registered under `name` in the configuration
    pub async fn play_named_motion(&self, name: &str) -> MotionHandle {
        let Some(named) = self.model.config().motion_name(name).cloned() else {
            debug!("No configured motion named {}", name);
            return MotionHandle::NOT_STARTED;
        };
        match named.target() {
            Some((group, index)) => self.play_motion(group, index, named.priority).await,
            None => MotionHandle::NOT_STARTED,
        }
    }

    pub fn play_expression(&self, name: &str) -> MotionHandle {
        self.model.set_expression(name)
    }

    pub fn stop_expression(&self) {
        self.model.stop_expression();
    }

    /// Back to the configured default expression. Does nothing when none is set.
    pub fn reset_default_expression(&self) -> MotionHandle {
        match self.model.config().default_expression() {
            Some(name) => self.model.set_expression(name),
            None => MotionHandle::NOT_STARTED,
        }
    }

    pub fn motions_info(&self) -> Option<Vec<(String, Vec<String>)>> {
        self.model.motions_info()
    }

    pub fn expressions_info(&self) -> Option<Vec<String>> {
        self.model.expressions_info()
    }

    /// Lip-sync amplitude in [0, 1]; the weight defaults to the configured one
    pub fn set_lip_sync(&self, value: f32, weight: Option<f32>) {
        let mut input = lock_input(&self.input);
        input.lip_sync_value = value.clamp(0.0, 1.0);
        input.lip_sync_weight = weight.unwrap_or(self.model.config().lip_sync_weight);
    }

    /// Sample inputs for the next frame, advancing the frame clock
    pub fn frame_inputs(&self) -> FrameInputs {
        lock_input(&self.input).frame_inputs()
    }

    /// Compose one frame with freshly sampled inputs
    pub fn tick(&self) -> bool {
        let inputs = self.frame_inputs();
        self.model.update(&inputs)
    }

    /// Start ticking at the configured frame rate, calling `renderer` after every composed frame
    pub fn start(&self, renderer: Arc<dyn Renderer>) {
        let mut slot = self.frame_loop.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_some() {
            return;
        }

        lock_input(&self.input).clock.reset();
        let fps = self.model.config().target_fps.max(1);
        let period = Duration::from_secs_f64(1.0 / fps as f64);
        let (stop, mut stopped) = watch::channel(false);
        let model = self.model.clone();
        let input = self.input.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let inputs = lock_input(&input).frame_inputs();
                        if model.update(&inputs) {
                            if let Some(frame) = model.snapshot() {
                                renderer.draw(&frame);
                            }
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Frame loop stopped");
        });

        info!("▶️ Frame loop started at {} fps", fps);
        *slot = Some(FrameLoop { stop, task });
    }

    fn take_frame_loop(&self) -> Option<JoinHandle<()>> {
        let frame_loop = self.frame_loop.lock().unwrap_or_else(|p| p.into_inner()).take()?;
        let _ = frame_loop.stop.send(true);
        info!("⏸️ Frame loop stopped");
        Some(frame_loop.task)
    }

    /// Stop the frame loop; the model keeps its state
    pub fn stop(&self) {
        self.take_frame_loop();
    }

    pub fn is_running(&self) -> bool {
        self.frame_loop
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Stop the loop, drop caches and free textures
    pub async fn release(&self) {
        if let Some(task) = self.take_frame_loop() {
            let _ = task.await;
        }
        self.model.release().await;
    }
}

impl Drop for Mascot {
    fn drop(&mut self) {
        self.stop();
    }
}
