//! Motion and expression requests against a loaded model

use rand::Rng;
use tracing::{debug, warn};

use super::{Model, ModelState};
use crate::assets::fetch_bytes;
use crate::motion::{MotionCallbacks, MotionHandle, Priority, Reservation};
use crate::runtime::MotionOptions;

/// A reserved request whose clip still has to be fetched
pub(crate) struct PendingMotion {
    reservation: Reservation,
    key: String,
    path: String,
    options: MotionOptions,
    callbacks: MotionCallbacks,
}

enum Request {
    Started(MotionHandle),
    Rejected,
    Fetch(PendingMotion),
}

impl Model {
    /// Request playback of motion `index` in `group`.
    ///
    /// Rejected requests return [`MotionHandle::NOT_STARTED`] and change nothing.
    /// A cached clip starts immediately; otherwise the clip is fetched, played
    /// once, and dropped afterwards.
    pub async fn start_motion(
        &self,
        group: &str,
        index: usize,
        priority: Priority,
        callbacks: MotionCallbacks,
    ) -> MotionHandle {
        let request = {
            let mut state = self.lock();
            self.begin_motion(&mut state, group, index, priority, callbacks)
        };
        match request {
            Request::Started(handle) => handle,
            Request::Rejected => MotionHandle::NOT_STARTED,
            Request::Fetch(pending) => self.resolve_motion(pending).await,
        }
    }

    /// Request a uniformly random motion from `group`
    pub async fn start_random_motion(
        &self,
        group: &str,
        priority: Priority,
        callbacks: MotionCallbacks,
    ) -> MotionHandle {
        let index = {
            let mut state = self.lock();
            let count = state
                .setting
                .as_ref()
                .map(|setting| setting.motion_count(group))
                .unwrap_or(0);
            if count == 0 {
                debug!("Motion group {} has no entries", group);
                return MotionHandle::NOT_STARTED;
            }
            state.rng.random_range(0..count)
        };
        self.start_motion(group, index, priority, callbacks).await
    }

    /// Idle fallback issued from the frame tick. Must not suspend, so a cache
    /// miss is resolved on a separate task.
    pub(crate) fn request_idle_motion(&self, state: &mut ModelState, group: &str, index: usize) {
        let request = self.begin_motion(state, group, index, Priority::Idle, MotionCallbacks::none());
        let Request::Fetch(pending) = request else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let model = self.clone();
                runtime.spawn(async move {
                    model.resolve_motion(pending).await;
                });
            }
            Err(_) => {
                warn!("⚠️ No async runtime to fetch idle motion {}", pending.key);
                state.motion_manager.cancel(pending.reservation);
            }
        }
    }

    fn begin_motion(
        &self,
        state: &mut ModelState,
        group: &str,
        index: usize,
        priority: Priority,
        callbacks: MotionCallbacks,
    ) -> Request {
        if !state.stage.is_drawable() {
            debug!("Motion {}_{} requested before the model is drawable", group, index);
            return Request::Rejected;
        }
        let Some(setting) = state.setting.clone() else {
            return Request::Rejected;
        };
        let Some(motion) = setting.motion(group, index) else {
            debug!("No motion {}[{}] in the settings document", group, index);
            return Request::Rejected;
        };

        let reservation = if priority == Priority::Force {
            state.motion_manager.force_reserve(priority)
        } else {
            match state.motion_manager.reserve(priority) {
                Some(reservation) => reservation,
                None => return Request::Rejected,
            }
        };

        let key = format!("{group}_{index}");
        if let Some(clip) = state.motions.get(&key).cloned() {
            debug!("📋 Motion cache HIT for {}", key);
            let handle = state.motion_manager.start(reservation, clip, false, callbacks);
            return Request::Started(handle);
        }

        debug!("📋 Motion cache MISS for {}", key);
        Request::Fetch(PendingMotion {
            reservation,
            path: self.resource_path(&motion.file),
            options: self.motion_options(&setting, group, index),
            key,
            callbacks,
        })
    }

    async fn resolve_motion(&self, pending: PendingMotion) -> MotionHandle {
        let PendingMotion {
            reservation,
            key,
            path,
            options,
            callbacks,
        } = pending;

        let ctx = self.context();
        let parsed = match fetch_bytes(ctx.fetcher.as_ref(), &path).await {
            Ok(bytes) => ctx.runtime.load_motion(&bytes, &options).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let mut state = self.lock();
        match parsed {
            Err(reason) => {
                warn!("⚠️ Failed to load motion {}: {}", key, reason);
                state.motion_manager.cancel(reservation);
                MotionHandle::NOT_STARTED
            }
            Ok(_) if !state.motion_manager.is_current(&reservation) => {
                debug!("Discarding motion {}: its reservation was superseded", key);
                MotionHandle::NOT_STARTED
            }
            Ok(clip) => state.motion_manager.start(reservation, clip, true, callbacks),
        }
    }

    pub fn is_motion_playing(&self, handle: MotionHandle) -> bool {
        self.lock().motion_manager.is_playing(handle)
    }

    /// Reserved and playing priorities of the motion slot
    pub fn motion_priorities(&self) -> (Priority, Priority) {
        let state = self.lock();
        (
            state.motion_manager.reserved_priority(),
            state.motion_manager.current_priority(),
        )
    }

    /// Start a loaded expression on the expression track
    pub fn set_expression(&self, name: &str) -> MotionHandle {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.stage.is_drawable() {
            return MotionHandle::NOT_STARTED;
        }
        let Some(clip) = state
            .expressions
            .iter()
            .find(|expression| expression.name == name)
            .map(|expression| expression.clip.clone())
        else {
            debug!("Expression {} is not loaded", name);
            return MotionHandle::NOT_STARTED;
        };
        debug!("😊 Expression {}", name);
        state.expression_queue.start(clip, false, MotionCallbacks::none())
    }

    /// Start a uniformly random loaded expression
    pub fn set_random_expression(&self) -> MotionHandle {
        let name = {
            let mut state = self.lock();
            if !state.stage.is_drawable() || state.expressions.is_empty() {
                return MotionHandle::NOT_STARTED;
            }
            let count = state.expressions.len();
            let index = state.rng.random_range(0..count);
            state.expressions[index].name.clone()
        };
        self.set_expression(&name)
    }

    /// Fade out the expression track
    pub fn stop_expression(&self) {
        self.lock().expression_queue.fade_out_all();
    }
}
