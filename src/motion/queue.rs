use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::MotionHandle;
use crate::model::ParameterBuffer;
use crate::runtime::AnimationClip;

/// Invoked with the entry's handle when it begins or finishes playing
pub type MotionCallback = Box<dyn FnOnce(MotionHandle) + Send>;

/// Per-entry began/finished handlers. They live on the queue entry, not on the
/// shared clip, so a cached clip never carries a previous caller's handlers.
#[derive(Default)]
pub struct MotionCallbacks {
    pub on_began: Option<MotionCallback>,
    pub on_finished: Option<MotionCallback>,
}

impl MotionCallbacks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn on_began(mut self, callback: impl FnOnce(MotionHandle) + Send + 'static) -> Self {
        self.on_began = Some(Box::new(callback));
        self
    }

    pub fn on_finished(mut self, callback: impl FnOnce(MotionHandle) + Send + 'static) -> Self {
        self.on_finished = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for MotionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionCallbacks")
            .field("on_began", &self.on_began.is_some())
            .field("on_finished", &self.on_finished.is_some())
            .finish()
    }
}

struct QueueEntry {
    handle: MotionHandle,
    clip: Arc<dyn AnimationClip>,
    auto_release: bool,
    /// Queue time at which the entry was started
    start_time: f32,
    began: bool,
    /// Queue time at which the entry stops contributing
    end_time: Option<f32>,
    last_local_time: f32,
    finished: bool,
    callbacks: MotionCallbacks,
}

impl QueueEntry {
    fn begin_fade_out(&mut self, now: f32) {
        let fade = self.clip.fade_out_seconds().max(0.0);
        let end = now + fade;
        self.end_time = Some(match self.end_time {
            Some(existing) => existing.min(end),
            None => end,
        });
        if fade <= 0.0 {
            self.finished = true;
        }
    }

    fn weight(&self, now: f32, start: f32) -> f32 {
        let fade_in = self.clip.fade_in_seconds();
        let fade_in_weight = if fade_in <= 0.0 {
            1.0
        } else {
            ease_sine((now - start) / fade_in)
        };

        let fade_out = self.clip.fade_out_seconds();
        let fade_out_weight = match self.end_time {
            Some(end) if fade_out > 0.0 => ease_sine((end - now) / fade_out),
            _ => 1.0,
        };

        fade_in_weight * fade_out_weight
    }
}

/// Sine ease over [0, 1], clamped at both ends
pub(crate) fn ease_sine(value: f32) -> f32 {
    if value <= 0.0 {
        0.0
    } else if value >= 1.0 {
        1.0
    } else {
        0.5 - 0.5 * (value * PI).cos()
    }
}

/// Ordered list of playing clips. Newer entries are applied after older ones,
/// and starting an entry fades out everything already queued.
pub struct MotionQueue {
    entries: Vec<QueueEntry>,
    next_handle: i64,
    time: f32,
}

impl MotionQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_handle: 0,
            time: 0.0,
        }
    }

    pub fn start(
        &mut self,
        clip: Arc<dyn AnimationClip>,
        auto_release: bool,
        callbacks: MotionCallbacks,
    ) -> MotionHandle {
        let now = self.time;
        for entry in &mut self.entries {
            entry.begin_fade_out(now);
        }

        let handle = MotionHandle::new(self.next_handle);
        self.next_handle += 1;

        let end_time = clip.duration().map(|duration| now + duration);
        self.entries.push(QueueEntry {
            handle,
            clip,
            auto_release,
            start_time: now,
            began: false,
            end_time,
            last_local_time: 0.0,
            finished: false,
            callbacks,
        });
        handle
    }

    /// Advance by `delta` seconds and write every live entry into `params`.
    /// Returns whether any entry contributed this step.
    pub fn update(&mut self, params: &mut ParameterBuffer, delta: f32) -> bool {
        self.time += delta.max(0.0);
        let now = self.time;
        let mut updated = false;

        for entry in &mut self.entries {
            if entry.finished {
                continue;
            }

            if !entry.began {
                entry.began = true;
                if let Some(on_began) = entry.callbacks.on_began.take() {
                    on_began(entry.handle);
                }
            }

            let start = entry.start_time;
            let local_time = now - start;
            let weight = entry.weight(now, start);
            entry.clip.apply(params, local_time, weight);

            for event in entry.clip.events_between(entry.last_local_time, local_time) {
                debug!("🎬 Motion {} fired event '{}'", entry.handle, event);
            }
            entry.last_local_time = local_time;
            updated = true;

            if matches!(entry.end_time, Some(end) if now >= end) {
                entry.finished = true;
            }
        }

        self.remove_finished();
        updated
    }

    fn remove_finished(&mut self) {
        let mut index = 0;
        while index < self.entries.len() {
            if !self.entries[index].finished {
                index += 1;
                continue;
            }
            let mut entry = self.entries.remove(index);
            if let Some(on_finished) = entry.callbacks.on_finished.take() {
                on_finished(entry.handle);
            }
            if entry.auto_release {
                trace!("Released auto-delete clip for motion {}", entry.handle);
            }
        }
    }

    /// True when nothing is queued
    pub fn is_finished(&self) -> bool {
        self.entries.iter().all(|entry| entry.finished)
    }

    pub fn is_playing(&self, handle: MotionHandle) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.handle == handle && !entry.finished)
    }

    /// Fade out every entry over its clip's fade-out time
    pub fn fade_out_all(&mut self) {
        let now = self.time;
        for entry in &mut self.entries {
            entry.begin_fade_out(now);
        }
        self.remove_finished();
    }

    /// Drop every entry immediately without firing finished handlers
    pub fn stop_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MotionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MotionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionQueue")
            .field("entries", &self.entries.len())
            .field("time", &self.time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterSpec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct ConstantClip {
        value: f32,
        duration: Option<f32>,
        fade: f32,
    }

    impl AnimationClip for ConstantClip {
        fn duration(&self) -> Option<f32> {
            self.duration
        }
        fn fade_in_seconds(&self) -> f32 {
            self.fade
        }
        fn fade_out_seconds(&self) -> f32 {
            self.fade
        }
        fn apply(&self, params: &mut ParameterBuffer, _time: f32, weight: f32) {
            params.set("ParamAngleX", self.value, weight);
        }
    }

    fn buffer() -> ParameterBuffer {
        ParameterBuffer::new(vec![ParameterSpec::new("ParamAngleX", -30.0, 30.0, 0.0)])
    }

    fn clip(value: f32, duration: Option<f32>, fade: f32) -> Arc<dyn AnimationClip> {
        Arc::new(ConstantClip { value, duration, fade })
    }

    #[test]
    fn test_entry_finishes_after_duration() {
        let mut queue = MotionQueue::new();
        let mut params = buffer();
        queue.start(clip(10.0, Some(1.0), 0.0), false, MotionCallbacks::none());

        assert!(queue.update(&mut params, 0.5));
        assert!(!queue.is_finished());
        assert_eq!(params.get("ParamAngleX"), Some(10.0));

        queue.update(&mut params, 0.6);
        assert!(queue.is_finished());
    }

    #[test]
    fn test_callbacks_fire_once() {
        let began = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (b, f) = (began.clone(), finished.clone());

        let mut queue = MotionQueue::new();
        let mut params = buffer();
        queue.start(
            clip(1.0, Some(0.2), 0.0),
            true,
            MotionCallbacks::none()
                .on_began(move |_| {
                    b.fetch_add(1, Ordering::SeqCst);
                })
                .on_finished(move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                }),
        );

        for _ in 0..10 {
            queue.update(&mut params, 0.1);
        }
        assert_eq!(began.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_entry_fades_out_previous() {
        let mut queue = MotionQueue::new();
        let mut params = buffer();
        queue.start(clip(10.0, None, 0.5), false, MotionCallbacks::none());
        queue.update(&mut params, 1.0);

        queue.start(clip(-10.0, None, 0.5), false, MotionCallbacks::none());
        assert_eq!(queue.len(), 2);
        queue.update(&mut params, 0.6);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_looping_entry_never_finishes_on_its_own() {
        let mut queue = MotionQueue::new();
        let mut params = buffer();
        queue.start(clip(3.0, None, 0.0), false, MotionCallbacks::none());
        for _ in 0..100 {
            queue.update(&mut params, 0.1);
        }
        assert!(!queue.is_finished());

        queue.fade_out_all();
        assert!(queue.is_finished());
    }

    #[test]
    fn test_ease_sine_bounds() {
        assert_eq!(ease_sine(-1.0), 0.0);
        assert_eq!(ease_sine(2.0), 1.0);
        assert!((ease_sine(0.5) - 0.5).abs() < 1e-6);
    }
}
