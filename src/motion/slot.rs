use std::sync::Arc;

use tracing::debug;

use super::{MotionCallbacks, MotionHandle, MotionQueue, Priority};
use crate::model::ParameterBuffer;
use crate::runtime::AnimationClip;

/// Proof of a successful slot reservation.
///
/// Every reservation bumps the slot's token, so a reservation whose clip is
/// still being fetched can tell on resolution whether it was superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    token: u64,
    priority: Priority,
}

impl Reservation {
    pub fn priority(&self) -> Priority {
        self.priority
    }
}

/// The motion track: one queue guarded by a reserved/current priority pair
#[derive(Debug, Default)]
pub struct MotionManager {
    queue: MotionQueue,
    current: Priority,
    reserved: Priority,
    token: u64,
}

impl MotionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_priority(&self) -> Priority {
        self.current
    }

    pub fn reserved_priority(&self) -> Priority {
        self.reserved
    }

    /// Priority-gated reservation. Admitted only when `priority` is strictly above
    /// both the reserved and the playing priority; otherwise nothing changes.
    pub fn reserve(&mut self, priority: Priority) -> Option<Reservation> {
        if priority <= self.reserved || priority <= self.current {
            debug!(
                "Motion request at {} rejected (reserved {}, current {})",
                priority, self.reserved, self.current
            );
            return None;
        }
        Some(self.take(priority))
    }

    /// Unconditional reservation used for `Force` requests
    pub fn force_reserve(&mut self, priority: Priority) -> Reservation {
        self.take(priority)
    }

    fn take(&mut self, priority: Priority) -> Reservation {
        self.token += 1;
        self.reserved = priority;
        Reservation {
            token: self.token,
            priority,
        }
    }

    /// Whether no reservation has been taken since `reservation`
    pub fn is_current(&self, reservation: &Reservation) -> bool {
        self.token == reservation.token
    }

    /// Give back a reservation whose clip could not be resolved
    pub fn cancel(&mut self, reservation: Reservation) {
        if self.is_current(&reservation) {
            self.reserved = Priority::None;
        }
    }

    /// Hand a resolved clip to playback under `reservation`'s priority
    pub fn start(
        &mut self,
        reservation: Reservation,
        clip: Arc<dyn AnimationClip>,
        auto_release: bool,
        callbacks: MotionCallbacks,
    ) -> MotionHandle {
        if reservation.priority == self.reserved {
            self.reserved = Priority::None;
        }
        self.current = reservation.priority;
        self.queue.start(clip, auto_release, callbacks)
    }

    /// Advance the track; the playing priority drops to `None` once the queue drains
    pub fn update(&mut self, params: &mut ParameterBuffer, delta: f32) -> bool {
        let updated = self.queue.update(params, delta);
        if self.queue.is_finished() {
            self.current = Priority::None;
        }
        updated
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_finished()
    }

    pub fn is_playing(&self, handle: MotionHandle) -> bool {
        self.queue.is_playing(handle)
    }

    pub fn stop_all(&mut self) {
        self.queue.stop_all();
        self.current = Priority::None;
    }
}
