//! Motion playback primitives
//!
//! A [`MotionQueue`] blends clip entries with fade weights; a [`MotionManager`]
//! wraps one queue with the priority slot that decides which request may take it over.

pub mod queue;
pub mod slot;

pub use queue::{MotionCallback, MotionCallbacks, MotionQueue};
pub use slot::{MotionManager, Reservation};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback precedence of a motion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    #[default]
    None = 0,
    Idle = 1,
    Normal = 2,
    Force = 3,
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Priority::None),
            1 => Ok(Priority::Idle),
            2 => Ok(Priority::Normal),
            3 => Ok(Priority::Force),
            other => Err(format!("invalid motion priority {other}, expected 0-3")),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::None => write!(f, "None"),
            Priority::Idle => write!(f, "Idle"),
            Priority::Normal => write!(f, "Normal"),
            Priority::Force => write!(f, "Force"),
        }
    }
}

/// Identifies one started queue entry. [`MotionHandle::NOT_STARTED`] is returned
/// for every request that was rejected or failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotionHandle(i64);

impl MotionHandle {
    pub const NOT_STARTED: MotionHandle = MotionHandle(-1);

    pub(crate) fn new(raw: i64) -> Self {
        MotionHandle(raw)
    }

    pub fn is_started(&self) -> bool {
        self.0 >= 0
    }

    pub fn raw(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MotionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_started() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "not-started")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::None < Priority::Idle);
        assert!(Priority::Idle < Priority::Normal);
        assert!(Priority::Normal < Priority::Force);
    }

    #[test]
    fn test_priority_from_number() {
        assert_eq!(Priority::try_from(2), Ok(Priority::Normal));
        assert!(Priority::try_from(7).is_err());
    }

    #[test]
    fn test_sentinel_handle() {
        assert!(!MotionHandle::NOT_STARTED.is_started());
        assert!(MotionHandle::new(0).is_started());
    }
}
