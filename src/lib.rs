// live2d-mascot: a headless Live2D character driver
// Ordered loading, priority-arbitrated motion playback, per-frame parameter composition

pub mod utils;
pub mod config;
pub mod assets;
pub mod runtime;
pub mod effects;
pub mod motion;
pub mod model;
pub mod compositor;
pub mod control;

// Re-export commonly used types for convenience
pub use config::{MascotConfig, load_config, load_config_from_file};
pub use assets::{ResourceFetcher, FileFetcher, HttpFetcher, TextureCache};
pub use compositor::{FrameInputs, FrameSnapshot};
pub use control::{Mascot, Renderer};
pub use model::{Model, LoadStage, LoadError};
pub use motion::{MotionHandle, Priority};
pub use runtime::{AnimationRuntime, HeadlessRuntime};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
