pub mod settings;

pub use settings::{
    ConfigError, MascotConfig, MotionName, ViewSettings, DEFAULT_KEY,
    default_config_path, load_config, load_config_from_file, load_config_from_str, save_config,
    save_config_to,
};
