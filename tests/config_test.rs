use std::io::Write;

use live2d_mascot::config::{
    load_config, load_config_from_file, save_config_to, MascotConfig, MotionName, DEFAULT_KEY,
};
use live2d_mascot::Priority;

#[test]
fn test_partial_toml_keeps_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
resources_path = "https://cdn.example.com/models/"
model_dir = "Haru"
target_fps = 30

[motion_names.default]
group = "Idle"
no = 0
priority = 1

[expression_names]
default = "smile"
"#
    )
    .unwrap();

    let config = load_config_from_file(file.path()).unwrap();
    assert_eq!(config.model_dir, "Haru");
    assert_eq!(config.target_fps, 30);
    assert_eq!(config.home_dir(), "https://cdn.example.com/models/Haru/");
    assert_eq!(config.default_motion(), Some(("Idle", 0)));
    assert_eq!(config.motion_name(DEFAULT_KEY).unwrap().priority, Priority::Idle);
    assert_eq!(config.default_expression(), Some("smile"));

    // Untouched keys keep their defaults
    assert_eq!(config.motion_group_tap_body, "TapBody");
    assert_eq!(config.lip_sync_weight, 0.8);
    assert!(config.moc_consistency_validation);
}

#[test]
fn test_broken_file_falls_back_to_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "target_fps = \"fast\"\n[[[").unwrap();

    assert!(load_config_from_file(file.path()).is_err());
    assert_eq!(load_config(Some(file.path())), MascotConfig::default());
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(Some(&dir.path().join("absent.toml")));
    assert_eq!(config, MascotConfig::default());
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("mascot.toml");

    let mut config = MascotConfig {
        model_dir: "Mark".to_string(),
        random_seed: Some(9),
        ..Default::default()
    };
    config
        .motion_names
        .insert("wave".to_string(), MotionName::new("TapBody", 2, Priority::Normal));
    config.view.scale = 1.25;

    save_config_to(&config, &path).unwrap();
    let loaded = load_config_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.motion_name("WAVE").and_then(MotionName::target), Some(("TapBody", 2)));
}
