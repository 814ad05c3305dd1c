#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use live2d_mascot::assets::{FetchError, FetchResponse, HeadlessBackend, ResourceFetcher, TextureCache};
use live2d_mascot::runtime::{HeadlessRuntime, Rect};
use live2d_mascot::{MascotConfig, Model};

pub const MODEL_DIR: &str = "Haru";
pub const HOME: &str = "Haru/";

/// In-memory fetcher with per-path delays and fetch counters
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, (FetchResponse, Option<Duration>)>>,
    fetches: Mutex<Vec<String>>,
    panics: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, path: impl Into<String>, body: impl Into<Bytes>) {
        self.insert_response(path, FetchResponse::ok(body), None);
    }

    pub fn insert_delayed(&self, path: impl Into<String>, body: impl Into<Bytes>, delay: Duration) {
        self.insert_response(path, FetchResponse::ok(body), Some(delay));
    }

    pub fn insert_status(&self, path: impl Into<String>, status: u16) {
        self.insert_response(path, FetchResponse::status(status), None);
    }

    pub fn insert_response(&self, path: impl Into<String>, response: FetchResponse, delay: Option<Duration>) {
        self.responses.lock().unwrap().insert(path.into(), (response, delay));
    }

    /// Make fetching `path` panic inside the loading task
    pub fn insert_panic(&self, path: impl Into<String>) {
        self.panics.lock().unwrap().push(path.into());
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetches.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    /// Number of fetches whose path contains `fragment`
    pub fn fetches_matching(&self, fragment: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(fragment))
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl ResourceFetcher for MockFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchResponse, FetchError> {
        self.fetches.lock().unwrap().push(path.to_string());
        let panics = self.panics.lock().unwrap().iter().any(|p| p == path);
        if panics {
            panic!("fetch of {path} blew up");
        }
        let entry = self.responses.lock().unwrap().get(path).cloned();
        match entry {
            Some((response, delay)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(response)
            }
            None => Ok(FetchResponse::status(404)),
        }
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 128, 0, 200]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn geometry_bytes() -> Vec<u8> {
    b"MOC3\x04\x00\x00\x00".to_vec()
}

/// A one-curve motion moving ParamAngleX from 0 to `peak` over `duration` seconds
pub fn motion_json(duration: f32, peak: f32) -> String {
    json!({
        "Version": 3,
        "Meta": {
            "Duration": duration,
            "Fps": 30.0,
            "Loop": false,
            "CurveCount": 1,
            "TotalSegmentCount": 1,
            "TotalPointCount": 2,
            "FadeInTime": 0.0,
            "FadeOutTime": 0.0
        },
        "Curves": [
            { "Target": "Parameter", "Id": "ParamAngleX", "Segments": [0.0, 0.0, 0, duration, peak] }
        ]
    })
    .to_string()
}

pub fn expression_json(param: &str, value: f32) -> String {
    json!({
        "Type": "Live2D Expression",
        "FadeInTime": 0.0,
        "FadeOutTime": 0.0,
        "Parameters": [ { "Id": param, "Value": value, "Blend": "Add" } ]
    })
    .to_string()
}

pub fn motion_path(group: &str, index: usize) -> String {
    format!("{HOME}motions/{group}_{index}.motion3.json")
}

pub fn expression_path(name: &str) -> String {
    format!("{HOME}expressions/{name}.exp3.json")
}

pub fn texture_path(index: usize) -> String {
    format!("{HOME}textures/texture_{index:02}.png")
}

pub fn settings_path() -> String {
    format!("{HOME}{MODEL_DIR}.model3.json")
}

pub fn geometry_path() -> String {
    format!("{HOME}{MODEL_DIR}.moc3")
}

/// Describes a model directory and installs it into a [`MockFetcher`]
#[derive(Debug, Clone, Default)]
pub struct ModelFixture {
    pub motion_groups: Vec<(String, usize)>,
    pub expressions: Vec<String>,
    pub textures: usize,
    pub physics: bool,
    pub pose: bool,
    pub eye_blink_ids: Vec<String>,
    pub lip_sync_ids: Vec<String>,
}

impl ModelFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn motion_group(mut self, name: &str, count: usize) -> Self {
        self.motion_groups.push((name.to_string(), count));
        self
    }

    pub fn expression(mut self, name: &str) -> Self {
        self.expressions.push(name.to_string());
        self
    }

    pub fn textures(mut self, count: usize) -> Self {
        self.textures = count;
        self
    }

    pub fn physics(mut self) -> Self {
        self.physics = true;
        self
    }

    pub fn pose(mut self) -> Self {
        self.pose = true;
        self
    }

    pub fn eye_blink(mut self, ids: &[&str]) -> Self {
        self.eye_blink_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn lip_sync(mut self, ids: &[&str]) -> Self {
        self.lip_sync_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn settings_json(&self) -> String {
        let mut refs = json!({
            "Moc": format!("{MODEL_DIR}.moc3"),
            "Textures": (0..self.textures)
                .map(|i| format!("textures/texture_{i:02}.png"))
                .collect::<Vec<_>>(),
        });

        if !self.expressions.is_empty() {
            refs["Expressions"] = Value::Array(
                self.expressions
                    .iter()
                    .map(|name| json!({ "Name": name, "File": format!("expressions/{name}.exp3.json") }))
                    .collect(),
            );
        }
        if !self.motion_groups.is_empty() {
            let mut motions = serde_json::Map::new();
            for (group, count) in &self.motion_groups {
                let entries: Vec<Value> = (0..*count)
                    .map(|i| json!({ "File": format!("motions/{group}_{i}.motion3.json") }))
                    .collect();
                motions.insert(group.clone(), Value::Array(entries));
            }
            refs["Motions"] = Value::Object(motions);
        }
        if self.physics {
            refs["Physics"] = json!(format!("{MODEL_DIR}.physics3.json"));
        }
        if self.pose {
            refs["Pose"] = json!(format!("{MODEL_DIR}.pose3.json"));
        }

        let mut groups = Vec::new();
        if !self.eye_blink_ids.is_empty() {
            groups.push(json!({ "Target": "Parameter", "Name": "EyeBlink", "Ids": self.eye_blink_ids }));
        }
        if !self.lip_sync_ids.is_empty() {
            groups.push(json!({ "Target": "Parameter", "Name": "LipSync", "Ids": self.lip_sync_ids }));
        }

        json!({
            "Version": 3,
            "FileReferences": refs,
            "Groups": groups,
            "HitAreas": [
                { "Id": "HitAreaHead", "Name": "Head" },
                { "Id": "HitAreaBody", "Name": "Body" }
            ]
        })
        .to_string()
    }

    /// Serve every declared resource from `fetcher`
    pub fn install(&self, fetcher: &MockFetcher) {
        fetcher.insert(settings_path(), self.settings_json());
        fetcher.insert(geometry_path(), geometry_bytes());
        for name in &self.expressions {
            fetcher.insert(expression_path(name), expression_json("ParamCheek", 0.5));
        }
        for (group, count) in &self.motion_groups {
            for i in 0..*count {
                fetcher.insert(motion_path(group, i), motion_json(1.0, 10.0));
            }
        }
        for i in 0..self.textures {
            fetcher.insert(texture_path(i), png(4, 4));
        }
        if self.physics {
            fetcher.insert(format!("{HOME}{MODEL_DIR}.physics3.json"), "{}");
        }
        if self.pose {
            fetcher.insert(format!("{HOME}{MODEL_DIR}.pose3.json"), "{}");
        }
    }
}

pub fn test_config() -> MascotConfig {
    MascotConfig {
        resources_path: String::new(),
        model_dir: MODEL_DIR.to_string(),
        random_seed: Some(42),
        ..Default::default()
    }
}

/// Runtime with a head area above a body area on a unit canvas
pub fn test_runtime() -> HeadlessRuntime {
    HeadlessRuntime::new()
        .with_canvas(1.0, 1.0)
        .with_drawable(
            "HitAreaHead",
            Rect {
                left: -0.5,
                top: 0.5,
                right: 0.5,
                bottom: 0.25,
            },
        )
        .with_drawable(
            "HitAreaBody",
            Rect {
                left: -0.5,
                top: 0.25,
                right: 0.5,
                bottom: -0.5,
            },
        )
}

pub struct Harness {
    pub fetcher: Arc<MockFetcher>,
    pub backend: Arc<HeadlessBackend>,
    pub textures: Arc<TextureCache>,
    pub model: Model,
}

pub fn harness(config: MascotConfig, fetcher: Arc<MockFetcher>) -> Harness {
    let backend = Arc::new(HeadlessBackend::new());
    let textures = Arc::new(TextureCache::new(fetcher.clone(), backend.clone()));
    let model = Model::new(
        Arc::new(config),
        fetcher.clone(),
        Arc::new(test_runtime()),
        textures.clone(),
    );
    Harness {
        fetcher,
        backend,
        textures,
        model,
    }
}

/// Install `fixture`, load it, and return the loaded harness
pub async fn loaded(fixture: &ModelFixture, config: MascotConfig) -> Harness {
    let fetcher = MockFetcher::new();
    fixture.install(&fetcher);
    let harness = harness(config, fetcher);
    harness.model.load_assets().await.expect("model should load");
    harness
}
