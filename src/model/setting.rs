//! Typed `*.model3.json` settings document

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

const GROUP_EYE_BLINK: &str = "EyeBlink";
const GROUP_LIP_SYNC: &str = "LipSync";

/// A JSON object kept as an ordered list of entries
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionRef {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MotionRef {
    pub file: String,
    pub fade_in_time: Option<f32>,
    pub fade_out_time: Option<f32>,
    pub sound: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileReferences {
    pub moc: String,
    #[serde(default)]
    pub textures: Vec<String>,
    pub physics: Option<String>,
    pub pose: Option<String>,
    pub user_data: Option<String>,
    pub display_info: Option<String>,
    #[serde(default)]
    pub expressions: Vec<ExpressionRef>,
    #[serde(default)]
    pub motions: OrderedMap<Vec<MotionRef>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterGroup {
    #[serde(default)]
    pub target: String,
    pub name: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HitArea {
    pub id: String,
    pub name: String,
}

/// The model settings document. Motion groups and layout keep declaration order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelSetting {
    #[serde(default)]
    pub version: u32,
    pub file_references: FileReferences,
    #[serde(default)]
    pub groups: Vec<ParameterGroup>,
    #[serde(default)]
    pub hit_areas: Vec<HitArea>,
    #[serde(default)]
    pub layout: OrderedMap<f32>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|name| !name.is_empty())
}

impl ModelSetting {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn model_file_name(&self) -> Option<&str> {
        Some(self.file_references.moc.as_str()).filter(|name| !name.is_empty())
    }

    pub fn expression_count(&self) -> usize {
        self.file_references.expressions.len()
    }

    pub fn expressions(&self) -> &[ExpressionRef] {
        &self.file_references.expressions
    }

    pub fn physics_file_name(&self) -> Option<&str> {
        non_empty(&self.file_references.physics)
    }

    pub fn pose_file_name(&self) -> Option<&str> {
        non_empty(&self.file_references.pose)
    }

    pub fn user_data_file_name(&self) -> Option<&str> {
        non_empty(&self.file_references.user_data)
    }

    pub fn motion_group_count(&self) -> usize {
        self.file_references.motions.0.len()
    }

    pub fn motion_groups(&self) -> impl Iterator<Item = (&str, &[MotionRef])> + '_ {
        self.file_references
            .motions
            .0
            .iter()
            .map(|(name, motions)| (name.as_str(), motions.as_slice()))
    }

    pub fn motion_count(&self, group: &str) -> usize {
        self.motions(group).map(<[MotionRef]>::len).unwrap_or(0)
    }

    pub fn motions(&self, group: &str) -> Option<&[MotionRef]> {
        self.motion_groups()
            .find(|(name, _)| *name == group)
            .map(|(_, motions)| motions)
    }

    pub fn motion(&self, group: &str, index: usize) -> Option<&MotionRef> {
        self.motions(group).and_then(|motions| motions.get(index))
    }

    pub fn total_motion_count(&self) -> usize {
        self.motion_groups().map(|(_, motions)| motions.len()).sum()
    }

    pub fn textures(&self) -> &[String] {
        &self.file_references.textures
    }

    fn group_ids(&self, name: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|group| group.name == name)
            .flat_map(|group| group.ids.iter().cloned())
            .collect()
    }

    pub fn eye_blink_parameter_ids(&self) -> Vec<String> {
        self.group_ids(GROUP_EYE_BLINK)
    }

    pub fn lip_sync_parameter_ids(&self) -> Vec<String> {
        self.group_ids(GROUP_LIP_SYNC)
    }

    /// Drawable id for a hit area name
    pub fn hit_area_id(&self, name: &str) -> Option<&str> {
        self.hit_areas
            .iter()
            .find(|area| area.name == name)
            .map(|area| area.id.as_str())
    }

    pub fn layout(&self) -> &[(String, f32)] {
        &self.layout.0
    }
}

/// Clip name shown to users: the file name without directory or `.motion3.json`
pub fn motion_display_name(file: &str) -> String {
    let name = file.rsplit(['/', '\\']).next().unwrap_or(file);
    name.strip_suffix(".motion3.json").unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTING: &str = r#"{
        "Version": 3,
        "FileReferences": {
            "Moc": "haru.moc3",
            "Textures": ["haru.2048/texture_00.png", ""],
            "Physics": "haru.physics3.json",
            "Pose": "",
            "Expressions": [ { "Name": "F01", "File": "expressions/F01.exp3.json" } ],
            "Motions": {
                "TapBody": [ { "File": "motions/tap_01.motion3.json", "FadeInTime": 0.5 } ],
                "Idle": [
                    { "File": "motions/idle_01.motion3.json" },
                    { "File": "motions/idle_02.motion3.json" }
                ]
            }
        },
        "Groups": [
            { "Target": "Parameter", "Name": "EyeBlink", "Ids": ["ParamEyeLOpen", "ParamEyeROpen"] },
            { "Target": "Parameter", "Name": "LipSync", "Ids": [] }
        ],
        "HitAreas": [ { "Id": "HitArea", "Name": "Body" } ],
        "Layout": { "CenterX": 0, "Width": 2.0 }
    }"#;

    #[test]
    fn test_parse_keeps_declaration_order() {
        let setting = ModelSetting::from_bytes(SETTING.as_bytes()).unwrap();
        let groups: Vec<&str> = setting.motion_groups().map(|(name, _)| name).collect();
        assert_eq!(groups, vec!["TapBody", "Idle"]);
        assert_eq!(setting.layout()[0].0, "CenterX");
        assert_eq!(setting.total_motion_count(), 3);
        assert_eq!(setting.motion("TapBody", 0).unwrap().fade_in_time, Some(0.5));
    }

    #[test]
    fn test_optional_files_and_groups() {
        let setting = ModelSetting::from_bytes(SETTING.as_bytes()).unwrap();
        assert_eq!(setting.model_file_name(), Some("haru.moc3"));
        assert_eq!(setting.physics_file_name(), Some("haru.physics3.json"));
        assert_eq!(setting.pose_file_name(), None);
        assert_eq!(setting.user_data_file_name(), None);
        assert_eq!(setting.eye_blink_parameter_ids().len(), 2);
        assert!(setting.lip_sync_parameter_ids().is_empty());
        assert_eq!(setting.hit_area_id("Body"), Some("HitArea"));
        assert_eq!(setting.hit_area_id("Head"), None);
    }

    #[test]
    fn test_motion_display_name() {
        assert_eq!(motion_display_name("motions/idle_01.motion3.json"), "idle_01");
        assert_eq!(motion_display_name("tap.motion3.json"), "tap");
    }
}
