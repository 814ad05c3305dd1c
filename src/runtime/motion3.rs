//! `*.motion3.json` and `*.exp3.json` clips

use std::collections::HashSet;

use serde::Deserialize;

use super::{AnimationClip, MotionOptions, RuntimeError, RuntimeResult};
use crate::model::ParameterBuffer;

const DEFAULT_FADE_SECONDS: f32 = 1.0;

const TARGET_MODEL: &str = "Model";
const TARGET_PARAMETER: &str = "Parameter";
const MODEL_CURVE_EYE_BLINK: &str = "EyeBlink";
const MODEL_CURVE_LIP_SYNC: &str = "LipSync";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Motion3Document {
    meta: Motion3Meta,
    #[serde(default)]
    curves: Vec<Motion3Curve>,
    #[serde(default)]
    user_data: Vec<Motion3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Motion3Meta {
    duration: f32,
    #[serde(default, rename = "Loop")]
    looping: bool,
    curve_count: Option<usize>,
    total_segment_count: Option<usize>,
    fade_in_time: Option<f32>,
    fade_out_time: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Motion3Curve {
    target: String,
    id: String,
    segments: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Motion3Event {
    time: f32,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    time: f32,
    value: f32,
}

impl Point {
    fn lerp(a: Point, b: Point, t: f32) -> Point {
        Point {
            time: a.time + (b.time - a.time) * t,
            value: a.value + (b.value - a.value) * t,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Linear(Point, Point),
    Bezier([Point; 4]),
    Stepped(Point, Point),
    InverseStepped(Point, Point),
}

impl Segment {
    fn end(&self) -> Point {
        match self {
            Segment::Linear(_, b) | Segment::Stepped(_, b) | Segment::InverseStepped(_, b) => *b,
            Segment::Bezier(points) => points[3],
        }
    }

    fn evaluate(&self, time: f32) -> f32 {
        match self {
            Segment::Linear(a, b) => {
                let span = b.time - a.time;
                let t = if span <= 0.0 { 1.0 } else { ((time - a.time) / span).clamp(0.0, 1.0) };
                a.value + (b.value - a.value) * t
            }
            Segment::Bezier([p0, p1, p2, p3]) => {
                let span = p3.time - p0.time;
                let t = if span <= 0.0 { 1.0 } else { ((time - p0.time) / span).clamp(0.0, 1.0) };
                let p01 = Point::lerp(*p0, *p1, t);
                let p12 = Point::lerp(*p1, *p2, t);
                let p23 = Point::lerp(*p2, *p3, t);
                let p012 = Point::lerp(p01, p12, t);
                let p123 = Point::lerp(p12, p23, t);
                Point::lerp(p012, p123, t).value
            }
            Segment::Stepped(a, _) => a.value,
            Segment::InverseStepped(_, b) => b.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurveTarget {
    EyeBlink,
    LipSync,
    Parameter,
    Ignored,
}

#[derive(Debug, Clone)]
struct Curve {
    target: CurveTarget,
    id: String,
    first: Point,
    segments: Vec<Segment>,
}

impl Curve {
    fn evaluate(&self, time: f32) -> f32 {
        if time <= self.first.time {
            return self.first.value;
        }
        for segment in &self.segments {
            if time <= segment.end().time {
                return segment.evaluate(time);
            }
        }
        self.segments
            .last()
            .map(|segment| segment.end().value)
            .unwrap_or(self.first.value)
    }
}

fn decode_segments(raw: &[f32]) -> RuntimeResult<(Point, Vec<Segment>)> {
    if raw.len() < 2 {
        return Err(RuntimeError::malformed("motion", "curve has no starting point"));
    }
    let point = |index: usize| -> RuntimeResult<Point> {
        match (raw.get(index), raw.get(index + 1)) {
            (Some(time), Some(value)) => Ok(Point { time: *time, value: *value }),
            _ => Err(RuntimeError::malformed("motion", "truncated segment data")),
        }
    };

    let first = point(0)?;
    let mut last = first;
    let mut segments = Vec::new();
    let mut cursor = 2;

    while cursor < raw.len() {
        let kind = raw[cursor] as i32;
        let segment = match kind {
            0 => {
                let end = point(cursor + 1)?;
                cursor += 3;
                Segment::Linear(last, end)
            }
            1 => {
                let c1 = point(cursor + 1)?;
                let c2 = point(cursor + 3)?;
                let end = point(cursor + 5)?;
                cursor += 7;
                Segment::Bezier([last, c1, c2, end])
            }
            2 => {
                let end = point(cursor + 1)?;
                cursor += 3;
                Segment::Stepped(last, end)
            }
            3 => {
                let end = point(cursor + 1)?;
                cursor += 3;
                Segment::InverseStepped(last, end)
            }
            other => {
                return Err(RuntimeError::malformed(
                    "motion",
                    format!("unknown segment type {other}"),
                ))
            }
        };
        last = segment.end();
        segments.push(segment);
    }

    Ok((first, segments))
}

/// Keyframed parameter animation loaded from a `motion3.json` document
#[derive(Debug, Clone)]
pub struct KeyframeMotion {
    duration: f32,
    looping: bool,
    fade_in: f32,
    fade_out: f32,
    curves: Vec<Curve>,
    events: Vec<(f32, String)>,
    eye_blink_ids: Vec<String>,
    lip_sync_ids: Vec<String>,
}

impl KeyframeMotion {
    pub fn parse(bytes: &[u8], options: &MotionOptions) -> RuntimeResult<Self> {
        if bytes.is_empty() {
            return Err(RuntimeError::Empty { kind: "motion" });
        }
        let document: Motion3Document =
            serde_json::from_slice(bytes).map_err(|e| RuntimeError::malformed("motion", e))?;

        let mut curves = Vec::with_capacity(document.curves.len());
        for curve in &document.curves {
            let (first, segments) = decode_segments(&curve.segments)?;
            let target = match (curve.target.as_str(), curve.id.as_str()) {
                (TARGET_MODEL, MODEL_CURVE_EYE_BLINK) => CurveTarget::EyeBlink,
                (TARGET_MODEL, MODEL_CURVE_LIP_SYNC) => CurveTarget::LipSync,
                (TARGET_PARAMETER, _) => CurveTarget::Parameter,
                _ => CurveTarget::Ignored,
            };
            curves.push(Curve {
                target,
                id: curve.id.clone(),
                first,
                segments,
            });
        }

        if options.check_consistency {
            let meta = &document.meta;
            if let Some(expected) = meta.curve_count {
                if expected != curves.len() {
                    return Err(RuntimeError::Inconsistent {
                        kind: "motion",
                        reason: format!("declares {expected} curves, found {}", curves.len()),
                    });
                }
            }
            if let Some(expected) = meta.total_segment_count {
                let found: usize = curves.iter().map(|c| c.segments.len()).sum();
                if expected != found {
                    return Err(RuntimeError::Inconsistent {
                        kind: "motion",
                        reason: format!("declares {expected} segments, found {found}"),
                    });
                }
            }
        }

        let pick_fade = |over: Option<f32>, own: Option<f32>| match over {
            Some(value) if value >= 0.0 => value,
            _ => own.filter(|v| *v >= 0.0).unwrap_or(DEFAULT_FADE_SECONDS),
        };

        Ok(Self {
            duration: document.meta.duration.max(0.0),
            looping: document.meta.looping,
            fade_in: pick_fade(options.fade_in, document.meta.fade_in_time),
            fade_out: pick_fade(options.fade_out, document.meta.fade_out_time),
            curves,
            events: document
                .user_data
                .into_iter()
                .map(|event| (event.time, event.value))
                .collect(),
            eye_blink_ids: options.eye_blink_ids.clone(),
            lip_sync_ids: options.lip_sync_ids.clone(),
        })
    }

    fn local_time(&self, time: f32) -> f32 {
        if self.looping && self.duration > 0.0 {
            time % self.duration
        } else {
            time.min(self.duration)
        }
    }
}

impl AnimationClip for KeyframeMotion {
    fn duration(&self) -> Option<f32> {
        if self.looping {
            None
        } else {
            Some(self.duration)
        }
    }

    fn fade_in_seconds(&self) -> f32 {
        self.fade_in
    }

    fn fade_out_seconds(&self) -> f32 {
        self.fade_out
    }

    fn apply(&self, params: &mut ParameterBuffer, time: f32, weight: f32) {
        let time = self.local_time(time);

        let mut eye_blink = None;
        let mut lip_sync = None;
        for curve in &self.curves {
            match curve.target {
                CurveTarget::EyeBlink => eye_blink = Some(curve.evaluate(time)),
                CurveTarget::LipSync => lip_sync = Some(curve.evaluate(time)),
                _ => {}
            }
        }

        let mut written: HashSet<&str> = HashSet::new();
        for curve in self.curves.iter().filter(|c| c.target == CurveTarget::Parameter) {
            let mut value = curve.evaluate(time);
            if let Some(blink) = eye_blink {
                if self.eye_blink_ids.iter().any(|id| *id == curve.id) {
                    value *= blink;
                    written.insert(curve.id.as_str());
                }
            }
            if let Some(lip) = lip_sync {
                if self.lip_sync_ids.iter().any(|id| *id == curve.id) {
                    value += lip;
                    written.insert(curve.id.as_str());
                }
            }
            params.set(&curve.id, value, weight);
        }

        if let Some(blink) = eye_blink {
            for id in self.eye_blink_ids.iter().filter(|id| !written.contains(id.as_str())) {
                params.set(id, blink, weight);
            }
        }
        if let Some(lip) = lip_sync {
            for id in self.lip_sync_ids.iter().filter(|id| !written.contains(id.as_str())) {
                params.set(id, lip, weight);
            }
        }
    }

    fn events_between(&self, from: f32, to: f32) -> Vec<String> {
        if to <= from || self.events.is_empty() {
            return Vec::new();
        }
        let in_range = |t: f32, lo: f32, hi: f32| t > lo && t <= hi;

        if !self.looping || self.duration <= 0.0 {
            return self
                .events
                .iter()
                .filter(|(t, _)| in_range(*t, from, to))
                .map(|(_, name)| name.clone())
                .collect();
        }

        let (lo, hi) = (from % self.duration, to % self.duration);
        self.events
            .iter()
            .filter(|(t, _)| {
                if hi >= lo && to - from < self.duration {
                    in_range(*t, lo, hi)
                } else {
                    *t > lo || *t <= hi
                }
            })
            .map(|(_, name)| name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ExpressionBlend {
    #[default]
    Add,
    Multiply,
    Overwrite,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Exp3Document {
    fade_in_time: Option<f32>,
    fade_out_time: Option<f32>,
    #[serde(default)]
    parameters: Vec<Exp3Parameter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Exp3Parameter {
    id: String,
    value: f32,
    #[serde(default)]
    blend: ExpressionBlend,
}

/// Static parameter offsets loaded from an `exp3.json` document
#[derive(Debug, Clone)]
pub struct Expression {
    name: String,
    fade_in: f32,
    fade_out: f32,
    parameters: Vec<(String, f32, ExpressionBlend)>,
}

impl Expression {
    pub fn parse(bytes: &[u8], name: &str) -> RuntimeResult<Self> {
        if bytes.is_empty() {
            return Err(RuntimeError::Empty { kind: "expression" });
        }
        let document: Exp3Document =
            serde_json::from_slice(bytes).map_err(|e| RuntimeError::malformed("expression", e))?;

        Ok(Self {
            name: name.to_string(),
            fade_in: document.fade_in_time.filter(|v| *v >= 0.0).unwrap_or(DEFAULT_FADE_SECONDS),
            fade_out: document.fade_out_time.filter(|v| *v >= 0.0).unwrap_or(DEFAULT_FADE_SECONDS),
            parameters: document
                .parameters
                .into_iter()
                .map(|p| (p.id, p.value, p.blend))
                .collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AnimationClip for Expression {
    fn duration(&self) -> Option<f32> {
        None
    }

    fn fade_in_seconds(&self) -> f32 {
        self.fade_in
    }

    fn fade_out_seconds(&self) -> f32 {
        self.fade_out
    }

    fn apply(&self, params: &mut ParameterBuffer, _time: f32, weight: f32) {
        for (id, value, blend) in &self.parameters {
            match blend {
                ExpressionBlend::Add => params.add(id, *value, weight),
                ExpressionBlend::Multiply => params.multiply(id, *value, weight),
                ExpressionBlend::Overwrite => params.set(id, *value, weight),
            }
        }
    }
}
