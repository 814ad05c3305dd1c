use std::f32::consts::PI;

use crate::model::ParameterBuffer;

/// One sinusoid: `offset + peak * sin(2π t / cycle)`, added at `weight`
#[derive(Debug, Clone, PartialEq)]
pub struct BreathParameter {
    pub id: String,
    pub offset: f32,
    pub peak: f32,
    pub cycle: f32,
    pub weight: f32,
}

impl BreathParameter {
    pub fn new(id: impl Into<String>, offset: f32, peak: f32, cycle: f32, weight: f32) -> Self {
        Self {
            id: id.into(),
            offset,
            peak,
            cycle,
            weight,
        }
    }
}

/// Idle breathing: independent sinusoids added onto the composed pose
#[derive(Debug, Clone)]
pub struct Breath {
    parameters: Vec<BreathParameter>,
    current_time: f32,
}

impl Breath {
    pub fn new(parameters: Vec<BreathParameter>) -> Self {
        Self {
            parameters,
            current_time: 0.0,
        }
    }

    pub fn parameters(&self) -> &[BreathParameter] {
        &self.parameters
    }

    pub fn update(&mut self, params: &mut ParameterBuffer, delta: f32) {
        self.current_time += delta.max(0.0);
        let phase = self.current_time * 2.0 * PI;

        for p in &self.parameters {
            if p.cycle <= 0.0 {
                continue;
            }
            params.add(&p.id, p.offset + p.peak * (phase / p.cycle).sin(), p.weight);
        }
    }
}

impl Default for Breath {
    fn default() -> Self {
        Self::new(vec![
            BreathParameter::new("ParamAngleX", 0.0, 15.0, 6.5345, 0.5),
            BreathParameter::new("ParamAngleY", 0.0, 8.0, 3.5345, 0.5),
            BreathParameter::new("ParamAngleZ", 0.0, 10.0, 5.5345, 0.5),
            BreathParameter::new("ParamBodyAngleX", 0.0, 4.0, 15.5345, 0.5),
            BreathParameter::new("ParamBreath", 0.5, 0.5, 3.2345, 1.0),
        ])
    }
}
