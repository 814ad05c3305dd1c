use std::collections::HashMap;

/// Declared range and rest value of one model parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub id: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParameterSpec {
    pub fn new(id: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        Self {
            id: id.into(),
            min,
            max,
            default,
        }
    }
}

/// Flat, ordered set of named float parameters plus a saved baseline.
///
/// Writes are clamped to the parameter's range. Unknown ids are ignored.
#[derive(Debug, Clone, Default)]
pub struct ParameterBuffer {
    specs: Vec<ParameterSpec>,
    index: HashMap<String, usize>,
    values: Vec<f32>,
    saved: Vec<f32>,
}

impl ParameterBuffer {
    pub fn new(specs: Vec<ParameterSpec>) -> Self {
        let index = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.id.clone(), i))
            .collect();
        let values: Vec<f32> = specs.iter().map(|spec| spec.default).collect();
        Self {
            saved: values.clone(),
            specs,
            index,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<f32> {
        self.index.get(id).map(|&i| self.values[i])
    }

    fn write(&mut self, id: &str, compute: impl FnOnce(f32) -> f32) {
        if let Some(&i) = self.index.get(id) {
            let spec = &self.specs[i];
            self.values[i] = compute(self.values[i]).clamp(spec.min, spec.max);
        }
    }

    /// `current + (value - current) * weight`
    pub fn set(&mut self, id: &str, value: f32, weight: f32) {
        self.write(id, |current| {
            if weight >= 1.0 {
                value
            } else {
                current + (value - current) * weight
            }
        });
    }

    /// `current + value * weight`
    pub fn add(&mut self, id: &str, value: f32, weight: f32) {
        self.write(id, |current| current + value * weight);
    }

    /// `current * (1 + (value - 1) * weight)`
    pub fn multiply(&mut self, id: &str, value: f32, weight: f32) {
        self.write(id, |current| current * (1.0 + (value - 1.0) * weight));
    }

    /// Snapshot the current values as the baseline
    pub fn save(&mut self) {
        self.saved.copy_from_slice(&self.values);
    }

    /// Restore the baseline
    pub fn load(&mut self) {
        self.values.copy_from_slice(&self.saved);
    }

    /// Back to every parameter's rest value
    pub fn reset(&mut self) {
        for (value, spec) in self.values.iter_mut().zip(&self.specs) {
            *value = spec.default;
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.specs
            .iter()
            .zip(&self.values)
            .map(|(spec, value)| (spec.id.as_str(), *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> ParameterBuffer {
        ParameterBuffer::new(vec![
            ParameterSpec::new("ParamAngleX", -30.0, 30.0, 0.0),
            ParameterSpec::new("ParamEyeLOpen", 0.0, 1.0, 1.0),
        ])
    }

    #[test]
    fn test_weighted_writes() {
        let mut params = buffer();
        params.set("ParamAngleX", 10.0, 0.5);
        assert_eq!(params.get("ParamAngleX"), Some(5.0));
        params.add("ParamAngleX", 10.0, 0.5);
        assert_eq!(params.get("ParamAngleX"), Some(10.0));
        params.multiply("ParamEyeLOpen", 0.0, 0.5);
        assert_eq!(params.get("ParamEyeLOpen"), Some(0.5));
    }

    #[test]
    fn test_writes_are_clamped_and_unknown_ids_ignored() {
        let mut params = buffer();
        params.add("ParamAngleX", 100.0, 1.0);
        assert_eq!(params.get("ParamAngleX"), Some(30.0));
        params.set("ParamDoesNotExist", 1.0, 1.0);
        assert_eq!(params.get("ParamDoesNotExist"), None);
    }

    #[test]
    fn test_save_and_load_baseline() {
        let mut params = buffer();
        params.set("ParamAngleX", 12.0, 1.0);
        params.save();
        params.add("ParamAngleX", 3.0, 1.0);
        params.load();
        assert_eq!(params.get("ParamAngleX"), Some(12.0));
        params.reset();
        assert_eq!(params.get("ParamAngleX"), Some(0.0));
    }
}
