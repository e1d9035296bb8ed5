use std::{fs, path::Path};

use anyhow::Context;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Single labelled sample handed to every model slot as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Feature vector.
    pub features: Vec<f32>,
    /// Target label.
    pub label: f32,
}

impl DataPoint {
    /// Creates a sample from features and a label.
    #[must_use]
    pub fn new(features: Vec<f32>, label: f32) -> Self {
        Self { features, label }
    }
}

/// Generates a synthetic regression dataset for demos and tests.
#[must_use]
pub fn synthetic(count: usize, feature_dim: usize) -> Vec<DataPoint> {
    let mut rng = SmallRng::from_entropy();
    (0..count)
        .map(|_| {
            let features: Vec<f32> = (0..feature_dim)
                .map(|_| rng.gen_range(-1.0..1.0))
                .collect();
            let label = features.iter().sum::<f32>() + rng.gen_range(-0.1..0.1);
            DataPoint { features, label }
        })
        .collect()
}

/// Loads a JSON array of samples from disk.
pub fn load_json(path: impl AsRef<Path>) -> anyhow::Result<Vec<DataPoint>> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading dataset {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing dataset {}", path.display()))
}

/// Feature width of the first sample, zero for an empty set.
#[must_use]
pub fn feature_dim(points: &[DataPoint]) -> usize {
    points.first().map_or(0, |point| point.features.len())
}
