//! Reference model implementations used by the CLI and demos.

use anyhow::ensure;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    data::DataPoint,
    model::{factory, Model, ModelFactory},
};

/// Model families that can be selected from configuration or the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Always predicts zero.
    Constant,
    /// Predicts the mean label seen during training.
    Mean,
    /// Linear regression trained by gradient descent.
    #[default]
    Linear,
}

impl ModelKind {
    /// Builds a factory producing fresh models of this kind.
    #[must_use]
    pub fn factory(self, feature_dim: usize) -> ModelFactory {
        match self {
            Self::Constant => factory(|| ConstantModel::new(0.0)),
            Self::Mean => factory(MeanModel::default),
            Self::Linear => factory(move || LinearRegressionModel::new(feature_dim)),
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "constant" => Ok(Self::Constant),
            "mean" => Ok(Self::Mean),
            "linear" => Ok(Self::Linear),
            other => anyhow::bail!("unknown model kind `{other}`"),
        }
    }
}

/// Computes mean squared error between predictions and labels.
#[must_use]
pub fn mean_squared_error(predictions: &[f32], labels: &[f32]) -> f32 {
    if predictions.is_empty() || predictions.len() != labels.len() {
        return 0.0;
    }
    predictions
        .iter()
        .zip(labels.iter())
        .map(|(pred, label)| (pred - label).powi(2))
        .sum::<f32>()
        / predictions.len() as f32
}

fn labels(data: &[DataPoint]) -> Vec<f32> {
    data.iter().map(|point| point.label).collect()
}

/// Model returning a fixed score regardless of input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantModel {
    value: f32,
}

impl ConstantModel {
    /// Creates a model that always predicts `value`.
    #[must_use]
    pub const fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Model for ConstantModel {
    fn train(&mut self, _data: &[DataPoint]) -> anyhow::Result<()> {
        Ok(())
    }

    fn predict(&self, _features: &[f32]) -> anyhow::Result<f32> {
        Ok(self.value)
    }

    fn evaluate(&self, data: &[DataPoint]) -> anyhow::Result<f32> {
        Ok(mean_squared_error(&vec![self.value; data.len()], &labels(data)))
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Model predicting the running mean of every label it was trained on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeanModel {
    sum: f64,
    count: u64,
}

impl MeanModel {
    fn mean(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum / self.count as f64) as f32
        }
    }
}

impl Model for MeanModel {
    fn train(&mut self, data: &[DataPoint]) -> anyhow::Result<()> {
        for point in data {
            self.sum += f64::from(point.label);
            self.count += 1;
        }
        Ok(())
    }

    fn predict(&self, _features: &[f32]) -> anyhow::Result<f32> {
        Ok(self.mean())
    }

    fn evaluate(&self, data: &[DataPoint]) -> anyhow::Result<f32> {
        Ok(mean_squared_error(&vec![self.mean(); data.len()], &labels(data)))
    }

    fn name(&self) -> &str {
        "mean"
    }
}

/// Linear regression model with bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    weights: Vec<f32>,
    bias: f32,
    learning_rate: f32,
    epochs: usize,
}

impl LinearRegressionModel {
    /// Creates a new model with small random weights.
    #[must_use]
    pub fn new(feature_dim: usize) -> Self {
        let mut rng = SmallRng::from_entropy();
        Self {
            weights: (0..feature_dim)
                .map(|_| rng.gen_range(-0.05..0.05))
                .collect(),
            bias: rng.gen_range(-0.05..0.05),
            learning_rate: 0.05,
            epochs: 10,
        }
    }

    /// Creates a model from explicit parameters.
    #[must_use]
    pub fn from_parts(weights: Vec<f32>, bias: f32) -> Self {
        Self {
            weights,
            bias,
            learning_rate: 0.05,
            epochs: 10,
        }
    }

    /// Overrides the gradient descent schedule.
    #[must_use]
    pub const fn with_schedule(mut self, learning_rate: f32, epochs: usize) -> Self {
        self.learning_rate = learning_rate;
        self.epochs = epochs;
        self
    }

    fn check_width(&self, features: &[f32]) -> anyhow::Result<()> {
        ensure!(
            features.len() == self.weights.len(),
            "feature width {} does not match model width {}",
            features.len(),
            self.weights.len()
        );
        Ok(())
    }

    fn score(&self, features: &[f32]) -> f32 {
        features
            .iter()
            .zip(self.weights.iter())
            .map(|(feature, weight)| feature * weight)
            .sum::<f32>()
            + self.bias
    }
}

impl Model for LinearRegressionModel {
    fn train(&mut self, data: &[DataPoint]) -> anyhow::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        for point in data {
            self.check_width(&point.features)?;
        }
        let n = data.len() as f32;
        for _ in 0..self.epochs {
            let error: Vec<f32> = data
                .iter()
                .map(|point| self.score(&point.features) - point.label)
                .collect();

            for (idx, weight) in self.weights.iter_mut().enumerate() {
                let grad = error
                    .iter()
                    .zip(data.iter())
                    .map(|(err, point)| err * point.features[idx])
                    .sum::<f32>()
                    / n;
                *weight -= self.learning_rate * grad;
            }

            let bias_grad = error.iter().sum::<f32>() / n;
            self.bias -= self.learning_rate * bias_grad;
        }
        Ok(())
    }

    fn predict(&self, features: &[f32]) -> anyhow::Result<f32> {
        self.check_width(features)?;
        Ok(self.score(features))
    }

    fn evaluate(&self, data: &[DataPoint]) -> anyhow::Result<f32> {
        let predictions = data
            .iter()
            .map(|point| self.predict(&point.features))
            .collect::<anyhow::Result<Vec<f32>>>()?;
        Ok(mean_squared_error(&predictions, &labels(data)))
    }

    fn name(&self) -> &str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic;

    #[test]
    fn mse_handles_inputs() {
        assert!(mean_squared_error(&[1.0, 2.0], &[1.0, 1.5]) > 0.0);
        assert_eq!(mean_squared_error(&[], &[]), 0.0);
        assert_eq!(mean_squared_error(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn constant_model_ignores_input() {
        let model = ConstantModel::new(2.0);
        assert_eq!(model.predict(&[9.0, 9.0]).unwrap(), 2.0);
        let data = vec![DataPoint::new(vec![0.0], 4.0)];
        assert_eq!(model.evaluate(&data).unwrap(), 4.0);
    }

    #[test]
    fn mean_model_tracks_labels() {
        let mut model = MeanModel::default();
        assert_eq!(model.predict(&[]).unwrap(), 0.0);
        model
            .train(&[DataPoint::new(vec![], 1.0), DataPoint::new(vec![], 3.0)])
            .unwrap();
        assert_eq!(model.predict(&[]).unwrap(), 2.0);
    }

    #[test]
    fn linear_training_reduces_error() {
        let data = synthetic(64, 3);
        let mut model = LinearRegressionModel::new(3).with_schedule(0.1, 50);
        let before = model.evaluate(&data).unwrap();
        model.train(&data).unwrap();
        let after = model.evaluate(&data).unwrap();
        assert!(after < before);
    }

    #[test]
    fn linear_rejects_width_mismatch() {
        let model = LinearRegressionModel::from_parts(vec![1.0, 1.0], 0.0);
        assert_eq!(model.predict(&[1.0, 2.0]).unwrap(), 3.0);
        let err = model.predict(&[1.0]).unwrap_err();
        assert!(err.to_string().contains("feature width 1"));
    }

    #[test]
    fn kinds_parse_and_build() {
        let kind: ModelKind = "mean".parse().unwrap();
        assert_eq!(kind, ModelKind::Mean);
        assert!("forest".parse::<ModelKind>().is_err());
        let build = ModelKind::Linear.factory(2);
        assert_eq!(build().name(), "linear");
    }
}
