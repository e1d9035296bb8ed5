//! Capability contract every ensemble member implements.

use std::sync::Arc;

use crate::data::DataPoint;

/// Interchangeable predictive model driven by a coordinator.
///
/// Errors are opaque to the ensemble and surface to callers unchanged.
pub trait Model: Send + Sync {
    /// Updates the model's internal state from a batch of samples.
    fn train(&mut self, data: &[DataPoint]) -> anyhow::Result<()>;

    /// Scores a single feature vector.
    fn predict(&self, features: &[f32]) -> anyhow::Result<f32>;

    /// Scores the model against a labelled batch.
    fn evaluate(&self, data: &[DataPoint]) -> anyhow::Result<f32>;

    /// Short label used in logs.
    fn name(&self) -> &str {
        "model"
    }
}

/// Zero-argument constructor producing one fresh model slot.
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn Model> + Send + Sync>;

/// Wraps a closure as a [`ModelFactory`].
pub fn factory<M, F>(build: F) -> ModelFactory
where
    M: Model + 'static,
    F: Fn() -> M + Send + Sync + 'static,
{
    Arc::new(move || Box::new(build()) as Box<dyn Model>)
}
