//! Bounded, lazily populated ensemble of interchangeable models.

use std::{fmt, num::NonZeroUsize};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    data::DataPoint,
    error::EnsembleResult,
    model::{Model, ModelFactory},
    telemetry::{emit, EnsembleTelemetry},
};

struct ModelSlot {
    id: Uuid,
    created_at: DateTime<Utc>,
    model: Box<dyn Model>,
}

impl fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSlot")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .finish()
    }
}

/// Serializable view of a coordinator's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleSummary {
    /// Nominal slot count fixed at construction.
    pub capacity: usize,
    /// Slots created so far.
    pub populated: usize,
    /// Populated slots in creation order.
    pub slots: Vec<SlotSummary>,
}

/// Serializable view of one populated slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSummary {
    /// Stable identifier assigned at creation.
    pub id: Uuid,
    /// Model label reported by the slot.
    pub model: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Owns one ensemble's model slots and broadcasts operations across them.
///
/// Slots are only ever created through [`EnsembleCoordinator::add_model`];
/// fan-out addresses the populated slots, never the nominal capacity.
pub struct EnsembleCoordinator {
    capacity: NonZeroUsize,
    factory: ModelFactory,
    slots: Vec<ModelSlot>,
    telemetry: Option<EnsembleTelemetry>,
}

impl fmt::Debug for EnsembleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnsembleCoordinator")
            .field("capacity", &self.capacity)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl EnsembleCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new(capacity: NonZeroUsize, factory: ModelFactory) -> Self {
        Self {
            capacity,
            factory,
            slots: Vec::with_capacity(capacity.get()),
            telemetry: None,
        }
    }

    /// Attaches telemetry for slot lifecycle logging.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: EnsembleTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Nominal capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of populated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the populated count has reached the nominal capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity.get()
    }

    /// Slot identifiers in creation order.
    #[must_use]
    pub fn slot_ids(&self) -> Vec<Uuid> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    /// Builds a serializable summary.
    #[must_use]
    pub fn summary(&self) -> EnsembleSummary {
        EnsembleSummary {
            capacity: self.capacity(),
            populated: self.len(),
            slots: self
                .slots
                .iter()
                .map(|slot| SlotSummary {
                    id: slot.id,
                    model: slot.model.name().to_string(),
                    created_at: slot.created_at,
                })
                .collect(),
        }
    }

    /// Creates one model through the factory and appends it.
    ///
    /// Capacity is advisory: adding past it succeeds and is logged as a warning.
    pub fn add_model(&mut self) -> Uuid {
        if self.is_full() {
            emit(
                self.telemetry.as_ref(),
                LogLevel::Warn,
                "model_added_over_capacity",
                &json!({ "capacity": self.capacity(), "populated": self.len() }),
            );
        }
        let slot = ModelSlot {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            model: (self.factory)(),
        };
        let id = slot.id;
        self.slots.push(slot);
        id
    }

    /// Trains every populated slot on `data`, in creation order.
    pub fn add_data(&mut self, data: &[DataPoint]) -> EnsembleResult<()> {
        for slot in &mut self.slots {
            slot.model.train(data)?;
        }
        Ok(())
    }

    /// Collects one prediction per populated slot, in creation order.
    pub fn predict(&self, features: &[f32]) -> EnsembleResult<Vec<f32>> {
        let predictions = self
            .slots
            .iter()
            .map(|slot| slot.model.predict(features))
            .collect::<anyhow::Result<Vec<f32>>>()?;
        Ok(predictions)
    }

    /// Collects one evaluation score per populated slot, in creation order.
    pub fn evaluate(&self, data: &[DataPoint]) -> EnsembleResult<Vec<f32>> {
        let scores = self
            .slots
            .iter()
            .map(|slot| slot.model.evaluate(data))
            .collect::<anyhow::Result<Vec<f32>>>()?;
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::EnsembleError,
        model::factory,
        models::{ConstantModel, MeanModel},
    };
    use shared_logging::MemorySink;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct CountingModel {
        score: f32,
        trained: Arc<AtomicUsize>,
    }

    impl Model for CountingModel {
        fn train(&mut self, _data: &[DataPoint]) -> anyhow::Result<()> {
            self.trained.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn predict(&self, _features: &[f32]) -> anyhow::Result<f32> {
            Ok(self.score)
        }

        fn evaluate(&self, _data: &[DataPoint]) -> anyhow::Result<f32> {
            Ok(self.score * 10.0)
        }
    }

    struct FailingModel;

    impl Model for FailingModel {
        fn train(&mut self, _data: &[DataPoint]) -> anyhow::Result<()> {
            anyhow::bail!("train exploded")
        }

        fn predict(&self, _features: &[f32]) -> anyhow::Result<f32> {
            anyhow::bail!("predict exploded")
        }

        fn evaluate(&self, _data: &[DataPoint]) -> anyhow::Result<f32> {
            anyhow::bail!("evaluate exploded")
        }
    }

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn counting(trained: &Arc<AtomicUsize>) -> ModelFactory {
        let next = Arc::new(AtomicUsize::new(0));
        let trained = Arc::clone(trained);
        factory(move || CountingModel {
            score: (next.fetch_add(1, Ordering::SeqCst) + 1) as f32,
            trained: Arc::clone(&trained),
        })
    }

    #[test]
    fn starts_empty_without_calling_factory() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let coordinator = EnsembleCoordinator::new(
            cap(3),
            factory(move || {
                seen.fetch_add(1, Ordering::SeqCst);
                MeanModel::default()
            }),
        );
        assert!(coordinator.is_empty());
        assert_eq!(coordinator.capacity(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(coordinator.predict(&[0.0]).unwrap().is_empty());
        assert!(coordinator.evaluate(&[]).unwrap().is_empty());
    }

    #[test]
    fn predictions_follow_creation_order() {
        let trained = Arc::new(AtomicUsize::new(0));
        let mut coordinator = EnsembleCoordinator::new(cap(3), counting(&trained));
        coordinator.add_model();
        coordinator.add_model();
        assert_eq!(coordinator.predict(&[0.0, 0.0]).unwrap(), vec![1.0, 2.0]);
        assert_eq!(coordinator.evaluate(&[]).unwrap(), vec![10.0, 20.0]);
    }

    #[test]
    fn add_data_trains_each_slot_once() {
        let trained = Arc::new(AtomicUsize::new(0));
        let mut coordinator = EnsembleCoordinator::new(cap(4), counting(&trained));
        for _ in 0..3 {
            coordinator.add_model();
        }
        coordinator
            .add_data(&[DataPoint::new(vec![1.0], 1.0)])
            .unwrap();
        assert_eq!(trained.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn capacity_is_advisory() {
        let mut coordinator = EnsembleCoordinator::new(cap(1), factory(|| ConstantModel::new(1.0)));
        let first = coordinator.add_model();
        assert!(coordinator.is_full());
        let second = coordinator.add_model();
        assert_ne!(first, second);
        assert_eq!(coordinator.slot_ids(), vec![first, second]);
        assert_eq!(coordinator.predict(&[]).unwrap().len(), 2);
        let summary = coordinator.summary();
        assert_eq!(summary.capacity, 1);
        assert_eq!(summary.populated, 2);
        assert_eq!(summary.slots[0].id, first);
        assert_eq!(summary.slots[1].model, "constant");
        assert!(summary.slots[0].created_at <= summary.slots[1].created_at);
    }

    #[test]
    fn over_capacity_is_logged_as_warning() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = EnsembleTelemetry::builder("coordinator")
            .sink(sink.clone())
            .min_level(LogLevel::Debug)
            .build()
            .unwrap();
        let mut coordinator =
            EnsembleCoordinator::new(cap(1), factory(|| ConstantModel::new(1.0)))
                .with_telemetry(telemetry);
        coordinator.add_model();
        coordinator.add_data(&[]).unwrap();
        assert!(sink.messages().is_empty());
        coordinator.add_model();
        assert_eq!(sink.messages(), vec!["model_added_over_capacity".to_string()]);
    }

    #[test]
    fn model_errors_pass_through_unchanged() {
        let mut coordinator = EnsembleCoordinator::new(cap(2), factory(|| FailingModel));
        coordinator.add_model();
        let err = coordinator.predict(&[1.0]).unwrap_err();
        assert!(matches!(err, EnsembleError::Model(_)));
        assert_eq!(err.to_string(), "predict exploded");
        let err = coordinator.add_data(&[]).unwrap_err();
        assert_eq!(err.to_string(), "train exploded");
        let err = coordinator.evaluate(&[]).unwrap_err();
        assert_eq!(err.to_string(), "evaluate exploded");
    }

    struct FlakyModel {
        fails: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FlakyModel {
        fn touch(&self, op: &str) -> anyhow::Result<f32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                anyhow::bail!("{op} failed in slot 1");
            }
            Ok(0.5)
        }
    }

    impl Model for FlakyModel {
        fn train(&mut self, _data: &[DataPoint]) -> anyhow::Result<()> {
            self.touch("train").map(|_| ())
        }

        fn predict(&self, _features: &[f32]) -> anyhow::Result<f32> {
            self.touch("predict")
        }

        fn evaluate(&self, _data: &[DataPoint]) -> anyhow::Result<f32> {
            self.touch("evaluate")
        }
    }

    #[test]
    fn fan_out_stops_at_first_failing_slot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let next = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&calls);
        let mut coordinator = EnsembleCoordinator::new(
            cap(3),
            factory(move || FlakyModel {
                fails: next.fetch_add(1, Ordering::SeqCst) == 1,
                calls: Arc::clone(&shared),
            }),
        );
        for _ in 0..3 {
            coordinator.add_model();
        }

        let err = coordinator.add_data(&[]).unwrap_err();
        assert!(matches!(err, EnsembleError::Model(_)));
        assert_eq!(err.to_string(), "train failed in slot 1");
        assert_eq!(calls.swap(0, Ordering::SeqCst), 2);

        let err = coordinator.predict(&[0.0]).unwrap_err();
        assert_eq!(err.to_string(), "predict failed in slot 1");
        assert_eq!(calls.swap(0, Ordering::SeqCst), 2);

        let err = coordinator.evaluate(&[]).unwrap_err();
        assert_eq!(err.to_string(), "evaluate failed in slot 1");
        assert_eq!(calls.swap(0, Ordering::SeqCst), 2);
    }
}
