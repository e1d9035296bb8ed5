//! Keyed registry addressing coordinators by string identifier.

use std::{num::NonZeroUsize, sync::Arc};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    coordinator::{EnsembleCoordinator, EnsembleSummary},
    data::DataPoint,
    error::{EnsembleError, EnsembleResult},
    model::ModelFactory,
    telemetry::{emit, EnsembleTelemetry},
};

/// Prefix used for issued identifiers unless configured otherwise.
pub const DEFAULT_ID_PREFIX: &str = "controller";

#[derive(Debug)]
struct RegistryState {
    instances: IndexMap<String, EnsembleCoordinator>,
    // Monotonic, never derived from `instances.len()`.
    issued: u64,
}

/// Registry that owns every live coordinator.
///
/// Cloning yields another handle to the same registry. Identifier assignment
/// happens under the write lock, so concurrent creators never collide.
#[derive(Debug, Clone)]
pub struct EnsembleRegistry {
    inner: Arc<RwLock<RegistryState>>,
    prefix: Arc<str>,
    telemetry: Option<EnsembleTelemetry>,
}

impl Default for EnsembleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsembleRegistry {
    /// Creates an empty registry issuing `controller-<n>` identifiers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_ID_PREFIX)
    }

    /// Creates an empty registry issuing `<prefix>-<n>` identifiers.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            inner: Arc::new(RwLock::new(RegistryState {
                instances: IndexMap::new(),
                issued: 0,
            })),
            prefix: Arc::from(prefix),
            telemetry: None,
        }
    }

    /// Attaches telemetry shared with every coordinator created afterwards.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: EnsembleTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Creates a coordinator and returns its freshly issued identifier.
    pub fn create_controller(&self, capacity: NonZeroUsize, factory: ModelFactory) -> String {
        let mut coordinator = EnsembleCoordinator::new(capacity, factory);
        if let Some(telemetry) = &self.telemetry {
            coordinator = coordinator.with_telemetry(telemetry.clone());
        }
        let id = {
            let mut state = self.inner.write();
            state.issued += 1;
            let id = format!("{}-{}", self.prefix, state.issued);
            state.instances.insert(id.clone(), coordinator);
            id
        };
        self.log(
            LogLevel::Info,
            "controller_created",
            &json!({ "id": id, "capacity": capacity.get() }),
        );
        id
    }

    /// Trains every model of the addressed ensemble.
    pub fn add_data(&self, id: &str, data: &[DataPoint]) -> EnsembleResult<()> {
        self.with_mut(id, |coordinator| coordinator.add_data(data))??;
        self.log(
            LogLevel::Debug,
            "data_added",
            &json!({ "id": id, "samples": data.len() }),
        );
        Ok(())
    }

    /// Adds one model to the addressed ensemble and returns its slot id.
    pub fn add_model(&self, id: &str) -> EnsembleResult<Uuid> {
        let slot = self.with_mut(id, EnsembleCoordinator::add_model)?;
        self.log(
            LogLevel::Info,
            "model_added",
            &json!({ "id": id, "slot": slot }),
        );
        Ok(slot)
    }

    /// Returns one prediction per populated model of the addressed ensemble.
    pub fn predict(&self, id: &str, features: &[f32]) -> EnsembleResult<Vec<f32>> {
        let predictions = self.with_ref(id, |coordinator| coordinator.predict(features))??;
        self.log(
            LogLevel::Debug,
            "predictions_produced",
            &json!({ "id": id, "count": predictions.len() }),
        );
        Ok(predictions)
    }

    /// Returns one evaluation score per populated model of the addressed ensemble.
    pub fn evaluate(&self, id: &str, data: &[DataPoint]) -> EnsembleResult<Vec<f32>> {
        let scores = self.with_ref(id, |coordinator| coordinator.evaluate(data))??;
        self.log(
            LogLevel::Debug,
            "evaluations_produced",
            &json!({ "id": id, "count": scores.len() }),
        );
        Ok(scores)
    }

    /// Summary of the addressed ensemble.
    pub fn describe(&self, id: &str) -> EnsembleResult<EnsembleSummary> {
        self.with_ref(id, EnsembleCoordinator::summary)
    }

    /// Issued identifiers in creation order.
    #[must_use]
    pub fn controller_ids(&self) -> Vec<String> {
        self.inner.read().instances.keys().cloned().collect()
    }

    /// Whether the identifier was issued by this registry.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().instances.contains_key(id)
    }

    /// Number of live coordinators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().instances.len()
    }

    /// Whether no coordinator has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().instances.is_empty()
    }

    fn with_ref<T>(
        &self,
        id: &str,
        op: impl FnOnce(&EnsembleCoordinator) -> T,
    ) -> EnsembleResult<T> {
        let state = self.inner.read();
        if let Some(coordinator) = state.instances.get(id) {
            return Ok(op(coordinator));
        }
        drop(state);
        Err(self.unknown(id))
    }

    fn with_mut<T>(
        &self,
        id: &str,
        op: impl FnOnce(&mut EnsembleCoordinator) -> T,
    ) -> EnsembleResult<T> {
        let mut state = self.inner.write();
        if let Some(coordinator) = state.instances.get_mut(id) {
            return Ok(op(coordinator));
        }
        drop(state);
        Err(self.unknown(id))
    }

    fn unknown(&self, id: &str) -> EnsembleError {
        self.log(LogLevel::Warn, "controller_not_found", &json!({ "id": id }));
        EnsembleError::UnknownController(id.to_string())
    }

    fn log(&self, level: LogLevel, message: &str, metadata: &serde_json::Value) {
        emit(self.telemetry.as_ref(), level, message, metadata);
    }
}
