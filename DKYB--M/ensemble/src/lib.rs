#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! DKYB ensemble stack: a coordinator fanning train/predict/evaluate calls across
//! interchangeable models, and a registry addressing coordinators by identifier.

/// Ensemble configuration loading.
pub mod config;
/// Fixed-capacity model ensembles.
pub mod coordinator;
/// Labelled samples passed through to models.
pub mod data;
/// Error types.
pub mod error;
/// Model capability contract.
pub mod model;
/// Reference model implementations.
pub mod models;
/// Identifier-keyed coordinator registry.
pub mod registry;
/// Structured logging wiring.
pub mod telemetry;

pub use config::{EnsembleConfig, LoggingConfig};
pub use coordinator::{EnsembleCoordinator, EnsembleSummary, SlotSummary};
pub use data::DataPoint;
pub use error::{ConfigError, EnsembleError, EnsembleResult};
pub use model::{factory, Model, ModelFactory};
pub use models::{ConstantModel, LinearRegressionModel, MeanModel, ModelKind};
pub use registry::EnsembleRegistry;
pub use telemetry::{EnsembleTelemetry, EnsembleTelemetryBuilder};
