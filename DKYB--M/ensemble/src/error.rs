use thiserror::Error;

/// Errors raised by ensemble operations.
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// Identifier was never issued by the registry.
    #[error("controller with id {0} not found")]
    UnknownController(String),
    /// Failure raised by a model slot, passed through untouched.
    #[error(transparent)]
    Model(#[from] anyhow::Error),
}

impl EnsembleError {
    /// Identifier carried by an unknown-controller error.
    #[must_use]
    pub fn controller_id(&self) -> Option<&str> {
        match self {
            Self::UnknownController(id) => Some(id),
            Self::Model(_) => None,
        }
    }
}

/// Result alias used by the coordinator and registry.
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Errors raised while loading ensemble configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (filesystem).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing failure.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Ensembles need room for at least one model.
    #[error("default_capacity must be greater than zero")]
    InvalidCapacity,
}
