//! Runtime errors

use thiserror::Error;

use sober_registry::RegistryError;
use sober_transport::TransportError;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),

    /// The link reader stopped; nothing more will arrive
    #[error("Sensor link closed")]
    LinkClosed,
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
