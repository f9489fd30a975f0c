//! Registry errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry record corrupt: {0}")]
    Corrupt(String),

    #[error("Registry serialization failed: {0}")]
    Serialization(String),

    #[error("Registry save rejected: {0}")]
    Rejected(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
