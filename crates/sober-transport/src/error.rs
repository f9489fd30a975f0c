//! Transport errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid link endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to open {endpoint}: {source}")]
    Open {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Link write failed: {0}")]
    Write(#[source] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
