//! Wire protocol errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Unrecognized line: {0:?}")]
    UnrecognizedLine(String),

    #[error("Malformed alcohol reading: {0:?}")]
    MalformedReading(String),

    #[error("Line exceeds {max} bytes")]
    LineTooLong { max: usize },
}

pub type WireResult<T> = Result<T, WireError>;
