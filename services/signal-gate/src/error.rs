//! Gate errors

use thiserror::Error;

/// Errors surfaced by the gate itself.
///
/// Collector failures are never escalated here; they are absorbed into
/// the failed snapshot for their source.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
