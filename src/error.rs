//! Domain errors raised by the chart pipeline.
//!
//! Infrastructure failures (config, database, filesystem) travel as
//! `anyhow::Error`; only failures the caller is expected to branch on get a
//! variant here.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Network or service failure after retries were exhausted.
    #[error("external service error ({service}): {message}")]
    ExternalService { service: String, message: String },

    /// The metadata service had no usable match for a normalized query.
    #[error("no match for query '{query}'")]
    LookupFailure { query: String },

    /// Aggregation was attempted over zero resolved tracks.
    #[error("cannot summarize an empty track list")]
    EmptyInput,

    /// User-supplied date failed format or range validation.
    #[error("invalid date '{input}': {reason}")]
    InvalidDateInput { input: String, reason: String },
}

impl PipelineError {
    pub fn external(service: &str, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn lookup(query: &str) -> Self {
        Self::LookupFailure {
            query: query.to_string(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
