//! Error types for the job model.

use crate::domain::DomainType;
use std::io;
use thiserror::Error;

/// Result type for job model operations.
pub type JobResult<T> = Result<T, JobError>;

/// Errors that can occur while building, sorting or persisting jobs.
#[derive(Debug, Error)]
pub enum JobError {
    /// A domain type has no rank in the dependency precedence table.
    #[error("domain type {domain_type} has no rank in the dependency table")]
    UnmappedDomainType {
        /// The unmapped type.
        domain_type: DomainType,
    },

    /// A domain type name could not be parsed.
    #[error("unknown domain type: {0}")]
    UnknownDomainType(String),

    /// A category hierarchy loops back on itself.
    #[error("cyclic category hierarchy at {guid}")]
    CyclicHierarchy {
        /// Category at which the cycle was detected.
        guid: String,
    },

    /// A persisted job could not be found.
    #[error("persisted job not found: {id}")]
    JobNotFound {
        /// Job id or directory that was looked up.
        id: String,
    },

    /// A composite guid is malformed.
    #[error("malformed composite guid: {0}")]
    MalformedGuid(String),

    /// I/O error in the job store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error in the job store.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JobError {
    /// Returns true if this error indicates a misconfigured engine rather than bad data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            JobError::UnmappedDomainType { .. }
                | JobError::UnknownDomainType(_)
                | JobError::CyclicHierarchy { .. }
        )
    }
}
