//! Error types for the sync engine.

use catsync_job::{DomainType, JobError};
use std::io;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The engine or the job configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A change set named by the selector or a unit does not exist.
    #[error("{message}: {change_set}")]
    ChangeSetNotFound {
        /// Error message.
        message: String,
        /// Name of the missing change set.
        change_set: String,
    },

    /// A unit's target transaction was rolled back.
    #[error("transaction for unit {unit} rolled back: {message}")]
    TransactionRolledBack {
        /// Unit whose transaction was rolled back.
        unit: String,
        /// Error message.
        message: String,
        /// The failure that caused the rollback.
        source: Box<SyncError>,
    },

    /// A domain object could not be found.
    #[error("{domain_type} {guid} not found")]
    EntityNotFound {
        /// Type of the missing object.
        domain_type: DomainType,
        /// Guid of the missing object.
        guid: String,
    },

    /// An adapter rejected an operation.
    #[error("{domain_type} adapter error: {message}")]
    Adapter {
        /// Adapter's domain type.
        domain_type: DomainType,
        /// Error message.
        message: String,
    },

    /// Target persistence failure.
    #[error("target error: {0}")]
    Target(String),

    /// Source persistence failure.
    #[error("source error: {0}")]
    Source(String),

    /// Job model error.
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    /// Creates a change-set-not-found error.
    pub fn change_set_not_found(message: impl Into<String>, change_set: impl Into<String>) -> Self {
        SyncError::ChangeSetNotFound {
            message: message.into(),
            change_set: change_set.into(),
        }
    }

    /// Wraps `source` as the cause of a unit rollback.
    pub fn rolled_back(unit: impl Into<String>, message: impl Into<String>, source: SyncError) -> Self {
        SyncError::TransactionRolledBack {
            unit: unit.into(),
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error must abort `synchronize()` instead of being
    /// recorded in the summary.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Configuration(_) => true,
            SyncError::Job(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// Returns the change set this error is attributed to, if any.
    pub fn change_set(&self) -> Option<&str> {
        match self {
            SyncError::ChangeSetNotFound { change_set, .. } => Some(change_set),
            SyncError::TransactionRolledBack { unit, .. } => Some(unit),
            _ => None,
        }
    }

    /// Returns the domain type this error is attributed to, if any.
    pub fn domain_type(&self) -> Option<DomainType> {
        match self {
            SyncError::EntityNotFound { domain_type, .. }
            | SyncError::Adapter { domain_type, .. } => Some(*domain_type),
            SyncError::Job(JobError::UnmappedDomainType { domain_type }) => Some(*domain_type),
            SyncError::TransactionRolledBack { source, .. } => source.domain_type(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn fatal_classification() {
        assert!(SyncError::Configuration("no selector".into()).is_fatal());
        assert!(SyncError::Job(JobError::UnmappedDomainType {
            domain_type: DomainType::CouponUsage
        })
        .is_fatal());

        assert!(!SyncError::change_set_not_found("change set not found", "cs").is_fatal());
        assert!(!SyncError::Target("disk full".into()).is_fatal());
        assert!(!SyncError::Job(JobError::JobNotFound { id: "x".into() }).is_fatal());
    }

    #[test]
    fn rollback_keeps_cause() {
        let err = SyncError::rolled_back(
            "cs-1",
            "failed to apply UPDATE Product p-1",
            SyncError::EntityNotFound {
                domain_type: DomainType::Product,
                guid: "p-1".into(),
            },
        );

        assert_eq!(err.change_set(), Some("cs-1"));
        assert_eq!(err.domain_type(), Some(DomainType::Product));
        assert_eq!(err.source().unwrap().to_string(), "Product p-1 not found");
        assert_eq!(
            err.to_string(),
            "transaction for unit cs-1 rolled back: failed to apply UPDATE Product p-1"
        );
    }

    #[test]
    fn change_set_not_found_display() {
        let err = SyncError::change_set_not_found("change set not found", "unknown_cs");
        assert_eq!(err.change_set(), Some("unknown_cs"));
        assert_eq!(err.to_string(), "change set not found: unknown_cs");
    }
}
