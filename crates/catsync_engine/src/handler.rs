//! Failure classification.
//!
//! Every failure caught while running a unit, or in the terminal
//! `finished()` call, becomes exactly one [`SyncErrorResultItem`]. Handlers
//! are evaluated in order and the first one that accepts the error records
//! it.

use crate::error::SyncError;
use crate::summary::{JobEntryType, Summary, SyncErrorResultItem};
use std::error::Error as _;
use tracing::warn;

/// Turns one class of errors into error records.
pub trait ExceptionHandler: Send + Sync {
    /// Returns true if this handler records `error`.
    fn handles(&self, error: &SyncError) -> bool;

    /// Builds the record for `error` raised while running `unit_name`.
    fn error_item(&self, error: &SyncError, unit_name: &str) -> SyncErrorResultItem;
}

/// Records missing change sets and rolled-back units against their change set.
#[derive(Debug, Default)]
pub struct ChangeSetErrorHandler;

impl ExceptionHandler for ChangeSetErrorHandler {
    fn handles(&self, error: &SyncError) -> bool {
        matches!(
            error,
            SyncError::ChangeSetNotFound { .. } | SyncError::TransactionRolledBack { .. }
        )
    }

    fn error_item(&self, error: &SyncError, unit_name: &str) -> SyncErrorResultItem {
        let (name, message) = match error {
            SyncError::ChangeSetNotFound {
                message,
                change_set,
            } => (change_set.as_str(), message.clone()),
            SyncError::TransactionRolledBack { unit, message, .. } => (unit.as_str(), message.clone()),
            other => (unit_name, other.to_string()),
        };
        SyncErrorResultItem {
            job_entry_type: JobEntryType::ChangeSet,
            transaction_job_unit_name: name.to_string(),
            message,
            cause: error.source().map(ToString::to_string),
        }
    }
}

/// Records any error against the unit it was raised in.
#[derive(Debug, Default)]
pub struct GenericErrorHandler;

impl ExceptionHandler for GenericErrorHandler {
    fn handles(&self, _error: &SyncError) -> bool {
        true
    }

    fn error_item(&self, error: &SyncError, unit_name: &str) -> SyncErrorResultItem {
        SyncErrorResultItem {
            job_entry_type: error
                .domain_type()
                .map(JobEntryType::Entity)
                .unwrap_or(JobEntryType::ChangeSet),
            transaction_job_unit_name: unit_name.to_string(),
            message: error.to_string(),
            cause: error.source().map(ToString::to_string),
        }
    }
}

/// An ordered, first-match-wins list of handlers.
pub struct ExceptionHandlerChain {
    handlers: Vec<Box<dyn ExceptionHandler>>,
}

impl ExceptionHandlerChain {
    /// Creates an empty chain. Errors no handler accepts are recorded generically.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Creates the standard chain: change set errors, then everything else.
    pub fn standard() -> Self {
        Self::empty()
            .with_handler(ChangeSetErrorHandler)
            .with_handler(GenericErrorHandler)
    }

    /// Appends a handler.
    pub fn with_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Records `error` in `summary`.
    pub fn handle(&self, error: SyncError, unit_name: &str, summary: &mut Summary) {
        let item = match self.handlers.iter().find(|h| h.handles(&error)) {
            Some(handler) => handler.error_item(&error, unit_name),
            None => GenericErrorHandler.error_item(&error, unit_name),
        };
        warn!(
            unit = %item.transaction_job_unit_name,
            entry_type = %item.job_entry_type,
            error = %error,
            "recorded synchronization error"
        );
        summary.add_error(item);
    }
}

impl Default for ExceptionHandlerChain {
    fn default() -> Self {
        Self::standard()
    }
}
