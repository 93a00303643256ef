//! Outcome accounting for one synchronization run.

use catsync_job::{ChangeKind, DomainType};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What an error record is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobEntryType {
    /// A whole change set or unit.
    ChangeSet,
    /// A single domain object.
    Entity(DomainType),
}

impl fmt::Display for JobEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobEntryType::ChangeSet => f.write_str("ChangeSet"),
            JobEntryType::Entity(domain_type) => write!(f, "{domain_type}"),
        }
    }
}

/// How a unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitOutcome {
    /// Every entry was applied.
    Applied,
    /// Start or an entry failed.
    Failed,
}

/// One entry applied by a committed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResultItem {
    /// Type of the applied object.
    pub job_entry_type: DomainType,
    /// Guid of the applied object.
    pub job_entry_guid: String,
    /// Change that was applied.
    pub command: ChangeKind,
    /// Unit the entry belonged to.
    pub transaction_job_unit_name: String,
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorResultItem {
    /// What the failure is attributed to.
    pub job_entry_type: JobEntryType,
    /// Unit or change set that failed.
    pub transaction_job_unit_name: String,
    /// Error message.
    pub message: String,
    /// Underlying cause, if any.
    pub cause: Option<String>,
}

/// Per-unit bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    /// Unit name.
    pub name: String,
    /// Number of entries processed before the unit ended.
    pub processed: usize,
    /// How the unit ended.
    pub outcome: UnitOutcome,
}

/// The record of a `synchronize()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    job_id: Option<Uuid>,
    success_results: Vec<SyncResultItem>,
    sync_errors: Vec<SyncErrorResultItem>,
    units: Vec<UnitReport>,
}

impl Summary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of the job this run executed.
    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }

    /// Sets the id of the job this run executed.
    pub fn set_job_id(&mut self, id: Uuid) {
        self.job_id = Some(id);
    }

    /// Records an applied entry.
    pub fn add_success(&mut self, item: SyncResultItem) {
        self.success_results.push(item);
    }

    /// Records a failure.
    pub fn add_error(&mut self, item: SyncErrorResultItem) {
        self.sync_errors.push(item);
    }

    /// Records how a unit ended.
    pub fn record_unit(&mut self, name: impl Into<String>, processed: usize, outcome: UnitOutcome) {
        self.units.push(UnitReport {
            name: name.into(),
            processed,
            outcome,
        });
    }

    /// Returns the applied entries.
    pub fn success_results(&self) -> &[SyncResultItem] {
        &self.success_results
    }

    /// Returns the recorded failures.
    pub fn sync_errors(&self) -> &[SyncErrorResultItem] {
        &self.sync_errors
    }

    /// Returns the per-unit reports in execution order.
    pub fn units(&self) -> &[UnitReport] {
        &self.units
    }

    /// Returns the number of entries processed by a unit.
    pub fn processed_count(&self, unit_name: &str) -> Option<usize> {
        self.units
            .iter()
            .find(|u| u.name == unit_name)
            .map(|u| u.processed)
    }

    /// Returns true if any failure was recorded.
    pub fn has_errors(&self) -> bool {
        !self.sync_errors.is_empty()
    }

    /// Returns the number of recorded failures.
    pub fn number_of_errors(&self) -> usize {
        self.sync_errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary() {
        let summary = Summary::new();
        assert!(!summary.has_errors());
        assert_eq!(summary.number_of_errors(), 0);
        assert!(summary.success_results().is_empty());
        assert!(summary.job_id().is_none());
    }

    #[test]
    fn records_units_and_errors() {
        let mut summary = Summary::new();
        summary.add_success(SyncResultItem {
            job_entry_type: DomainType::Product,
            job_entry_guid: "p-1".into(),
            command: ChangeKind::Update,
            transaction_job_unit_name: "cs-1".into(),
        });
        summary.record_unit("cs-1", 1, UnitOutcome::Applied);
        summary.add_error(SyncErrorResultItem {
            job_entry_type: JobEntryType::ChangeSet,
            transaction_job_unit_name: "cs-2".into(),
            message: "change set not found".into(),
            cause: None,
        });
        summary.record_unit("cs-2", 0, UnitOutcome::Failed);

        assert!(summary.has_errors());
        assert_eq!(summary.number_of_errors(), 1);
        assert_eq!(summary.processed_count("cs-1"), Some(1));
        assert_eq!(summary.processed_count("cs-2"), Some(0));
        assert_eq!(summary.processed_count("cs-3"), None);
        assert_eq!(summary.units()[1].outcome, UnitOutcome::Failed);
    }

    #[test]
    fn entry_type_display() {
        assert_eq!(JobEntryType::ChangeSet.to_string(), "ChangeSet");
        assert_eq!(JobEntryType::Entity(DomainType::BaseAmount).to_string(), "BaseAmount");
    }
}
