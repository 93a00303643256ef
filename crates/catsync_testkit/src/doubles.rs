//! Scripted collaborators for driving `SyncController` directly.
//!
//! [`RecordingProcessor`] logs every lifecycle call into a shared
//! [`ProcessorLog`] and fails on request, so controller guarantees can be
//! checked without a target system.

use catsync_engine::{
    JobLoader, ObjectProcessor, Summary, SyncError, SyncJobConfiguration, SyncResult, UnitOutcome,
};
use catsync_job::{DomainType, JobEntry, TransactionJob, TransactionJobUnit};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// A processor lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorEvent {
    /// `transaction_job_unit_start`.
    Start(String),
    /// `process`, with the entry's type and guid.
    Process(String, DomainType, String),
    /// `transaction_job_unit_end`.
    End(String, UnitOutcome),
    /// `finished`.
    Finished,
}

/// Shared record of processor calls.
#[derive(Debug, Clone, Default)]
pub struct ProcessorLog {
    events: Arc<Mutex<Vec<ProcessorEvent>>>,
}

impl ProcessorLog {
    fn push(&self, event: ProcessorEvent) {
        self.events.lock().push(event);
    }

    /// Returns every call in order.
    pub fn events(&self) -> Vec<ProcessorEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of starts of a unit.
    pub fn starts(&self, unit: &str) -> usize {
        self.count(|e| matches!(e, ProcessorEvent::Start(u) if u == unit))
    }

    /// Returns the number of ends of a unit.
    pub fn ends(&self, unit: &str) -> usize {
        self.count(|e| matches!(e, ProcessorEvent::End(u, _) if u == unit))
    }

    /// Returns the outcome a unit was ended with, if it was ended.
    pub fn outcome(&self, unit: &str) -> Option<UnitOutcome> {
        self.events.lock().iter().find_map(|e| match e {
            ProcessorEvent::End(u, outcome) if u == unit => Some(*outcome),
            _ => None,
        })
    }

    /// Returns the guids processed in a unit, in order.
    pub fn processed(&self, unit: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProcessorEvent::Process(u, _, guid) if u == unit => Some(guid.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of `finished` calls.
    pub fn finished_count(&self) -> usize {
        self.count(|e| *e == ProcessorEvent::Finished)
    }

    fn count(&self, predicate: impl Fn(&ProcessorEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

/// A processor that records calls and fails where it was told to.
#[derive(Debug, Default)]
pub struct RecordingProcessor {
    log: ProcessorLog,
    missing_change_sets: HashSet<String>,
    failing_guids: HashSet<String>,
    fail_finished: bool,
    open: Option<(String, usize)>,
}

impl RecordingProcessor {
    /// Creates a processor that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle on the call log.
    pub fn log(&self) -> ProcessorLog {
        self.log.clone()
    }

    /// Fails the start of `unit` as if its change set did not exist.
    pub fn missing_change_set(mut self, unit: &str) -> Self {
        self.missing_change_sets.insert(unit.to_string());
        self
    }

    /// Fails every entry with this guid.
    pub fn failing_entry(mut self, guid: &str) -> Self {
        self.failing_guids.insert(guid.to_string());
        self
    }

    /// Fails the `finished` call.
    pub fn failing_finished(mut self) -> Self {
        self.fail_finished = true;
        self
    }
}

impl ObjectProcessor for RecordingProcessor {
    fn transaction_job_unit_start(&mut self, unit_name: &str) -> SyncResult<()> {
        self.log.push(ProcessorEvent::Start(unit_name.to_string()));
        if self.missing_change_sets.contains(unit_name) {
            return Err(SyncError::change_set_not_found("change set not found", unit_name));
        }
        self.open = Some((unit_name.to_string(), 0));
        Ok(())
    }

    fn process(&mut self, entry: JobEntry) -> SyncResult<()> {
        let (unit, processed) = self
            .open
            .as_mut()
            .ok_or_else(|| SyncError::Target("no transaction job unit is open".into()))?;
        self.log.push(ProcessorEvent::Process(
            unit.clone(),
            entry.domain_type,
            entry.guid.clone(),
        ));
        if self.failing_guids.contains(&entry.guid) {
            return Err(SyncError::rolled_back(
                unit.as_str(),
                format!("failed to apply {} {}", entry.domain_type, entry.guid),
                SyncError::Target(format!("write to {} failed", entry.guid)),
            ));
        }
        *processed += 1;
        Ok(())
    }

    fn transaction_job_unit_end(
        &mut self,
        unit_name: &str,
        outcome: UnitOutcome,
        summary: &mut Summary,
    ) -> SyncResult<()> {
        self.log.push(ProcessorEvent::End(unit_name.to_string(), outcome));
        let processed = self.open.take().map(|(_, n)| n).unwrap_or(0);
        summary.record_unit(unit_name, processed, outcome);
        Ok(())
    }

    fn finished(&mut self, _summary: &Summary) -> SyncResult<()> {
        self.log.push(ProcessorEvent::Finished);
        if self.fail_finished {
            return Err(SyncError::Target("index queue unavailable".into()));
        }
        Ok(())
    }
}

/// Hands out copies of a fixed job.
#[derive(Debug, Clone)]
pub struct StaticJobLoader {
    job: TransactionJob,
}

impl StaticJobLoader {
    /// Serves `job` on every load.
    pub fn new(job: TransactionJob) -> Self {
        Self { job }
    }

    /// Serves a fresh job with one unit per `(name, entries)` pair.
    pub fn with_units(units: impl IntoIterator<Item = (&'static str, Vec<JobEntry>)>) -> Self {
        let mut job = TransactionJob::new(Uuid::new_v4());
        for (name, entries) in units {
            let mut unit = TransactionJobUnit::new(name);
            for entry in entries {
                unit.push(entry);
            }
            job.push(unit);
        }
        Self::new(job)
    }

    /// Returns the served job.
    pub fn job(&self) -> &TransactionJob {
        &self.job
    }
}

impl JobLoader for StaticJobLoader {
    fn load_transaction_job(&self, _config: &SyncJobConfiguration) -> SyncResult<TransactionJob> {
        Ok(self.job.clone())
    }
}
