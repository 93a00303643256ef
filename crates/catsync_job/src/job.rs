//! Transaction jobs and their units.

use crate::descriptor::TransactionJobDescriptorEntry;
use crate::domain::{ChangeKind, DomainType};
use crate::object::SerializableObject;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry of a transaction job unit.
///
/// The source object is present when the job was built with preloading,
/// or always absent for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    /// Type of the changed object.
    pub domain_type: DomainType,
    /// Guid of the changed object.
    pub guid: String,
    /// Kind of change.
    pub change_kind: ChangeKind,
    /// Materialized source object, if loaded.
    pub source_object: Option<SerializableObject>,
}

impl JobEntry {
    /// Creates an entry without a materialized object.
    pub fn new(domain_type: DomainType, guid: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            domain_type,
            guid: guid.into(),
            change_kind,
            source_object: None,
        }
    }

    /// Creates an entry from a descriptor entry.
    pub fn from_descriptor(entry: &TransactionJobDescriptorEntry) -> Self {
        Self::new(entry.domain_type, entry.guid.clone(), entry.change_kind)
    }

    /// Attaches a materialized source object.
    pub fn with_object(mut self, object: SerializableObject) -> Self {
        self.source_object = Some(object);
        self
    }

    /// Removes and returns the materialized source object.
    pub fn take_object(&mut self) -> Option<SerializableObject> {
        self.source_object.take()
    }
}

/// An atomic group of entries applied inside a single target transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionJobUnit {
    name: String,
    entries: Vec<JobEntry>,
}

impl TransactionJobUnit {
    /// Creates an empty unit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Returns the unit name (usually the change set name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: JobEntry) {
        self.entries.push(entry);
    }

    /// Returns the entries in application order.
    pub fn entries(&self) -> &[JobEntry] {
        &self.entries
    }

    /// Returns the entries mutably, for sorting.
    pub fn entries_mut(&mut self) -> &mut [JobEntry] {
        &mut self.entries
    }

    /// Consumes the unit, returning its entries.
    pub fn into_entries(self) -> Vec<JobEntry> {
        self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the unit has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordered sequence of units.
///
/// Unit order is the safe global application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionJob {
    /// Job id, equal to the id of the descriptor it was built from.
    pub id: Uuid,
    units: Vec<TransactionJobUnit>,
}

impl TransactionJob {
    /// Creates an empty job.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            units: Vec::new(),
        }
    }

    /// Appends a unit.
    pub fn push(&mut self, unit: TransactionJobUnit) {
        self.units.push(unit);
    }

    /// Returns the units in order.
    pub fn units(&self) -> &[TransactionJobUnit] {
        &self.units
    }

    /// Returns the units mutably.
    pub fn units_mut(&mut self) -> &mut [TransactionJobUnit] {
        &mut self.units
    }

    /// Consumes the job, returning its units.
    pub fn into_units(self) -> Vec<TransactionJobUnit> {
        self.units
    }

    /// Returns the total number of entries across all units.
    pub fn entry_count(&self) -> usize {
        self.units.iter().map(TransactionJobUnit::len).sum()
    }

    /// Returns true if the job has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_keeps_insertion_order() {
        let mut unit = TransactionJobUnit::new("cs-1");
        unit.push(JobEntry::new(DomainType::Product, "p-1", ChangeKind::Update));
        unit.push(JobEntry::new(DomainType::Catalog, "cat", ChangeKind::Add));

        assert_eq!(unit.name(), "cs-1");
        let guids: Vec<&str> = unit.entries().iter().map(|e| e.guid.as_str()).collect();
        assert_eq!(guids, vec!["p-1", "cat"]);
    }

    #[test]
    fn job_counts_entries() {
        let mut job = TransactionJob::new(Uuid::new_v4());
        assert!(job.is_empty());

        let mut first = TransactionJobUnit::new("a");
        first.push(JobEntry::new(DomainType::Product, "p-1", ChangeKind::Update));
        let mut second = TransactionJobUnit::new("b");
        second.push(JobEntry::new(DomainType::Product, "p-2", ChangeKind::Update));
        second.push(JobEntry::new(DomainType::Product, "p-3", ChangeKind::Delete));
        job.push(first);
        job.push(second);

        assert_eq!(job.units().len(), 2);
        assert_eq!(job.entry_count(), 3);
    }

    #[test]
    fn take_object_moves_ownership() {
        let object = SerializableObject::new(
            "pl-1",
            crate::object::DomainSnapshot::PriceList(crate::object::PriceListSnapshot {
                name: "Retail".into(),
                currency: "USD".into(),
            }),
        );
        let mut entry =
            JobEntry::new(DomainType::PriceList, "pl-1", ChangeKind::Add).with_object(object);
        assert!(entry.take_object().is_some());
        assert!(entry.take_object().is_none());
    }
}
