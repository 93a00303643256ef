//! Job descriptors.

use crate::domain::{ChangeKind, DomainType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One detected change: a `(type, guid, change kind)` tuple and the change
/// set it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionJobDescriptorEntry {
    /// Type of the changed object.
    pub domain_type: DomainType,
    /// Guid of the changed object.
    pub guid: String,
    /// Kind of change.
    pub change_kind: ChangeKind,
    /// Name of the change set that owns the change.
    pub change_set_name: String,
}

impl TransactionJobDescriptorEntry {
    /// Creates a new descriptor entry.
    pub fn new(
        domain_type: DomainType,
        guid: impl Into<String>,
        change_kind: ChangeKind,
        change_set_name: impl Into<String>,
    ) -> Self {
        Self {
            domain_type,
            guid: guid.into(),
            change_kind,
            change_set_name: change_set_name.into(),
        }
    }
}

/// A named, ordered collection of descriptor entries and the selector that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Unique id, shared with the transaction job built from it.
    pub id: Uuid,
    /// The selector the descriptor was built from (e.g. change set names).
    pub selector: String,
    /// Change sets named by the selector, in selector order, including
    /// those that produced no entries.
    #[serde(default)]
    pub change_sets: Vec<String>,
    /// Entries in detection order.
    pub entries: Vec<TransactionJobDescriptorEntry>,
}

impl JobDescriptor {
    /// Creates an empty descriptor with a fresh id.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            selector: selector.into(),
            change_sets: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Declares a selected change set.
    pub fn select_change_set(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.change_sets.contains(&name) {
            self.change_sets.push(name);
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: TransactionJobDescriptorEntry) {
        self.entries.push(entry);
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no changes were detected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the selected change set names followed by any other change
    /// set named by an entry, in first-appearance order.
    pub fn change_set_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.change_sets.iter().map(String::as_str).collect();
        for entry in &self.entries {
            if !names.contains(&entry.change_set_name.as_str()) {
                names.push(&entry.change_set_name);
            }
        }
        names
    }
}
