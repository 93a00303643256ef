//! Source-side collaborators and job construction.

use crate::error::{SyncError, SyncResult};
use catsync_job::{
    CategoryLocator, ChangeKind, DomainType, JobDescriptor, JobEntry, SerializableObject,
    TransactionJob, TransactionJobDescriptorEntry, TransactionJobUnit,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Publishing state of a change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeSetState {
    /// Accepting changes.
    Open,
    /// Closed for editing.
    Locked,
    /// Approved and waiting to be published.
    ReadyToPublish,
    /// Published to the target.
    Finalized,
}

/// One object tracked by a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetMember {
    /// Object type.
    pub domain_type: DomainType,
    /// Object guid.
    pub guid: String,
    /// Pending change.
    pub change_kind: ChangeKind,
}

impl ChangeSetMember {
    /// Creates a member.
    pub fn new(domain_type: DomainType, guid: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            domain_type,
            guid: guid.into(),
            change_kind,
        }
    }
}

/// A named group of pending source changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Change set name.
    pub name: String,
    /// Publishing state.
    pub state: ChangeSetState,
    /// Tracked objects in the order they were added.
    pub members: Vec<ChangeSetMember>,
}

impl ChangeSet {
    /// Creates an open, empty change set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ChangeSetState::Open,
            members: Vec::new(),
        }
    }

    /// Adds a member.
    pub fn with_member(mut self, domain_type: DomainType, guid: impl Into<String>, change_kind: ChangeKind) -> Self {
        self.members.push(ChangeSetMember::new(domain_type, guid, change_kind));
        self
    }

    /// Sets the state.
    pub fn with_state(mut self, state: ChangeSetState) -> Self {
        self.state = state;
        self
    }
}

/// Change set storage on the source system.
pub trait ChangeSetSource: Send + Sync {
    /// Finds a change set by name.
    fn find_change_set(&self, name: &str) -> SyncResult<Option<ChangeSet>>;

    /// Moves a change set to a new state.
    fn update_state(&self, name: &str, state: ChangeSetState) -> SyncResult<()>;
}

/// Turns a change selector into a job descriptor.
pub trait SourceSyncRequestAdapter: Send + Sync {
    /// Builds the descriptor for `selector`.
    fn build_job_descriptor(&self, selector: &str) -> SyncResult<JobDescriptor>;
}

/// Materializes source objects.
pub trait ObjectLoader: Send + Sync {
    /// Loads an object, or `None` if it does not exist on the source.
    fn load_object(&self, domain_type: DomainType, guid: &str) -> SyncResult<Option<SerializableObject>>;
}

/// Source-side object caches.
pub trait SourceCache: Send + Sync {
    /// Clears the object cache and the second-level cache.
    fn clear_caches(&self);
}

/// The typed collaborators of a source system.
#[derive(Clone)]
pub struct SourceSystem {
    /// Change set storage.
    pub change_sets: Arc<dyn ChangeSetSource>,
    /// Object materialization.
    pub objects: Arc<dyn ObjectLoader>,
    /// Caches cleared before a job is built.
    pub cache: Arc<dyn SourceCache>,
    /// Category lookups used for ordering.
    pub categories: Arc<dyn CategoryLocator>,
}

/// Builds descriptors from comma-separated change set names.
pub struct ChangeSetSourceAdapter {
    change_sets: Arc<dyn ChangeSetSource>,
}

impl ChangeSetSourceAdapter {
    /// Creates an adapter over change set storage.
    pub fn new(change_sets: Arc<dyn ChangeSetSource>) -> Self {
        Self { change_sets }
    }
}

impl SourceSyncRequestAdapter for ChangeSetSourceAdapter {
    fn build_job_descriptor(&self, selector: &str) -> SyncResult<JobDescriptor> {
        let names: Vec<&str> = selector
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Err(SyncError::Configuration("no change set selected".into()));
        }

        let mut descriptor = JobDescriptor::new(selector);
        for name in names {
            if descriptor.change_sets.iter().any(|selected| selected == name) {
                debug!(change_set = %name, "change set selected twice");
                continue;
            }
            descriptor.select_change_set(name);
            // A missing change set still gets its (empty) unit so the failure
            // is recorded against it when the unit starts.
            let Some(change_set) = self.change_sets.find_change_set(name)? else {
                warn!(change_set = %name, "selected change set not found");
                continue;
            };
            if change_set.state == ChangeSetState::Finalized {
                warn!(change_set = %name, "change set was already published");
            }
            for member in change_set.members {
                descriptor.push(TransactionJobDescriptorEntry::new(
                    member.domain_type,
                    member.guid,
                    member.change_kind,
                    name,
                ));
            }
        }

        debug!(selector, entries = descriptor.len(), "built job descriptor");
        Ok(descriptor)
    }
}

/// Groups descriptor entries into transaction job units.
pub struct TransactionJobBuilder {
    objects: Arc<dyn ObjectLoader>,
    cache: Arc<dyn SourceCache>,
}

impl TransactionJobBuilder {
    /// Creates a builder.
    pub fn new(objects: Arc<dyn ObjectLoader>, cache: Arc<dyn SourceCache>) -> Self {
        Self { objects, cache }
    }

    /// Builds the job for `descriptor`.
    ///
    /// Produces one unit per change set in first-appearance order. Source
    /// caches are cleared once before anything is read, so the whole job
    /// sees one snapshot. With `preload`, every add and update carries its
    /// materialized object.
    pub fn build(&self, descriptor: &JobDescriptor, preload: bool) -> SyncResult<TransactionJob> {
        self.cache.clear_caches();

        let mut job = TransactionJob::new(descriptor.id);
        for name in descriptor.change_set_names() {
            let mut unit = TransactionJobUnit::new(name);
            for entry in descriptor.entries.iter().filter(|e| e.change_set_name == name) {
                let mut job_entry = JobEntry::from_descriptor(entry);
                if preload && entry.change_kind.is_upsert() {
                    match self.objects.load_object(entry.domain_type, &entry.guid)? {
                        Some(object) => job_entry = job_entry.with_object(object),
                        None => warn!(
                            domain_type = %entry.domain_type,
                            guid = %entry.guid,
                            "source object missing at build time"
                        ),
                    }
                }
                unit.push(job_entry);
            }
            job.push(unit);
        }

        info!(
            job = %job.id,
            units = job.units().len(),
            entries = job.entry_count(),
            preload,
            "built transaction job"
        );
        Ok(job)
    }
}
