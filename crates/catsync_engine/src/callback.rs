//! Transaction callbacks invoked around each applied object.
//!
//! Callbacks carry no state of their own between objects. Everything that
//! must survive from one object to the next within a unit lives in the
//! [`UnitContext`], which is created at unit start and dropped at unit end.

use crate::error::SyncResult;
use crate::target::{IndexNotification, IndexNotificationSink, IndexOperation, IndexType, TargetSession};
use catsync_job::DomainType;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Unit-of-work state shared by the callbacks of one unit.
pub struct UnitContext {
    unit_name: String,
    session: Arc<dyn TargetSession>,
    last_type: Option<DomainType>,
    ignore_changes: bool,
    flush_count: usize,
}

impl UnitContext {
    /// Creates the context for a unit.
    pub fn new(unit_name: impl Into<String>, session: Arc<dyn TargetSession>) -> Self {
        Self {
            unit_name: unit_name.into(),
            session,
            last_type: None,
            ignore_changes: false,
            flush_count: 0,
        }
    }

    /// Returns the unit name.
    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Returns the target session.
    pub fn session(&self) -> &dyn TargetSession {
        self.session.as_ref()
    }

    /// Flushes the session if `domain_type` differs from the previous object's type.
    ///
    /// Returns true if a flush happened.
    pub fn flush_if_type_changed(&mut self, domain_type: DomainType) -> SyncResult<bool> {
        if self.last_type == Some(domain_type) {
            return Ok(false);
        }
        self.session.flush()?;
        self.last_type = Some(domain_type);
        self.flush_count += 1;
        debug!(unit = %self.unit_name, domain_type = %domain_type, "flushed target session");
        Ok(true)
    }

    /// Sets the session's ignore-changes flag.
    pub fn set_ignore_changes(&mut self, ignore: bool) {
        self.session.set_ignore_changes(ignore);
        self.ignore_changes = ignore;
    }

    /// Returns the ignore-changes flag last set in this unit.
    pub fn ignore_changes(&self) -> bool {
        self.ignore_changes
    }

    /// Returns the number of flushes in this unit.
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }
}

/// Hooks around each applied object.
///
/// "Update" covers both adds and updates.
pub trait TransactionCallback: Send + Sync {
    /// Runs before an add or update.
    fn pre_update(&self, _ctx: &mut UnitContext, _domain_type: DomainType, _guid: &str) -> SyncResult<()> {
        Ok(())
    }

    /// Runs after an add or update.
    fn post_update(&self, _ctx: &mut UnitContext, _domain_type: DomainType, _guid: &str) -> SyncResult<()> {
        Ok(())
    }

    /// Runs before a removal.
    fn pre_remove(&self, _ctx: &mut UnitContext, _domain_type: DomainType, _guid: &str) -> SyncResult<()> {
        Ok(())
    }

    /// Runs after a removal.
    fn post_remove(&self, _ctx: &mut UnitContext, _domain_type: DomainType, _guid: &str) -> SyncResult<()> {
        Ok(())
    }
}

/// Enqueues search-index notifications for applied objects of indexed types.
pub struct IndexNotificationCallback {
    sink: Arc<dyn IndexNotificationSink>,
    index_types: HashMap<DomainType, IndexType>,
}

impl IndexNotificationCallback {
    /// Creates the callback.
    pub fn new(sink: Arc<dyn IndexNotificationSink>, index_types: HashMap<DomainType, IndexType>) -> Self {
        Self { sink, index_types }
    }

    fn notify(&self, domain_type: DomainType, guid: &str, operation: IndexOperation) -> SyncResult<()> {
        match self.index_types.get(&domain_type) {
            Some(index_type) => self
                .sink
                .enqueue(IndexNotification::new(*index_type, operation, guid)),
            None => {
                trace!(domain_type = %domain_type, guid, "type is not indexed");
                Ok(())
            }
        }
    }
}

impl TransactionCallback for IndexNotificationCallback {
    fn post_update(&self, _ctx: &mut UnitContext, domain_type: DomainType, guid: &str) -> SyncResult<()> {
        self.notify(domain_type, guid, IndexOperation::Update)
    }

    fn post_remove(&self, _ctx: &mut UnitContext, domain_type: DomainType, guid: &str) -> SyncResult<()> {
        self.notify(domain_type, guid, IndexOperation::Delete)
    }
}

/// Suppresses change tracking while updating types in the ignore set.
pub struct IgnoreChangesCallback {
    ignored: HashSet<DomainType>,
}

impl IgnoreChangesCallback {
    /// Creates the callback.
    pub fn new(ignored: HashSet<DomainType>) -> Self {
        Self { ignored }
    }
}

impl TransactionCallback for IgnoreChangesCallback {
    fn pre_update(&self, ctx: &mut UnitContext, domain_type: DomainType, _guid: &str) -> SyncResult<()> {
        ctx.set_ignore_changes(self.ignored.contains(&domain_type));
        Ok(())
    }
}

/// Flushes the session once per run of same-type objects.
#[derive(Default)]
pub struct PersistenceFlusherCallback;

impl PersistenceFlusherCallback {
    /// Creates the callback.
    pub fn new() -> Self {
        Self
    }
}

impl TransactionCallback for PersistenceFlusherCallback {
    fn pre_update(&self, ctx: &mut UnitContext, domain_type: DomainType, _guid: &str) -> SyncResult<()> {
        ctx.flush_if_type_changed(domain_type).map(|_| ())
    }

    fn pre_remove(&self, ctx: &mut UnitContext, domain_type: DomainType, _guid: &str) -> SyncResult<()> {
        ctx.flush_if_type_changed(domain_type).map(|_| ())
    }
}
