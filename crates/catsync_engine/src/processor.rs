//! Object processors apply the entries of a job, one unit at a time.

use crate::adapter::AdapterRegistry;
use crate::callback::{
    IgnoreChangesCallback, IndexNotificationCallback, PersistenceFlusherCallback,
    TransactionCallback, UnitContext,
};
use crate::config::EngineSettings;
use crate::distributor::{IndexNotificationDistributor, ObjectEventDistributor};
use crate::error::{SyncError, SyncResult};
use crate::source::{ChangeSetSource, ChangeSetState, ObjectLoader};
use crate::summary::{Summary, SyncResultItem, UnitOutcome};
use crate::target::{EntityLocator, TargetServices, TargetSession};
use catsync_job::{ChangeKind, DomainType, JobEntry, ObjectReference, SerializableObject};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Applies job entries unit by unit.
///
/// The controller calls `transaction_job_unit_start`, then `process` for
/// each entry, then `transaction_job_unit_end` exactly once per unit, even
/// if start or an entry failed. `finished` is called once per run.
pub trait ObjectProcessor: Send {
    /// Opens a unit.
    fn transaction_job_unit_start(&mut self, unit_name: &str) -> SyncResult<()>;

    /// Applies one entry of the open unit.
    fn process(&mut self, entry: JobEntry) -> SyncResult<()>;

    /// Closes the unit and records its outcome.
    fn transaction_job_unit_end(
        &mut self,
        unit_name: &str,
        outcome: UnitOutcome,
        summary: &mut Summary,
    ) -> SyncResult<()>;

    /// Completes the run.
    fn finished(&mut self, summary: &Summary) -> SyncResult<()>;
}

struct OpenUnit {
    ctx: UnitContext,
    applied: Vec<SyncResultItem>,
}

struct Pipeline {
    registry: AdapterRegistry,
    callbacks: Vec<Box<dyn TransactionCallback>>,
    distributor: Arc<dyn ObjectEventDistributor>,
    objects: Option<Arc<dyn ObjectLoader>>,
    references: Option<Arc<dyn EntityLocator>>,
}

impl Pipeline {
    fn apply(&self, unit: &mut OpenUnit, entry: JobEntry) -> SyncResult<()> {
        let JobEntry {
            domain_type,
            guid,
            change_kind,
            source_object,
        } = entry;

        let result = if change_kind.is_upsert() {
            self.upsert(&mut unit.ctx, domain_type, &guid, change_kind, source_object)
        } else {
            self.delete(&mut unit.ctx, domain_type, &guid)
        };

        match result {
            Ok(()) => {
                unit.applied.push(SyncResultItem {
                    job_entry_type: domain_type,
                    job_entry_guid: guid,
                    command: change_kind,
                    transaction_job_unit_name: unit.ctx.unit_name().to_string(),
                });
                Ok(())
            }
            Err(e) => Err(SyncError::rolled_back(
                unit.ctx.unit_name(),
                format!("failed to apply {change_kind} {domain_type} {guid}"),
                e,
            )),
        }
    }

    fn upsert(
        &self,
        ctx: &mut UnitContext,
        domain_type: DomainType,
        guid: &str,
        change_kind: ChangeKind,
        source_object: Option<SerializableObject>,
    ) -> SyncResult<()> {
        let object = match source_object {
            Some(object) => object,
            None => self.load(domain_type, guid)?,
        };
        if object.domain_type() != domain_type {
            return Err(SyncError::Adapter {
                domain_type,
                message: format!("{guid} carries a {} payload", object.domain_type()),
            });
        }
        self.resolve_references(&object)?;

        let adapter = self.registry.adapter(domain_type)?;
        for callback in &self.callbacks {
            callback.pre_update(ctx, domain_type, guid)?;
        }
        if adapter.get(guid)?.is_some() {
            adapter.update(&object)?;
        } else {
            adapter.add(&object)?;
        }
        for callback in &self.callbacks {
            callback.post_update(ctx, domain_type, guid)?;
        }

        self.distributor
            .object_applied(ctx.unit_name(), domain_type, guid, change_kind);
        debug!(unit = %ctx.unit_name(), domain_type = %domain_type, guid, "applied object");
        Ok(())
    }

    fn delete(&self, ctx: &mut UnitContext, domain_type: DomainType, guid: &str) -> SyncResult<()> {
        for (associated_type, associated_guid) in self.registry.associated_guids(domain_type, guid)? {
            self.remove(ctx, associated_type, &associated_guid)?;
        }
        self.remove(ctx, domain_type, guid)
    }

    fn remove(&self, ctx: &mut UnitContext, domain_type: DomainType, guid: &str) -> SyncResult<()> {
        let adapter = self.registry.adapter(domain_type)?;
        for callback in &self.callbacks {
            callback.pre_remove(ctx, domain_type, guid)?;
        }
        adapter.remove(guid)?;
        for callback in &self.callbacks {
            callback.post_remove(ctx, domain_type, guid)?;
        }

        self.distributor
            .object_applied(ctx.unit_name(), domain_type, guid, ChangeKind::Delete);
        debug!(unit = %ctx.unit_name(), domain_type = %domain_type, guid, "removed object");
        Ok(())
    }

    fn resolve_references(&self, object: &SerializableObject) -> SyncResult<()> {
        let Some(locator) = &self.references else {
            return Ok(());
        };
        for reference in object.snapshot.references() {
            let found = match &reference {
                ObjectReference::Guid { domain_type, guid } => locator.locate(*domain_type, guid)?,
                ObjectReference::ProductCode(code) => locator.locate_product_by_code(code)?,
            };
            if found.is_none() {
                return Err(SyncError::EntityNotFound {
                    domain_type: reference.domain_type(),
                    guid: reference.key().to_string(),
                });
            }
        }
        Ok(())
    }

    fn load(&self, domain_type: DomainType, guid: &str) -> SyncResult<SerializableObject> {
        let not_found = || SyncError::EntityNotFound {
            domain_type,
            guid: guid.to_string(),
        };
        match &self.objects {
            Some(loader) => loader.load_object(domain_type, guid)?.ok_or_else(not_found),
            None => Err(not_found()),
        }
    }
}

/// Applies entries to the target system, one target transaction per unit.
pub struct TargetObjectProcessor {
    session: Arc<dyn TargetSession>,
    pipeline: Pipeline,
    change_sets: Option<Arc<dyn ChangeSetSource>>,
    unit: Option<OpenUnit>,
}

impl TargetObjectProcessor {
    /// Creates a processor without callbacks.
    pub fn new(
        session: Arc<dyn TargetSession>,
        registry: AdapterRegistry,
        distributor: Arc<dyn ObjectEventDistributor>,
    ) -> Self {
        Self {
            session,
            pipeline: Pipeline {
                registry,
                callbacks: Vec::new(),
                distributor,
                objects: None,
                references: None,
            },
            change_sets: None,
            unit: None,
        }
    }

    /// Creates a processor with the standard adapters, callbacks,
    /// reference checks and price-change distributor for a target system.
    pub fn for_target(target: &TargetServices, settings: &EngineSettings) -> Self {
        Self::new(
            target.session.clone(),
            AdapterRegistry::standard(target),
            Arc::new(IndexNotificationDistributor::new(target.index_sink.clone())),
        )
        .with_callback(IgnoreChangesCallback::new(settings.ignore_changes_types.clone()))
        .with_callback(PersistenceFlusherCallback::new())
        .with_callback(IndexNotificationCallback::new(
            target.index_sink.clone(),
            settings.index_types.clone(),
        ))
        .with_reference_locator(target.locator.clone())
    }

    /// Appends a callback. Callbacks run in registration order.
    pub fn with_callback(mut self, callback: impl TransactionCallback + 'static) -> Self {
        self.pipeline.callbacks.push(Box::new(callback));
        self
    }

    /// Checks change sets on the source at unit start and finalizes them on commit.
    pub fn with_change_sets(mut self, change_sets: Arc<dyn ChangeSetSource>) -> Self {
        self.change_sets = Some(change_sets);
        self
    }

    /// Requires every object an added or updated snapshot points at to
    /// exist on the target.
    pub fn with_reference_locator(mut self, locator: Arc<dyn EntityLocator>) -> Self {
        self.pipeline.references = Some(locator);
        self
    }

    /// Materializes entries that were not preloaded.
    pub fn with_object_loader(mut self, objects: Arc<dyn ObjectLoader>) -> Self {
        self.pipeline.objects = Some(objects);
        self
    }
}

impl ObjectProcessor for TargetObjectProcessor {
    fn transaction_job_unit_start(&mut self, unit_name: &str) -> SyncResult<()> {
        if let Some(open) = &self.unit {
            return Err(SyncError::Target(format!(
                "unit {} is still open",
                open.ctx.unit_name()
            )));
        }
        if let Some(change_sets) = &self.change_sets {
            if change_sets.find_change_set(unit_name)?.is_none() {
                return Err(SyncError::change_set_not_found("change set not found", unit_name));
            }
        }

        self.session.begin()?;
        self.unit = Some(OpenUnit {
            ctx: UnitContext::new(unit_name, self.session.clone()),
            applied: Vec::new(),
        });
        info!(unit = %unit_name, "transaction job unit started");
        Ok(())
    }

    fn process(&mut self, entry: JobEntry) -> SyncResult<()> {
        let unit = self
            .unit
            .as_mut()
            .ok_or_else(|| SyncError::Target("no transaction job unit is open".into()))?;
        self.pipeline.apply(unit, entry)
    }

    fn transaction_job_unit_end(
        &mut self,
        unit_name: &str,
        outcome: UnitOutcome,
        summary: &mut Summary,
    ) -> SyncResult<()> {
        let distributor = &self.pipeline.distributor;
        let Some(mut unit) = self.unit.take() else {
            // Start failed before a transaction was opened.
            summary.record_unit(unit_name, 0, UnitOutcome::Failed);
            distributor.unit_completed(unit_name, UnitOutcome::Failed);
            return Ok(());
        };

        if unit.ctx.ignore_changes() {
            unit.ctx.set_ignore_changes(false);
        }
        let processed = unit.applied.len();

        if outcome == UnitOutcome::Failed {
            summary.record_unit(unit_name, processed, UnitOutcome::Failed);
            distributor.unit_completed(unit_name, UnitOutcome::Failed);
            self.session.rollback()?;
            warn!(unit = %unit_name, processed, "transaction job unit rolled back");
            return Ok(());
        }

        if let Err(e) = self.session.commit() {
            if let Err(rollback) = self.session.rollback() {
                warn!(unit = %unit_name, error = %rollback, "rollback after failed commit failed");
            }
            summary.record_unit(unit_name, processed, UnitOutcome::Failed);
            distributor.unit_completed(unit_name, UnitOutcome::Failed);
            return Err(SyncError::rolled_back(unit_name, "commit failed", e));
        }

        for item in unit.applied {
            summary.add_success(item);
        }
        summary.record_unit(unit_name, processed, UnitOutcome::Applied);
        distributor.unit_completed(unit_name, UnitOutcome::Applied);
        info!(
            unit = %unit_name,
            processed,
            flushes = unit.ctx.flush_count(),
            "transaction job unit committed"
        );

        if let Some(change_sets) = &self.change_sets {
            change_sets.update_state(unit_name, ChangeSetState::Finalized)?;
        }
        Ok(())
    }

    fn finished(&mut self, summary: &Summary) -> SyncResult<()> {
        self.pipeline.distributor.finished(summary)
    }
}

/// Records the entries of each unit without touching any target.
///
/// Used when the job is only exported.
#[derive(Debug, Default)]
pub struct ExportProcessor {
    unit: Option<Vec<SyncResultItem>>,
}

impl ExportProcessor {
    /// Creates the processor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectProcessor for ExportProcessor {
    fn transaction_job_unit_start(&mut self, _unit_name: &str) -> SyncResult<()> {
        self.unit = Some(Vec::new());
        Ok(())
    }

    fn process(&mut self, entry: JobEntry) -> SyncResult<()> {
        let unit = self
            .unit
            .as_mut()
            .ok_or_else(|| SyncError::Target("no transaction job unit is open".into()))?;
        unit.push(SyncResultItem {
            job_entry_type: entry.domain_type,
            job_entry_guid: entry.guid,
            command: entry.change_kind,
            transaction_job_unit_name: String::new(),
        });
        Ok(())
    }

    fn transaction_job_unit_end(
        &mut self,
        unit_name: &str,
        outcome: UnitOutcome,
        summary: &mut Summary,
    ) -> SyncResult<()> {
        let items = self.unit.take().unwrap_or_default();
        summary.record_unit(unit_name, items.len(), outcome);
        if outcome == UnitOutcome::Applied {
            for mut item in items {
                item.transaction_job_unit_name = unit_name.to_string();
                summary.add_success(item);
            }
        }
        Ok(())
    }

    fn finished(&mut self, _summary: &Summary) -> SyncResult<()> {
        Ok(())
    }
}
