//! Synchronization orchestration.
//!
//! A [`SyncController`] runs one job per `synchronize()` call:
//!
//! ```text
//! validate config -> open connections -> load job -> sort units
//!     -> for each unit: start, apply entries, end
//!     -> finished -> close connections -> Summary
//! ```
//!
//! Units run strictly one after another. A failure in a unit's start or in
//! one of its entries is recorded through the [`ExceptionHandlerChain`] and
//! the unit is still ended before the next unit begins. Only configuration
//! and job construction failures escape `synchronize()`; the connections
//! are closed on every path.

use crate::config::{ControllerKind, EngineSettings, SyncJobConfiguration};
use crate::error::{SyncError, SyncResult};
use crate::handler::ExceptionHandlerChain;
use crate::lifecycle::{ConfigGuard, ConfigLifecycle};
use crate::processor::{ExportProcessor, ObjectProcessor, TargetObjectProcessor};
use crate::source::{ChangeSetSourceAdapter, SourceSyncRequestAdapter, SourceSystem, TransactionJobBuilder};
use crate::summary::{Summary, UnitOutcome};
use crate::target::TargetServices;
use catsync_job::{
    CategorySortingPolicy, DomainSorter, DomainType, FileJobStore, JobDescriptorDao,
    JobEntry, TransactionJob, TransactionJobDao,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Produces the transaction job a run executes.
pub trait JobLoader: Send {
    /// Loads or builds the job for `config`.
    fn load_transaction_job(&self, config: &SyncJobConfiguration) -> SyncResult<TransactionJob>;
}

/// Builds jobs from the source, optionally persisting them under the
/// configured root path.
pub struct BuildJobLoader {
    adapter: Box<dyn SourceSyncRequestAdapter>,
    builder: TransactionJobBuilder,
    preload: bool,
    persist: bool,
}

impl BuildJobLoader {
    /// Creates a loader.
    pub fn new(
        adapter: impl SourceSyncRequestAdapter + 'static,
        builder: TransactionJobBuilder,
        preload: bool,
    ) -> Self {
        Self {
            adapter: Box::new(adapter),
            builder,
            preload,
            persist: false,
        }
    }

    /// Persists every built descriptor and job before it is returned.
    pub fn persisting(mut self) -> Self {
        self.persist = true;
        self
    }
}

impl JobLoader for BuildJobLoader {
    fn load_transaction_job(&self, config: &SyncJobConfiguration) -> SyncResult<TransactionJob> {
        let selector = config
            .adapter_parameter
            .as_deref()
            .ok_or_else(|| SyncError::Configuration("adapter parameter is not set".into()))?;

        let descriptor = self.adapter.build_job_descriptor(selector)?;
        let job = self.builder.build(&descriptor, self.preload)?;

        if self.persist {
            let store = FileJobStore::new(config.require_root_path()?);
            store.save_descriptor(&descriptor)?;
            store.save_job(&job)?;
            info!(job = %job.id, root = %store.root().display(), "persisted transaction job");
        }
        Ok(job)
    }
}

/// Resumes a job persisted under `root_path/sub_dir`.
///
/// Persisted units without entries belong to change sets the source did
/// not know when the job was built. They are dropped, since a replay has
/// no source to check them against.
#[derive(Debug, Default)]
pub struct PersistedJobLoader;

impl JobLoader for PersistedJobLoader {
    fn load_transaction_job(&self, config: &SyncJobConfiguration) -> SyncResult<TransactionJob> {
        let store = FileJobStore::new(config.require_root_path()?);
        let persisted = store.load_job(config.require_sub_dir()?)?;
        let mut job = TransactionJob::new(persisted.id);
        for unit in persisted.into_units() {
            if unit.is_empty() {
                warn!(job = %job.id, unit = %unit.name(), "skipping persisted unit without entries");
                continue;
            }
            job.push(unit);
        }
        info!(job = %job.id, units = job.units().len(), "loaded persisted transaction job");
        Ok(job)
    }
}

/// Orchestrates one synchronization run per `synchronize()` call.
pub struct SyncController {
    kind: ControllerKind,
    lifecycle: Arc<dyn ConfigLifecycle>,
    loader: Box<dyn JobLoader>,
    sorter: Option<DomainSorter>,
    processor: Box<dyn ObjectProcessor>,
    handlers: ExceptionHandlerChain,
}

impl SyncController {
    /// Creates a controller from its strategies. No sorting is applied and
    /// the standard exception handlers are used.
    pub fn new(
        kind: ControllerKind,
        lifecycle: Arc<dyn ConfigLifecycle>,
        loader: impl JobLoader + 'static,
        processor: impl ObjectProcessor + 'static,
    ) -> Self {
        Self {
            kind,
            lifecycle,
            loader: Box::new(loader),
            sorter: None,
            processor: Box::new(processor),
            handlers: ExceptionHandlerChain::standard(),
        }
    }

    /// Sorts every unit with `sorter` before it is applied.
    pub fn with_sorter(mut self, sorter: DomainSorter) -> Self {
        self.sorter = Some(sorter);
        self
    }

    /// Replaces the exception handlers.
    pub fn with_handlers(mut self, handlers: ExceptionHandlerChain) -> Self {
        self.handlers = handlers;
        self
    }

    /// Builds the job from the source and applies it to the target.
    pub fn full(
        source: &SourceSystem,
        target: &TargetServices,
        settings: &EngineSettings,
        lifecycle: Arc<dyn ConfigLifecycle>,
    ) -> Self {
        Self::applying(ControllerKind::Full, source, target, settings, lifecycle, false)
    }

    /// Like [`SyncController::full`], and persists the descriptor and job
    /// first. Objects are always preloaded so the saved job can be replayed
    /// without the source.
    pub fn full_and_save(
        source: &SourceSystem,
        target: &TargetServices,
        settings: &EngineSettings,
        lifecycle: Arc<dyn ConfigLifecycle>,
    ) -> Self {
        Self::applying(ControllerKind::FullAndSave, source, target, settings, lifecycle, true)
    }

    /// Builds the job from the source and persists it without applying it.
    pub fn export(source: &SourceSystem, lifecycle: Arc<dyn ConfigLifecycle>) -> Self {
        let loader = BuildJobLoader::new(
            ChangeSetSourceAdapter::new(source.change_sets.clone()),
            TransactionJobBuilder::new(source.objects.clone(), source.cache.clone()),
            true,
        )
        .persisting();
        Self::new(ControllerKind::Export, lifecycle, loader, ExportProcessor::new())
    }

    /// Applies a persisted job to the target.
    pub fn load(
        target: &TargetServices,
        settings: &EngineSettings,
        lifecycle: Arc<dyn ConfigLifecycle>,
    ) -> Self {
        let sorter = DomainSorter::new(settings.dependency_table.clone())
            .with_policy(DomainType::Category, CategorySortingPolicy::from_snapshots());
        Self::new(
            ControllerKind::Load,
            lifecycle,
            PersistedJobLoader,
            TargetObjectProcessor::for_target(target, settings),
        )
        .with_sorter(sorter)
    }

    fn applying(
        kind: ControllerKind,
        source: &SourceSystem,
        target: &TargetServices,
        settings: &EngineSettings,
        lifecycle: Arc<dyn ConfigLifecycle>,
        save: bool,
    ) -> Self {
        let mut loader = BuildJobLoader::new(
            ChangeSetSourceAdapter::new(source.change_sets.clone()),
            TransactionJobBuilder::new(source.objects.clone(), source.cache.clone()),
            settings.preload || save,
        );
        if save {
            loader = loader.persisting();
        }
        let processor = TargetObjectProcessor::for_target(target, settings)
            .with_change_sets(source.change_sets.clone())
            .with_object_loader(source.objects.clone());
        let sorter = DomainSorter::new(settings.dependency_table.clone()).with_policy(
            DomainType::Category,
            CategorySortingPolicy::with_locator(source.categories.clone()),
        );
        Self::new(kind, lifecycle, loader, processor).with_sorter(sorter)
    }

    /// Returns the controller kind.
    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    /// Runs one synchronization.
    ///
    /// Returns `Err` only for configuration and job construction failures.
    /// Everything else is recorded in the returned summary.
    pub fn synchronize(&mut self, config: &SyncJobConfiguration) -> SyncResult<Summary> {
        config.validate(self.kind)?;
        info!(kind = %self.kind, selector = ?config.adapter_parameter, "synchronization started");

        let _guard = ConfigGuard::acquire(
            self.lifecycle.clone(),
            config.source.as_ref().filter(|_| self.kind.uses_source()),
            config.target.as_ref().filter(|_| self.kind.uses_target()),
        )?;

        let mut job = self.loader.load_transaction_job(config)?;
        if let Some(sorter) = &self.sorter {
            for unit in job.units_mut() {
                sorter.sort(unit.entries_mut())?;
            }
        }

        let mut summary = Summary::new();
        summary.set_job_id(job.id);
        for unit in job.into_units() {
            let name = unit.name().to_string();
            self.run_unit(&name, unit.into_entries(), &mut summary);
        }

        if let Err(e) = self.processor.finished(&summary) {
            error!(error = %e, "finishing synchronization failed");
            let selector = config.adapter_parameter.as_deref().unwrap_or_default();
            self.handlers.handle(e, selector, &mut summary);
        }

        info!(
            kind = %self.kind,
            units = summary.units().len(),
            applied = summary.success_results().len(),
            errors = summary.number_of_errors(),
            "synchronization finished"
        );
        Ok(summary)
    }

    fn run_unit(&mut self, name: &str, entries: Vec<JobEntry>, summary: &mut Summary) {
        let outcome = match self.apply_unit(name, entries) {
            Ok(()) => UnitOutcome::Applied,
            Err(e) => {
                warn!(unit = %name, error = %e, "transaction job unit failed");
                self.handlers.handle(e, name, summary);
                UnitOutcome::Failed
            }
        };

        if let Err(e) = self.processor.transaction_job_unit_end(name, outcome, summary) {
            error!(unit = %name, error = %e, "ending transaction job unit failed");
            self.handlers.handle(e, name, summary);
        }
    }

    fn apply_unit(&mut self, name: &str, entries: Vec<JobEntry>) -> SyncResult<()> {
        self.processor.transaction_job_unit_start(name)?;
        for entry in entries {
            self.processor.process(entry)?;
        }
        Ok(())
    }
}
