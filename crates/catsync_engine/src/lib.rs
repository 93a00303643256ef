//! # catsync Engine
//!
//! Change-set synchronization between two deployments of the catalog.
//!
//! This crate provides:
//! - Source adapters that turn a change selector into a job descriptor
//! - The transaction job builder
//! - Per-type target adapters with cascade support
//! - Transaction callbacks (index notification, ignore-changes, flush batching)
//! - The exception handler chain and the run `Summary`
//! - `SyncController` in full, full-and-save, export and load variants
//! - In-memory source and target systems
//!
//! ## Architecture
//!
//! A run builds (or loads) a `TransactionJob`, orders every unit with the
//! `DomainSorter`, and applies each unit inside one target transaction:
//! 1. Open the source and target connections
//! 2. Build the job from a single source snapshot
//! 3. Apply units one by one, parents before children, children removed first
//! 4. Fire batched notifications once the last unit ended
//! 5. Close the connections
//!
//! ## Key Invariants
//!
//! - Units run strictly sequentially; at most one target transaction is open
//! - Every unit is started and ended exactly once, even when it fails
//! - `finished()` runs exactly once per run that reached the unit loop
//! - Every caught failure becomes exactly one error record
//! - Only configuration and job construction failures escape `synchronize()`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod callback;
mod config;
mod controller;
mod distributor;
mod error;
mod handler;
mod lifecycle;
mod memory;
mod processor;
mod source;
mod summary;
mod target;

pub use adapter::{
    AdapterRegistry, BaseAmountDaoAdapter, CouponUsageDaoAdapter, ProductCategoryDaoAdapter,
    ProductSkuDaoAdapter, ServiceDaoAdapter, TargetDaoAdapter,
};
pub use callback::{
    IgnoreChangesCallback, IndexNotificationCallback, PersistenceFlusherCallback,
    TransactionCallback, UnitContext,
};
pub use config::{ConnectionConfiguration, ControllerKind, EngineSettings, SyncJobConfiguration};
pub use controller::{BuildJobLoader, JobLoader, PersistedJobLoader, SyncController};
pub use distributor::{IndexNotificationDistributor, NoopDistributor, ObjectEventDistributor};
pub use error::{SyncError, SyncResult};
pub use handler::{
    ChangeSetErrorHandler, ExceptionHandler, ExceptionHandlerChain, GenericErrorHandler,
};
pub use lifecycle::{ConfigGuard, ConfigLifecycle};
pub use memory::{MemoryLifecycle, MemorySource, MemoryTarget, TargetCall};
pub use processor::{ExportProcessor, ObjectProcessor, TargetObjectProcessor};
pub use source::{
    ChangeSet, ChangeSetMember, ChangeSetSource, ChangeSetSourceAdapter, ChangeSetState,
    ObjectLoader, SourceCache, SourceSyncRequestAdapter, SourceSystem, TransactionJobBuilder,
};
pub use summary::{
    JobEntryType, Summary, SyncErrorResultItem, SyncResultItem, UnitOutcome, UnitReport,
};
pub use target::{
    BaseAmountDao, CouponUsageService, DomainService, EntityLocator, IndexNotification,
    IndexNotificationSink, IndexOperation, IndexType, ProductCategoryService, ProductSkuService,
    TargetServices, TargetSession,
};
