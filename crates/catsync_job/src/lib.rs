//! # catsync Job Model
//!
//! Job model and dependency sorting for the catsync publishing engine.
//!
//! This crate provides:
//! - `DomainType` and `SerializableObject` for materialized domain snapshots
//! - `TransactionJobDescriptorEntry` and `JobDescriptor` describing detected changes
//! - `TransactionJob` / `TransactionJobUnit` for ordered, atomic groups of changes
//! - `DomainSorter` for dependency-ordered application inside a unit
//! - Job persistence for audit and resume
//!
//! This is a pure model crate: it performs no source or target I/O apart
//! from the file-backed job store.
//!
//! ## Key Invariants
//!
//! - Every descriptor entry belongs to exactly one unit
//! - Unit order in a job is significant and preserved by persistence
//! - Sorting is deterministic and stable for entries with equal sort keys
//! - A domain type missing from the precedence table is a configuration error

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod descriptor;
mod domain;
mod error;
mod job;
mod object;
mod sorter;
mod store;

pub use descriptor::{JobDescriptor, TransactionJobDescriptorEntry};
pub use domain::{ChangeKind, DomainType};
pub use error::{JobError, JobResult};
pub use job::{JobEntry, TransactionJob, TransactionJobUnit};
pub use object::{
    BaseAmountSnapshot, CatalogSnapshot, CategorySnapshot, CouponConfigSnapshot,
    CouponUsageSnapshot, DomainSnapshot, ObjectReference, PriceListSnapshot,
    ProductCategorySnapshot, ProductSkuSnapshot, ProductSnapshot, SerializableObject,
};
pub use sorter::{
    CategoryLocator, CategoryNode, CategorySortingPolicy, DependencyTable, DomainSorter,
    SnapshotCategoryLocator, SortPhase, SortingPolicy,
};
pub use store::{FileJobStore, JobDescriptorDao, TransactionJobDao};
