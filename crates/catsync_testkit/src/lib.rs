//! # catsync Testkit
//!
//! Test utilities for catsync.
//!
//! This crate provides:
//! - Object builders and ready-made source/target systems
//! - Scripted processors and job loaders for driving `SyncController`
//! - Property-based generators for job entries and category trees
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catsync_testkit::prelude::*;
//!
//! #[test]
//! fn publishes_one_product() {
//!     let systems = TestSystems::new();
//!     systems.publish("cs-1", [product("p-1", "P1")]);
//!     let summary = systems.full().synchronize(&systems.config("cs-1")).unwrap();
//!     assert!(!summary.has_errors());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod doubles;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::doubles::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use doubles::*;
pub use fixtures::*;
pub use generators::*;
