//! Property-based test generators using proptest.
//!
//! Provides strategies for job entries, whole units and category trees
//! listed in random order.

use crate::fixtures::{add_entry, category};
use catsync_job::{ChangeKind, DomainType, JobEntry};
use proptest::prelude::*;

/// Strategy for any known domain type.
pub fn domain_type_strategy() -> impl Strategy<Value = DomainType> {
    prop::sample::select(DomainType::ALL.to_vec())
}

/// Strategy for any change kind.
pub fn change_kind_strategy() -> impl Strategy<Value = ChangeKind> {
    prop_oneof![
        2 => Just(ChangeKind::Add),
        2 => Just(ChangeKind::Update),
        1 => Just(ChangeKind::Delete),
    ]
}

/// Strategy for object guids.
pub fn guid_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,4}-[0-9]{1,3}").expect("Invalid regex")
}

/// Strategy for a single entry without a materialized object.
pub fn job_entry_strategy() -> impl Strategy<Value = JobEntry> {
    (domain_type_strategy(), guid_strategy(), change_kind_strategy())
        .prop_map(|(domain_type, guid, kind)| JobEntry::new(domain_type, guid, kind))
}

/// Strategy for the entries of one unit.
///
/// Categories are excluded so that sorting needs no locator.
pub fn unit_entries_strategy(max_entries: usize) -> impl Strategy<Value = Vec<JobEntry>> {
    prop::collection::vec(
        job_entry_strategy().prop_filter("categories need a locator", |e| {
            e.domain_type != DomainType::Category
        }),
        0..max_entries,
    )
}

/// Strategy for a category forest of up to `max_nodes` nodes, as preloaded
/// add entries in random order.
///
/// Node `cat-<i>` is either a root or the child of some `cat-<j>` with
/// `j < i`, so every forest is acyclic.
pub fn category_forest_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<JobEntry>> {
    prop::collection::vec(prop::option::weighted(0.8, any::<prop::sample::Index>()), 1..max_nodes)
        .prop_map(|parents| {
            parents
                .iter()
                .enumerate()
                .map(|(i, parent)| {
                    let parent = match parent {
                        Some(index) if i > 0 => Some(format!("cat-{}", index.index(i))),
                        _ => None,
                    };
                    add_entry(category(&format!("cat-{i}"), parent.as_deref()))
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

/// Number of cases a property test runs, by what one case costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseBudget {
    /// Number of test cases to run.
    pub cases: u32,
}

impl CaseBudget {
    /// Each case drives a whole job through a controller.
    pub const fn jobs() -> Self {
        Self { cases: 24 }
    }

    /// Each case sorts or generates a single unit.
    pub const fn units() -> Self {
        Self { cases: 96 }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(self) -> ProptestConfig {
        ProptestConfig::with_cases(self.cases)
    }
}
