//! Dependency-ordered sorting of job entries.
//!
//! Entries inside a unit are applied in an order that satisfies the
//! target schema's ownership graph: parents are written before children
//! and children are removed before parents.
//!
//! ## Sort key
//!
//! Each entry is keyed by `(phase, rank)`:
//! - adds and updates form the first phase, ordered by ascending rank
//! - deletes form the second phase, ordered by descending rank
//!
//! The sort is stable, so entries with equal keys keep their relative order.
//! A [`SortingPolicy`] registered for a domain type can further refine the
//! order of a contiguous run of that type within one phase.

use crate::domain::{ChangeKind, DomainType};
use crate::error::{JobError, JobResult};
use crate::job::JobEntry;
use crate::object::DomainSnapshot;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The phase an entry is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortPhase {
    /// Adds and updates, parents first.
    Upsert,
    /// Deletes, children first.
    Delete,
}

impl SortPhase {
    /// Returns the phase a change kind is applied in.
    pub fn of(kind: ChangeKind) -> Self {
        if kind.is_upsert() {
            SortPhase::Upsert
        } else {
            SortPhase::Delete
        }
    }
}

/// Static precedence table mapping each domain type to a dependency rank.
///
/// Lower ranks are parents of higher ranks. Ranks are plain integers, so
/// the table cannot express a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTable {
    ranks: HashMap<DomainType, u32>,
}

impl DependencyTable {
    /// Creates an empty table.
    pub fn empty() -> Self {
        Self {
            ranks: HashMap::new(),
        }
    }

    /// Creates a table where each type's rank is its position in `order`.
    pub fn from_order(order: &[DomainType]) -> Self {
        let ranks = order
            .iter()
            .enumerate()
            .map(|(rank, domain_type)| (*domain_type, rank as u32))
            .collect();
        Self { ranks }
    }

    /// Returns the table derived from the catalog schema's ownership graph.
    ///
    /// Catalog < Category < Product < ProductSku < BaseAmount < ProductCategory.
    /// Price lists precede their price rows and coupon configurations precede
    /// their usages.
    pub fn standard() -> Self {
        Self::empty()
            .with_rank(DomainType::Catalog, 0)
            .with_rank(DomainType::PriceList, 5)
            .with_rank(DomainType::Category, 10)
            .with_rank(DomainType::CouponConfig, 15)
            .with_rank(DomainType::Product, 20)
            .with_rank(DomainType::ProductSku, 30)
            .with_rank(DomainType::BaseAmount, 40)
            .with_rank(DomainType::ProductCategory, 50)
            .with_rank(DomainType::CouponUsage, 50)
    }

    /// Sets the rank of a type.
    pub fn with_rank(mut self, domain_type: DomainType, rank: u32) -> Self {
        self.ranks.insert(domain_type, rank);
        self
    }

    /// Returns the rank of a type, if mapped.
    pub fn rank(&self, domain_type: DomainType) -> Option<u32> {
        self.ranks.get(&domain_type).copied()
    }

    /// Returns the rank of a type or an error if it is unmapped.
    pub fn require_rank(&self, domain_type: DomainType) -> JobResult<u32> {
        self.rank(domain_type)
            .ok_or(JobError::UnmappedDomainType { domain_type })
    }
}

impl Default for DependencyTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Refines the order of a contiguous run of same-type entries.
pub trait SortingPolicy: Send + Sync {
    /// Reorders `run` in place. All entries share one type and one phase.
    fn sort_run(&self, run: &mut [JobEntry], phase: SortPhase) -> JobResult<()>;
}

/// Orders the entries of a unit by dependency rank.
pub struct DomainSorter {
    table: DependencyTable,
    policies: HashMap<DomainType, Box<dyn SortingPolicy>>,
}

impl DomainSorter {
    /// Creates a sorter over a precedence table.
    pub fn new(table: DependencyTable) -> Self {
        Self {
            table,
            policies: HashMap::new(),
        }
    }

    /// Registers a policy for runs of one domain type.
    pub fn with_policy(
        mut self,
        domain_type: DomainType,
        policy: impl SortingPolicy + 'static,
    ) -> Self {
        self.policies.insert(domain_type, Box::new(policy));
        self
    }

    /// Returns the precedence table.
    pub fn table(&self) -> &DependencyTable {
        &self.table
    }

    /// Sorts entries in place.
    ///
    /// Fails without reordering anything if an entry's type is unmapped.
    pub fn sort(&self, entries: &mut [JobEntry]) -> JobResult<()> {
        for entry in entries.iter() {
            self.table.require_rank(entry.domain_type)?;
        }

        entries.sort_by_cached_key(|entry| self.key(entry));

        let mut start = 0;
        while start < entries.len() {
            let domain_type = entries[start].domain_type;
            let phase = SortPhase::of(entries[start].change_kind);
            let mut end = start + 1;
            while end < entries.len()
                && entries[end].domain_type == domain_type
                && SortPhase::of(entries[end].change_kind) == phase
            {
                end += 1;
            }
            if let Some(policy) = self.policies.get(&domain_type) {
                policy.sort_run(&mut entries[start..end], phase)?;
            }
            start = end;
        }

        tracing::trace!(count = entries.len(), "sorted job entries");
        Ok(())
    }

    fn key(&self, entry: &JobEntry) -> (SortPhase, u32) {
        // Ranks were validated before sorting.
        let rank = self.table.rank(entry.domain_type).unwrap_or(u32::MAX);
        let phase = SortPhase::of(entry.change_kind);
        match phase {
            SortPhase::Upsert => (phase, rank),
            SortPhase::Delete => (phase, u32::MAX - rank),
        }
    }
}

impl Default for DomainSorter {
    fn default() -> Self {
        Self::new(DependencyTable::standard())
    }
}

/// A category's position in its hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    /// Category guid.
    pub guid: String,
    /// Parent category guid, if any.
    pub parent_guid: Option<String>,
    /// Whether the category is linked into a virtual catalog.
    pub linked: bool,
}

/// Looks up categories for sorting.
pub trait CategoryLocator: Send + Sync {
    /// Returns the category with `guid`, or `None` if it no longer exists.
    fn locate_category(&self, guid: &str) -> Option<CategoryNode>;
}

/// A category locator backed by materialized category snapshots.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCategoryLocator {
    nodes: HashMap<String, CategoryNode>,
}

impl SnapshotCategoryLocator {
    /// Creates an empty locator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the category snapshots carried by `entries`.
    pub fn from_entries(entries: &[JobEntry]) -> Self {
        let mut locator = Self::new();
        for object in entries.iter().filter_map(|e| e.source_object.as_ref()) {
            if let DomainSnapshot::Category(category) = &object.snapshot {
                locator.insert(CategoryNode {
                    guid: object.guid.clone(),
                    parent_guid: category.parent_guid.clone(),
                    linked: category.is_linked(),
                });
            }
        }
        locator
    }

    /// Adds a node.
    pub fn insert(&mut self, node: CategoryNode) {
        self.nodes.insert(node.guid.clone(), node);
    }
}

impl CategoryLocator for SnapshotCategoryLocator {
    fn locate_category(&self, guid: &str) -> Option<CategoryNode> {
        self.nodes.get(guid).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CategoryKey {
    Located { linked: bool, depth: usize },
    Missing,
}

/// Orders categories so that hierarchies are written top-down and removed
/// bottom-up.
///
/// Upserts are ordered master categories first, then by depth, then by
/// guid. Deletes use the exact reverse. Categories that can no longer be
/// located are placed after the located ones in guid order.
pub struct CategorySortingPolicy {
    locator: Option<Arc<dyn CategoryLocator>>,
}

impl CategorySortingPolicy {
    /// Creates a policy that only uses snapshots carried by the entries.
    pub fn from_snapshots() -> Self {
        Self { locator: None }
    }

    /// Creates a policy that falls back to `locator` for categories not
    /// carried by the entries.
    pub fn with_locator(locator: Arc<dyn CategoryLocator>) -> Self {
        Self {
            locator: Some(locator),
        }
    }

    fn lookup(&self, local: &SnapshotCategoryLocator, guid: &str) -> Option<CategoryNode> {
        local.locate_category(guid).or_else(|| {
            self.locator
                .as_ref()
                .and_then(|locator| locator.locate_category(guid))
        })
    }

    fn key(&self, local: &SnapshotCategoryLocator, guid: &str) -> JobResult<CategoryKey> {
        let Some(node) = self.lookup(local, guid) else {
            return Ok(CategoryKey::Missing);
        };

        let linked = node.linked;
        let mut depth = 0;
        let mut visited = HashSet::from([node.guid.clone()]);
        let mut parent = node.parent_guid;
        while let Some(parent_guid) = parent {
            if !visited.insert(parent_guid.clone()) {
                return Err(JobError::CyclicHierarchy { guid: parent_guid });
            }
            match self.lookup(local, &parent_guid) {
                Some(parent_node) => {
                    depth += 1;
                    parent = parent_node.parent_guid;
                }
                None => break,
            }
        }
        Ok(CategoryKey::Located { linked, depth })
    }
}

impl SortingPolicy for CategorySortingPolicy {
    fn sort_run(&self, run: &mut [JobEntry], phase: SortPhase) -> JobResult<()> {
        let local = SnapshotCategoryLocator::from_entries(run);
        let mut keys = HashMap::with_capacity(run.len());
        for entry in run.iter() {
            keys.insert(entry.guid.clone(), self.key(&local, &entry.guid)?);
        }

        run.sort_by(|a, b| {
            let (Some(key_a), Some(key_b)) = (keys.get(&a.guid), keys.get(&b.guid)) else {
                return Ordering::Equal;
            };
            compare_categories(key_a, &a.guid, key_b, &b.guid, phase)
        });
        Ok(())
    }
}

fn compare_categories(
    a: &CategoryKey,
    a_guid: &str,
    b: &CategoryKey,
    b_guid: &str,
    phase: SortPhase,
) -> Ordering {
    match (a, b) {
        (CategoryKey::Missing, CategoryKey::Missing) => a_guid.cmp(b_guid),
        (CategoryKey::Located { .. }, CategoryKey::Missing) => Ordering::Less,
        (CategoryKey::Missing, CategoryKey::Located { .. }) => Ordering::Greater,
        (
            CategoryKey::Located {
                linked: a_linked,
                depth: a_depth,
            },
            CategoryKey::Located {
                linked: b_linked,
                depth: b_depth,
            },
        ) => {
            let ascending = (a_linked, a_depth, a_guid).cmp(&(b_linked, b_depth, b_guid));
            match phase {
                SortPhase::Upsert => ascending,
                SortPhase::Delete => ascending.reverse(),
            }
        }
    }
}
