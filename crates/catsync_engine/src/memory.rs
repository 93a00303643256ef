//! In-memory source and target systems.
//!
//! These implement every collaborator trait of the engine and are used by
//! the tests and for dry runs. The target keeps a committed store and, while
//! a transaction is open, a working copy that is swapped in on commit.

use crate::config::ConnectionConfiguration;
use crate::error::{SyncError, SyncResult};
use crate::lifecycle::ConfigLifecycle;
use crate::source::{
    ChangeSet, ChangeSetSource, ChangeSetState, ObjectLoader, SourceCache, SourceSystem,
};
use crate::target::{
    BaseAmountDao, CouponUsageService, DomainService, EntityLocator, IndexNotification,
    IndexNotificationSink, IndexOperation, IndexType, ProductCategoryService, ProductSkuService,
    TargetServices, TargetSession,
};
use catsync_job::{
    CategoryLocator, CategoryNode, DomainSnapshot, DomainType, ProductCategorySnapshot,
    SerializableObject,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

type ObjectKey = (DomainType, String);

fn key(domain_type: DomainType, guid: &str) -> ObjectKey {
    (domain_type, guid.to_string())
}

/// An in-memory source system.
#[derive(Debug, Default)]
pub struct MemorySource {
    change_sets: RwLock<Vec<ChangeSet>>,
    objects: RwLock<HashMap<ObjectKey, SerializableObject>>,
    cache_clears: AtomicUsize,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the source's collaborators.
    pub fn system(self: &Arc<Self>) -> SourceSystem {
        SourceSystem {
            change_sets: self.clone(),
            objects: self.clone(),
            cache: self.clone(),
            categories: self.clone(),
        }
    }

    /// Adds a change set, replacing one with the same name.
    pub fn add_change_set(&self, change_set: ChangeSet) {
        let mut change_sets = self.change_sets.write();
        change_sets.retain(|existing| existing.name != change_set.name);
        change_sets.push(change_set);
    }

    /// Stores an object.
    pub fn put_object(&self, object: SerializableObject) {
        self.objects
            .write()
            .insert(key(object.domain_type(), &object.guid), object);
    }

    /// Deletes an object.
    pub fn remove_object(&self, domain_type: DomainType, guid: &str) {
        self.objects.write().remove(&key(domain_type, guid));
    }

    /// Returns the state of a change set.
    pub fn change_set_state(&self, name: &str) -> Option<ChangeSetState> {
        self.change_sets
            .read()
            .iter()
            .find(|change_set| change_set.name == name)
            .map(|change_set| change_set.state)
    }

    /// Returns how often the caches were cleared.
    pub fn cache_clears(&self) -> usize {
        self.cache_clears.load(Ordering::SeqCst)
    }
}

impl ChangeSetSource for MemorySource {
    fn find_change_set(&self, name: &str) -> SyncResult<Option<ChangeSet>> {
        Ok(self
            .change_sets
            .read()
            .iter()
            .find(|change_set| change_set.name == name)
            .cloned())
    }

    fn update_state(&self, name: &str, state: ChangeSetState) -> SyncResult<()> {
        let mut change_sets = self.change_sets.write();
        let change_set = change_sets
            .iter_mut()
            .find(|change_set| change_set.name == name)
            .ok_or_else(|| SyncError::change_set_not_found("change set not found", name))?;
        change_set.state = state;
        Ok(())
    }
}

impl ObjectLoader for MemorySource {
    fn load_object(&self, domain_type: DomainType, guid: &str) -> SyncResult<Option<SerializableObject>> {
        Ok(self.objects.read().get(&key(domain_type, guid)).cloned())
    }
}

impl SourceCache for MemorySource {
    fn clear_caches(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }
}

impl CategoryLocator for MemorySource {
    fn locate_category(&self, guid: &str) -> Option<CategoryNode> {
        let objects = self.objects.read();
        match &objects.get(&key(DomainType::Category, guid))?.snapshot {
            DomainSnapshot::Category(category) => Some(CategoryNode {
                guid: guid.to_string(),
                parent_guid: category.parent_guid.clone(),
                linked: category.is_linked(),
            }),
            _ => None,
        }
    }
}

/// A call made against a [`MemoryTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCall {
    /// Transaction opened.
    Begin,
    /// Transaction committed.
    Commit,
    /// Transaction rolled back.
    Rollback,
    /// Session flushed.
    Flush,
    /// Ignore-changes flag set.
    SetIgnoreChanges(bool),
    /// Domain service insert.
    ServiceAdd(DomainType, String),
    /// Domain service update.
    ServiceUpdate(DomainType, String),
    /// Domain service removal.
    ServiceRemove(DomainType, String),
    /// Low-level price row update.
    DaoUpdate(DomainType, String),
    /// Entity locator lookup.
    Locate(DomainType, String),
    /// Sku tree removal.
    RemoveSkuTree(String),
    /// Category assignment `(category guid, product code)`.
    Assign(String, String),
    /// Category unassignment `(category guid, product code)`.
    Unassign(String, String),
}

#[derive(Debug, Clone, Default)]
struct Store {
    objects: HashMap<ObjectKey, SerializableObject>,
    assignments: BTreeSet<(String, String)>,
}

impl Store {
    fn objects_of(&self, domain_type: DomainType) -> Vec<&SerializableObject> {
        let mut objects: Vec<_> = self
            .objects
            .iter()
            .filter(|((t, _), _)| *t == domain_type)
            .map(|(_, object)| object)
            .collect();
        objects.sort_by(|a, b| a.guid.cmp(&b.guid));
        objects
    }
}

#[derive(Debug, Default)]
struct TargetState {
    committed: Store,
    working: Option<Store>,
    staged: Vec<IndexNotification>,
    published: Vec<IndexNotification>,
    ignore_changes: bool,
    calls: Vec<TargetCall>,
    failures: HashSet<ObjectKey>,
    fail_commits: bool,
}

impl TargetState {
    fn view(&self) -> &Store {
        self.working.as_ref().unwrap_or(&self.committed)
    }

    fn view_mut(&mut self) -> &mut Store {
        match &mut self.working {
            Some(working) => working,
            None => &mut self.committed,
        }
    }

    fn check(&self, domain_type: DomainType, guid: &str) -> SyncResult<()> {
        if self.failures.contains(&key(domain_type, guid)) {
            return Err(SyncError::Target(format!("write to {domain_type} {guid} failed")));
        }
        Ok(())
    }

    fn require(&self, domain_type: DomainType, guid: &str) -> SyncResult<()> {
        if self.view().objects.contains_key(&key(domain_type, guid)) {
            Ok(())
        } else {
            Err(SyncError::EntityNotFound {
                domain_type,
                guid: guid.to_string(),
            })
        }
    }

    fn notify(&mut self, notification: IndexNotification) {
        if self.working.is_some() {
            self.staged.push(notification);
        } else {
            self.published.push(notification);
        }
    }
}

/// An in-memory target system.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    state: Mutex<TargetState>,
}

impl MemoryTarget {
    /// Creates an empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target's collaborators.
    pub fn services(self: &Arc<Self>) -> TargetServices {
        TargetServices {
            session: self.clone(),
            domain: self.clone(),
            base_amounts: self.clone(),
            locator: self.clone(),
            skus: self.clone(),
            coupon_usages: self.clone(),
            product_categories: self.clone(),
            index_sink: self.clone(),
        }
    }

    /// Stores a committed object without recording a call.
    pub fn seed(&self, object: SerializableObject) {
        self.state
            .lock()
            .committed
            .objects
            .insert(key(object.domain_type(), &object.guid), object);
    }

    /// Stores a committed category assignment without recording a call.
    pub fn seed_assignment(&self, category_guid: &str, product_code: &str) {
        self.state
            .lock()
            .committed
            .assignments
            .insert((category_guid.to_string(), product_code.to_string()));
    }

    /// Makes every write to an object fail.
    pub fn fail_on(&self, domain_type: DomainType, guid: &str) {
        self.state.lock().failures.insert(key(domain_type, guid));
    }

    /// Makes every commit fail.
    pub fn fail_commits(&self, fail: bool) {
        self.state.lock().fail_commits = fail;
    }

    /// Returns the calls made so far.
    pub fn calls(&self) -> Vec<TargetCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the published index notifications.
    pub fn notifications(&self) -> Vec<IndexNotification> {
        self.state.lock().published.clone()
    }

    /// Returns an object as seen by the current transaction, or the
    /// committed version if none is open.
    pub fn object(&self, domain_type: DomainType, guid: &str) -> Option<SerializableObject> {
        self.state.lock().view().objects.get(&key(domain_type, guid)).cloned()
    }

    /// Returns the number of committed objects.
    pub fn object_count(&self) -> usize {
        self.state.lock().committed.objects.len()
    }

    /// Returns the ignore-changes flag.
    pub fn ignore_changes(&self) -> bool {
        self.state.lock().ignore_changes
    }

    /// Returns true if a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.state.lock().working.is_some()
    }
}

impl TargetSession for MemoryTarget {
    fn begin(&self) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.working.is_some() {
            return Err(SyncError::Target("a transaction is already open".into()));
        }
        state.calls.push(TargetCall::Begin);
        state.working = Some(state.committed.clone());
        Ok(())
    }

    fn commit(&self) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(TargetCall::Commit);
        if state.fail_commits {
            return Err(SyncError::Target("commit failed".into()));
        }
        let working = state
            .working
            .take()
            .ok_or_else(|| SyncError::Target("no open transaction".into()))?;
        state.committed = working;
        let staged = std::mem::take(&mut state.staged);
        state.published.extend(staged);
        Ok(())
    }

    fn rollback(&self) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(TargetCall::Rollback);
        state.working = None;
        state.staged.clear();
        Ok(())
    }

    fn flush(&self) -> SyncResult<()> {
        self.state.lock().calls.push(TargetCall::Flush);
        Ok(())
    }

    fn set_ignore_changes(&self, ignore: bool) {
        let mut state = self.state.lock();
        state.calls.push(TargetCall::SetIgnoreChanges(ignore));
        state.ignore_changes = ignore;
    }
}

impl DomainService for MemoryTarget {
    fn find(&self, domain_type: DomainType, guid: &str) -> SyncResult<Option<SerializableObject>> {
        Ok(self.object(domain_type, guid))
    }

    fn add(&self, object: &SerializableObject) -> SyncResult<()> {
        let domain_type = object.domain_type();
        let mut state = self.state.lock();
        state.calls.push(TargetCall::ServiceAdd(domain_type, object.guid.clone()));
        state.check(domain_type, &object.guid)?;
        state
            .view_mut()
            .objects
            .insert(key(domain_type, &object.guid), object.clone());
        Ok(())
    }

    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject> {
        let domain_type = object.domain_type();
        let mut state = self.state.lock();
        state.calls.push(TargetCall::ServiceUpdate(domain_type, object.guid.clone()));
        state.check(domain_type, &object.guid)?;
        state.require(domain_type, &object.guid)?;
        state
            .view_mut()
            .objects
            .insert(key(domain_type, &object.guid), object.clone());
        if let DomainSnapshot::BaseAmount(amount) = &object.snapshot {
            // The service announces every price row it touches.
            state.notify(IndexNotification::new(
                IndexType::PriceChange,
                IndexOperation::Update,
                amount.object_guid.as_str(),
            ));
        }
        Ok(object.clone())
    }

    fn remove(&self, domain_type: DomainType, guid: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(TargetCall::ServiceRemove(domain_type, guid.to_string()));
        state.check(domain_type, guid)?;
        state.view_mut().objects.remove(&key(domain_type, guid));
        Ok(())
    }
}

impl BaseAmountDao for MemoryTarget {
    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject> {
        let domain_type = object.domain_type();
        let mut state = self.state.lock();
        state.calls.push(TargetCall::DaoUpdate(domain_type, object.guid.clone()));
        state.check(domain_type, &object.guid)?;
        state.require(domain_type, &object.guid)?;
        state
            .view_mut()
            .objects
            .insert(key(domain_type, &object.guid), object.clone());
        Ok(object.clone())
    }
}

impl EntityLocator for MemoryTarget {
    fn locate(&self, domain_type: DomainType, guid: &str) -> SyncResult<Option<SerializableObject>> {
        let mut state = self.state.lock();
        state.calls.push(TargetCall::Locate(domain_type, guid.to_string()));
        Ok(state.view().objects.get(&key(domain_type, guid)).cloned())
    }

    fn locate_product_by_code(&self, code: &str) -> SyncResult<Option<SerializableObject>> {
        let mut state = self.state.lock();
        state.calls.push(TargetCall::Locate(DomainType::Product, code.to_string()));
        Ok(state
            .view()
            .objects_of(DomainType::Product)
            .into_iter()
            .find(|object| matches!(&object.snapshot, DomainSnapshot::Product(product) if product.code == code))
            .cloned())
    }
}

impl ProductSkuService for MemoryTarget {
    fn remove_product_sku_tree(&self, sku: &SerializableObject) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(TargetCall::RemoveSkuTree(sku.guid.clone()));
        state.check(DomainType::ProductSku, &sku.guid)?;

        let store = state.view_mut();
        store.objects.remove(&key(DomainType::ProductSku, &sku.guid));
        store.objects.retain(|_, object| match &object.snapshot {
            DomainSnapshot::BaseAmount(amount) => amount.object_guid != sku.guid,
            _ => true,
        });
        debug!(guid = %sku.guid, "removed sku tree");
        Ok(())
    }

    fn find_by_product(&self, product_guid: &str) -> SyncResult<Vec<SerializableObject>> {
        let state = self.state.lock();
        Ok(state
            .view()
            .objects_of(DomainType::ProductSku)
            .into_iter()
            .filter(|object| {
                matches!(&object.snapshot, DomainSnapshot::ProductSku(sku) if sku.product_guid == product_guid)
            })
            .cloned()
            .collect())
    }
}

impl CouponUsageService for MemoryTarget {
    fn find_by_coupon_config(&self, coupon_config_guid: &str) -> SyncResult<Vec<SerializableObject>> {
        let state = self.state.lock();
        Ok(state
            .view()
            .objects_of(DomainType::CouponUsage)
            .into_iter()
            .filter(|object| {
                matches!(&object.snapshot, DomainSnapshot::CouponUsage(usage) if usage.coupon_config_guid == coupon_config_guid)
            })
            .cloned()
            .collect())
    }
}

impl ProductCategoryService for MemoryTarget {
    fn find_products_by_category(&self, category_guid: &str) -> SyncResult<Vec<SerializableObject>> {
        let state = self.state.lock();
        let store = state.view();
        let codes: HashSet<&str> = store
            .assignments
            .iter()
            .filter(|(category, _)| category == category_guid)
            .map(|(_, code)| code.as_str())
            .collect();
        Ok(store
            .objects_of(DomainType::Product)
            .into_iter()
            .filter(|object| {
                matches!(&object.snapshot, DomainSnapshot::Product(product) if codes.contains(product.code.as_str()))
            })
            .cloned()
            .collect())
    }

    fn find_categories_by_product(&self, product_code: &str) -> SyncResult<Vec<String>> {
        let state = self.state.lock();
        Ok(state
            .view()
            .assignments
            .iter()
            .filter(|(_, code)| code == product_code)
            .map(|(category, _)| category.clone())
            .collect())
    }

    fn is_assigned(&self, category_guid: &str, product_code: &str) -> SyncResult<bool> {
        let state = self.state.lock();
        Ok(state
            .view()
            .assignments
            .contains(&(category_guid.to_string(), product_code.to_string())))
    }

    fn assign(&self, category_guid: &str, product_code: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(TargetCall::Assign(category_guid.to_string(), product_code.to_string()));
        state.check(
            DomainType::ProductCategory,
            &ProductCategorySnapshot::composite_guid(category_guid, product_code),
        )?;
        state
            .view_mut()
            .assignments
            .insert((category_guid.to_string(), product_code.to_string()));
        Ok(())
    }

    fn unassign(&self, category_guid: &str, product_code: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(TargetCall::Unassign(category_guid.to_string(), product_code.to_string()));
        state.check(
            DomainType::ProductCategory,
            &ProductCategorySnapshot::composite_guid(category_guid, product_code),
        )?;
        state
            .view_mut()
            .assignments
            .remove(&(category_guid.to_string(), product_code.to_string()));
        Ok(())
    }
}

impl IndexNotificationSink for MemoryTarget {
    fn enqueue(&self, notification: IndexNotification) -> SyncResult<()> {
        self.state.lock().notify(notification);
        Ok(())
    }
}

/// Connection lifecycle that only counts calls.
#[derive(Debug, Default)]
pub struct MemoryLifecycle {
    fail_init: bool,
    inits: AtomicUsize,
    destroys: AtomicUsize,
    open: AtomicBool,
}

impl MemoryLifecycle {
    /// Creates a lifecycle whose connections always open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lifecycle whose connections never open.
    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    /// Returns the number of `init_config` calls.
    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    /// Returns the number of `destroy_config` calls.
    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    /// Returns true while connections are open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl ConfigLifecycle for MemoryLifecycle {
    fn init_config(
        &self,
        source: Option<&ConnectionConfiguration>,
        target: Option<&ConnectionConfiguration>,
    ) -> SyncResult<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(SyncError::Configuration("cannot open system connections".into()));
        }
        debug!(
            source = ?source.map(|c| c.name.as_str()),
            target = ?target.map(|c| c.name.as_str()),
            "opened system connections"
        );
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn destroy_config(&self) {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }
}
