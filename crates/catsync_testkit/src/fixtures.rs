//! Object builders and ready-made systems.
//!
//! Builders produce snapshots with predictable codes derived from their
//! guids. [`TestSystems`] wires an in-memory source and target to the
//! stock controllers.

use catsync_engine::{
    ChangeSet, ChangeSetState, ConnectionConfiguration, EngineSettings, MemoryLifecycle,
    MemorySource, MemoryTarget, SyncController, SyncJobConfiguration,
};
use catsync_job::{
    BaseAmountSnapshot, CatalogSnapshot, CategorySnapshot, ChangeKind, CouponConfigSnapshot,
    CouponUsageSnapshot, DomainSnapshot, DomainType, JobEntry, PriceListSnapshot,
    ProductCategorySnapshot, ProductSkuSnapshot, ProductSnapshot, SerializableObject,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Guid of the catalog every fixture category belongs to.
pub const MASTER_CATALOG: &str = "master";

/// Guid of the price list every fixture price row belongs to.
pub const PRICE_LIST: &str = "pl-usd";

/// A master catalog.
pub fn catalog(guid: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::Catalog(CatalogSnapshot {
            code: guid.to_uppercase(),
            master: true,
        }),
    )
}

/// A master category of [`MASTER_CATALOG`].
pub fn category(guid: &str, parent: Option<&str>) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::Category(CategorySnapshot {
            code: guid.to_uppercase(),
            catalog_guid: MASTER_CATALOG.into(),
            parent_guid: parent.map(String::from),
            master_category_guid: None,
        }),
    )
}

/// A category linked into a virtual catalog from `master_guid`.
pub fn linked_category(guid: &str, parent: Option<&str>, master_guid: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::Category(CategorySnapshot {
            code: guid.to_uppercase(),
            catalog_guid: "virtual".into(),
            parent_guid: parent.map(String::from),
            master_category_guid: Some(master_guid.into()),
        }),
    )
}

/// A product.
pub fn product(guid: &str, code: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::Product(ProductSnapshot {
            code: code.into(),
            category_guids: Vec::new(),
        }),
    )
}

/// A sku of `product_guid`.
pub fn sku(guid: &str, product_guid: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::ProductSku(ProductSkuSnapshot {
            sku_code: guid.to_uppercase(),
            product_guid: product_guid.into(),
        }),
    )
}

/// A USD price list.
pub fn price_list(guid: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::PriceList(PriceListSnapshot {
            name: guid.into(),
            currency: "USD".into(),
        }),
    )
}

/// A single-quantity price row of [`PRICE_LIST`] for a product.
pub fn base_amount(guid: &str, product_guid: &str, list_value: i64) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::BaseAmount(BaseAmountSnapshot {
            price_list_guid: PRICE_LIST.into(),
            object_guid: product_guid.into(),
            object_type: DomainType::Product,
            quantity: 1,
            list_value,
            sale_value: None,
        }),
    )
}

/// A product-category assignment, keyed by its composite guid.
pub fn product_category(category_guid: &str, product_code: &str) -> SerializableObject {
    let snapshot = ProductCategorySnapshot {
        category_guid: category_guid.into(),
        product_code: product_code.into(),
    };
    SerializableObject::new(snapshot.guid(), DomainSnapshot::ProductCategory(snapshot))
}

/// A coupon configuration.
pub fn coupon_config(guid: &str, usage_limit: u32) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::CouponConfig(CouponConfigSnapshot {
            rule_code: guid.to_uppercase(),
            usage_limit,
        }),
    )
}

/// A coupon usage. Usages without an email are not addressable.
pub fn coupon_usage(guid: &str, coupon_config_guid: &str, email: Option<&str>) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::CouponUsage(CouponUsageSnapshot {
            coupon_config_guid: coupon_config_guid.into(),
            coupon_code: guid.to_uppercase(),
            customer_email: email.map(String::from),
            use_count: 0,
        }),
    )
}

/// A preloaded add entry for `object`.
pub fn add_entry(object: SerializableObject) -> JobEntry {
    JobEntry::new(object.domain_type(), object.guid.clone(), ChangeKind::Add).with_object(object)
}

/// A delete entry.
pub fn delete_entry(domain_type: DomainType, guid: &str) -> JobEntry {
    JobEntry::new(domain_type, guid, ChangeKind::Delete)
}

/// A temporary root directory for persisted jobs.
pub struct TempJobRoot {
    dir: TempDir,
}

impl TempJobRoot {
    /// Creates an empty root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the root path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns true if a job directory holds both persisted files.
    pub fn contains_job(&self, job_id: &str) -> bool {
        let dir = self.dir.path().join(job_id);
        dir.join("descriptor.json").exists() && dir.join("transaction_job.json").exists()
    }
}

impl Default for TempJobRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory source, target and connection lifecycle.
pub struct TestSystems {
    /// The source system.
    pub source: Arc<MemorySource>,
    /// The target system.
    pub target: Arc<MemoryTarget>,
    /// The connection lifecycle shared by every controller.
    pub lifecycle: Arc<MemoryLifecycle>,
    /// Engine settings handed to every controller.
    pub settings: EngineSettings,
}

impl TestSystems {
    /// Creates empty systems with the standard settings.
    pub fn new() -> Self {
        Self {
            source: Arc::new(MemorySource::new()),
            target: Arc::new(MemoryTarget::new()),
            lifecycle: Arc::new(MemoryLifecycle::new()),
            settings: EngineSettings::default(),
        }
    }

    /// Stores `objects` on the source and opens a change set that adds them
    /// in the given order.
    pub fn publish(&self, name: &str, objects: impl IntoIterator<Item = SerializableObject>) {
        let mut change_set = ChangeSet::new(name).with_state(ChangeSetState::ReadyToPublish);
        for object in objects {
            change_set = change_set.with_member(object.domain_type(), object.guid.clone(), ChangeKind::Add);
            self.source.put_object(object);
        }
        self.source.add_change_set(change_set);
    }

    /// Opens a change set that deletes the given objects.
    pub fn retire<'a>(&self, name: &str, members: impl IntoIterator<Item = (DomainType, &'a str)>) {
        let mut change_set = ChangeSet::new(name).with_state(ChangeSetState::ReadyToPublish);
        for (domain_type, guid) in members {
            change_set = change_set.with_member(domain_type, guid, ChangeKind::Delete);
        }
        self.source.add_change_set(change_set);
    }

    /// A configuration naming both systems.
    pub fn config(&self, selector: &str) -> SyncJobConfiguration {
        SyncJobConfiguration::new(selector)
            .with_source(ConnectionConfiguration::new("author", "mem://author"))
            .with_target(ConnectionConfiguration::new("live", "mem://live"))
    }

    /// A full controller.
    pub fn full(&self) -> SyncController {
        SyncController::full(
            &self.source.system(),
            &self.target.services(),
            &self.settings,
            self.lifecycle.clone(),
        )
    }

    /// A full controller that also persists the job.
    pub fn full_and_save(&self) -> SyncController {
        SyncController::full_and_save(
            &self.source.system(),
            &self.target.services(),
            &self.settings,
            self.lifecycle.clone(),
        )
    }

    /// A controller that only persists the job.
    pub fn export(&self) -> SyncController {
        SyncController::export(&self.source.system(), self.lifecycle.clone())
    }

    /// A controller that replays a persisted job into this target.
    pub fn load(&self) -> SyncController {
        SyncController::load(&self.target.services(), &self.settings, self.lifecycle.clone())
    }
}

impl Default for TestSystems {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_category_guid_is_composite() {
        assert_eq!(product_category("cat-1", "P1").guid, "cat-1|P1");
    }

    #[test]
    fn publish_registers_members_in_order() {
        let systems = TestSystems::new();
        systems.publish("cs-1", [sku("sku-1", "p-1"), product("p-1", "P1")]);
        let root = TempJobRoot::new();

        let summary = systems
            .export()
            .synchronize(&systems.config("cs-1").with_root_path(root.path()))
            .unwrap();

        let guids: Vec<_> = summary
            .success_results()
            .iter()
            .map(|r| r.job_entry_guid.as_str())
            .collect();
        assert_eq!(guids, vec!["sku-1", "p-1"]);
        assert!(root.contains_job(&summary.job_id().unwrap().to_string()));
    }

    #[test]
    fn temp_root_starts_empty() {
        let root = TempJobRoot::new();
        assert!(!root.contains_job("anything"));
    }
}
