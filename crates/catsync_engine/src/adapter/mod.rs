//! Per-type target adapters.
//!
//! An adapter translates a job entry into target persistence operations for
//! one domain type. Most types go straight to the [`DomainService`]; the
//! types with dedicated adapters deviate from that default to keep index
//! notifications, cascades and synthetic guids correct:
//!
//! - [`BaseAmountDaoAdapter`] updates through the low-level DAO
//! - [`ProductSkuDaoAdapter`] removes whole sku trees
//! - [`CouponUsageDaoAdapter`] skips anonymous usages
//! - [`ProductCategoryDaoAdapter`] works on `category|product` guids
//!
//! [`DomainService`]: crate::DomainService

mod base_amount;
mod coupon_usage;
mod product_category;
mod product_sku;
mod service;

pub use base_amount::BaseAmountDaoAdapter;
pub use coupon_usage::CouponUsageDaoAdapter;
pub use product_category::ProductCategoryDaoAdapter;
pub use product_sku::ProductSkuDaoAdapter;
pub use service::ServiceDaoAdapter;

use crate::error::{SyncError, SyncResult};
use crate::target::TargetServices;
use catsync_job::{DomainType, SerializableObject};
use std::collections::HashMap;
use std::sync::Arc;

/// Target operations for one domain type.
pub trait TargetDaoAdapter: Send + Sync {
    /// The type this adapter handles.
    fn domain_type(&self) -> DomainType;

    /// Finds the target version of an object.
    fn get(&self, guid: &str) -> SyncResult<Option<SerializableObject>>;

    /// Inserts an object.
    fn add(&self, object: &SerializableObject) -> SyncResult<()>;

    /// Updates an object and returns the stored version.
    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject>;

    /// Removes an object. Removing a missing object is not an error.
    fn remove(&self, guid: &str) -> SyncResult<()>;

    /// Returns the guids of this type's objects owned by another object.
    fn associated_guids(&self, _owner_type: DomainType, _owner_guid: &str) -> SyncResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Adapters by type plus the ownership associations used to cascade removals.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<DomainType, Arc<dyn TargetDaoAdapter>>,
    associations: Vec<(DomainType, DomainType)>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the registry used against a full target system.
    pub fn standard(services: &TargetServices) -> Self {
        let mut registry = Self::new();
        for domain_type in [
            DomainType::Catalog,
            DomainType::Category,
            DomainType::Product,
            DomainType::PriceList,
            DomainType::CouponConfig,
        ] {
            registry = registry.with_adapter(ServiceDaoAdapter::new(domain_type, services.domain.clone()));
        }
        registry
            .with_adapter(BaseAmountDaoAdapter::new(
                services.domain.clone(),
                services.base_amounts.clone(),
            ))
            .with_adapter(ProductSkuDaoAdapter::new(
                services.domain.clone(),
                services.locator.clone(),
                services.skus.clone(),
            ))
            .with_adapter(CouponUsageDaoAdapter::new(
                services.domain.clone(),
                services.coupon_usages.clone(),
            ))
            .with_adapter(ProductCategoryDaoAdapter::new(
                services.domain.clone(),
                services.product_categories.clone(),
            ))
            .with_association(DomainType::Product, DomainType::ProductSku)
            .with_association(DomainType::Product, DomainType::ProductCategory)
            .with_association(DomainType::Category, DomainType::ProductCategory)
            .with_association(DomainType::CouponConfig, DomainType::CouponUsage)
    }

    /// Registers an adapter, replacing any adapter for the same type.
    pub fn with_adapter(mut self, adapter: impl TargetDaoAdapter + 'static) -> Self {
        self.adapters.insert(adapter.domain_type(), Arc::new(adapter));
        self
    }

    /// Declares that removing an `owner` removes its associated objects.
    pub fn with_association(mut self, owner: DomainType, associated: DomainType) -> Self {
        self.associations.push((owner, associated));
        self
    }

    /// Returns the adapter for a type.
    pub fn adapter(&self, domain_type: DomainType) -> SyncResult<&dyn TargetDaoAdapter> {
        self.adapters
            .get(&domain_type)
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| {
                SyncError::Configuration(format!("no target adapter registered for {domain_type}"))
            })
    }

    /// Returns the objects owned by an object, in association order.
    pub fn associated_guids(
        &self,
        owner_type: DomainType,
        owner_guid: &str,
    ) -> SyncResult<Vec<(DomainType, String)>> {
        let mut associated = Vec::new();
        for (_, associated_type) in self.associations.iter().filter(|(owner, _)| *owner == owner_type) {
            let adapter = self.adapter(*associated_type)?;
            for guid in adapter.associated_guids(owner_type, owner_guid)? {
                associated.push((*associated_type, guid));
            }
        }
        Ok(associated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTarget;
    use catsync_job::{DomainSnapshot, ProductSkuSnapshot, ProductSnapshot};

    #[test]
    fn missing_adapter_is_configuration_error() {
        let registry = AdapterRegistry::new();
        let err = registry.adapter(DomainType::Product).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn standard_registry_covers_every_type() {
        let target = Arc::new(MemoryTarget::new());
        let registry = AdapterRegistry::standard(&target.services());
        for domain_type in DomainType::ALL {
            assert_eq!(registry.adapter(domain_type).unwrap().domain_type(), domain_type);
        }
    }

    #[test]
    fn product_owns_skus_and_assignments() {
        let target = Arc::new(MemoryTarget::new());
        target.seed(SerializableObject::new(
            "p-1",
            DomainSnapshot::Product(ProductSnapshot {
                code: "P1".into(),
                category_guids: Vec::new(),
            }),
        ));
        target.seed(SerializableObject::new(
            "sku-1",
            DomainSnapshot::ProductSku(ProductSkuSnapshot {
                sku_code: "SKU1".into(),
                product_guid: "p-1".into(),
            }),
        ));
        target.seed_assignment("cat-1", "P1");

        let registry = AdapterRegistry::standard(&target.services());
        let associated = registry.associated_guids(DomainType::Product, "p-1").unwrap();
        assert_eq!(
            associated,
            vec![
                (DomainType::ProductSku, "sku-1".to_string()),
                (DomainType::ProductCategory, "cat-1|P1".to_string()),
            ]
        );
        assert!(registry.associated_guids(DomainType::Catalog, "master").unwrap().is_empty());
    }
}
