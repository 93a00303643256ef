use super::TargetDaoAdapter;
use crate::error::SyncResult;
use crate::target::{CouponUsageService, DomainService};
use catsync_job::{DomainSnapshot, DomainType, SerializableObject};
use std::sync::Arc;

/// Coupon usage adapter.
///
/// Usages without a customer email are anonymous placeholders and are never
/// reported as associated with their coupon configuration.
pub struct CouponUsageDaoAdapter {
    service: Arc<dyn DomainService>,
    usages: Arc<dyn CouponUsageService>,
}

impl CouponUsageDaoAdapter {
    /// Creates the adapter.
    pub fn new(service: Arc<dyn DomainService>, usages: Arc<dyn CouponUsageService>) -> Self {
        Self { service, usages }
    }
}

impl TargetDaoAdapter for CouponUsageDaoAdapter {
    fn domain_type(&self) -> DomainType {
        DomainType::CouponUsage
    }

    fn get(&self, guid: &str) -> SyncResult<Option<SerializableObject>> {
        self.service.find(DomainType::CouponUsage, guid)
    }

    fn add(&self, object: &SerializableObject) -> SyncResult<()> {
        self.service.add(object)
    }

    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject> {
        self.service.update(object)
    }

    fn remove(&self, guid: &str) -> SyncResult<()> {
        self.service.remove(DomainType::CouponUsage, guid)
    }

    fn associated_guids(&self, owner_type: DomainType, owner_guid: &str) -> SyncResult<Vec<String>> {
        if owner_type != DomainType::CouponConfig {
            return Ok(Vec::new());
        }
        Ok(self
            .usages
            .find_by_coupon_config(owner_guid)?
            .into_iter()
            .filter(|object| match &object.snapshot {
                DomainSnapshot::CouponUsage(usage) => usage.is_addressable(),
                _ => false,
            })
            .map(|object| object.guid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTarget;
    use catsync_job::CouponUsageSnapshot;

    fn usage(guid: &str, email: Option<&str>) -> SerializableObject {
        SerializableObject::new(
            guid,
            DomainSnapshot::CouponUsage(CouponUsageSnapshot {
                coupon_config_guid: "cc-1".into(),
                coupon_code: guid.to_uppercase(),
                customer_email: email.map(String::from),
                use_count: 1,
            }),
        )
    }

    #[test]
    fn anonymous_usages_filtered() {
        let target = Arc::new(MemoryTarget::new());
        target.seed(usage("cu-1", Some("ann@example.com")));
        target.seed(usage("cu-2", None));
        target.seed(usage("cu-3", Some("  ")));
        let adapter = CouponUsageDaoAdapter::new(target.clone(), target.clone());

        let guids = adapter
            .associated_guids(DomainType::CouponConfig, "cc-1")
            .unwrap();
        assert_eq!(guids, vec!["cu-1"]);
        assert!(adapter
            .associated_guids(DomainType::Product, "cc-1")
            .unwrap()
            .is_empty());
    }
}
